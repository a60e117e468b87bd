//! Computational budget for oracle calls.
//!
//! Every call reserves its worst-case cost synchronously before it is
//! dispatched, then settles to the actual cost once token usage is known.
//! Reservation and the spend counter live behind one mutex, so concurrent
//! dispatches can never overspend the ceiling.
//!
//! All monetary calculations use [`rust_decimal::Decimal`].

use std::fmt;
use std::sync::Mutex;

use rust_decimal::Decimal;

/// One million, the denominator for per-million-token pricing.
const ONE_MILLION: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Thread-safe spend ceiling with reservations.
///
/// Safe to share via `Arc<Budget>`.
pub struct Budget {
    /// Total dollars that may ever be committed.
    limit: Decimal,
    /// Price per million input tokens.
    input_rate: Decimal,
    /// Price per million output tokens.
    output_rate: Decimal,
    inner: Mutex<BudgetInner>,
}

#[derive(Debug, Default)]
struct BudgetInner {
    /// Dollars held by in-flight calls.
    reserved: Decimal,
    /// Dollars settled by finished calls.
    spent: Decimal,
    /// Calls dispatched.
    calls: u64,
    /// Calls refused for lack of budget.
    refused: u64,
    input_tokens: u64,
    output_tokens: u64,
}

/// A worst-case hold on the budget for one in-flight call.
///
/// Must be handed back through [`Budget::settle`]; dropping it without
/// settling leaves the hold in place.
#[derive(Debug)]
#[must_use = "a reservation holds budget until settled"]
pub struct Reservation {
    amount: Decimal,
}

impl Reservation {
    /// Dollars held.
    pub const fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Snapshot of budget state returned by [`Budget::summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetSummary {
    /// Spend ceiling.
    pub limit: Decimal,
    /// Held by in-flight calls.
    pub reserved: Decimal,
    /// Settled.
    pub spent: Decimal,
    /// Calls dispatched.
    pub calls: u64,
    /// Calls refused for lack of budget.
    pub refused: u64,
    /// Total input tokens reported.
    pub input_tokens: u64,
    /// Total output tokens reported.
    pub output_tokens: u64,
}

impl Budget {
    /// Create a budget with a ceiling and per-million-token pricing.
    pub fn new(limit: Decimal, input_rate: Decimal, output_rate: Decimal) -> Self {
        Self {
            limit,
            input_rate,
            output_rate,
            inner: Mutex::new(BudgetInner::default()),
        }
    }

    /// Price a call from its token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> Decimal {
        let input_cost = Decimal::from(input_tokens)
            .checked_div(ONE_MILLION)
            .and_then(|d| d.checked_mul(self.input_rate))
            .unwrap_or(Decimal::ZERO);
        let output_cost = Decimal::from(output_tokens)
            .checked_div(ONE_MILLION)
            .and_then(|d| d.checked_mul(self.output_rate))
            .unwrap_or(Decimal::ZERO);
        input_cost.checked_add(output_cost).unwrap_or(Decimal::MAX)
    }

    /// Try to hold the worst-case cost of a call.
    ///
    /// Returns `None` when the remaining budget cannot cover it; the caller
    /// then takes its local fallback.
    pub fn try_reserve(&self, input_tokens: u64, max_output_tokens: u64) -> Option<Reservation> {
        let amount = self.cost(input_tokens, max_output_tokens);
        let Ok(mut inner) = self.inner.lock() else {
            return None;
        };
        let committed = inner.reserved.checked_add(inner.spent)?;
        let after = committed.checked_add(amount)?;
        if after > self.limit {
            inner.refused = inner.refused.saturating_add(1);
            return None;
        }
        inner.reserved = inner.reserved.checked_add(amount)?;
        inner.calls = inner.calls.saturating_add(1);
        Some(Reservation { amount })
    }

    /// Release a reservation and record the actual cost.
    ///
    /// Pass `None` for usage when the call failed without reporting it;
    /// the full reservation is then counted as spent.
    pub fn settle(&self, reservation: Reservation, usage: Option<(u64, u64)>) {
        let actual = match usage {
            Some((input, output)) => self.cost(input, output),
            None => reservation.amount,
        };
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.reserved = inner
            .reserved
            .checked_sub(reservation.amount)
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO);
        inner.spent = inner.spent.checked_add(actual).unwrap_or(inner.spent);
        if let Some((input, output)) = usage {
            inner.input_tokens = inner.input_tokens.saturating_add(input);
            inner.output_tokens = inner.output_tokens.saturating_add(output);
        }
    }

    /// Whether any further call at all could be afforded.
    pub fn is_exhausted(&self) -> bool {
        self.inner.lock().map_or(true, |inner| {
            inner
                .reserved
                .checked_add(inner.spent)
                .is_none_or(|committed| committed >= self.limit)
        })
    }

    /// Current state. Zeroed if the mutex is poisoned.
    pub fn summary(&self) -> BudgetSummary {
        let Ok(inner) = self.inner.lock() else {
            return BudgetSummary {
                limit: self.limit,
                reserved: Decimal::ZERO,
                spent: Decimal::ZERO,
                calls: 0,
                refused: 0,
                input_tokens: 0,
                output_tokens: 0,
            };
        };
        BudgetSummary {
            limit: self.limit,
            reserved: inner.reserved,
            spent: inner.spent,
            calls: inner.calls,
            refused: inner.refused,
            input_tokens: inner.input_tokens,
            output_tokens: inner.output_tokens,
        }
    }
}

impl fmt::Debug for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Budget")
            .field("limit", &self.limit)
            .field("input_rate", &self.input_rate)
            .field("output_rate", &self.output_rate)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for BudgetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Oracle budget: ${} spent, ${} reserved of ${} | {} calls, {} refused | \
             {} input tokens, {} output tokens",
            self.spent,
            self.reserved,
            self.limit,
            self.calls,
            self.refused,
            self.input_tokens,
            self.output_tokens,
        )
    }
}
