//! Lineage fingerprints: generation, drift and kinship.
//!
//! A lineage is [`LINEAGE_LEN`] uppercase ASCII letters. A birth changes
//! exactly one position to a different letter, so siblings and
//! parent/child pairs sit at Hamming distance one and kinship decays
//! naturally over generations.

use rand::Rng;
use throng_types::LINEAGE_LEN;

const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Wildcard scope meaning "every lineage".
pub const EVERYONE: &str = "*";

/// Largest Hamming distance still counted as kin.
pub const KIN_DISTANCE: usize = 1;

/// A fresh random lineage for a founder.
pub fn random_lineage<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..LINEAGE_LEN).map(|_| random_letter(rng)).collect()
}

/// Copy `parent` with exactly one position changed to a different letter.
///
/// A malformed parent (wrong length or non-letters) is replaced with a
/// fresh random lineage rather than propagated.
pub fn mutate_lineage<R: Rng + ?Sized>(parent: &str, rng: &mut R) -> String {
    if !is_well_formed(parent) {
        return random_lineage(rng);
    }
    let mut bytes: Vec<u8> = parent.bytes().collect();
    let position = rng.random_range(0..LINEAGE_LEN);
    if let Some(slot) = bytes.get_mut(position) {
        let current = *slot;
        // Draw from the 25 letters that differ from the current one.
        let offset = rng.random_range(1..26_u8);
        let index = current.saturating_sub(b'A').saturating_add(offset) % 26;
        *slot = ALPHABET.get(usize::from(index)).copied().unwrap_or(b'A');
    }
    String::from_utf8(bytes).unwrap_or_else(|_| random_lineage(rng))
}

/// Number of differing positions, or `None` if the lengths differ.
pub fn hamming(a: &str, b: &str) -> Option<usize> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count())
}

/// Whether two lineages are kin (Hamming distance at most one).
pub fn is_kin(a: &str, b: &str) -> bool {
    hamming(a, b).is_some_and(|d| d <= KIN_DISTANCE)
}

/// Whether `lineage` falls inside a petition scope.
pub fn in_scope(lineage: &str, scope: &str) -> bool {
    scope == EVERYONE || is_kin(lineage, scope)
}

/// Exactly [`LINEAGE_LEN`] uppercase ASCII letters.
pub fn is_well_formed(lineage: &str) -> bool {
    lineage.len() == LINEAGE_LEN && lineage.bytes().all(|b| b.is_ascii_uppercase())
}

fn random_letter<R: Rng + ?Sized>(rng: &mut R) -> char {
    char::from(ALPHABET.get(rng.random_range(0..26)).copied().unwrap_or(b'A'))
}
