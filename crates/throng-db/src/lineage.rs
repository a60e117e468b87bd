//! Per-lineage aggregate written alongside each snapshot.

use std::collections::BTreeMap;

use throng_types::{Creature, LineageSummary, WorldSnapshot};

/// Events taken from each member's log.
const EVENTS_PER_MEMBER: usize = 2;

/// Pooled events kept per lineage.
const EVENTS_PER_LINEAGE: usize = 10;

/// Aggregate the living creatures of a snapshot by exact lineage.
///
/// Output is ordered by lineage so repeated saves of the same world write
/// the same document.
pub fn summarize(snapshot: &WorldSnapshot) -> Vec<LineageSummary> {
    let mut groups: BTreeMap<&str, Vec<&Creature>> = BTreeMap::new();
    for creature in snapshot.creatures.iter().filter(|c| c.alive) {
        groups.entry(creature.lineage.as_str()).or_default().push(creature);
    }

    groups
        .into_iter()
        .map(|(lineage, members)| {
            let total_hunger: f32 = members.iter().map(|c| c.hunger).sum();
            let mut recent_events: Vec<String> = members
                .iter()
                .flat_map(|c| c.event_log.recent(EVENTS_PER_MEMBER).iter().cloned())
                .collect();
            recent_events.truncate(EVENTS_PER_LINEAGE);
            LineageSummary {
                lineage: lineage.to_owned(),
                members: u32::try_from(members.len()).unwrap_or(u32::MAX),
                average_hunger: total_hunger / members.len().max(1) as f32,
                max_generation: members
                    .iter()
                    .map(|c| c.evolution_generation)
                    .max()
                    .unwrap_or(0),
                recent_events,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use throng_types::{Epoch, LastEvent, ResourceLedger};

    use super::*;

    fn snapshot(creatures: Vec<Creature>) -> WorldSnapshot {
        WorldSnapshot {
            world_id: "test".to_owned(),
            tick: 0,
            creatures,
            food: Vec::new(),
            trees: Vec::new(),
            bones: Vec::new(),
            resources: ResourceLedger::default(),
            pollution: 0.0,
            epoch: Epoch::Eden,
            observed_principles: Vec::new(),
            ancestral_memory: Vec::new(),
            chronicle: Vec::new(),
            petitions: Vec::new(),
            next_petition_id: 1,
            grants: 0,
            denials: 0,
            births: 0,
            deaths: 0,
            last_evaluation_date: None,
            last_event: LastEvent::default(),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn groups_living_members_by_lineage() {
        let mut a = Creature::founder("ABCD", 0.0, 0.0);
        a.hunger = 40.0;
        a.evolution_generation = 2;
        a.event_log.push("found figs");
        let mut b = Creature::founder("ABCD", 1.0, 0.0);
        b.hunger = 60.0;
        b.evolution_generation = 5;
        let c = Creature::founder("WXYZ", 2.0, 0.0);
        let mut dead = Creature::founder("WXYZ", 3.0, 0.0);
        dead.alive = false;

        let summaries = summarize(&snapshot(vec![a, b, c, dead]));
        assert_eq!(summaries.len(), 2);

        let abcd = summaries.first();
        assert_eq!(abcd.map(|s| s.lineage.as_str()), Some("ABCD"));
        assert_eq!(abcd.map(|s| s.members), Some(2));
        assert!(abcd.is_some_and(|s| (s.average_hunger - 50.0).abs() < 1e-4));
        assert_eq!(abcd.map(|s| s.max_generation), Some(5));
        assert_eq!(abcd.map(|s| s.recent_events.clone()), Some(vec!["found figs".to_owned()]));

        assert_eq!(summaries.get(1).map(|s| s.members), Some(1));
    }

    #[test]
    fn empty_world_has_no_lineages() {
        assert!(summarize(&snapshot(Vec::new())).is_empty());
    }
}
