use crate::simulation_engine::intersections::{Direction, IntersectionId};
use std::collections::HashMap;

/// Sightings older than this are expired.
pub const EMERGENCY_HORIZON_SECS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmergencySighting {
    pub direction: Direction,
    pub seen_at: i64,
}

/// Time-bounded set of active emergency-vehicle sightings, indexed per
/// intersection. Volumes are tiny, so membership checks are linear scans
/// over the intersection's own bucket.
///
/// Pruning is lazy: expired entries are dropped on every insert, and the
/// membership queries filter by age, so a stale entry can linger in memory
/// between inserts but is never reported as active.
#[derive(Debug, Default)]
pub struct EmergencyRegistry {
    sightings: HashMap<IntersectionId, Vec<EmergencySighting>>,
}

impl EmergencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sighting at `now` and returns the number of active
    /// sightings across the whole network after pruning.
    pub fn add(&mut self, intersection_id: IntersectionId, direction: Direction, now: i64) -> usize {
        self.sightings
            .entry(intersection_id)
            .or_default()
            .push(EmergencySighting { direction, seen_at: now });
        self.prune(now);
        self.active_count(now)
    }

    /// Any unexpired sighting at the intersection, regardless of approach.
    pub fn has(&self, intersection_id: IntersectionId, now: i64) -> bool {
        self.sightings
            .get(&intersection_id)
            .is_some_and(|bucket| bucket.iter().any(|s| is_active(s, now)))
    }

    /// Unexpired sighting for one specific approach.
    pub fn has_direction(
        &self,
        intersection_id: IntersectionId,
        direction: Direction,
        now: i64,
    ) -> bool {
        self.sightings
            .get(&intersection_id)
            .is_some_and(|bucket| {
                bucket
                    .iter()
                    .any(|s| s.direction == direction && is_active(s, now))
            })
    }

    pub fn active_count(&self, now: i64) -> usize {
        self.sightings
            .values()
            .map(|bucket| bucket.iter().filter(|s| is_active(s, now)).count())
            .sum()
    }

    fn prune(&mut self, now: i64) {
        for bucket in self.sightings.values_mut() {
            bucket.retain(|s| is_active(s, now));
        }
        self.sightings.retain(|_, bucket| !bucket.is_empty());
    }
}

fn is_active(sighting: &EmergencySighting, now: i64) -> bool {
    now - sighting.seen_at < EMERGENCY_HORIZON_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    const I1: IntersectionId = IntersectionId(1);
    const I2: IntersectionId = IntersectionId(2);

    #[test]
    fn add_reports_the_active_count() {
        let mut registry = EmergencyRegistry::new();
        assert_eq!(registry.add(I1, Direction::N, 1000), 1);
        assert_eq!(registry.add(I2, Direction::E, 1010), 2);
        assert!(registry.has(I1, 1010));
        assert!(registry.has_direction(I2, Direction::E, 1010));
        assert!(!registry.has_direction(I2, Direction::W, 1010));
    }

    #[test]
    fn sighting_exactly_at_the_horizon_is_expired() {
        let mut registry = EmergencyRegistry::new();
        registry.add(I1, Direction::S, 1000);
        assert!(registry.has(I1, 1000 + EMERGENCY_HORIZON_SECS - 1));
        assert!(!registry.has(I1, 1000 + EMERGENCY_HORIZON_SECS));
        assert!(!registry.has_direction(I1, Direction::S, 1000 + EMERGENCY_HORIZON_SECS));
    }

    #[test]
    fn insert_prunes_expired_entries() {
        let mut registry = EmergencyRegistry::new();
        registry.add(I1, Direction::N, 0);
        registry.add(I1, Direction::S, 10);
        // Both old sightings are past the horizon by now.
        assert_eq!(registry.add(I2, Direction::W, 500), 1);
        assert!(!registry.has(I1, 500));
        assert_eq!(registry.active_count(500), 1);
    }
}
