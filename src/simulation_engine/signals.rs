use crate::simulation_engine::intersections::{Direction, Intersection, IntersectionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_CYCLE_SECS: u32 = 60;

/// Cycle bounds applied when an operator overrides a signal.
pub const MIN_CYCLE_SECS: u32 = 5;
pub const MAX_CYCLE_SECS: u32 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalPhase {
    Red,
    Yellow,
    Green,
}

impl SignalPhase {
    pub fn parse(s: &str) -> Option<SignalPhase> {
        match s {
            "red" => Some(SignalPhase::Red),
            "yellow" => Some(SignalPhase::Yellow),
            "green" => Some(SignalPhase::Green),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalPhase::Red => "red",
            SignalPhase::Yellow => "yellow",
            SignalPhase::Green => "green",
        }
    }
}

/// One signal head: the light facing a single approach of one intersection.
/// Mutated only by the signal controller and the manual override path.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub intersection_id: IntersectionId,
    pub direction: Direction,
    pub phase: SignalPhase,
    pub cycle_secs: u32,
    pub last_changed: i64,
}

impl Signal {
    pub fn new(intersection_id: IntersectionId, direction: Direction, now: i64) -> Self {
        Self {
            intersection_id,
            direction,
            phase: SignalPhase::Red,
            cycle_secs: DEFAULT_CYCLE_SECS,
            last_changed: now,
        }
    }

    pub fn is_green(&self) -> bool {
        self.phase == SignalPhase::Green
    }

    /// Applies a phase/cycle decision, returning true when something changed.
    /// `last_changed` moves only on a real change so elapsed-green tracking
    /// stays accurate across no-op recomputes.
    pub fn apply(&mut self, phase: SignalPhase, cycle_secs: u32, now: i64) -> bool {
        if self.phase == phase && self.cycle_secs == cycle_secs {
            return false;
        }
        self.phase = phase;
        self.cycle_secs = cycle_secs;
        self.last_changed = now;
        true
    }

    pub fn snapshot(&self) -> crate::shared_data::SignalSnapshot {
        crate::shared_data::SignalSnapshot {
            intersection_id: self.intersection_id,
            direction: self.direction,
            phase: self.phase,
            cycle_secs: self.cycle_secs,
            last_changed: self.last_changed,
        }
    }
}

pub type SignalKey = (IntersectionId, Direction);

/// All-red signal set for the given network, one head per approach.
pub fn create_signals(intersections: &[Intersection], now: i64) -> BTreeMap<SignalKey, Signal> {
    let mut signals = BTreeMap::new();
    for intersection in intersections {
        for &direction in intersection.directions() {
            signals.insert(
                (intersection.id, direction),
                Signal::new(intersection.id, direction, now),
            );
        }
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_engine::intersections::create_intersections;

    #[test]
    fn network_gets_one_signal_per_approach() {
        let signals = create_signals(&create_intersections(), 0);
        // Four 4-way junctions and one 3-way.
        assert_eq!(signals.len(), 4 * 4 + 3);
        assert!(signals.values().all(|s| s.phase == SignalPhase::Red));
        assert!(signals.values().all(|s| s.cycle_secs == DEFAULT_CYCLE_SECS));
    }

    #[test]
    fn apply_is_a_no_op_without_change() {
        let mut signal = Signal::new(IntersectionId(1), Direction::N, 100);
        assert!(!signal.apply(SignalPhase::Red, DEFAULT_CYCLE_SECS, 200));
        assert_eq!(signal.last_changed, 100);

        assert!(signal.apply(SignalPhase::Green, 45, 200));
        assert_eq!(signal.last_changed, 200);
        assert!(signal.is_green());
    }

    #[test]
    fn phase_parse_rejects_unknown_states() {
        assert_eq!(SignalPhase::parse("green"), Some(SignalPhase::Green));
        assert_eq!(SignalPhase::parse("flashing"), None);
        assert_eq!(SignalPhase::Yellow.as_str(), "yellow");
    }
}
