// signal_control.rs
//
// Adaptive phase assignment. Every 5th generator tick each intersection is
// re-ranked from its latest samples and the highest-priority approach gets
// the green (with its opposing approach when traffic allows). Emergency
// sightings preempt everything until they expire.

use crate::errors::ControlError;
use crate::events::{emit_json, EventBus};
use crate::global_variables::QUEUE_SIGNALS_UPDATED;
use crate::shared_data::{SignalSnapshot, SignalsUpdated};
use crate::simulation_engine::intersections::{Direction, IntersectionId};
use crate::simulation_engine::signals::{SignalPhase, MAX_CYCLE_SECS, MIN_CYCLE_SECS};
use crate::simulation_engine::simulation::CoreState;
use crate::storage::Storage;
use log::info;
use std::collections::{BTreeMap, HashSet};

/// Full recompute runs on every 5th invocation; the rest are no-ops.
pub const RECOMPUTE_EVERY: u64 = 5;

/// Only samples from the last five minutes inform the ranking.
const SAMPLE_WINDOW_SECS: i64 = 300;

const EMERGENCY_CYCLE_SECS: u32 = 30;
const RED_CYCLE_SECS: u32 = 60;
const YELLOW_CYCLE_SECS: u32 = 5;

/// Opposing approach joins the green only when the top approach is below
/// this priority. Policy constant, preserved as-is.
const OPPOSING_GREEN_THRESHOLD: f64 = 0.8;

/// Priority score in [0, 1]: 0.4 wait + 0.4 queue + 0.2 slowness, each factor
/// saturating at its normalization cap (120 s wait, 20 vehicles, 60 km/h).
pub fn priority_score(wait_time: f64, queue_length: u32, average_speed: f64) -> f64 {
    let wait_factor = (wait_time / 120.0).min(1.0);
    let queue_factor = (queue_length as f64 / 20.0).min(1.0);
    let speed_factor = 1.0 - (average_speed / 60.0).min(1.0);
    0.4 * wait_factor + 0.4 * queue_factor + 0.2 * speed_factor
}

#[derive(Debug, Clone, Copy)]
struct DirectionMetrics {
    priority: f64,
    has_emergency: bool,
}

/// Result of one recompute invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RecomputeOutcome {
    /// Off-cadence invocation; nothing was read or written.
    Skipped { counter: u64 },
    /// On-cadence run; carries every signal that actually changed.
    Updated { updated: Vec<SignalSnapshot> },
}

/// Cadence counter plus the transient per-intersection emergency-mode set.
#[derive(Debug, Default)]
pub struct SignalController {
    pub(crate) update_counter: u64,
    emergency_mode: HashSet<IntersectionId>,
}

impl SignalController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_emergency_mode(&self, intersection_id: IntersectionId) -> bool {
        self.emergency_mode.contains(&intersection_id)
    }
}

/// One controller invocation over the whole network. Also the body of the
/// manual `trigger_signal_update` surface, which shares the cadence counter.
pub fn recompute_signals(
    state: &mut CoreState,
    storage: &dyn Storage,
    events: &dyn EventBus,
    now: i64,
) -> Result<RecomputeOutcome, ControlError> {
    state.controller.update_counter += 1;
    let counter = state.controller.update_counter;
    if counter % RECOMPUTE_EVERY != 0 {
        return Ok(RecomputeOutcome::Skipped { counter });
    }

    let network: Vec<(IntersectionId, Vec<Direction>)> = state
        .intersections
        .iter()
        .map(|i| (i.id, i.directions().to_vec()))
        .collect();

    let mut updated: Vec<SignalSnapshot> = Vec::new();

    for (intersection_id, directions) in network {
        let mut metrics: BTreeMap<Direction, DirectionMetrics> = BTreeMap::new();
        let mut seen: HashSet<Direction> = HashSet::new();
        // Newest first, so the first sample per direction is the latest.
        for sample in storage.recent_samples(Some(intersection_id), now - SAMPLE_WINDOW_SECS) {
            if !seen.insert(sample.direction) {
                continue;
            }
            let has_emergency =
                state
                    .emergencies
                    .has_direction(intersection_id, sample.direction, now);
            let priority = if has_emergency {
                1.0
            } else {
                priority_score(sample.wait_time, sample.queue_length, sample.average_speed)
            };
            metrics.insert(
                sample.direction,
                DirectionMetrics {
                    priority,
                    has_emergency,
                },
            );
        }

        if state.emergencies.has(intersection_id, now) {
            if state.controller.emergency_mode.insert(intersection_id) {
                info!("intersection {intersection_id:?} entering emergency mode");
            }
            for &direction in &directions {
                let sighted =
                    state
                        .emergencies
                        .has_direction(intersection_id, direction, now);
                let phase = if sighted {
                    SignalPhase::Green
                } else {
                    SignalPhase::Red
                };
                apply_decision(
                    state,
                    storage,
                    &mut updated,
                    (intersection_id, direction),
                    phase,
                    EMERGENCY_CYCLE_SECS,
                    now,
                )?;
            }
            continue;
        }

        // Automatic reversion once the last sighting has expired.
        if state.controller.emergency_mode.remove(&intersection_id) {
            info!("intersection {intersection_id:?} leaving emergency mode");
        }

        if metrics.is_empty() {
            continue;
        }

        let mut ranked: Vec<Direction> = metrics.keys().copied().collect();
        ranked.sort_by(|a, b| {
            metrics[b]
                .priority
                .partial_cmp(&metrics[a].priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(b))
        });
        let top = ranked[0];

        let current_green: Vec<Direction> = directions
            .iter()
            .copied()
            .filter(|&d| {
                state
                    .signals
                    .get(&(intersection_id, d))
                    .is_some_and(|s| s.is_green())
            })
            .collect();

        let mut change_needed = !current_green.contains(&top);
        if let Some(&green_dir) = current_green.first() {
            if let Some(signal) = state.signals.get(&(intersection_id, green_dir)) {
                if now - signal.last_changed > signal.cycle_secs as i64 {
                    change_needed = true;
                }
            }
        }

        if !change_needed && !current_green.is_empty() {
            continue;
        }

        let mut new_green = vec![top];
        let opposing = top.opposing();
        if metrics.contains_key(&opposing) && metrics[&top].priority < OPPOSING_GREEN_THRESHOLD {
            new_green.push(opposing);
        }

        for &direction in &directions {
            let (phase, cycle) = if new_green.contains(&direction) {
                let priority = metrics[&direction].priority;
                (SignalPhase::Green, (30.0 + priority * 60.0) as u32)
            } else {
                let currently_green = state
                    .signals
                    .get(&(intersection_id, direction))
                    .is_some_and(|s| s.is_green());
                if currently_green {
                    // Green never drops straight to red.
                    (SignalPhase::Yellow, YELLOW_CYCLE_SECS)
                } else {
                    (SignalPhase::Red, RED_CYCLE_SECS)
                }
            };
            apply_decision(
                state,
                storage,
                &mut updated,
                (intersection_id, direction),
                phase,
                cycle,
                now,
            )?;
        }
    }

    if !updated.is_empty() {
        emit_json(
            events,
            QUEUE_SIGNALS_UPDATED,
            &SignalsUpdated {
                timestamp: now,
                updated_count: updated.len(),
                updated_signals: updated.clone(),
            },
        );
    }

    Ok(RecomputeOutcome::Updated { updated })
}

fn apply_decision(
    state: &mut CoreState,
    storage: &dyn Storage,
    updated: &mut Vec<SignalSnapshot>,
    key: (IntersectionId, Direction),
    phase: SignalPhase,
    cycle: u32,
    now: i64,
) -> Result<(), ControlError> {
    if let Some(signal) = state.signals.get_mut(&key) {
        if signal.apply(phase, cycle, now) {
            let snapshot = signal.snapshot();
            storage.append_signal_change(&snapshot)?;
            updated.push(snapshot);
        }
    }
    Ok(())
}

/// Manual operator override of a single head. A green override forces every
/// conflicting approach at the intersection to red; the opposing approach is
/// left alone.
pub fn override_signal(
    state: &mut CoreState,
    storage: &dyn Storage,
    intersection_id: IntersectionId,
    direction: Direction,
    phase: &str,
    cycle_secs: Option<u32>,
    now: i64,
) -> Result<SignalSnapshot, ControlError> {
    let phase = SignalPhase::parse(phase)
        .ok_or_else(|| ControlError::InvalidArgument(format!("invalid signal phase '{phase}'")))?;

    let key = (intersection_id, direction);
    let signal = state.signals.get_mut(&key).ok_or_else(|| {
        ControlError::NotFound(format!(
            "no signal for intersection {} direction {}",
            intersection_id.0,
            direction.as_str()
        ))
    })?;

    signal.phase = phase;
    if let Some(cycle) = cycle_secs {
        signal.cycle_secs = cycle.clamp(MIN_CYCLE_SECS, MAX_CYCLE_SECS);
    }
    signal.last_changed = now;
    let snapshot = signal.snapshot();
    storage.append_signal_change(&snapshot)?;

    if phase == SignalPhase::Green {
        let conflicting: Vec<Direction> = state
            .signals
            .keys()
            .filter(|(id, d)| *id == intersection_id && direction.conflicts_with(*d))
            .map(|(_, d)| *d)
            .collect();
        for other in conflicting {
            if let Some(other_signal) = state.signals.get_mut(&(intersection_id, other)) {
                if other_signal.phase != SignalPhase::Red {
                    other_signal.phase = SignalPhase::Red;
                    other_signal.last_changed = now;
                    storage.append_signal_change(&other_signal.snapshot())?;
                }
            }
        }
    }

    Ok(snapshot)
}
