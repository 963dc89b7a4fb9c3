// generator.rs
//
// Synthetic traffic source. Each tick produces exactly one sample per
// (intersection, approach) pair from the active pattern, the signal phase and
// the emergency registry, persists the whole batch atomically and publishes
// the per-intersection and consolidated updates.

use crate::errors::ControlError;
use crate::events::{emit_json, EventBus};
use crate::global_variables::{QUEUE_ALL_TRAFFIC, QUEUE_INTERSECTION_TRAFFIC};
use crate::shared_data::{IntersectionTrafficUpdate, TrafficSample};
use crate::simulation_engine::simulation::CoreState;
use crate::storage::Storage;
use rand::Rng;

/// Peak approaches carry half again the base flow.
const PEAK_FACTOR: f64 = 1.5;

/// One simulated second. Returns the number of samples written.
///
/// The batch is appended all-or-nothing: if the storage append fails nothing
/// is emitted and the error surfaces to the tick boundary, where the caller
/// logs it and waits for the next cadence.
pub fn generate_tick(
    state: &mut CoreState,
    storage: &dyn Storage,
    events: &dyn EventBus,
    rng: &mut impl Rng,
    now: i64,
) -> Result<usize, ControlError> {
    state.sim.tick_counter += 1;
    let pattern = state.active_pattern_key(now).pattern();

    let mut all_samples: Vec<TrafficSample> = Vec::new();
    let mut batches: Vec<IntersectionTrafficUpdate> = Vec::new();

    for intersection in &state.intersections {
        let mut batch = Vec::with_capacity(intersection.directions().len());
        for &direction in intersection.directions() {
            let Some(signal) = state.signals.get(&(intersection.id, direction)) else {
                continue;
            };
            let is_green = signal.is_green();

            let mut base = pattern.base_vehicle_count;
            if pattern.is_peak(direction) {
                base *= PEAK_FACTOR;
            }
            let noise = rng.random_range(-pattern.variation..=pattern.variation);
            let mut vehicle_count = (base + noise).round().max(0.0) as u32;

            let (min_speed, max_speed) = pattern.avg_speed_range;
            let average_speed = if is_green {
                rng.random_range(min_speed * 1.2..max_speed)
            } else {
                rng.random_range(min_speed * 0.5..min_speed * 1.2)
            };

            let mut queue_multiplier = pattern.queue_multiplier;
            if !is_green {
                queue_multiplier *= 2.0;
            }
            let queue_length = (vehicle_count as f64 * queue_multiplier) as u32;

            let mut wait_time = pattern.wait_time_base;
            if !is_green {
                // Average wait over the remaining cycle.
                wait_time += signal.cycle_secs as f64 / 2.0;
            }

            if state
                .emergencies
                .has_direction(intersection.id, direction, now)
            {
                // The vehicle itself barely moves the count; the signal
                // controller is what reacts to the sighting.
                vehicle_count += 1;
            }

            batch.push(TrafficSample {
                intersection_id: intersection.id,
                direction,
                timestamp: now,
                vehicle_count,
                average_speed,
                queue_length,
                wait_time,
            });
        }
        all_samples.extend(batch.iter().cloned());
        batches.push(IntersectionTrafficUpdate {
            intersection_id: intersection.id,
            traffic_data: batch,
        });
    }

    storage.append_samples(&all_samples)?;

    for batch in &batches {
        emit_json(events, QUEUE_INTERSECTION_TRAFFIC, batch);
    }
    emit_json(events, QUEUE_ALL_TRAFFIC, &all_samples);

    Ok(all_samples.len())
}
