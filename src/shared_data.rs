// src/shared_data.rs
//
// Data shared between the simulation tasks and the monitoring consumers.
// Everything here crosses a queue boundary as JSON, so it all derives serde.

use crate::simulation_engine::intersections::{Direction, IntersectionId};
use crate::simulation_engine::signals::SignalPhase;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time as unix seconds.
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// One synthetic measurement for a single approach of an intersection.
/// Append-only: never mutated once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSample {
    pub intersection_id: IntersectionId,
    pub direction: Direction,
    pub timestamp: i64,
    pub vehicle_count: u32,
    pub average_speed: f64,
    pub queue_length: u32,
    pub wait_time: f64,
}

/// Snapshot of a single signal head, as persisted and published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub intersection_id: IntersectionId,
    pub direction: Direction,
    pub phase: SignalPhase,
    pub cycle_secs: u32,
    pub last_changed: i64,
}

/// Rolling metrics for the active scenario, recomputed every monitor tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub avg_wait_time: f64,
    pub total_vehicles: u64,
    pub congested_intersections: usize,
    pub total_intersections: usize,
}

/// Closed record of one scenario run.
///
/// `congestion_duration` and `emergency_response_time` are recorded as 0:
/// the core does not track them yet (kept as explicit columns so the record
/// shape stays stable once tracking lands).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub id: u64,
    pub scenario_id: u32,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub avg_wait_time: f64,
    pub throughput: u64,
    pub congestion_duration: f64,
    pub emergency_response_time: f64,
}

/// Payload for the `intersection_traffic_update` queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntersectionTrafficUpdate {
    pub intersection_id: IntersectionId,
    pub traffic_data: Vec<TrafficSample>,
}

/// Payload for the `signals_updated` queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsUpdated {
    pub timestamp: i64,
    pub updated_count: usize,
    pub updated_signals: Vec<SignalSnapshot>,
}

/// Payload for the `scenario_progress` queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioProgress {
    pub scenario_id: u32,
    pub name: String,
    pub progress: u32,
    pub elapsed: i64,
    pub remaining: i64,
    pub metrics: ScenarioMetrics,
}

/// Payload for the `scenario_completed` queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioCompleted {
    pub scenario_id: u32,
    pub name: String,
    pub metrics: ScenarioMetrics,
}

/// Payload for the `emergency_vehicle_injected` queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyInjected {
    pub intersection_id: IntersectionId,
    pub intersection_name: String,
    pub direction: Direction,
    pub timestamp: i64,
}

/// Running/speed pair returned by the simulation-state surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationStateView {
    pub running: bool,
    pub speed: f64,
}
