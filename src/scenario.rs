// scenario.rs
//
// Named, timed simulation runs. The supervisor is a two-state machine
// (idle / active, at most one active run globally): starting a scenario
// installs its pattern override and speed, the 5-second monitor tick keeps
// rolling metrics and injects scheduled emergency vehicles, and the run ends
// itself once its duration elapses.

use crate::errors::ControlError;
use crate::events::{emit_json, EventBus};
use crate::global_variables::{
    QUEUE_EMERGENCY_INJECTED, QUEUE_SCENARIO_COMPLETED, QUEUE_SCENARIO_PROGRESS,
};
use crate::shared_data::{
    EmergencyInjected, ScenarioCompleted, ScenarioMetrics, ScenarioProgress,
};
use crate::simulation_engine::patterns::PatternKey;
use crate::simulation_engine::simulation::CoreState;
use crate::storage::Storage;
use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// An intersection counts as congested when more than half of its considered
/// samples are past both thresholds.
const CONGESTION_WAIT_SECS: f64 = 45.0;
const CONGESTION_QUEUE_LEN: u32 = 10;

/// Samples per intersection considered by the metrics aggregation.
const METRICS_SAMPLE_DEPTH: usize = 10;

/// Generation parameters a scenario imposes while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub pattern: PatternKey,
    pub emergency_vehicles: bool,
    #[serde(default = "default_emergency_interval")]
    pub emergency_interval_secs: i64,
    pub simulation_speed: f64,
}

fn default_emergency_interval() -> i64 {
    60
}

/// Immutable scenario template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub duration_secs: i64,
    pub config: ScenarioConfig,
}

/// The one live run, while a scenario is active.
#[derive(Debug, Clone)]
pub struct ActiveScenario {
    pub scenario_id: u32,
    pub start_time: i64,
    pub config: ScenarioConfig,
    pub metrics: ScenarioMetrics,
}

impl ActiveScenario {
    pub fn new(scenario_id: u32, start_time: i64, config: ScenarioConfig) -> Self {
        Self {
            scenario_id,
            start_time,
            config,
            metrics: ScenarioMetrics::default(),
        }
    }
}

/// Status surface: idle marker or live progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScenarioStatus {
    Idle,
    Running {
        scenario_id: u32,
        name: String,
        description: String,
        progress: u32,
        elapsed: i64,
        remaining: i64,
        metrics: ScenarioMetrics,
    },
}

/// Outcome handed back by `start` and `end`.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRunSummary {
    pub scenario_id: u32,
    pub name: String,
    pub metrics: ScenarioMetrics,
}

pub fn default_scenarios() -> Vec<Scenario> {
    let demo = |pattern| ScenarioConfig {
        pattern,
        emergency_vehicles: false,
        emergency_interval_secs: 60,
        simulation_speed: 2.0,
    };
    vec![
        Scenario {
            id: 1,
            name: "Normal Traffic Flow".to_string(),
            description: "Typical weekday traffic with moderate congestion during business hours"
                .to_string(),
            duration_secs: 180,
            config: demo(PatternKey::Normal),
        },
        Scenario {
            id: 2,
            name: "Morning Rush Hour".to_string(),
            description: "Heavy traffic flowing into the central business district during morning peak hours"
                .to_string(),
            duration_secs: 180,
            config: demo(PatternKey::MorningRush),
        },
        Scenario {
            id: 3,
            name: "Evening Rush Hour".to_string(),
            description: "Heavy outbound traffic during the evening exodus from the city center"
                .to_string(),
            duration_secs: 180,
            config: demo(PatternKey::EveningRush),
        },
        Scenario {
            id: 4,
            name: "Weekend Shopping".to_string(),
            description: "Moderate traffic around the shopping districts during the weekend"
                .to_string(),
            duration_secs: 180,
            config: demo(PatternKey::Weekend),
        },
        Scenario {
            id: 5,
            name: "Emergency Response".to_string(),
            description: "Emergency vehicle priority through congested intersections during rush hour"
                .to_string(),
            duration_secs: 180,
            config: ScenarioConfig {
                pattern: PatternKey::MorningRush,
                emergency_vehicles: true,
                emergency_interval_secs: 30,
                simulation_speed: 2.0,
            },
        },
    ]
}

fn find_scenario(scenarios: &[Scenario], id: u32) -> Result<&Scenario, ControlError> {
    scenarios
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| ControlError::NotFound(format!("scenario with id {id} not found")))
}

/// Activates a scenario. A scenario already running is ended first, so its
/// performance record is closed before the new one opens.
pub fn start_scenario(
    state: &mut CoreState,
    scenarios: &[Scenario],
    storage: &dyn Storage,
    events: &dyn EventBus,
    id: u32,
    now: i64,
) -> Result<ScenarioRunSummary, ControlError> {
    let scenario = find_scenario(scenarios, id)?.clone();

    if state.active.is_some() {
        end_scenario(state, scenarios, storage, events, now)?;
    }

    storage.open_performance_record(scenario.id, now)?;
    state.active = Some(ActiveScenario::new(
        scenario.id,
        now,
        scenario.config.clone(),
    ));
    state.sim.running = true;
    state.sim.set_speed(scenario.config.simulation_speed);

    info!(
        "scenario '{}' started (duration {}s, pattern {})",
        scenario.name,
        scenario.duration_secs,
        scenario.config.pattern.as_str()
    );
    Ok(ScenarioRunSummary {
        scenario_id: scenario.id,
        name: scenario.name,
        metrics: ScenarioMetrics::default(),
    })
}

/// Ends the active run: closes the performance record with the last computed
/// metrics, removes the pattern override and emits the completion event.
pub fn end_scenario(
    state: &mut CoreState,
    scenarios: &[Scenario],
    storage: &dyn Storage,
    events: &dyn EventBus,
    now: i64,
) -> Result<ScenarioRunSummary, ControlError> {
    let run = state.active.take().ok_or(ControlError::NotActive)?;
    let name = scenarios
        .iter()
        .find(|s| s.id == run.scenario_id)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| format!("scenario {}", run.scenario_id));

    let closed = storage.close_performance_record(
        run.scenario_id,
        now,
        run.metrics.avg_wait_time,
        run.metrics.total_vehicles,
    )?;
    if !closed {
        warn!("no open performance record for scenario {}", run.scenario_id);
    }

    emit_json(
        events,
        QUEUE_SCENARIO_COMPLETED,
        &ScenarioCompleted {
            scenario_id: run.scenario_id,
            name: name.clone(),
            metrics: run.metrics.clone(),
        },
    );
    info!("scenario '{name}' completed");
    Ok(ScenarioRunSummary {
        scenario_id: run.scenario_id,
        name,
        metrics: run.metrics,
    })
}

/// Unconditional reset to idle without closing the performance record.
/// Error-recovery path; safe to call repeatedly.
pub fn clear_scenario(state: &mut CoreState) {
    state.active = None;
}

/// One monitor tick. Returns the progress payload when a run is active and
/// did not just complete.
pub fn monitor_scenario(
    state: &mut CoreState,
    scenarios: &[Scenario],
    storage: &dyn Storage,
    events: &dyn EventBus,
    rng: &mut impl Rng,
    now: i64,
) -> Result<Option<ScenarioProgress>, ControlError> {
    let Some(run) = state.active.as_ref() else {
        return Ok(None);
    };
    let Ok(scenario) = find_scenario(scenarios, run.scenario_id) else {
        // Template vanished under the run; reset rather than loop on errors.
        warn!("active scenario {} has no template, clearing", run.scenario_id);
        clear_scenario(state);
        return Ok(None);
    };
    let scenario = scenario.clone();

    let elapsed = now - run.start_time;
    if elapsed >= scenario.duration_secs {
        end_scenario(state, scenarios, storage, events, now)?;
        return Ok(None);
    }

    let metrics = aggregate_metrics(state, storage);
    if let Some(run) = state.active.as_mut() {
        run.metrics = metrics.clone();
    }

    let config = &scenario.config;
    if config.emergency_vehicles
        && config.emergency_interval_secs > 0
        && elapsed % config.emergency_interval_secs == 0
    {
        inject_random_emergency(state, events, rng, now);
    }

    let progress = ScenarioProgress {
        scenario_id: scenario.id,
        name: scenario.name.clone(),
        progress: (elapsed * 100 / scenario.duration_secs).min(100) as u32,
        elapsed,
        remaining: (scenario.duration_secs - elapsed).max(0),
        metrics,
    };
    emit_json(events, QUEUE_SCENARIO_PROGRESS, &progress);
    Ok(Some(progress))
}

/// Cross-intersection aggregation over the most recent samples: per-junction
/// mean wait, total vehicle throughput, and a congestion census.
pub fn aggregate_metrics(state: &CoreState, storage: &dyn Storage) -> ScenarioMetrics {
    let mut per_intersection_waits: Vec<f64> = Vec::new();
    let mut total_vehicles: u64 = 0;
    let mut congested = 0;

    for intersection in &state.intersections {
        let samples = storage.latest_samples(intersection.id, METRICS_SAMPLE_DEPTH);
        if samples.is_empty() {
            continue;
        }
        let wait_sum: f64 = samples.iter().map(|s| s.wait_time).sum();
        per_intersection_waits.push(wait_sum / samples.len() as f64);
        total_vehicles += samples.iter().map(|s| s.vehicle_count as u64).sum::<u64>();

        let congestion_count = samples
            .iter()
            .filter(|s| s.wait_time > CONGESTION_WAIT_SECS && s.queue_length > CONGESTION_QUEUE_LEN)
            .count();
        if congestion_count * 2 > samples.len() {
            congested += 1;
        }
    }

    let avg_wait_time = if per_intersection_waits.is_empty() {
        0.0
    } else {
        per_intersection_waits.iter().sum::<f64>() / per_intersection_waits.len() as f64
    };

    ScenarioMetrics {
        avg_wait_time,
        total_vehicles,
        congested_intersections: congested,
        total_intersections: state.intersections.len(),
    }
}

fn inject_random_emergency(
    state: &mut CoreState,
    events: &dyn EventBus,
    rng: &mut impl Rng,
    now: i64,
) {
    if state.intersections.is_empty() {
        return;
    }
    let intersection = &state.intersections[rng.random_range(0..state.intersections.len())];
    let directions = intersection.directions();
    let direction = directions[rng.random_range(0..directions.len())];
    let id = intersection.id;
    let name = intersection.name.clone();

    state.emergencies.add(id, direction, now);
    emit_json(
        events,
        QUEUE_EMERGENCY_INJECTED,
        &EmergencyInjected {
            intersection_id: id,
            intersection_name: name,
            direction,
            timestamp: now,
        },
    );
}

/// Idle marker or live progress for the status surface.
pub fn active_status(state: &CoreState, scenarios: &[Scenario], now: i64) -> ScenarioStatus {
    let Some(run) = state.active.as_ref() else {
        return ScenarioStatus::Idle;
    };
    let Some(scenario) = scenarios.iter().find(|s| s.id == run.scenario_id) else {
        return ScenarioStatus::Idle;
    };
    let elapsed = now - run.start_time;
    ScenarioStatus::Running {
        scenario_id: scenario.id,
        name: scenario.name.clone(),
        description: scenario.description.clone(),
        progress: (elapsed * 100 / scenario.duration_secs).min(100).max(0) as u32,
        elapsed,
        remaining: (scenario.duration_secs - elapsed).max(0),
        metrics: run.metrics.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventBus;
    use crate::shared_data::TrafficSample;
    use crate::simulation_engine::intersections::{Direction, IntersectionId};
    use crate::storage::MemoryStorage;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn sample(
        intersection: IntersectionId,
        timestamp: i64,
        wait_time: f64,
        queue_length: u32,
        vehicle_count: u32,
    ) -> TrafficSample {
        TrafficSample {
            intersection_id: intersection,
            direction: Direction::N,
            timestamp,
            vehicle_count,
            average_speed: 30.0,
            queue_length,
            wait_time,
        }
    }

    #[test]
    fn start_applies_speed_and_pattern_override() {
        let mut state = CoreState::new(0);
        let scenarios = default_scenarios();
        let storage = MemoryStorage::new();
        let events = RecordingEventBus::new();

        let started = start_scenario(&mut state, &scenarios, &storage, &events, 2, 1000)
            .expect("start succeeds");
        assert_eq!(started.name, "Morning Rush Hour");
        assert!(state.sim.running);
        assert_eq!(state.sim.speed, 2.0);
        assert_eq!(state.active_pattern_key(1000), PatternKey::MorningRush);
    }

    #[test]
    fn start_rejects_unknown_ids() {
        let mut state = CoreState::new(0);
        let scenarios = default_scenarios();
        let storage = MemoryStorage::new();
        let events = RecordingEventBus::new();

        let missing = start_scenario(&mut state, &scenarios, &storage, &events, 99, 0);
        assert!(matches!(missing, Err(ControlError::NotFound(_))));
        assert!(state.active.is_none());
    }

    #[test]
    fn starting_over_an_active_run_closes_its_record_first() {
        let mut state = CoreState::new(0);
        let scenarios = default_scenarios();
        let storage = MemoryStorage::new();
        let events = RecordingEventBus::new();

        start_scenario(&mut state, &scenarios, &storage, &events, 1, 1000)
            .expect("first start succeeds");
        start_scenario(&mut state, &scenarios, &storage, &events, 2, 1050)
            .expect("second start succeeds");

        // The first run's record is closed with end_time set.
        let closed = storage.performance_records(Some(1), 10);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].end_time, Some(1050));
        // The second run's record is still open.
        assert!(storage.performance_records(Some(2), 10).is_empty());
        assert_eq!(events.count_topic(QUEUE_SCENARIO_COMPLETED), 1);
        assert_eq!(
            state.active.as_ref().map(|r| r.scenario_id),
            Some(2)
        );
    }

    #[test]
    fn end_without_active_run_is_an_error() {
        let mut state = CoreState::new(0);
        let scenarios = default_scenarios();
        let storage = MemoryStorage::new();
        let events = RecordingEventBus::new();

        let result = end_scenario(&mut state, &scenarios, &storage, &events, 0);
        assert!(matches!(result, Err(ControlError::NotActive)));
    }

    #[test]
    fn monitor_auto_ends_an_expired_run_exactly_once() {
        let mut state = CoreState::new(0);
        let scenarios = default_scenarios();
        let storage = MemoryStorage::new();
        let events = RecordingEventBus::new();
        let mut rng = SmallRng::seed_from_u64(1);

        start_scenario(&mut state, &scenarios, &storage, &events, 1, 1000)
            .expect("start succeeds");

        // Duration is 180s; at 1180 the run expires.
        let progress = monitor_scenario(&mut state, &scenarios, &storage, &events, &mut rng, 1180)
            .expect("monitor succeeds");
        assert!(progress.is_none());
        assert!(state.active.is_none());
        assert_eq!(events.count_topic(QUEUE_SCENARIO_COMPLETED), 1);

        // Further monitoring is a no-op.
        let idle = monitor_scenario(&mut state, &scenarios, &storage, &events, &mut rng, 1185)
            .expect("monitor succeeds");
        assert!(idle.is_none());
        assert_eq!(events.count_topic(QUEUE_SCENARIO_COMPLETED), 1);
    }

    #[test]
    fn monitor_reports_progress_and_metrics() {
        let mut state = CoreState::new(0);
        let scenarios = default_scenarios();
        let storage = MemoryStorage::new();
        let events = RecordingEventBus::new();
        let mut rng = SmallRng::seed_from_u64(1);

        start_scenario(&mut state, &scenarios, &storage, &events, 1, 1000)
            .expect("start succeeds");
        let id = state.intersections[0].id;
        storage
            .append_samples(&[
                sample(id, 1030, 50.0, 12, 20),
                sample(id, 1031, 60.0, 15, 25),
            ])
            .expect("append succeeds");

        let progress = monitor_scenario(&mut state, &scenarios, &storage, &events, &mut rng, 1090)
            .expect("monitor succeeds")
            .expect("run is active");
        assert_eq!(progress.progress, 50); // 90 of 180 seconds
        assert_eq!(progress.elapsed, 90);
        assert_eq!(progress.remaining, 90);
        assert_eq!(progress.metrics.avg_wait_time, 55.0);
        assert_eq!(progress.metrics.total_vehicles, 45);
        assert_eq!(progress.metrics.congested_intersections, 1);
        assert_eq!(progress.metrics.total_intersections, 5);
        assert_eq!(events.count_topic(QUEUE_SCENARIO_PROGRESS), 1);
    }

    #[test]
    fn emergency_scenario_injects_on_schedule() {
        let mut state = CoreState::new(0);
        let scenarios = default_scenarios();
        let storage = MemoryStorage::new();
        let events = RecordingEventBus::new();
        let mut rng = SmallRng::seed_from_u64(9);

        // Scenario 5 injects every 30 seconds.
        start_scenario(&mut state, &scenarios, &storage, &events, 5, 1000)
            .expect("start succeeds");

        monitor_scenario(&mut state, &scenarios, &storage, &events, &mut rng, 1030)
            .expect("monitor succeeds");
        assert_eq!(events.count_topic(QUEUE_EMERGENCY_INJECTED), 1);
        assert_eq!(state.emergencies.active_count(1030), 1);

        // Off-schedule tick injects nothing.
        monitor_scenario(&mut state, &scenarios, &storage, &events, &mut rng, 1035)
            .expect("monitor succeeds");
        assert_eq!(events.count_topic(QUEUE_EMERGENCY_INJECTED), 1);
    }

    #[test]
    fn clear_resets_without_closing_the_record() {
        let mut state = CoreState::new(0);
        let scenarios = default_scenarios();
        let storage = MemoryStorage::new();
        let events = RecordingEventBus::new();

        start_scenario(&mut state, &scenarios, &storage, &events, 1, 1000)
            .expect("start succeeds");
        clear_scenario(&mut state);
        clear_scenario(&mut state); // idempotent

        assert!(state.active.is_none());
        // Record stays open: clear is the error-recovery path.
        assert!(storage.performance_records(Some(1), 10).is_empty());
        assert_eq!(events.count_topic(QUEUE_SCENARIO_COMPLETED), 0);
        assert_eq!(active_status(&state, &scenarios, 1010), ScenarioStatus::Idle);
    }

    #[test]
    fn status_reports_live_progress() {
        let mut state = CoreState::new(0);
        let scenarios = default_scenarios();
        let storage = MemoryStorage::new();
        let events = RecordingEventBus::new();

        assert_eq!(active_status(&state, &scenarios, 0), ScenarioStatus::Idle);
        start_scenario(&mut state, &scenarios, &storage, &events, 3, 2000)
            .expect("start succeeds");

        match active_status(&state, &scenarios, 2045) {
            ScenarioStatus::Running {
                scenario_id,
                progress,
                elapsed,
                remaining,
                ..
            } => {
                assert_eq!(scenario_id, 3);
                assert_eq!(progress, 25);
                assert_eq!(elapsed, 45);
                assert_eq!(remaining, 135);
            }
            ScenarioStatus::Idle => panic!("expected a running status"),
        }
    }

    #[test]
    fn aggregation_skips_intersections_without_samples() {
        let state = CoreState::new(0);
        let storage = MemoryStorage::new();
        let metrics = aggregate_metrics(&state, &storage);
        assert_eq!(metrics.avg_wait_time, 0.0);
        assert_eq!(metrics.total_vehicles, 0);
        assert_eq!(metrics.congested_intersections, 0);
        assert_eq!(metrics.total_intersections, 5);
    }
}
