// control.rs
//
// `TrafficSystem` is the one entry point the binaries and the task loops talk
// to. It owns the core state behind a single mutex together with the storage
// and event-bus handles, and exposes the whole control surface as methods.
// Every method has a `*_with` twin taking an explicit clock (and rng where
// randomness is involved) so tests drive the system deterministically.

use crate::control_system::signal_control::{self, RecomputeOutcome, RECOMPUTE_EVERY};
use crate::errors::ControlError;
use crate::events::EventBus;
use crate::scenario::{self, Scenario, ScenarioRunSummary, ScenarioStatus};
use crate::shared_data::{
    current_timestamp, PerformanceRecord, ScenarioProgress, SignalSnapshot, SimulationStateView,
    TrafficSample,
};
use crate::simulation_engine::generator;
use crate::simulation_engine::intersections::{Direction, IntersectionId};
use crate::simulation_engine::simulation::CoreState;
use crate::storage::Storage;
use log::info;
use rand::Rng;
use std::sync::{Arc, Mutex};

/// History window bounds for `get_traffic_data`, in minutes.
const MIN_HISTORY_MINUTES: u32 = 1;
const MAX_HISTORY_MINUTES: u32 = 60;

/// Result-page bounds for `get_scenario_metrics`.
const MIN_RECORD_LIMIT: usize = 1;
const MAX_RECORD_LIMIT: usize = 100;

pub struct TrafficSystem {
    state: Mutex<CoreState>,
    scenarios: Vec<Scenario>,
    storage: Arc<dyn Storage>,
    events: Arc<dyn EventBus>,
}

impl TrafficSystem {
    pub fn new(storage: Arc<dyn Storage>, events: Arc<dyn EventBus>) -> Self {
        Self::with_clock(storage, events, current_timestamp())
    }

    pub fn with_clock(storage: Arc<dyn Storage>, events: Arc<dyn EventBus>, now: i64) -> Self {
        Self {
            state: Mutex::new(CoreState::new(now)),
            scenarios: scenario::default_scenarios(),
            storage,
            events,
        }
    }

    // --- simulation state -------------------------------------------------

    pub fn get_simulation_state(&self) -> SimulationStateView {
        let state = self.state.lock().unwrap();
        SimulationStateView {
            running: state.sim.running,
            speed: state.sim.speed,
        }
    }

    /// Partial update: either field may be left untouched. Speed is clamped
    /// to the supported range.
    pub fn set_simulation_state(
        &self,
        running: Option<bool>,
        speed: Option<f64>,
    ) -> SimulationStateView {
        let mut state = self.state.lock().unwrap();
        if let Some(running) = running {
            state.sim.running = running;
            info!("simulation {}", if running { "resumed" } else { "paused" });
        }
        if let Some(speed) = speed {
            state.sim.set_speed(speed);
        }
        SimulationStateView {
            running: state.sim.running,
            speed: state.sim.speed,
        }
    }

    // --- generation -------------------------------------------------------

    pub fn tick(&self) -> Result<usize, ControlError> {
        self.tick_with(&mut rand::rng(), current_timestamp())
    }

    pub fn tick_with(&self, rng: &mut impl Rng, now: i64) -> Result<usize, ControlError> {
        let mut state = self.state.lock().unwrap();
        generator::generate_tick(&mut state, self.storage.as_ref(), self.events.as_ref(), rng, now)
    }

    // --- signals ----------------------------------------------------------

    pub fn recompute_signals(&self) -> Result<RecomputeOutcome, ControlError> {
        self.recompute_signals_with(current_timestamp())
    }

    pub fn recompute_signals_with(&self, now: i64) -> Result<RecomputeOutcome, ControlError> {
        let mut state = self.state.lock().unwrap();
        signal_control::recompute_signals(
            &mut state,
            self.storage.as_ref(),
            self.events.as_ref(),
            now,
        )
    }

    /// Forces the next recompute on-cadence and runs it immediately.
    pub fn trigger_signal_update(&self) -> Result<RecomputeOutcome, ControlError> {
        self.trigger_signal_update_with(current_timestamp())
    }

    pub fn trigger_signal_update_with(&self, now: i64) -> Result<RecomputeOutcome, ControlError> {
        let mut state = self.state.lock().unwrap();
        state.controller.update_counter = RECOMPUTE_EVERY - 1;
        signal_control::recompute_signals(
            &mut state,
            self.storage.as_ref(),
            self.events.as_ref(),
            now,
        )
    }

    pub fn get_signal_states(
        &self,
        intersection_id: Option<IntersectionId>,
    ) -> Vec<SignalSnapshot> {
        let state = self.state.lock().unwrap();
        state
            .signals
            .iter()
            .filter(|((id, _), _)| intersection_id.is_none_or(|wanted| *id == wanted))
            .map(|(_, signal)| signal.snapshot())
            .collect()
    }

    pub fn override_signal(
        &self,
        intersection_id: IntersectionId,
        direction: Direction,
        phase: &str,
        cycle_secs: Option<u32>,
    ) -> Result<SignalSnapshot, ControlError> {
        self.override_signal_with(intersection_id, direction, phase, cycle_secs, current_timestamp())
    }

    pub fn override_signal_with(
        &self,
        intersection_id: IntersectionId,
        direction: Direction,
        phase: &str,
        cycle_secs: Option<u32>,
        now: i64,
    ) -> Result<SignalSnapshot, ControlError> {
        let mut state = self.state.lock().unwrap();
        signal_control::override_signal(
            &mut state,
            self.storage.as_ref(),
            intersection_id,
            direction,
            phase,
            cycle_secs,
            now,
        )
    }

    // --- emergencies ------------------------------------------------------

    /// Registers an emergency-vehicle sighting. Returns the number of active
    /// sightings at the intersection after registration.
    pub fn add_emergency_vehicle(
        &self,
        intersection_id: IntersectionId,
        direction: Direction,
    ) -> Result<usize, ControlError> {
        self.add_emergency_vehicle_with(intersection_id, direction, current_timestamp())
    }

    pub fn add_emergency_vehicle_with(
        &self,
        intersection_id: IntersectionId,
        direction: Direction,
        now: i64,
    ) -> Result<usize, ControlError> {
        let mut state = self.state.lock().unwrap();
        let intersection = state.intersection(intersection_id).ok_or_else(|| {
            ControlError::NotFound(format!("intersection {} not found", intersection_id.0))
        })?;
        if !intersection.directions().contains(&direction) {
            return Err(ControlError::InvalidArgument(format!(
                "intersection '{}' has no {} approach",
                intersection.name,
                direction.as_str()
            )));
        }
        info!(
            "emergency vehicle reported at intersection {} from {}",
            intersection_id.0,
            direction.as_str()
        );
        Ok(state.emergencies.add(intersection_id, direction, now))
    }

    // --- traffic history --------------------------------------------------

    /// Recent samples, newest first. The window is clamped to 1..=60 minutes.
    pub fn get_traffic_data(
        &self,
        intersection_id: Option<IntersectionId>,
        minutes: u32,
    ) -> Vec<TrafficSample> {
        self.get_traffic_data_with(intersection_id, minutes, current_timestamp())
    }

    pub fn get_traffic_data_with(
        &self,
        intersection_id: Option<IntersectionId>,
        minutes: u32,
        now: i64,
    ) -> Vec<TrafficSample> {
        let minutes = minutes.clamp(MIN_HISTORY_MINUTES, MAX_HISTORY_MINUTES);
        let since = now - i64::from(minutes) * 60;
        self.storage.recent_samples(intersection_id, since)
    }

    // --- scenarios --------------------------------------------------------

    pub fn list_scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn start_scenario(&self, id: u32) -> Result<ScenarioRunSummary, ControlError> {
        self.start_scenario_with(id, current_timestamp())
    }

    pub fn start_scenario_with(
        &self,
        id: u32,
        now: i64,
    ) -> Result<ScenarioRunSummary, ControlError> {
        let mut state = self.state.lock().unwrap();
        scenario::start_scenario(
            &mut state,
            &self.scenarios,
            self.storage.as_ref(),
            self.events.as_ref(),
            id,
            now,
        )
    }

    pub fn end_scenario(&self) -> Result<ScenarioRunSummary, ControlError> {
        self.end_scenario_with(current_timestamp())
    }

    pub fn end_scenario_with(&self, now: i64) -> Result<ScenarioRunSummary, ControlError> {
        let mut state = self.state.lock().unwrap();
        scenario::end_scenario(
            &mut state,
            &self.scenarios,
            self.storage.as_ref(),
            self.events.as_ref(),
            now,
        )
    }

    pub fn clear_scenario(&self) {
        let mut state = self.state.lock().unwrap();
        scenario::clear_scenario(&mut state);
    }

    pub fn monitor_scenario(&self) -> Result<Option<ScenarioProgress>, ControlError> {
        self.monitor_scenario_with(&mut rand::rng(), current_timestamp())
    }

    pub fn monitor_scenario_with(
        &self,
        rng: &mut impl Rng,
        now: i64,
    ) -> Result<Option<ScenarioProgress>, ControlError> {
        let mut state = self.state.lock().unwrap();
        scenario::monitor_scenario(
            &mut state,
            &self.scenarios,
            self.storage.as_ref(),
            self.events.as_ref(),
            rng,
            now,
        )
    }

    pub fn get_active_scenario(&self) -> ScenarioStatus {
        self.get_active_scenario_with(current_timestamp())
    }

    pub fn get_active_scenario_with(&self, now: i64) -> ScenarioStatus {
        let state = self.state.lock().unwrap();
        scenario::active_status(&state, &self.scenarios, now)
    }

    /// Completed performance records, newest first. The page size is clamped
    /// to 1..=100.
    pub fn get_scenario_metrics(
        &self,
        scenario_id: Option<u32>,
        limit: usize,
    ) -> Vec<PerformanceRecord> {
        let limit = limit.clamp(MIN_RECORD_LIMIT, MAX_RECORD_LIMIT);
        self.storage.performance_records(scenario_id, limit)
    }
}
