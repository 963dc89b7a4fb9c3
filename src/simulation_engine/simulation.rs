// simulation.rs
//
// Owned simulation context plus the periodic task loops. All shared mutable
// state lives in `CoreState` behind one mutex inside `TrafficSystem`: the
// generator tick, the signal recompute and the scenario monitor each take the
// lock for the duration of one step, so there is a single logical timeline
// and no concurrent mutation of signals, scenario state or the registry.

use crate::control::TrafficSystem;
use crate::control_system::signal_control::SignalController;
use crate::scenario::ActiveScenario;
use crate::simulation_engine::emergency::EmergencyRegistry;
use crate::simulation_engine::intersections::{create_intersections, Intersection, IntersectionId};
use crate::simulation_engine::patterns::{default_pattern_key, PatternKey};
use crate::simulation_engine::signals::{create_signals, Signal, SignalKey};
use chrono::{DateTime, Local, TimeZone};
use log::error;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 10.0;

/// Cadence of the scenario monitor task, in wall-clock seconds.
pub const MONITOR_INTERVAL_SECS: u64 = 5;

/// Runtime flags for the generator loop. `running = false` is a cooperative
/// stop: in-flight ticks complete, future ticks no-op.
#[derive(Debug, Clone, Copy)]
pub struct SimulationState {
    pub running: bool,
    pub speed: f64,
    pub tick_counter: u64,
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            running: false,
            speed: 1.0,
            tick_counter: 0,
        }
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the three periodic tasks mutate, kept behind one lock.
#[derive(Debug)]
pub struct CoreState {
    pub intersections: Vec<Intersection>,
    pub signals: BTreeMap<SignalKey, Signal>,
    pub emergencies: EmergencyRegistry,
    pub sim: SimulationState,
    pub active: Option<ActiveScenario>,
    pub controller: SignalController,
}

impl CoreState {
    pub fn new(now: i64) -> Self {
        let intersections = create_intersections();
        let signals = create_signals(&intersections, now);
        Self {
            intersections,
            signals,
            emergencies: EmergencyRegistry::new(),
            sim: SimulationState::new(),
            active: None,
            controller: SignalController::new(),
        }
    }

    pub fn intersection(&self, id: IntersectionId) -> Option<&Intersection> {
        self.intersections.iter().find(|i| i.id == id)
    }

    /// Active generation pattern: the scenario override when one is running,
    /// otherwise the wall-clock default.
    pub fn active_pattern_key(&self, now: i64) -> PatternKey {
        match &self.active {
            Some(run) => run.config.pattern,
            None => default_pattern_key(local_time(now)),
        }
    }
}

fn local_time(now: i64) -> DateTime<Local> {
    Local.timestamp_opt(now, 0).single().unwrap_or_else(Local::now)
}

/// Main simulation driver: one generator tick per simulated second (scaled by
/// the speed multiplier), with the signal recompute gated to every 5th tick
/// inside the controller, plus the 5-second scenario monitor task.
///
/// Tick failures are logged at the tick boundary and the loops keep going.
pub async fn run_simulation(system: Arc<TrafficSystem>) {
    let monitor_system = Arc::clone(&system);
    tokio::spawn(async move {
        loop {
            if let Err(e) = monitor_system.monitor_scenario() {
                error!("scenario monitor tick failed: {e}");
            }
            sleep(Duration::from_secs(MONITOR_INTERVAL_SECS)).await;
        }
    });

    loop {
        let state = system.get_simulation_state();
        if state.running {
            if let Err(e) = system.tick() {
                error!("generator tick failed: {e}");
            }
            if let Err(e) = system.recompute_signals() {
                error!("signal recompute failed: {e}");
            }
        }
        sleep(Duration::from_secs_f64(1.0 / state.speed)).await;
    }
}
