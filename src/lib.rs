pub mod control;
pub mod control_system;
pub mod errors;
pub mod events;
pub mod flow_analyzer;
pub mod global_variables;
pub mod monitoring;
pub mod scenario;
pub mod shared_data;
pub mod simulation_engine;
pub mod storage;
