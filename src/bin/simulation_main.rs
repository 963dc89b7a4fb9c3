// simulation_main.rs
use std::sync::Arc;
use traffic_control::control::TrafficSystem;
use traffic_control::events::RabbitEventBus;
use traffic_control::global_variables::AMQP_URL;
use traffic_control::simulation_engine::simulation::run_simulation;
use traffic_control::storage::MemoryStorage;

#[tokio::main]
async fn main() {
    env_logger::init();

    let storage = Arc::new(MemoryStorage::new());
    let events = Arc::new(RabbitEventBus::connect(AMQP_URL));
    let system = Arc::new(TrafficSystem::new(storage, events));

    system.set_simulation_state(Some(true), None);
    run_simulation(system).await;
}
