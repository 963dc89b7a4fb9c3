// monitoring_main.rs
use tokio::join;
use traffic_control::monitoring::{
    listen_emergency_injections, listen_scenario_completions, listen_scenario_progress,
    listen_signal_updates, listen_traffic_updates, run_cli,
};

#[tokio::main]
async fn main() {
    env_logger::init();

    // Spawn one listener per RabbitMQ queue concurrently.
    let traffic_listener = tokio::spawn(async {
        if let Err(e) = listen_traffic_updates().await {
            eprintln!("Error in traffic updates listener: {}", e);
        }
    });
    let signal_listener = tokio::spawn(async {
        if let Err(e) = listen_signal_updates().await {
            eprintln!("Error in signal updates listener: {}", e);
        }
    });
    let progress_listener = tokio::spawn(async {
        if let Err(e) = listen_scenario_progress().await {
            eprintln!("Error in scenario progress listener: {}", e);
        }
    });
    let completion_listener = tokio::spawn(async {
        if let Err(e) = listen_scenario_completions().await {
            eprintln!("Error in scenario completions listener: {}", e);
        }
    });
    let emergency_listener = tokio::spawn(async {
        if let Err(e) = listen_emergency_injections().await {
            eprintln!("Error in emergency injections listener: {}", e);
        }
    });

    // Run the admin CLI concurrently; it exits on its own.
    let cli_handle = tokio::spawn(async {
        run_cli().await;
    });

    let _ = join!(
        traffic_listener,
        signal_listener,
        progress_listener,
        completion_listener,
        emergency_listener,
        cli_handle
    );
}
