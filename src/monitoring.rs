// monitoring.rs
//
// Standalone monitoring side: consumes the simulation queues from RabbitMQ,
// appends every event to flat CSV logs, and offers a small admin CLI with
// textual views, a record-count report and a wait-time chart.

use crate::global_variables::{
    AMQP_URL, QUEUE_EMERGENCY_INJECTED, QUEUE_INTERSECTION_TRAFFIC, QUEUE_SCENARIO_COMPLETED,
    QUEUE_SCENARIO_PROGRESS, QUEUE_SIGNALS_UPDATED,
};
use crate::shared_data::{
    current_timestamp, EmergencyInjected, IntersectionTrafficUpdate, ScenarioCompleted,
    ScenarioProgress, SignalsUpdated,
};
use amiquip::{
    Connection, ConsumerMessage, ConsumerOptions, QueueDeclareOptions, Result as AmiquipResult,
};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::path::Path;

pub const TRAFFIC_CSV: &str = "traffic_updates.csv";
pub const SIGNALS_CSV: &str = "signal_updates.csv";
pub const PROGRESS_CSV: &str = "scenario_progress.csv";
pub const COMPLETIONS_CSV: &str = "scenario_completions.csv";
pub const EMERGENCIES_CSV: &str = "emergency_injections.csv";

// CSV rows are flat mirrors of the queue payloads: one row per sample or
// signal, enums rendered as strings.

#[derive(Debug, Serialize, Deserialize)]
pub struct TrafficUpdateRow {
    pub received_at: i64,
    pub timestamp: i64,
    pub intersection_id: u32,
    pub direction: String,
    pub vehicle_count: u32,
    pub average_speed: f64,
    pub queue_length: u32,
    pub wait_time: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignalUpdateRow {
    pub received_at: i64,
    pub intersection_id: u32,
    pub direction: String,
    pub phase: String,
    pub cycle_secs: u32,
    pub last_changed: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScenarioProgressRow {
    pub received_at: i64,
    pub scenario_id: u32,
    pub name: String,
    pub progress: u32,
    pub elapsed: i64,
    pub remaining: i64,
    pub avg_wait_time: f64,
    pub total_vehicles: u64,
    pub congested_intersections: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScenarioCompletionRow {
    pub received_at: i64,
    pub scenario_id: u32,
    pub name: String,
    pub avg_wait_time: f64,
    pub total_vehicles: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmergencyRow {
    pub received_at: i64,
    pub timestamp: i64,
    pub intersection_id: u32,
    pub intersection_name: String,
    pub direction: String,
}

fn traffic_rows(update: &IntersectionTrafficUpdate, received_at: i64) -> Vec<TrafficUpdateRow> {
    update
        .traffic_data
        .iter()
        .map(|s| TrafficUpdateRow {
            received_at,
            timestamp: s.timestamp,
            intersection_id: s.intersection_id.0,
            direction: s.direction.as_str().to_string(),
            vehicle_count: s.vehicle_count,
            average_speed: s.average_speed,
            queue_length: s.queue_length,
            wait_time: s.wait_time,
        })
        .collect()
}

fn signal_rows(update: &SignalsUpdated, received_at: i64) -> Vec<SignalUpdateRow> {
    update
        .updated_signals
        .iter()
        .map(|s| SignalUpdateRow {
            received_at,
            intersection_id: s.intersection_id.0,
            direction: s.direction.as_str().to_string(),
            phase: s.phase.as_str().to_string(),
            cycle_secs: s.cycle_secs,
            last_changed: s.last_changed,
        })
        .collect()
}

fn progress_row(progress: &ScenarioProgress, received_at: i64) -> ScenarioProgressRow {
    ScenarioProgressRow {
        received_at,
        scenario_id: progress.scenario_id,
        name: progress.name.clone(),
        progress: progress.progress,
        elapsed: progress.elapsed,
        remaining: progress.remaining,
        avg_wait_time: progress.metrics.avg_wait_time,
        total_vehicles: progress.metrics.total_vehicles,
        congested_intersections: progress.metrics.congested_intersections,
    }
}

fn completion_row(completed: &ScenarioCompleted, received_at: i64) -> ScenarioCompletionRow {
    ScenarioCompletionRow {
        received_at,
        scenario_id: completed.scenario_id,
        name: completed.name.clone(),
        avg_wait_time: completed.metrics.avg_wait_time,
        total_vehicles: completed.metrics.total_vehicles,
    }
}

fn emergency_row(injected: &EmergencyInjected, received_at: i64) -> EmergencyRow {
    EmergencyRow {
        received_at,
        timestamp: injected.timestamp,
        intersection_id: injected.intersection_id.0,
        intersection_name: injected.intersection_name.clone(),
        direction: injected.direction.as_str().to_string(),
    }
}

/// Generic helper to append a record to a CSV file, writing the header only
/// when the file is created.
fn log_to_csv<T: Serialize>(filename: &str, record: &T) -> Result<(), Box<dyn Error>> {
    let file_exists = Path::new(filename).exists();
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(filename)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

fn consume_queue<F>(queue_name: &'static str, mut handle: F) -> AmiquipResult<()>
where
    F: FnMut(&str, i64) + Send + 'static,
{
    let mut connection = Connection::insecure_open(AMQP_URL)?;
    let channel = connection.open_channel(None)?;
    let queue = channel.queue_declare(queue_name, QueueDeclareOptions::default())?;
    let consumer = queue.consume(ConsumerOptions::default())?;
    println!("Listening on '{}'...", queue_name);
    for message in consumer.receiver() {
        match message {
            ConsumerMessage::Delivery(delivery) => {
                if let Ok(json_str) = std::str::from_utf8(&delivery.body) {
                    handle(json_str, current_timestamp());
                }
                consumer.ack(delivery)?;
            }
            other => {
                println!("Consumer on '{}' ended: {:?}", queue_name, other);
                break;
            }
        }
    }
    connection.close()
}

/// Listens to the traffic-update queue and logs one row per sample.
pub async fn listen_traffic_updates() -> AmiquipResult<()> {
    tokio::task::spawn_blocking(|| {
        consume_queue(QUEUE_INTERSECTION_TRAFFIC, |json_str, received_at| {
            match serde_json::from_str::<IntersectionTrafficUpdate>(json_str) {
                Ok(update) => {
                    for row in traffic_rows(&update, received_at) {
                        if let Err(e) = log_to_csv(TRAFFIC_CSV, &row) {
                            eprintln!("Error logging traffic update: {}", e);
                        }
                    }
                }
                Err(e) => eprintln!("Malformed traffic update: {}", e),
            }
        })
    })
    .await
    .unwrap()
}

/// Listens to the signal-update queue and logs one row per changed signal.
pub async fn listen_signal_updates() -> AmiquipResult<()> {
    tokio::task::spawn_blocking(|| {
        consume_queue(QUEUE_SIGNALS_UPDATED, |json_str, received_at| {
            match serde_json::from_str::<SignalsUpdated>(json_str) {
                Ok(update) => {
                    for row in signal_rows(&update, received_at) {
                        if let Err(e) = log_to_csv(SIGNALS_CSV, &row) {
                            eprintln!("Error logging signal update: {}", e);
                        }
                    }
                }
                Err(e) => eprintln!("Malformed signal update: {}", e),
            }
        })
    })
    .await
    .unwrap()
}

/// Listens to the scenario-progress queue.
pub async fn listen_scenario_progress() -> AmiquipResult<()> {
    tokio::task::spawn_blocking(|| {
        consume_queue(QUEUE_SCENARIO_PROGRESS, |json_str, received_at| {
            match serde_json::from_str::<ScenarioProgress>(json_str) {
                Ok(progress) => {
                    if let Err(e) = log_to_csv(PROGRESS_CSV, &progress_row(&progress, received_at))
                    {
                        eprintln!("Error logging scenario progress: {}", e);
                    }
                }
                Err(e) => eprintln!("Malformed scenario progress: {}", e),
            }
        })
    })
    .await
    .unwrap()
}

/// Listens to the scenario-completed queue.
pub async fn listen_scenario_completions() -> AmiquipResult<()> {
    tokio::task::spawn_blocking(|| {
        consume_queue(QUEUE_SCENARIO_COMPLETED, |json_str, received_at| {
            match serde_json::from_str::<ScenarioCompleted>(json_str) {
                Ok(completed) => {
                    if let Err(e) =
                        log_to_csv(COMPLETIONS_CSV, &completion_row(&completed, received_at))
                    {
                        eprintln!("Error logging scenario completion: {}", e);
                    }
                }
                Err(e) => eprintln!("Malformed scenario completion: {}", e),
            }
        })
    })
    .await
    .unwrap()
}

/// Listens to the emergency-injection queue.
pub async fn listen_emergency_injections() -> AmiquipResult<()> {
    tokio::task::spawn_blocking(|| {
        consume_queue(QUEUE_EMERGENCY_INJECTED, |json_str, received_at| {
            match serde_json::from_str::<EmergencyInjected>(json_str) {
                Ok(injected) => {
                    if let Err(e) =
                        log_to_csv(EMERGENCIES_CSV, &emergency_row(&injected, received_at))
                    {
                        eprintln!("Error logging emergency injection: {}", e);
                    }
                }
                Err(e) => eprintln!("Malformed emergency injection: {}", e),
            }
        })
    })
    .await
    .unwrap()
}

fn show_csv<T: for<'de> Deserialize<'de> + std::fmt::Debug>(
    filename: &str,
    title: &str,
) -> Result<(), Box<dyn Error>> {
    let file = File::open(filename)?;
    let mut rdr = csv::Reader::from_reader(file);
    println!("{}:", title);
    for result in rdr.deserialize() {
        let record: T = result?;
        println!("{:?}", record);
    }
    Ok(())
}

pub fn show_traffic_updates() -> Result<(), Box<dyn Error>> {
    show_csv::<TrafficUpdateRow>(TRAFFIC_CSV, "Traffic Updates")
}

pub fn show_signal_updates() -> Result<(), Box<dyn Error>> {
    show_csv::<SignalUpdateRow>(SIGNALS_CSV, "Signal Updates")
}

pub fn show_scenario_progress() -> Result<(), Box<dyn Error>> {
    show_csv::<ScenarioProgressRow>(PROGRESS_CSV, "Scenario Progress")
}

pub fn show_scenario_completions() -> Result<(), Box<dyn Error>> {
    show_csv::<ScenarioCompletionRow>(COMPLETIONS_CSV, "Scenario Completions")
}

pub fn show_emergency_injections() -> Result<(), Box<dyn Error>> {
    show_csv::<EmergencyRow>(EMERGENCIES_CSV, "Emergency Injections")
}

fn count_csv_records(filename: &str) -> usize {
    File::open(filename)
        .map(|file| {
            csv::Reader::from_reader(file)
                .deserialize::<serde_json::Value>()
                .count()
        })
        .unwrap_or(0)
}

/// Counts the records collected in each CSV log.
pub fn generate_report() {
    println!("Report Summary:");
    println!("Traffic Updates: {} records", count_csv_records(TRAFFIC_CSV));
    println!("Signal Updates: {} records", count_csv_records(SIGNALS_CSV));
    println!(
        "Scenario Progress: {} records",
        count_csv_records(PROGRESS_CSV)
    );
    println!(
        "Scenario Completions: {} records",
        count_csv_records(COMPLETIONS_CSV)
    );
    println!(
        "Emergency Injections: {} records",
        count_csv_records(EMERGENCIES_CSV)
    );
}

/// Scatterplot of the average wait time over scenario elapsed time, from the
/// collected progress rows.
pub fn plot_wait_times() -> Result<(), Box<dyn Error>> {
    let file = File::open(PROGRESS_CSV)?;
    let mut rdr = csv::Reader::from_reader(file);
    let rows: Vec<ScenarioProgressRow> = rdr.deserialize().collect::<Result<_, _>>()?;
    if rows.is_empty() {
        println!("No scenario progress collected yet.");
        return Ok(());
    }

    let max_elapsed = rows.iter().map(|r| r.elapsed).max().unwrap_or(1).max(1);
    let max_wait = rows
        .iter()
        .map(|r| r.avg_wait_time)
        .fold(f64::NEG_INFINITY, f64::max)
        .max(1.0);

    let backend = BitMapBackend::new("scenario_wait_times.png", (800, 600));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Scenario Average Wait Time", ("sans-serif", 20))
        .margin(40)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0..max_elapsed, 0.0..max_wait)?;

    chart.configure_mesh().draw()?;
    chart.draw_series(
        rows.iter()
            .map(|r| Circle::new((r.elapsed, r.avg_wait_time), 5, RED.filled())),
    )?;

    root.present()?;
    println!("Wait-time chart saved to scenario_wait_times.png");
    Ok(())
}

/// Provides a simple CLI for admin operations.
pub async fn run_cli() {
    use std::io::{stdin, stdout, Write};
    loop {
        println!("\nTraffic Monitoring Admin CLI");
        println!("1. Display Traffic Updates");
        println!("2. Display Signal Updates");
        println!("3. Display Scenario Progress");
        println!("4. Display Scenario Completions");
        println!("5. Display Emergency Injections");
        println!("6. Generate Report");
        println!("7. Plot Scenario Wait Times");
        println!("8. Exit");
        print!("Enter your choice: ");
        stdout().flush().unwrap();
        let mut input = String::new();
        stdin().read_line(&mut input).unwrap();
        let choice = input.trim().parse::<u32>().unwrap_or(0);
        match choice {
            1 => {
                if let Err(e) = show_traffic_updates() {
                    eprintln!("Error displaying traffic updates: {}", e);
                }
            }
            2 => {
                if let Err(e) = show_signal_updates() {
                    eprintln!("Error displaying signal updates: {}", e);
                }
            }
            3 => {
                if let Err(e) = show_scenario_progress() {
                    eprintln!("Error displaying scenario progress: {}", e);
                }
            }
            4 => {
                if let Err(e) = show_scenario_completions() {
                    eprintln!("Error displaying scenario completions: {}", e);
                }
            }
            5 => {
                if let Err(e) = show_emergency_injections() {
                    eprintln!("Error displaying emergency injections: {}", e);
                }
            }
            6 => generate_report(),
            7 => {
                if let Err(e) = plot_wait_times() {
                    eprintln!("Error plotting wait times: {}", e);
                }
            }
            8 => {
                println!("Exiting CLI.");
                break;
            }
            _ => {
                println!("Invalid choice. Try again.");
            }
        }
    }
}
