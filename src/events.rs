// events.rs
//
// Fire-and-forget push channel toward front-end clients. The simulation core
// only knows the `EventBus` trait; the RabbitMQ implementation mirrors the
// queue-publishing setup used across the rest of the system, with a dedicated
// publisher thread owning the connection so emits never block a tick.

use amiquip::{Connection, Exchange, Publish, QueueDeclareOptions};
use log::{error, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::mpsc::{channel, Sender};
use std::sync::Mutex;
use std::thread;

pub trait EventBus: Send + Sync {
    /// Fire-and-forget emit; implementations must not block the caller on
    /// broker I/O and must not propagate delivery failures.
    fn emit(&self, topic: &str, payload: Value);
}

/// Serializes `payload` and emits it; serialization failures are logged and
/// dropped, matching the fire-and-forget contract.
pub fn emit_json<T: Serialize>(bus: &dyn EventBus, topic: &str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => bus.emit(topic, value),
        Err(e) => error!("failed to serialize event for '{topic}': {e}"),
    }
}

/// Discards every event. Used where no front-end is attached.
#[derive(Debug, Default)]
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _topic: &str, _payload: Value) {}
}

/// Captures events for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns everything emitted so far.
    pub fn take(&self) -> Vec<(String, Value)> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn count_topic(&self, topic: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .count()
    }
}

impl EventBus for RecordingEventBus {
    fn emit(&self, topic: &str, payload: Value) {
        self.events
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
    }
}

/// RabbitMQ-backed bus. A single publisher thread owns the connection and the
/// direct exchange; `emit` just hands the message over an in-process channel,
/// so a slow or absent broker never stalls the simulation loops.
pub struct RabbitEventBus {
    tx: Sender<(String, Value)>,
}

impl RabbitEventBus {
    pub fn connect(url: &str) -> Self {
        let (tx, rx) = channel::<(String, Value)>();
        let url = url.to_string();
        thread::spawn(move || {
            let mut connection = match Connection::insecure_open(&url) {
                Ok(conn) => conn,
                Err(e) => {
                    error!("RabbitMQ connection failed, events will be dropped: {e}");
                    // Drain so senders never see a closed channel.
                    for _ in rx {}
                    return;
                }
            };
            let channel = match connection.open_channel(None) {
                Ok(ch) => ch,
                Err(e) => {
                    error!("RabbitMQ channel open failed, events will be dropped: {e}");
                    for _ in rx {}
                    return;
                }
            };
            for queue in crate::global_variables::ALL_QUEUES {
                if let Err(e) = channel.queue_declare(queue, QueueDeclareOptions::default()) {
                    warn!("failed to declare queue '{queue}': {e}");
                }
            }
            let exchange = Exchange::direct(&channel);
            for (topic, payload) in rx {
                match serde_json::to_vec(&payload) {
                    Ok(body) => {
                        if let Err(e) = exchange.publish(Publish::new(&body, &topic)) {
                            warn!("failed to publish to '{topic}': {e}");
                        }
                    }
                    Err(e) => error!("failed to encode payload for '{topic}': {e}"),
                }
            }
            if let Err(e) = connection.close() {
                warn!("error closing RabbitMQ connection: {e}");
            }
        });
        Self { tx }
    }
}

impl EventBus for RabbitEventBus {
    fn emit(&self, topic: &str, payload: Value) {
        // Send only fails when the publisher thread is gone; fire-and-forget.
        let _ = self.tx.send((topic.to_string(), payload));
    }
}
