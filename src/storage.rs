// storage.rs
//
// Durable-store boundary. The core only needs append-only writes and simple
// time-range/key reads, so the trait stays small; the simulation and the
// tests run against the in-memory backend, while the monitoring binary keeps
// its own CSV files fed from the event queues.

use crate::shared_data::{PerformanceRecord, SignalSnapshot, TrafficSample};
use crate::simulation_engine::intersections::IntersectionId;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub trait Storage: Send + Sync {
    /// Appends one generator tick's batch. All-or-nothing: a failed append
    /// must leave no partial batch behind.
    fn append_samples(&self, batch: &[TrafficSample]) -> Result<(), StorageError>;

    /// Samples at or after `since`, newest first, optionally scoped to one
    /// intersection.
    fn recent_samples(
        &self,
        intersection_id: Option<IntersectionId>,
        since: i64,
    ) -> Vec<TrafficSample>;

    /// The `limit` most recent samples for one intersection, newest first.
    fn latest_samples(&self, intersection_id: IntersectionId, limit: usize) -> Vec<TrafficSample>;

    fn append_signal_change(&self, change: &SignalSnapshot) -> Result<(), StorageError>;

    /// Opens a performance record for a scenario run (end_time unset).
    fn open_performance_record(
        &self,
        scenario_id: u32,
        start_time: i64,
    ) -> Result<u64, StorageError>;

    /// Closes the newest open record for the scenario. Returns false when no
    /// open record exists.
    fn close_performance_record(
        &self,
        scenario_id: u32,
        end_time: i64,
        avg_wait_time: f64,
        throughput: u64,
    ) -> Result<bool, StorageError>;

    /// Completed records only, newest first.
    fn performance_records(
        &self,
        scenario_id: Option<u32>,
        limit: usize,
    ) -> Vec<PerformanceRecord>;
}

/// In-memory backend used by the simulation binary and the tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    samples: Mutex<Vec<TrafficSample>>,
    signal_changes: Mutex<Vec<SignalSnapshot>>,
    records: Mutex<Vec<PerformanceRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal_change_count(&self) -> usize {
        self.signal_changes.lock().unwrap().len()
    }
}

impl Storage for MemoryStorage {
    fn append_samples(&self, batch: &[TrafficSample]) -> Result<(), StorageError> {
        self.samples.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }

    fn recent_samples(
        &self,
        intersection_id: Option<IntersectionId>,
        since: i64,
    ) -> Vec<TrafficSample> {
        let samples = self.samples.lock().unwrap();
        let mut matching: Vec<TrafficSample> = samples
            .iter()
            .filter(|s| s.timestamp >= since)
            .filter(|s| intersection_id.is_none_or(|id| s.intersection_id == id))
            .cloned()
            .collect();
        matching.reverse();
        matching
    }

    fn latest_samples(&self, intersection_id: IntersectionId, limit: usize) -> Vec<TrafficSample> {
        let samples = self.samples.lock().unwrap();
        samples
            .iter()
            .rev()
            .filter(|s| s.intersection_id == intersection_id)
            .take(limit)
            .cloned()
            .collect()
    }

    fn append_signal_change(&self, change: &SignalSnapshot) -> Result<(), StorageError> {
        self.signal_changes.lock().unwrap().push(change.clone());
        Ok(())
    }

    fn open_performance_record(
        &self,
        scenario_id: u32,
        start_time: i64,
    ) -> Result<u64, StorageError> {
        let mut records = self.records.lock().unwrap();
        let id = records.len() as u64 + 1;
        records.push(PerformanceRecord {
            id,
            scenario_id,
            start_time,
            end_time: None,
            avg_wait_time: 0.0,
            throughput: 0,
            congestion_duration: 0.0,
            emergency_response_time: 0.0,
        });
        Ok(id)
    }

    fn close_performance_record(
        &self,
        scenario_id: u32,
        end_time: i64,
        avg_wait_time: f64,
        throughput: u64,
    ) -> Result<bool, StorageError> {
        let mut records = self.records.lock().unwrap();
        let open = records
            .iter_mut()
            .rev()
            .find(|r| r.scenario_id == scenario_id && r.end_time.is_none());
        match open {
            Some(record) => {
                record.end_time = Some(end_time);
                record.avg_wait_time = avg_wait_time;
                record.throughput = throughput;
                // Not tracked by the core yet; recorded as zero.
                record.congestion_duration = 0.0;
                record.emergency_response_time = 0.0;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn performance_records(
        &self,
        scenario_id: Option<u32>,
        limit: usize,
    ) -> Vec<PerformanceRecord> {
        let records = self.records.lock().unwrap();
        let mut completed: Vec<PerformanceRecord> = records
            .iter()
            .filter(|r| r.end_time.is_some())
            .filter(|r| scenario_id.is_none_or(|id| r.scenario_id == id))
            .cloned()
            .collect();
        completed.sort_by_key(|r| std::cmp::Reverse(r.start_time));
        completed.truncate(limit);
        completed
    }
}
