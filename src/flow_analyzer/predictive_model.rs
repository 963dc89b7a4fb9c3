// predictive_model.rs
//
// Short-horizon traffic forecasting over the stored sample history. The
// `Forecaster` trait is the seam: the default implementation blends the most
// recent observation with the windowed mean per approach, which is cheap and
// good enough to drive the dashboard. Heavier models can slot in behind the
// same trait without touching callers.

use crate::errors::ControlError;
use crate::shared_data::TrafficSample;
use crate::simulation_engine::intersections::{Direction, IntersectionId};
use crate::storage::Storage;
use std::collections::HashMap;

/// Congestion thresholds shared with the scenario metrics aggregation.
const CONGESTION_WAIT_SECS: f64 = 45.0;
const CONGESTION_QUEUE_LEN: u32 = 10;

/// Sample count at which confidence tops out.
const FULL_CONFIDENCE_SAMPLES: usize = 12;

/// Per-approach forecast for the next few minutes.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionForecast {
    pub predicted_count: u32,
    pub predicted_congestion: bool,
    pub confidence: f64,
}

pub trait Forecaster: Send + Sync {
    /// Forecast per approach of one intersection from the samples of the
    /// last `window_minutes`. Errors with `NotFound` when the window holds
    /// no samples for the intersection.
    fn predict(
        &self,
        storage: &dyn Storage,
        intersection_id: IntersectionId,
        window_minutes: u32,
        now: i64,
    ) -> Result<HashMap<Direction, DirectionForecast>, ControlError>;
}

/// Blend of latest observation and windowed mean, weighted by `alpha`.
/// `alpha = 1.0` trusts only the latest sample, `0.0` only the history.
#[derive(Debug, Clone, Copy)]
pub struct WeightedAverageForecaster {
    pub alpha: f64,
}

impl WeightedAverageForecaster {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
        }
    }
}

impl Default for WeightedAverageForecaster {
    fn default() -> Self {
        Self::new(0.6)
    }
}

impl Forecaster for WeightedAverageForecaster {
    fn predict(
        &self,
        storage: &dyn Storage,
        intersection_id: IntersectionId,
        window_minutes: u32,
        now: i64,
    ) -> Result<HashMap<Direction, DirectionForecast>, ControlError> {
        let since = now - i64::from(window_minutes.max(1)) * 60;
        let samples = storage.recent_samples(Some(intersection_id), since);
        if samples.is_empty() {
            return Err(ControlError::NotFound(format!(
                "no samples for intersection {} in the last {} minutes",
                intersection_id.0,
                window_minutes.max(1)
            )));
        }

        // recent_samples is newest first, so the first sample seen per
        // direction is the latest one.
        let mut by_direction: HashMap<Direction, Vec<&TrafficSample>> = HashMap::new();
        for sample in &samples {
            by_direction.entry(sample.direction).or_default().push(sample);
        }

        let mut forecasts = HashMap::new();
        for (direction, history) in by_direction {
            let latest = history[0];
            let n = history.len() as f64;
            let mean_count = history.iter().map(|s| s.vehicle_count as f64).sum::<f64>() / n;
            let mean_wait = history.iter().map(|s| s.wait_time).sum::<f64>() / n;
            let mean_queue = history.iter().map(|s| s.queue_length as f64).sum::<f64>() / n;

            let blend = |latest: f64, mean: f64| self.alpha * latest + (1.0 - self.alpha) * mean;
            let predicted_count = blend(latest.vehicle_count as f64, mean_count).round().max(0.0);
            let predicted_wait = blend(latest.wait_time, mean_wait);
            let predicted_queue = blend(latest.queue_length as f64, mean_queue).round();

            forecasts.insert(
                direction,
                DirectionForecast {
                    predicted_count: predicted_count as u32,
                    predicted_congestion: predicted_wait > CONGESTION_WAIT_SECS
                        && predicted_queue as u32 > CONGESTION_QUEUE_LEN,
                    confidence: (history.len() as f64 / FULL_CONFIDENCE_SAMPLES as f64).min(1.0),
                },
            );
        }
        Ok(forecasts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn sample(
        direction: Direction,
        timestamp: i64,
        vehicle_count: u32,
        wait_time: f64,
        queue_length: u32,
    ) -> TrafficSample {
        TrafficSample {
            intersection_id: IntersectionId(1),
            direction,
            timestamp,
            vehicle_count,
            average_speed: 25.0,
            queue_length,
            wait_time,
        }
    }

    #[test]
    fn empty_window_is_not_found() {
        let storage = MemoryStorage::new();
        let model = WeightedAverageForecaster::default();
        let result = model.predict(&storage, IntersectionId(1), 5, 1000);
        assert!(matches!(result, Err(ControlError::NotFound(_))));
    }

    #[test]
    fn blend_weighs_latest_against_the_mean() {
        let storage = MemoryStorage::new();
        storage
            .append_samples(&[
                sample(Direction::N, 900, 10, 20.0, 4),
                sample(Direction::N, 960, 30, 20.0, 4),
            ])
            .expect("append succeeds");

        // alpha = 1.0: the latest sample wins outright.
        let latest_only = WeightedAverageForecaster::new(1.0)
            .predict(&storage, IntersectionId(1), 5, 1000)
            .expect("prediction succeeds");
        assert_eq!(latest_only[&Direction::N].predicted_count, 30);

        // alpha = 0.0: the windowed mean wins outright.
        let mean_only = WeightedAverageForecaster::new(0.0)
            .predict(&storage, IntersectionId(1), 5, 1000)
            .expect("prediction succeeds");
        assert_eq!(mean_only[&Direction::N].predicted_count, 20);

        // alpha = 0.5: halfway between.
        let blended = WeightedAverageForecaster::new(0.5)
            .predict(&storage, IntersectionId(1), 5, 1000)
            .expect("prediction succeeds");
        assert_eq!(blended[&Direction::N].predicted_count, 25);
    }

    #[test]
    fn congestion_needs_both_wait_and_queue_over_threshold() {
        let storage = MemoryStorage::new();
        storage
            .append_samples(&[
                sample(Direction::N, 990, 20, 60.0, 15), // both over
                sample(Direction::S, 990, 20, 60.0, 5),  // queue under
                sample(Direction::E, 990, 20, 30.0, 15), // wait under
            ])
            .expect("append succeeds");

        let forecasts = WeightedAverageForecaster::new(1.0)
            .predict(&storage, IntersectionId(1), 5, 1000)
            .expect("prediction succeeds");
        assert!(forecasts[&Direction::N].predicted_congestion);
        assert!(!forecasts[&Direction::S].predicted_congestion);
        assert!(!forecasts[&Direction::E].predicted_congestion);
    }

    #[test]
    fn confidence_grows_with_history_depth() {
        let storage = MemoryStorage::new();
        storage
            .append_samples(&[sample(Direction::N, 990, 10, 10.0, 2)])
            .expect("append succeeds");
        let model = WeightedAverageForecaster::default();

        let thin = model
            .predict(&storage, IntersectionId(1), 5, 1000)
            .expect("prediction succeeds");
        assert!(thin[&Direction::N].confidence < 0.1 + 1e-9);

        let deep: Vec<TrafficSample> = (0..20)
            .map(|i| sample(Direction::N, 700 + i, 10, 10.0, 2))
            .collect();
        storage.append_samples(&deep).expect("append succeeds");
        let full = model
            .predict(&storage, IntersectionId(1), 5, 1000)
            .expect("prediction succeeds");
        assert_eq!(full[&Direction::N].confidence, 1.0);
    }
}
