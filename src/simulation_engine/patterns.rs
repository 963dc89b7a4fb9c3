use crate::simulation_engine::intersections::Direction;
use chrono::{DateTime, Datelike, Local, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Closed set of traffic-generation patterns. Keeping this an enum (rather
/// than string keys into a map) makes an unknown pattern unrepresentable at
/// runtime; only parsing a scenario config can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKey {
    MorningRush,
    EveningRush,
    Normal,
    Night,
    Weekend,
}

impl PatternKey {
    pub fn parse(s: &str) -> Option<PatternKey> {
        match s {
            "morning_rush" => Some(PatternKey::MorningRush),
            "evening_rush" => Some(PatternKey::EveningRush),
            "normal" => Some(PatternKey::Normal),
            "night" => Some(PatternKey::Night),
            "weekend" => Some(PatternKey::Weekend),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PatternKey::MorningRush => "morning_rush",
            PatternKey::EveningRush => "evening_rush",
            PatternKey::Normal => "normal",
            PatternKey::Night => "night",
            PatternKey::Weekend => "weekend",
        }
    }

    pub fn pattern(self) -> &'static TrafficPattern {
        match self {
            PatternKey::MorningRush => &MORNING_RUSH,
            PatternKey::EveningRush => &EVENING_RUSH,
            PatternKey::Normal => &NORMAL,
            PatternKey::Night => &NIGHT,
            PatternKey::Weekend => &WEEKEND,
        }
    }
}

/// Parameter set governing synthetic traffic generation for one pattern.
#[derive(Debug, Clone)]
pub struct TrafficPattern {
    /// Approaches that carry the heavy flow (1.5x base count).
    pub peak_directions: &'static [Direction],
    pub base_vehicle_count: f64,
    /// Uniform +/- spread applied to the base count.
    pub variation: f64,
    /// (min, max) average speed in km/h before the phase adjustment.
    pub avg_speed_range: (f64, f64),
    pub queue_multiplier: f64,
    /// Baseline wait in seconds before the red-phase cycle penalty.
    pub wait_time_base: f64,
}

impl TrafficPattern {
    pub fn is_peak(&self, direction: Direction) -> bool {
        self.peak_directions.contains(&direction)
    }
}

// Toward the city center.
static MORNING_RUSH: TrafficPattern = TrafficPattern {
    peak_directions: &[Direction::S, Direction::E],
    base_vehicle_count: 40.0,
    variation: 15.0,
    avg_speed_range: (20.0, 60.0),
    queue_multiplier: 0.7,
    wait_time_base: 30.0,
};

// Away from the city center.
static EVENING_RUSH: TrafficPattern = TrafficPattern {
    peak_directions: &[Direction::N, Direction::W],
    base_vehicle_count: 35.0,
    variation: 20.0,
    avg_speed_range: (15.0, 50.0),
    queue_multiplier: 0.8,
    wait_time_base: 40.0,
};

static NORMAL: TrafficPattern = TrafficPattern {
    peak_directions: &[],
    base_vehicle_count: 15.0,
    variation: 8.0,
    avg_speed_range: (30.0, 70.0),
    queue_multiplier: 0.4,
    wait_time_base: 15.0,
};

static NIGHT: TrafficPattern = TrafficPattern {
    peak_directions: &[],
    base_vehicle_count: 5.0,
    variation: 3.0,
    avg_speed_range: (40.0, 90.0),
    queue_multiplier: 0.2,
    wait_time_base: 5.0,
};

// Shopping areas.
static WEEKEND: TrafficPattern = TrafficPattern {
    peak_directions: &[Direction::E, Direction::W],
    base_vehicle_count: 25.0,
    variation: 12.0,
    avg_speed_range: (25.0, 65.0),
    queue_multiplier: 0.5,
    wait_time_base: 20.0,
};

/// Pattern for the current wall-clock time, used when no scenario overrides it.
pub fn default_pattern_key(now: DateTime<Local>) -> PatternKey {
    let hour = now.hour();
    if (7..10).contains(&hour) {
        PatternKey::MorningRush
    } else if (16..19).contains(&hour) {
        PatternKey::EveningRush
    } else if hour >= 22 || hour < 5 {
        PatternKey::Night
    } else if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        PatternKey::Weekend
    } else {
        PatternKey::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, m, d, h, 30, 0)
            .single()
            .expect("valid local time")
    }

    #[test]
    fn weekday_schedule_picks_rush_patterns() {
        // 2025-06-04 is a Wednesday.
        assert_eq!(default_pattern_key(local(2025, 6, 4, 8)), PatternKey::MorningRush);
        assert_eq!(default_pattern_key(local(2025, 6, 4, 17)), PatternKey::EveningRush);
        assert_eq!(default_pattern_key(local(2025, 6, 4, 23)), PatternKey::Night);
        assert_eq!(default_pattern_key(local(2025, 6, 4, 3)), PatternKey::Night);
        assert_eq!(default_pattern_key(local(2025, 6, 4, 12)), PatternKey::Normal);
    }

    #[test]
    fn weekend_midday_uses_weekend_pattern() {
        // 2025-06-07 is a Saturday; rush windows still win on weekends.
        assert_eq!(default_pattern_key(local(2025, 6, 7, 12)), PatternKey::Weekend);
        assert_eq!(default_pattern_key(local(2025, 6, 7, 8)), PatternKey::MorningRush);
    }

    #[test]
    fn every_key_resolves_and_round_trips() {
        for key in [
            PatternKey::MorningRush,
            PatternKey::EveningRush,
            PatternKey::Normal,
            PatternKey::Night,
            PatternKey::Weekend,
        ] {
            let pattern = key.pattern();
            assert!(pattern.base_vehicle_count > 0.0);
            assert!(pattern.avg_speed_range.0 < pattern.avg_speed_range.1);
            assert_eq!(PatternKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(PatternKey::parse("gridlock"), None);
    }

    #[test]
    fn peak_directions_match_the_published_table() {
        assert!(PatternKey::MorningRush.pattern().is_peak(Direction::S));
        assert!(PatternKey::MorningRush.pattern().is_peak(Direction::E));
        assert!(!PatternKey::MorningRush.pattern().is_peak(Direction::N));
        assert!(PatternKey::Night.pattern().peak_directions.is_empty());
    }
}
