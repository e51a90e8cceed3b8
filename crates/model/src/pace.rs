use std::{error::Error, fmt, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::point::Point;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// How fast a simulated device moves along its path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Pace {
    /// Constant ground speed. Each segment takes as long as its length requires.
    SpeedKph(f64),
    /// Every segment takes the same time, regardless of its length.
    SegmentDuration(
        #[serde(with = "utility::serde::duration_millis")]
        #[schemars(schema_with = "utility::serde::duration_millis::schema")]
        Duration,
    ),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaceError {
    NonPositiveSpeed(f64),
    ZeroSegmentDuration,
    UnrepresentableDelay { seconds: f64 },
}

impl fmt::Display for PaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveSpeed(speed) => {
                write!(f, "speed must be a positive number of km/h, got {}", speed)
            }
            Self::ZeroSegmentDuration => {
                write!(f, "segment duration must be greater than zero")
            }
            Self::UnrepresentableDelay { seconds } => {
                write!(f, "segment delay of {} seconds can not be waited for", seconds)
            }
        }
    }
}

impl Error for PaceError {}

impl Pace {
    pub fn validate(&self) -> Result<(), PaceError> {
        match *self {
            Self::SpeedKph(speed) if !(speed.is_finite() && speed > 0.0) => {
                Err(PaceError::NonPositiveSpeed(speed))
            }
            Self::SegmentDuration(duration) if duration.is_zero() => {
                Err(PaceError::ZeroSegmentDuration)
            }
            _ => Ok(()),
        }
    }

    /// Time it takes to travel from one point to the next.
    pub fn delay_between(&self, from: &Point, to: &Point) -> Result<Duration, PaceError> {
        match *self {
            Self::SpeedKph(speed) => {
                let seconds = from.distance_km_to(to) / speed * SECONDS_PER_HOUR;
                Duration::try_from_secs_f64(seconds)
                    .map_err(|_| PaceError::UnrepresentableDelay { seconds })
            }
            Self::SegmentDuration(duration) => Ok(duration),
        }
    }

    /// Ground speed while travelling from one point to the next.
    pub fn speed_kph_between(&self, from: &Point, to: &Point) -> f64 {
        match *self {
            Self::SpeedKph(speed) => speed,
            Self::SegmentDuration(duration) => {
                from.distance_km_to(to) / (duration.as_secs_f64() / SECONDS_PER_HOUR)
            }
        }
    }
}
