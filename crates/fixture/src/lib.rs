use std::{
    error::Error,
    fmt, io,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use data_model::{FixtureFile, RouteEntry};
use model::{
    pace::Pace,
    point::{GeographicPath, Point},
    request::{Fixture, SimulationRequest},
};
use utility::polyline;

pub mod data_model;

#[derive(Debug)]
pub enum FixtureError {
    Io { path: PathBuf, source: io::Error },
    Parse(serde_json::Error),
    InvalidRoute { route: String, reason: String },
}

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "can not read fixture {}: {}", path.display(), source)
            }
            Self::Parse(why) => write!(f, "malformed fixture: {}", why),
            Self::InvalidRoute { route, reason } => {
                write!(f, "route {} is invalid: {}", route, reason)
            }
        }
    }
}

impl Error for FixtureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(why) => Some(why),
            Self::InvalidRoute { .. } => None,
        }
    }
}

impl From<serde_json::Error> for FixtureError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

pub type FixtureResult<O> = Result<O, FixtureError>;

/// Source of the batch of devices to simulate.
///
/// Loading is all or nothing: a fixture with a malformed route is reported as
/// a [`FixtureError`] and none of its routes are handed out. Routes that are
/// well formed but carry unusable values (an empty path, a zero speed) still
/// load and are rejected one by one when they are started.
#[async_trait]
pub trait FixtureLoader: Send + Sync {
    async fn load(&self) -> FixtureResult<Fixture>;
}

/// Reads the fixture from a JSON file every time it is loaded, so edits to the
/// file are picked up by the next start.
#[derive(Debug, Clone)]
pub struct JsonFileFixtureLoader {
    path: PathBuf,
}

impl JsonFileFixtureLoader {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FixtureLoader for JsonFileFixtureLoader {
    async fn load(&self) -> FixtureResult<Fixture> {
        let content =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| FixtureError::Io {
                    path: self.path.clone(),
                    source,
                })?;
        let fixture = parse_fixture(&content)?;
        log::info!(
            "loaded {} simulation requests from {}",
            fixture.len(),
            self.path.display()
        );
        Ok(fixture)
    }
}

/// Parses a whole fixture. The first malformed route fails the fixture.
pub fn parse_fixture(content: &str) -> FixtureResult<Fixture> {
    let file: FixtureFile = serde_json::from_str(content)?;
    file.simulations
        .into_iter()
        .enumerate()
        .map(|(index, entry)| to_request(index, entry))
        .collect()
}

fn to_request(index: usize, entry: RouteEntry) -> FixtureResult<SimulationRequest> {
    let invalid = |reason: &str| FixtureError::InvalidRoute {
        route: entry.label(index),
        reason: reason.to_owned(),
    };

    let path: GeographicPath = match (&entry.points, &entry.polyline) {
        (Some(points), None) => points.clone().into(),
        (None, Some(encoded)) => polyline::decode(encoded)
            .map_err(|why| invalid(&why.to_string()))?
            .into_iter()
            .map(Point::from)
            .collect(),
        (Some(_), Some(_)) => return Err(invalid("has both points and a polyline")),
        (None, None) => return Err(invalid("has neither points nor a polyline")),
    };

    let pace = match (entry.speed_kph, entry.segment_millis) {
        (Some(speed), None) => Pace::SpeedKph(speed),
        (None, Some(millis)) => Pace::SegmentDuration(Duration::from_millis(millis)),
        (Some(_), Some(_)) => {
            return Err(invalid("has both a speed and a segment duration"))
        }
        (None, None) => return Err(invalid("has neither a speed nor a segment duration")),
    };

    Ok(SimulationRequest {
        id: entry.id,
        name: entry.name,
        path,
        pace,
        runner_status: entry.runner_status,
    })
}
