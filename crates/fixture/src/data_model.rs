use model::{point::Point, request::RunnerStatus};
use serde::{Deserialize, Serialize};

/// Content of a fixture file.
///
/// ```json
/// {
///   "simulations": [
///     { "name": "harbour", "points": [{ "latitude": 54.32, "longitude": 10.13 }], "speedKph": 12 },
///     { "id": 4, "polyline": "_p~iF~ps|U_ulLnnqC", "segmentMillis": 500 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureFile {
    pub simulations: Vec<RouteEntry>,
}

/// One named route of a fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    /// Fixed id of the simulated device. Generated if missing.
    pub id: Option<u64>,

    pub name: Option<String>,

    /// Route given as explicit coordinates.
    pub points: Option<Vec<Point>>,

    /// Route given as an encoded polyline, as returned by directions services.
    pub polyline: Option<String>,

    /// Constant ground speed of the device.
    pub speed_kph: Option<f64>,

    /// Fixed time between two consecutive points.
    pub segment_millis: Option<u64>,

    #[serde(default)]
    pub runner_status: RunnerStatus,
}

impl RouteEntry {
    /// How the route is referred to in error messages.
    pub fn label(&self, index: usize) -> String {
        match (&self.name, self.id) {
            (Some(name), _) => format!("'{}'", name),
            (None, Some(id)) => format!("with id {}", id),
            (None, None) => format!("#{}", index),
        }
    }
}
