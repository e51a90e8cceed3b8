use std::{error::Error, fmt};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::geo;

use crate::ExampleData;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn distance_km_to(&self, other: &Point) -> f64 {
        geo::haversine_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    pub fn bearing_to(&self, other: &Point) -> f64 {
        geo::initial_bearing(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

impl From<(f64, f64)> for Point {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

impl ExampleData for Point {
    fn example_data() -> Self {
        // Kiel central station
        Self::new(54.3150, 10.1318)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    Empty,
    InvalidCoordinate { index: usize },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "path does not contain any points"),
            Self::InvalidCoordinate { index } => {
                write!(f, "point {} of the path is not a valid coordinate", index)
            }
        }
    }
}

impl Error for PathError {}

/// The ordered route a device travels along. The order of the points is the
/// order in which they are visited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct GeographicPath(Vec<Point>);

impl GeographicPath {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn validate(&self) -> Result<(), PathError> {
        if self.0.is_empty() {
            return Err(PathError::Empty);
        }
        match self.0.iter().position(|point| !point.is_valid()) {
            Some(index) => Err(PathError::InvalidCoordinate { index }),
            None => Ok(()),
        }
    }

    pub fn start(&self) -> Option<&Point> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Total length of the route in kilometers.
    pub fn length_km(&self) -> f64 {
        self.0
            .windows(2)
            .map(|pair| pair[0].distance_km_to(&pair[1]))
            .sum()
    }
}

impl From<Vec<Point>> for GeographicPath {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<Point> for GeographicPath {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
