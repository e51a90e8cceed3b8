use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{pace::Pace, point::GeographicPath};

/// Status hint a simulated runner reports alongside its position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RunnerStatus {
    #[default]
    None,
    SupplyNow,
    SupplySoon,
    StopNow,
}

/// Declarative description of one device to simulate.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    /// Identity seed. Requests without one get a generated id.
    pub id: Option<u64>,
    pub name: Option<String>,
    pub path: GeographicPath,
    pub pace: Pace,
    #[serde(default)]
    pub runner_status: RunnerStatus,
}

impl SimulationRequest {
    pub fn new(path: GeographicPath, pace: Pace) -> Self {
        Self {
            id: None,
            name: None,
            path,
            pace,
            runner_status: RunnerStatus::None,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_runner_status(mut self, runner_status: RunnerStatus) -> Self {
        self.runner_status = runner_status;
        self
    }
}

/// One batch of devices to simulate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub requests: Vec<SimulationRequest>,
}

impl Fixture {
    pub fn new(requests: Vec<SimulationRequest>) -> Self {
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl FromIterator<SimulationRequest> for Fixture {
    fn from_iter<I: IntoIterator<Item = SimulationRequest>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
