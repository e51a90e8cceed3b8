use chrono::{DateTime, Local};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};

use crate::{
    point::{GeographicPath, Point},
    request::RunnerStatus,
    ExampleData,
};

pub type SimulatorId = Id<SimulatorState>;

/// Lifecycle of a simulated device.
///
/// ```text
/// Created ──> Running ──> Completed
///    │           ├──────> Cancelled
///    │           └──────> Failed
///    └──────────────────> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulatorStatus {
    Created,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl SimulatorStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn can_transition_to(&self, next: SimulatorStatus) -> bool {
        use SimulatorStatus::*;
        matches!(
            (*self, next),
            (Created, Running)
                | (Created, Cancelled)
                | (Created, Failed)
                | (Running, Completed)
                | (Running, Cancelled)
                | (Running, Failed)
        )
    }
}

/// Live telemetry of one simulated device, as published to readers.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorState {
    pub name: Option<String>,
    pub status: SimulatorStatus,
    pub start_point: Point,
    pub position: Point,
    pub point_index: usize,
    pub total_points: usize,
    /// Degrees clockwise from north, towards the point last travelled to.
    pub heading: Option<f64>,
    pub speed_kph: f64,
    pub distance_travelled_km: f64,
    pub runner_status: RunnerStatus,
    pub updated_at: DateTime<Local>,
    pub failure: Option<String>,
}

impl HasId for SimulatorState {
    type IdType = u64;
}

impl SimulatorState {
    /// Initial state of a device parked at the beginning of its path.
    pub fn created(
        name: Option<String>,
        start_point: Point,
        path: &GeographicPath,
        runner_status: RunnerStatus,
    ) -> Self {
        Self {
            name,
            status: SimulatorStatus::Created,
            start_point,
            position: start_point,
            point_index: 0,
            total_points: path.len(),
            heading: None,
            speed_kph: 0.0,
            distance_travelled_km: 0.0,
            runner_status,
            updated_at: Local::now(),
            failure: None,
        }
    }
}

impl ExampleData for SimulatorState {
    fn example_data() -> Self {
        let start_point = Point::example_data();
        Self {
            name: Some("runner-7".to_owned()),
            status: SimulatorStatus::Running,
            start_point,
            position: Point::new(54.3233, 10.1394),
            point_index: 3,
            total_points: 12,
            heading: Some(23.4),
            speed_kph: 11.5,
            distance_travelled_km: 1.02,
            runner_status: RunnerStatus::SupplySoon,
            updated_at: Local::now(),
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_final() {
        use SimulatorStatus::*;
        for terminal in [Completed, Cancelled, Failed] {
            assert!(terminal.is_terminal());
            for next in [Created, Running, Completed, Cancelled, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Created.is_terminal());
        assert!(!Running.is_terminal());
    }

    #[test]
    fn no_resurrection_into_created() {
        use SimulatorStatus::*;
        assert!(!Running.can_transition_to(Created));
        assert!(!Running.can_transition_to(Running));
        assert!(Created.can_transition_to(Running));
    }

    #[test]
    fn status_serializes_in_upper_case() {
        assert_eq!(
            serde_json::to_string(&SimulatorStatus::Cancelled).unwrap(),
            r#""CANCELLED""#
        );
    }

    #[test]
    fn fresh_state_stands_at_the_start() {
        let path: GeographicPath =
            vec![Point::new(0.0, 0.0), Point::new(0.0, 1.0)].into();
        let state =
            SimulatorState::created(None, Point::new(0.0, 0.0), &path, RunnerStatus::None);
        assert_eq!(state.status, SimulatorStatus::Created);
        assert_eq!(state.position, state.start_point);
        assert_eq!(state.point_index, 0);
        assert_eq!(state.total_points, 2);
    }
}
