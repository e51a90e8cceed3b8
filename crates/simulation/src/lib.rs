use std::{error::Error, fmt};

use model::{
    pace::PaceError,
    point::PathError,
    simulator::SimulatorId,
};
use tokio::sync::oneshot;

pub mod factory;
pub mod pool;
pub mod registry;
pub mod simulator;

/// Why a simulation request was turned down by the factory.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidRequest {
    Path(PathError),
    Pace(PaceError),
}

impl fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(why) => write!(f, "{}", why),
            Self::Pace(why) => write!(f, "{}", why),
        }
    }
}

#[derive(Debug)]
pub enum SimulationError {
    InvalidRequest(InvalidRequest),
    DuplicateActiveId(SimulatorId),
    /// A request seeded an id the factory already generated for another
    /// simulator.
    IdAlreadyAssigned(SimulatorId),
    /// A simulator was interrupted while waiting for its next position.
    /// Never leaves the simulator, it ends up as a cancelled status.
    ExecutionAborted,
    ExecutionFailed(String),
    MailboxClosed,
    ResponseError(oneshot::error::RecvError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest(why) => write!(f, "invalid simulation request: {}", why),
            Self::DuplicateActiveId(id) => {
                write!(f, "a simulator with id {} is still active", id)
            }
            Self::IdAlreadyAssigned(id) => {
                write!(f, "id {} was already generated for another simulator", id)
            }
            Self::ExecutionAborted => write!(f, "simulator execution was interrupted"),
            Self::ExecutionFailed(why) => write!(f, "simulator execution failed: {}", why),
            Self::MailboxClosed => write!(f, "simulation registry is not running"),
            Self::ResponseError(why) => {
                write!(f, "simulation registry did not respond: {}", why)
            }
        }
    }
}

impl Error for SimulationError {}

impl From<PathError> for SimulationError {
    fn from(value: PathError) -> Self {
        Self::InvalidRequest(InvalidRequest::Path(value))
    }
}

impl From<PaceError> for SimulationError {
    fn from(value: PaceError) -> Self {
        Self::InvalidRequest(InvalidRequest::Pace(value))
    }
}

impl From<oneshot::error::RecvError> for SimulationError {
    fn from(why: oneshot::error::RecvError) -> Self {
        Self::ResponseError(why)
    }
}

pub type SimulationResult<O> = Result<O, SimulationError>;
