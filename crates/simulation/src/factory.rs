use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use model::{
    point::{PathError, Point},
    request::SimulationRequest,
    simulator::SimulatorState,
};
use utility::id::{Id, IdSequence};

use crate::{simulator::Simulator, SimulationError, SimulationResult};

/// A simulator ready to be submitted, together with the point it starts at.
pub struct PreparedSimulator {
    pub simulator: Simulator,
    pub start_point: Point,
}

/// Builds simulators from simulation requests.
///
/// Clones share one id sequence, so every generated id is one no other
/// simulator of this factory ever had. Requests carrying an id seed keep their
/// seed and the sequence moves past it. A seed names a device: seeding the same
/// id again prepares that device anew, but seeding an id that was generated
/// for another simulator is refused with [`SimulationError::IdAlreadyAssigned`].
#[derive(Debug, Clone, Default)]
pub struct SimulatorFactory {
    ids: Arc<IdSequence<SimulatorState>>,
    assigned: Arc<Mutex<AssignedIds>>,
}

#[derive(Debug, Default)]
struct AssignedIds {
    seeded: HashSet<u64>,
    generated: HashSet<u64>,
}

impl SimulatorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepare_simulator(
        &self,
        request: SimulationRequest,
    ) -> SimulationResult<PreparedSimulator> {
        request.path.validate()?;
        request.pace.validate()?;
        let start_point = *request.path.start().ok_or(PathError::Empty)?;

        let id = self.assign_id(request.id)?;

        let simulator = Simulator::new(
            id,
            request.name,
            start_point,
            request.path,
            request.pace,
            request.runner_status,
        );
        Ok(PreparedSimulator {
            start_point: simulator.start_point(),
            simulator,
        })
    }

    fn assign_id(&self, seed: Option<u64>) -> SimulationResult<Id<SimulatorState>> {
        let mut assigned = self.assigned.lock().unwrap_or_else(PoisonError::into_inner);
        match seed {
            Some(seed) => {
                let id = Id::new(seed);
                if assigned.generated.contains(&seed) {
                    return Err(SimulationError::IdAlreadyAssigned(id));
                }
                self.ids.reserve(&id);
                assigned.seeded.insert(seed);
                Ok(id)
            }
            None => loop {
                let id = self.ids.next();
                if !assigned.seeded.contains(&id.raw()) {
                    assigned.generated.insert(id.raw());
                    break Ok(id);
                }
            },
        }
    }
}
