use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::Local;
use model::{
    pace::Pace,
    point::{GeographicPath, Point},
    request::RunnerStatus,
    simulator::{SimulatorId, SimulatorState, SimulatorStatus},
    WithId,
};
use tokio::{sync::watch, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{SimulationError, SimulationResult};

/// State shared between a running simulator and everyone observing it.
///
/// Only the simulator's own execution writes positions. The cancel flag is
/// written by anyone and read by the execution loop.
struct Shared {
    id: SimulatorId,
    cancel_requested: AtomicBool,
    state: watch::Sender<SimulatorState>,
}

impl Shared {
    fn transition(&self, next: SimulatorStatus) -> bool {
        let moved = self.state.send_if_modified(|state| {
            if !state.status.can_transition_to(next) {
                return false;
            }
            state.status = next;
            state.updated_at = Local::now();
            if next.is_terminal() {
                state.speed_kph = 0.0;
            }
            true
        });
        if moved {
            log::debug!("simulator {} is now {:?}", self.id, next);
        }
        moved
    }

    fn fail<S: Into<String>>(&self, reason: S) -> bool {
        let reason = reason.into();
        let moved = self.state.send_if_modified(|state| {
            if !state.status.can_transition_to(SimulatorStatus::Failed) {
                return false;
            }
            state.status = SimulatorStatus::Failed;
            state.failure = Some(reason.clone());
            state.speed_kph = 0.0;
            state.updated_at = Local::now();
            true
        });
        if moved {
            log::warn!("simulator {} failed: {}", self.id, reason);
        }
        moved
    }

    fn status(&self) -> SimulatorStatus {
        self.state.borrow().status
    }

    fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    fn request_cancel(&self) {
        if !self.cancel_requested.swap(true, Ordering::AcqRel) {
            log::debug!("cancellation of simulator {} requested", self.id);
        }
    }
}

/// A simulated GPS device walking along a [`GeographicPath`].
///
/// A simulator is created by the
/// [`SimulatorFactory`](crate::factory::SimulatorFactory) and executed exactly
/// once through [`Simulator::run`], which consumes it. Use
/// [`Simulator::monitor`] to keep observing it afterwards.
pub struct Simulator {
    path: GeographicPath,
    pace: Pace,
    shared: Arc<Shared>,
}

impl Simulator {
    /// The path must already be validated and non-empty.
    pub(crate) fn new(
        id: SimulatorId,
        name: Option<String>,
        start_point: Point,
        path: GeographicPath,
        pace: Pace,
        runner_status: RunnerStatus,
    ) -> Self {
        let state = SimulatorState::created(name, start_point, &path, runner_status);
        let (state, _) = watch::channel(state);
        Self {
            path,
            pace,
            shared: Arc::new(Shared {
                id,
                cancel_requested: AtomicBool::new(false),
                state,
            }),
        }
    }

    pub fn id(&self) -> SimulatorId {
        self.shared.id
    }

    pub fn start_point(&self) -> Point {
        self.shared.state.borrow().start_point
    }

    pub fn status(&self) -> SimulatorStatus {
        self.shared.status()
    }

    pub fn current_position(&self) -> Point {
        self.shared.state.borrow().position
    }

    pub fn request_cancel(&self) {
        self.shared.request_cancel()
    }

    pub fn monitor(&self) -> SimulatorMonitor {
        SimulatorMonitor {
            shared: self.shared.clone(),
        }
    }

    /// Moves a freshly created simulator into `Running`. A path with a single
    /// point has nowhere to go and completes right away.
    pub(crate) fn begin(&self) -> SimulatorStatus {
        if self.shared.is_cancel_requested() {
            self.shared.transition(SimulatorStatus::Cancelled);
        } else if self.shared.transition(SimulatorStatus::Running) && self.path.len() <= 1
        {
            self.shared.transition(SimulatorStatus::Completed);
        }
        self.status()
    }

    /// Gives up on a simulator that never got to run.
    pub(crate) fn abandon(&self) {
        self.shared.transition(SimulatorStatus::Cancelled);
    }

    /// Walks the path until it is exhausted, cancellation is requested or the
    /// `interrupt` token fires. Waiting for the next position is the only point
    /// where this suspends, and the interrupt cuts that wait short.
    pub async fn run(self, interrupt: CancellationToken) -> SimulatorStatus {
        if self.status() == SimulatorStatus::Created {
            self.begin();
        }
        if self.status() != SimulatorStatus::Running {
            return self.status();
        }

        match self.walk(&interrupt).await {
            Ok(()) => {
                self.shared.transition(SimulatorStatus::Completed);
            }
            Err(SimulationError::ExecutionAborted) => {
                self.shared.transition(SimulatorStatus::Cancelled);
            }
            Err(why) => {
                self.shared.fail(why.to_string());
            }
        }
        self.status()
    }

    async fn walk(&self, interrupt: &CancellationToken) -> SimulationResult<()> {
        let mut distance_travelled_km = 0.0;
        for (index, segment) in self.path.points().windows(2).enumerate() {
            let (from, to) = (&segment[0], &segment[1]);
            if self.shared.is_cancel_requested() {
                return Err(SimulationError::ExecutionAborted);
            }

            let delay = self
                .pace
                .delay_between(from, to)
                .map_err(|why| SimulationError::ExecutionFailed(why.to_string()))?;
            tokio::select! {
                biased;
                _ = interrupt.cancelled() => return Err(SimulationError::ExecutionAborted),
                _ = sleep(delay) => {}
            }

            distance_travelled_km += from.distance_km_to(to);
            let speed_kph = self.pace.speed_kph_between(from, to);
            self.shared.state.send_modify(|state| {
                state.point_index = index + 1;
                state.position = *to;
                state.heading = Some(from.bearing_to(to));
                state.speed_kph = speed_kph;
                state.distance_travelled_km = distance_travelled_km;
                state.updated_at = Local::now();
            });
        }
        Ok(())
    }
}

/// Read-only view on a simulator that stays usable while it runs.
#[derive(Clone)]
pub struct SimulatorMonitor {
    shared: Arc<Shared>,
}

impl SimulatorMonitor {
    pub fn id(&self) -> SimulatorId {
        self.shared.id
    }

    pub fn status(&self) -> SimulatorStatus {
        self.shared.status()
    }

    pub fn current_position(&self) -> Point {
        self.shared.state.borrow().position
    }

    /// The last published state. Never waits for the simulator.
    pub fn snapshot(&self) -> WithId<SimulatorState> {
        WithId::new(self.shared.id, self.shared.state.borrow().clone())
    }

    /// Cooperative cancellation. The simulator notices the flag before its
    /// next segment. Calling this more than once has no further effect.
    pub fn request_cancel(&self) {
        self.shared.request_cancel()
    }

    pub(crate) fn fail<S: Into<String>>(&self, reason: S) -> bool {
        self.shared.fail(reason)
    }
}
