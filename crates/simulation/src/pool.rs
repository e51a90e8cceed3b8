use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use model::{
    simulator::{SimulatorId, SimulatorState, SimulatorStatus},
    WithId,
};
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::simulator::{Simulator, SimulatorMonitor};

#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    /// Upper bound of simultaneously running simulators. `None` runs every
    /// submitted simulator right away.
    pub max_workers: Option<usize>,
}

/// Executes simulators concurrently, one task per simulator run.
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
    workers: Option<Arc<Semaphore>>,
}

enum Worker {
    Unbounded,
    Acquired(OwnedSemaphorePermit),
    Pending(Arc<Semaphore>),
}

impl WorkerPool {
    pub fn new(config: &PoolConfig) -> Self {
        match config.max_workers {
            Some(max_workers) => Self::bounded(max_workers),
            None => Self::unbounded(),
        }
    }

    pub fn unbounded() -> Self {
        Self { workers: None }
    }

    pub fn bounded(max_workers: usize) -> Self {
        Self {
            workers: Some(Arc::new(Semaphore::new(max_workers.max(1)))),
        }
    }

    /// Number of additional simulators that could start right now.
    pub fn idle_workers(&self) -> Option<usize> {
        self.workers
            .as_ref()
            .map(|workers| workers.available_permits())
    }

    /// Submits a simulator for execution. If a worker is free, the simulator
    /// is `Running` (or already `Completed`) when this returns. Otherwise it
    /// stays `Created` until a worker frees up.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, simulator: Simulator) -> SimulatorHandle {
        let monitor = simulator.monitor();
        let interrupt = CancellationToken::new();

        let worker = match &self.workers {
            None => Worker::Unbounded,
            Some(workers) => match workers.clone().try_acquire_owned() {
                Ok(permit) => Worker::Acquired(permit),
                Err(_) => Worker::Pending(workers.clone()),
            },
        };
        if !matches!(worker, Worker::Pending(_)) {
            simulator.begin();
        }

        let task = tokio::spawn(execute(simulator, worker, interrupt.clone()));
        SimulatorHandle {
            monitor,
            interrupt,
            task,
        }
    }
}

async fn execute(
    simulator: Simulator,
    worker: Worker,
    interrupt: CancellationToken,
) -> SimulatorStatus {
    let monitor = simulator.monitor();
    let _permit = match worker {
        Worker::Unbounded => None,
        Worker::Acquired(permit) => Some(permit),
        Worker::Pending(workers) => {
            log::debug!("simulator {} waits for a free worker", monitor.id());
            tokio::select! {
                biased;
                _ = interrupt.cancelled() => {
                    simulator.abandon();
                    return monitor.status();
                }
                permit = workers.acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        simulator.abandon();
                        return monitor.status();
                    }
                },
            }
        }
    };

    let result = AssertUnwindSafe(simulator.run(interrupt))
        .catch_unwind()
        .await;
    match result {
        Ok(status) => status,
        Err(why) => {
            log::error!("simulator {} paniced: {:?}", monitor.id(), why);
            monitor.fail("simulator paniced");
            monitor.status()
        }
    }
}

/// The pool's record of one submitted simulator: the means to observe it, to
/// stop it and to find out whether it is done.
pub struct SimulatorHandle {
    monitor: SimulatorMonitor,
    interrupt: CancellationToken,
    task: JoinHandle<SimulatorStatus>,
}

impl SimulatorHandle {
    pub fn id(&self) -> SimulatorId {
        self.monitor.id()
    }

    pub fn status(&self) -> SimulatorStatus {
        self.monitor.status()
    }

    pub fn snapshot(&self) -> WithId<SimulatorState> {
        self.monitor.snapshot()
    }

    pub fn is_done(&self) -> bool {
        self.monitor.status().is_terminal() || self.task.is_finished()
    }

    /// Cooperative half of a cancellation, see [`SimulatorMonitor::request_cancel`].
    pub fn request_cancel(&self) {
        self.monitor.request_cancel()
    }

    /// Forceful half of a cancellation: wakes the simulator if it is waiting
    /// and stops it. Returns whether the execution had not finished yet.
    pub fn interrupt(&self) -> bool {
        let was_running = !self.is_done();
        self.interrupt.cancel();
        was_running
    }

    /// Applies both halves of a cancellation. Returns whether the execution
    /// had not finished yet.
    pub fn cancel(&self) -> bool {
        let was_running = !self.is_done();
        self.request_cancel();
        self.interrupt.cancel();
        was_running
    }

    /// Waits until the worker executing the simulator has exited.
    pub async fn join(self) -> SimulatorStatus {
        let monitor = self.monitor;
        match self.task.await {
            Ok(status) => status,
            Err(why) => {
                log::error!("worker of simulator {} was lost: {}", monitor.id(), why);
                monitor.status()
            }
        }
    }
}
