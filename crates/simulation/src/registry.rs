use std::{
    collections::HashSet,
    panic::{self, AssertUnwindSafe},
};

use indexmap::IndexMap;
use model::{
    request::{Fixture, SimulationRequest},
    simulator::{SimulatorId, SimulatorState},
    WithId,
};
use tokio::sync::{mpsc, oneshot};

use crate::{
    factory::SimulatorFactory,
    pool::{SimulatorHandle, WorkerPool},
    SimulationError, SimulationResult,
};

pub const DEFAULT_MAILBOX_CAPACITY: usize = 32;

/// A request of a fixture that was not started.
#[derive(Debug)]
pub struct Rejection {
    /// Position of the request within the fixture.
    pub index: usize,
    pub name: Option<String>,
    pub error: SimulationError,
}

/// Outcome of starting a fixture. Valid requests start even if others in the
/// same fixture are rejected.
#[derive(Debug, Default)]
pub struct StartReport {
    pub started: Vec<WithId<SimulatorState>>,
    pub rejected: Vec<Rejection>,
}

/// Bookkeeping of every simulator started and not yet cleared.
///
/// At most one unfinished execution exists per id. Starting a request whose id
/// belongs to an unfinished simulator is rejected with
/// [`SimulationError::DuplicateActiveId`]; an id whose simulator has finished
/// may be started again and replaces the finished entry.
pub struct Registry {
    factory: SimulatorFactory,
    pool: WorkerPool,
    handles: IndexMap<SimulatorId, SimulatorHandle>,
}

impl Registry {
    pub fn new(factory: SimulatorFactory, pool: WorkerPool) -> Self {
        Self {
            factory,
            pool,
            handles: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn start_all(&mut self, fixture: Fixture) -> StartReport {
        let mut report = StartReport::default();
        let mut started_now = HashSet::new();
        for (index, request) in fixture.requests.into_iter().enumerate() {
            let name = request.name.clone();
            match self.start(request, &started_now) {
                Ok(snapshot) => {
                    started_now.insert(snapshot.id);
                    report.started.push(snapshot)
                }
                Err(error) => {
                    log::warn!("simulation request #{} rejected: {}", index, error);
                    report.rejected.push(Rejection { index, name, error });
                }
            }
        }
        log::info!(
            "started {} simulators, rejected {}, tracking {}",
            report.started.len(),
            report.rejected.len(),
            self.handles.len()
        );
        report
    }

    /// Entries started by the same fixture are never replaced, even once
    /// finished, so every started simulator shows up in the status.
    fn start(
        &mut self,
        request: SimulationRequest,
        started_now: &HashSet<SimulatorId>,
    ) -> SimulationResult<WithId<SimulatorState>> {
        let prepared = self.factory.prepare_simulator(request)?;
        let id = prepared.simulator.id();
        if started_now.contains(&id)
            || self.handles.get(&id).is_some_and(|handle| !handle.is_done())
        {
            return Err(SimulationError::DuplicateActiveId(id));
        }

        let handle = self.pool.submit(prepared.simulator);
        let snapshot = handle.snapshot();
        if let Some(previous) = self.handles.insert(id, handle) {
            log::info!(
                "simulator {} replaces a finished run ({:?})",
                id,
                previous.status()
            );
        }
        Ok(snapshot)
    }

    pub fn status_all(&self) -> Vec<WithId<SimulatorState>> {
        self.handles
            .values()
            .map(|handle| handle.snapshot())
            .collect()
    }

    /// Cancels every tracked simulator and forgets all of them. Returns how
    /// many had not finished on their own.
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for handle in self.handles.values() {
            if handle.cancel() {
                cancelled += 1;
            }
        }
        let cleared = self.handles.len();
        self.handles.clear();
        log::info!(
            "cancelled {} running simulators, cleared {} entries",
            cancelled,
            cleared
        );
        cancelled
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::StartAll {
                fixture,
                respond_to,
            } => respond_to
                .send(self.start_all(fixture))
                .unwrap_or_else(|_| log::error!("Can not respond to start request!")),
            Command::StatusAll { respond_to } => respond_to
                .send(self.status_all())
                .unwrap_or_else(|_| log::error!("Can not respond to status request!")),
            Command::CancelAll { respond_to } => respond_to
                .send(self.cancel_all())
                .unwrap_or_else(|_| log::error!("Can not respond to cancel request!")),
        }
    }
}

enum Command {
    StartAll {
        fixture: Fixture,
        respond_to: oneshot::Sender<StartReport>,
    },
    StatusAll {
        respond_to: oneshot::Sender<Vec<WithId<SimulatorState>>>,
    },
    CancelAll {
        respond_to: oneshot::Sender<usize>,
    },
}

/// Runs the registry on its own task and returns a reference to talk to it.
///
/// Every operation goes through one mailbox and is handled to completion
/// before the next one is looked at, so no caller ever sees a partially
/// started or partially cleared registry. A panicking operation is logged and
/// the registry keeps its entries. Once every [`RegistryRef`] is dropped, the
/// remaining simulators are cancelled.
pub fn run(registry: Registry, mailbox_capacity: usize) -> RegistryRef {
    let (tx, mut rx) = mpsc::channel(mailbox_capacity.max(1));
    let mut registry = registry;

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            let result = panic::catch_unwind(AssertUnwindSafe(|| registry.handle(command)));
            if let Err(why) = result {
                log::error!("registry paniced: {:?}", why);
            }
        }
        if !registry.is_empty() {
            log::info!("registry shut down, cancelling remaining simulators");
            registry.cancel_all();
        }
    });

    RegistryRef { sender: tx }
}

#[derive(Debug, Clone)]
pub struct RegistryRef {
    sender: mpsc::Sender<Command>,
}

impl RegistryRef {
    async fn ask<R, F>(&self, command: F) -> SimulationResult<R>
    where
        F: FnOnce(oneshot::Sender<R>) -> Command,
    {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(command(respond_to))
            .await
            .map_err(|_| SimulationError::MailboxClosed)?;
        Ok(response.await?)
    }

    pub async fn start_all(&self, fixture: Fixture) -> SimulationResult<StartReport> {
        self.ask(|respond_to| Command::StartAll {
            fixture,
            respond_to,
        })
        .await
    }

    pub async fn status_all(&self) -> SimulationResult<Vec<WithId<SimulatorState>>> {
        self.ask(|respond_to| Command::StatusAll { respond_to })
            .await
    }

    pub async fn cancel_all(&self) -> SimulationResult<usize> {
        self.ask(|respond_to| Command::CancelAll { respond_to })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use model::{
        pace::Pace,
        point::{GeographicPath, Point},
        simulator::SimulatorStatus,
    };
    use tokio::time::sleep;

    use super::*;
    use crate::InvalidRequest;

    fn registry() -> RegistryRef {
        let _ = env_logger::builder().is_test(true).try_init();
        run(
            Registry::new(SimulatorFactory::new(), WorkerPool::unbounded()),
            DEFAULT_MAILBOX_CAPACITY,
        )
    }

    fn path(points: &[(f64, f64)]) -> GeographicPath {
        points.iter().copied().map(Point::from).collect()
    }

    fn long_running(points: usize) -> SimulationRequest {
        let path = (0..points)
            .map(|i| Point::new(0.0, (i % 180) as f64 * 0.001))
            .collect();
        SimulationRequest::new(path, Pace::SpeedKph(0.5))
    }

    fn status_of(
        snapshots: &[WithId<SimulatorState>],
        name: &str,
    ) -> Option<SimulatorStatus> {
        snapshots
            .iter()
            .find(|snapshot| snapshot.content.name.as_deref() == Some(name))
            .map(|snapshot| snapshot.content.status)
    }

    #[tokio::test(start_paused = true)]
    async fn moving_and_parked_devices() {
        let registry = registry();
        let segment_km = Point::new(0.0, 0.0).distance_km_to(&Point::new(0.0, 1.0));
        // 100ms for the whole segment
        let speed_kph = segment_km * 36_000.0;
        let fixture = Fixture::new(vec![
            SimulationRequest::new(path(&[(0.0, 0.0), (0.0, 1.0)]), Pace::SpeedKph(speed_kph))
                .with_name("A"),
            SimulationRequest::new(path(&[(1.0, 1.0)]), Pace::SpeedKph(speed_kph))
                .with_name("B"),
        ]);

        let report = registry.start_all(fixture).await.unwrap();
        assert_eq!(report.started.len(), 2);
        assert!(report.rejected.is_empty());
        assert_eq!(report.started[1].content.start_point, Point::new(1.0, 1.0));

        let status = registry.status_all().await.unwrap();
        assert_eq!(status_of(&status, "A"), Some(SimulatorStatus::Running));
        assert_eq!(status_of(&status, "B"), Some(SimulatorStatus::Completed));

        sleep(Duration::from_millis(150)).await;
        let status = registry.status_all().await.unwrap();
        assert_eq!(status_of(&status, "A"), Some(SimulatorStatus::Completed));
        let a = status
            .iter()
            .find(|snapshot| snapshot.content.name.as_deref() == Some("A"))
            .unwrap();
        assert_eq!(a.content.position, Point::new(0.0, 1.0));
    }

    #[tokio::test]
    async fn cancel_all_on_empty_registry() {
        let registry = registry();
        assert_eq!(registry.cancel_all().await.unwrap(), 0);
        assert!(registry.status_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_all_stops_a_long_run_and_clears() {
        let registry = registry();
        let report = registry
            .start_all(Fixture::new(vec![long_running(1000)]))
            .await
            .unwrap();
        assert_eq!(report.started.len(), 1);

        assert_eq!(registry.cancel_all().await.unwrap(), 1);
        assert!(registry.status_all().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_simulators_are_not_counted_as_cancelled() {
        let registry = registry();
        registry
            .start_all(Fixture::new(vec![
                SimulationRequest::new(path(&[(1.0, 1.0)]), Pace::SpeedKph(5.0)),
                long_running(10),
            ]))
            .await
            .unwrap();

        assert_eq!(registry.cancel_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn zero_speed_is_rejected_and_never_registered() {
        let registry = registry();
        let report = registry
            .start_all(Fixture::new(vec![SimulationRequest::new(
                path(&[(0.0, 0.0), (0.0, 1.0)]),
                Pace::SpeedKph(0.0),
            )
            .with_name("broken")]))
            .await
            .unwrap();

        assert!(report.started.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 0);
        assert_eq!(report.rejected[0].name.as_deref(), Some("broken"));
        assert!(matches!(
            report.rejected[0].error,
            SimulationError::InvalidRequest(InvalidRequest::Pace(_))
        ));
        assert!(registry.status_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_requests_do_not_stop_valid_ones() {
        let registry = registry();
        let report = registry
            .start_all(Fixture::new(vec![
                long_running(5).with_name("ok-1"),
                SimulationRequest::new(GeographicPath::default(), Pace::SpeedKph(5.0)),
                long_running(5).with_name("ok-2"),
            ]))
            .await
            .unwrap();

        assert_eq!(report.started.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 1);
        assert_eq!(registry.status_all().await.unwrap().len(), 2);
        registry.cancel_all().await.unwrap();
    }

    #[tokio::test]
    async fn active_ids_can_not_be_started_twice() {
        let registry = registry();
        let fixture = Fixture::new(vec![long_running(100).with_id(7)]);

        let first = registry.start_all(fixture.clone()).await.unwrap();
        assert_eq!(first.started.len(), 1);

        let second = registry.start_all(fixture).await.unwrap();
        assert!(second.started.is_empty());
        assert!(matches!(
            second.rejected[0].error,
            SimulationError::DuplicateActiveId(id) if id.raw() == 7
        ));

        let status = registry.status_all().await.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].content.status, SimulatorStatus::Running);
        assert_eq!(registry.cancel_all().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_id_within_one_fixture_is_rejected() {
        let registry = registry();
        let fixture = Fixture::new(vec![
            SimulationRequest::new(path(&[(1.0, 1.0)]), Pace::SpeedKph(5.0))
                .with_id(5)
                .with_name("first"),
            SimulationRequest::new(
                path(&[(0.0, 0.0), (0.0, 1.0)]),
                Pace::SegmentDuration(Duration::from_millis(100)),
            )
            .with_id(5)
            .with_name("second"),
        ]);

        let report = registry.start_all(fixture).await.unwrap();
        assert_eq!(report.started.len(), 1);
        assert_eq!(report.started[0].content.name.as_deref(), Some("first"));
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 1);
        assert!(matches!(
            report.rejected[0].error,
            SimulationError::DuplicateActiveId(id) if id.raw() == 5
        ));

        let status = registry.status_all().await.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].content.name.as_deref(), Some("first"));
        assert_eq!(status[0].content.status, SimulatorStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_ids_can_be_started_again() {
        let registry = registry();
        let fixture = Fixture::new(vec![SimulationRequest::new(
            path(&[(0.0, 0.0), (0.0, 0.001)]),
            Pace::SegmentDuration(Duration::from_millis(10)),
        )
        .with_id(3)]);

        registry.start_all(fixture.clone()).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        let status = registry.status_all().await.unwrap();
        assert_eq!(status[0].content.status, SimulatorStatus::Completed);

        let again = registry.start_all(fixture).await.unwrap();
        assert_eq!(again.started.len(), 1);
        let status = registry.status_all().await.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].content.status, SimulatorStatus::Running);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn status_is_consistent_while_starting_concurrently() {
        let registry = registry();
        let batches = 4;
        let per_batch = 50;

        let starters = (0..batches)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let fixture = (0..per_batch).map(|_| long_running(20)).collect();
                    registry.start_all(fixture).await.unwrap()
                })
            })
            .collect::<Vec<_>>();

        let reader = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    let snapshots = registry.status_all().await.unwrap();
                    // every batch is inserted as a whole
                    assert_eq!(snapshots.len() % per_batch, 0);
                    let mut ids = HashSet::new();
                    for snapshot in snapshots {
                        assert!(ids.insert(snapshot.id));
                        assert!(snapshot.content.position.is_valid());
                        assert_eq!(snapshot.content.total_points, 20);
                        assert!(matches!(
                            snapshot.content.status,
                            SimulatorStatus::Running | SimulatorStatus::Completed
                        ));
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut started = 0;
        for starter in starters {
            started += starter.await.unwrap().started.len();
        }
        reader.await.unwrap();

        assert_eq!(started, batches * per_batch);
        assert_eq!(registry.status_all().await.unwrap().len(), started);
        assert_eq!(registry.cancel_all().await.unwrap(), started);
        assert!(registry.status_all().await.unwrap().is_empty());
    }
}
