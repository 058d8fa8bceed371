//! Worker supervision.
//!
//! The supervisor spawns one [`PortWorker`] task per configured port, fans
//! every stop request out to all live workers, and reaps workers as they
//! exit. It returns once no worker is left.
//!
//! ```text
//!   OS signals ─┐
//!               ├─► SupervisorHandle ─► WorkerSupervisor ──trigger──► ShutdownSignal (per worker)
//!   tests ──────┘                           │
//!                                           └── JoinSet ◄── reap ── PortWorker tasks
//! ```
//!
//! Each worker slot moves `Unstarted → Spawned → Exited`. A port that is
//! not configured, or that already has a live worker, cannot be spawned:
//! the failure is logged, the slot stays `Unstarted`, and spawning goes on.

use std::io;

use commentd_core::{CommentError, CommentResult};
use commentd_telemetry::metrics;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};

use crate::shutdown::{OsSignals, ShutdownSignal, StopReason};
use crate::worker::{PortWorker, WorkerConfig, WorkerExit};

/// A spawned worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerRecord {
    /// Task id of the worker.
    pub id: Id,
    /// Port the worker serves.
    pub port: u16,
}

/// How a reaped worker ended.
#[derive(Debug)]
pub enum WorkerStatus {
    /// The accept loop stopped on request.
    Stopped(WorkerExit),
    /// The worker could not bind or listen.
    Failed(CommentError),
    /// The worker task panicked.
    Panicked,
    /// The worker task was cancelled.
    Cancelled,
}

impl WorkerStatus {
    /// Returns `true` if the worker stopped on request.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped(_))
    }
}

/// State of one configured port.
#[derive(Debug)]
pub enum WorkerState {
    /// No worker has been started.
    Unstarted,
    /// A worker is running.
    Spawned(WorkerRecord),
    /// The worker has been reaped.
    Exited(WorkerStatus),
}

#[derive(Debug)]
struct WorkerSlot {
    port: u16,
    state: WorkerState,
    shutdown: Option<ShutdownSignal>,
}

/// The supervisor's table of workers, one slot per configured port.
#[derive(Debug)]
pub struct WorkerRegistry {
    slots: Vec<WorkerSlot>,
}

impl WorkerRegistry {
    /// Creates a registry with one `Unstarted` slot per distinct port.
    #[must_use]
    pub fn new(ports: &[u16]) -> Self {
        let mut slots: Vec<WorkerSlot> = Vec::with_capacity(ports.len());
        for &port in ports {
            if slots.iter().all(|slot| slot.port != port) {
                slots.push(WorkerSlot {
                    port,
                    state: WorkerState::Unstarted,
                    shutdown: None,
                });
            }
        }
        Self { slots }
    }

    /// Checks that a worker for `port` may be spawned.
    ///
    /// # Errors
    ///
    /// Returns `CommentError::Spawn` if `port` is not configured or already
    /// has a live worker.
    pub fn ensure_spawnable(&self, port: u16) -> CommentResult<()> {
        match self.slot(port) {
            None => Err(CommentError::spawn(port, "port is not configured")),
            Some(WorkerSlot {
                state: WorkerState::Spawned(record),
                ..
            }) => Err(CommentError::spawn(
                port,
                format!("worker {} is already running", record.id),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Records a spawned worker and the signal that stops it.
    ///
    /// # Errors
    ///
    /// Same as [`ensure_spawnable`](Self::ensure_spawnable); the registry is
    /// unchanged on error.
    pub fn insert(&mut self, record: WorkerRecord, shutdown: ShutdownSignal) -> CommentResult<()> {
        self.ensure_spawnable(record.port)?;
        if let Some(slot) = self.slot_mut(record.port) {
            slot.state = WorkerState::Spawned(record);
            slot.shutdown = Some(shutdown);
        }
        Ok(())
    }

    /// Marks the worker with task `id` as exited.
    ///
    /// Returns the removed record, or `None` if no live worker has that id.
    pub fn reap(&mut self, id: Id, status: WorkerStatus) -> Option<WorkerRecord> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| matches!(&slot.state, WorkerState::Spawned(r) if r.id == id))?;
        let previous = std::mem::replace(&mut slot.state, WorkerState::Exited(status));
        let WorkerState::Spawned(record) = previous else {
            return None;
        };
        slot.shutdown = None;
        Some(record)
    }

    /// Triggers every live worker's stop signal with `reason`.
    ///
    /// Returns the number of workers signalled.
    pub fn signal_all(&self, reason: StopReason) -> usize {
        let mut signalled = 0;
        for shutdown in self.slots.iter().filter_map(|slot| slot.shutdown.as_ref()) {
            shutdown.trigger(reason);
            signalled += 1;
        }
        signalled
    }

    /// Live worker records, in configuration order.
    pub fn live(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.slots.iter().filter_map(|slot| match &slot.state {
            WorkerState::Spawned(record) => Some(record),
            _ => None,
        })
    }

    /// Number of live workers.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    /// The state of `port`'s slot.
    #[must_use]
    pub fn state(&self, port: u16) -> Option<&WorkerState> {
        self.slot(port).map(|slot| &slot.state)
    }

    /// Configured ports, in order, without duplicates.
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.slots.iter().map(|slot| slot.port)
    }

    /// Consumes the registry into a per-port report.
    #[must_use]
    pub fn into_report(self) -> SupervisorReport {
        SupervisorReport {
            workers: self
                .slots
                .into_iter()
                .map(|slot| (slot.port, slot.state))
                .collect(),
        }
    }

    fn slot(&self, port: u16) -> Option<&WorkerSlot> {
        self.slots.iter().find(|slot| slot.port == port)
    }

    fn slot_mut(&mut self, port: u16) -> Option<&mut WorkerSlot> {
        self.slots.iter_mut().find(|slot| slot.port == port)
    }
}

/// The final state of every configured port.
#[derive(Debug)]
pub struct SupervisorReport {
    /// `(port, state)` in configuration order.
    pub workers: Vec<(u16, WorkerState)>,
}

impl SupervisorReport {
    /// The final state of `port`.
    #[must_use]
    pub fn state(&self, port: u16) -> Option<&WorkerState> {
        self.workers
            .iter()
            .find(|(p, _)| *p == port)
            .map(|(_, state)| state)
    }

    /// Returns `true` if every worker was started and stopped on request.
    #[must_use]
    pub fn all_stopped(&self) -> bool {
        self.workers
            .iter()
            .all(|(_, state)| matches!(state, WorkerState::Exited(status) if status.is_stopped()))
    }
}

/// Sends stop requests to a running supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    sender: mpsc::UnboundedSender<StopReason>,
}

impl SupervisorHandle {
    /// Asks the supervisor to stop every worker.
    ///
    /// Returns `false` if the supervisor has already finished.
    pub fn stop(&self, reason: StopReason) -> bool {
        self.sender.send(reason).is_ok()
    }
}

/// Runs one worker per port and waits for all of them.
///
/// # Example
///
/// ```rust,ignore
/// use commentd_server::{StopReason, WorkerConfig, WorkerSupervisor};
///
/// let supervisor = WorkerSupervisor::new(WorkerConfig::default(), vec![8080, 8081]);
/// let handle = supervisor.handle();
/// let run = tokio::spawn(supervisor.run());
///
/// handle.stop(StopReason::Requested);
/// let report = run.await?;
/// assert!(report.all_stopped());
/// ```
#[derive(Debug)]
pub struct WorkerSupervisor {
    config: WorkerConfig,
    ports: Vec<u16>,
    sender: mpsc::UnboundedSender<StopReason>,
    receiver: mpsc::UnboundedReceiver<StopReason>,
}

impl WorkerSupervisor {
    /// Creates a supervisor for `ports`.
    #[must_use]
    pub fn new(config: WorkerConfig, ports: Vec<u16>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            config,
            ports,
            sender,
            receiver,
        }
    }

    /// Returns a handle for stopping the workers.
    #[must_use]
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            sender: self.sender.clone(),
        }
    }

    /// Runs until every worker has exited, stopping them on SIGINT, SIGHUP
    /// or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handlers cannot be registered.
    pub async fn run_with_os_signals(self) -> io::Result<SupervisorReport> {
        let mut signals = OsSignals::register()?;
        let handle = self.handle();

        let forwarder = tokio::spawn(async move {
            while let Some(reason) = signals.recv().await {
                tracing::info!(%reason, "received stop signal");
                if !handle.stop(reason) {
                    break;
                }
            }
        });

        let report = self.run().await;
        forwarder.abort();
        Ok(report)
    }

    /// Spawns the workers, forwards stop requests, and reaps workers until
    /// none is left.
    pub async fn run(self) -> SupervisorReport {
        let Self {
            config,
            ports,
            sender,
            mut receiver,
        } = self;
        // Only handles keep the stop channel open.
        drop(sender);

        let mut registry = WorkerRegistry::new(&ports);
        let mut tasks = JoinSet::new();

        for &port in &ports {
            match spawn_worker(&config, port, &mut registry, &mut tasks) {
                Ok(record) => tracing::info!(port, id = %record.id, "worker spawned"),
                Err(err) => tracing::warn!(port, error = %err, "worker not spawned"),
            }
        }
        metrics::set_live_workers(registry.live_count());

        let mut accepting_stops = true;
        loop {
            tokio::select! {
                reason = receiver.recv(), if accepting_stops => match reason {
                    Some(reason) => {
                        let signalled = registry.signal_all(reason);
                        tracing::info!(%reason, signalled, "stopping workers");
                    }
                    None => accepting_stops = false,
                },
                joined = tasks.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    let (id, status) = match joined {
                        Ok((id, Ok(exit))) => (id, WorkerStatus::Stopped(exit)),
                        Ok((id, Err(err))) => (id, WorkerStatus::Failed(err)),
                        Err(err) if err.is_panic() => {
                            tracing::error!(id = %err.id(), "worker panicked");
                            (err.id(), WorkerStatus::Panicked)
                        }
                        Err(err) => (err.id(), WorkerStatus::Cancelled),
                    };
                    match registry.reap(id, status) {
                        Some(record) => tracing::info!(port = record.port, %id, "worker reaped"),
                        None => tracing::debug!(%id, "reaped unknown task"),
                    }
                    metrics::set_live_workers(registry.live_count());
                }
            }
        }

        tracing::info!("all workers exited");
        registry.into_report()
    }
}

fn spawn_worker(
    config: &WorkerConfig,
    port: u16,
    registry: &mut WorkerRegistry,
    tasks: &mut JoinSet<CommentResult<WorkerExit>>,
) -> CommentResult<WorkerRecord> {
    registry.ensure_spawnable(port)?;

    let shutdown = ShutdownSignal::new();
    let task = tasks.spawn(PortWorker::serve(config.clone(), port, shutdown.clone()));
    let record = WorkerRecord { id: task.id(), port };

    if let Err(err) = registry.insert(record, shutdown) {
        task.abort();
        return Err(err);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    async fn some_id() -> Id {
        tokio::spawn(async { tokio::task::id() }).await.unwrap()
    }

    fn config(dir: &std::path::Path) -> WorkerConfig {
        WorkerConfig {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            comment_dir: dir.to_path_buf(),
            ..WorkerConfig::default()
        }
    }

    #[test]
    fn test_registry_dedupes_ports() {
        let registry = WorkerRegistry::new(&[8080, 8081, 8080]);
        assert_eq!(registry.ports().collect::<Vec<_>>(), vec![8080, 8081]);
        assert!(matches!(registry.state(8080), Some(WorkerState::Unstarted)));
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let mut registry = WorkerRegistry::new(&[8080]);
        let record = WorkerRecord {
            id: some_id().await,
            port: 8080,
        };
        let shutdown = ShutdownSignal::new();

        registry.insert(record, shutdown.clone()).unwrap();
        assert!(matches!(registry.state(8080), Some(WorkerState::Spawned(r)) if *r == record));
        assert_eq!(registry.live().copied().collect::<Vec<_>>(), vec![record]);

        assert_eq!(registry.signal_all(StopReason::HangUp), 1);
        assert_eq!(shutdown.reason(), Some(StopReason::HangUp));

        let reaped = registry.reap(record.id, WorkerStatus::Cancelled);
        assert_eq!(reaped, Some(record));
        assert!(matches!(
            registry.state(8080),
            Some(WorkerState::Exited(WorkerStatus::Cancelled))
        ));
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.signal_all(StopReason::Terminate), 0);
    }

    #[tokio::test]
    async fn test_registry_rejects_unconfigured_port() {
        let mut registry = WorkerRegistry::new(&[8080]);
        let record = WorkerRecord {
            id: some_id().await,
            port: 9999,
        };

        let err = registry.insert(record, ShutdownSignal::new()).unwrap_err();
        assert!(matches!(err, CommentError::Spawn { port: 9999, .. }));
        assert!(registry.state(9999).is_none());
    }

    #[tokio::test]
    async fn test_registry_rejects_second_live_worker() {
        let mut registry = WorkerRegistry::new(&[8080]);
        let first = WorkerRecord {
            id: some_id().await,
            port: 8080,
        };
        let second = WorkerRecord {
            id: some_id().await,
            port: 8080,
        };

        registry.insert(first, ShutdownSignal::new()).unwrap();
        assert!(registry.insert(second, ShutdownSignal::new()).is_err());
        assert_eq!(registry.live().copied().collect::<Vec<_>>(), vec![first]);
    }

    #[tokio::test]
    async fn test_registry_reap_unknown_id() {
        let mut registry = WorkerRegistry::new(&[8080]);
        assert!(registry.reap(some_id().await, WorkerStatus::Panicked).is_none());
        assert!(matches!(registry.state(8080), Some(WorkerState::Unstarted)));
    }

    #[tokio::test]
    async fn test_run_without_ports_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = WorkerSupervisor::new(config(dir.path()), Vec::new());

        let report = tokio::time::timeout(Duration::from_secs(1), supervisor.run())
            .await
            .expect("nothing to wait for");
        assert!(report.workers.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_port_is_spawned_once() {
        let dir = tempfile::tempdir().unwrap();
        let port = commentd_test::free_port().unwrap();
        let supervisor = WorkerSupervisor::new(config(dir.path()), vec![port, port]);
        let handle = supervisor.handle();
        let run = tokio::spawn(supervisor.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.stop(StopReason::Requested));

        let report = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("supervisor should finish")
            .unwrap();
        assert_eq!(report.workers.len(), 1);
        assert!(report.all_stopped());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reaped() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let supervisor = WorkerSupervisor::new(config(dir.path()), vec![port]);

        let report = tokio::time::timeout(Duration::from_secs(5), supervisor.run())
            .await
            .expect("failed worker should be reaped");
        assert!(matches!(
            report.state(port),
            Some(WorkerState::Exited(WorkerStatus::Failed(err))) if err.is_fatal_to_worker()
        ));
        assert!(!report.all_stopped());
    }

    #[tokio::test]
    async fn test_handle_after_finish() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = WorkerSupervisor::new(config(dir.path()), Vec::new());
        let handle = supervisor.handle();

        supervisor.run().await;
        assert!(!handle.stop(StopReason::Requested));
    }
}
