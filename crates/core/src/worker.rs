//! Background poll loop driving a connection handle.
//!
//! Each live connection has exactly one worker. The worker drives the
//! connect attempt, then ticks the handle on a fixed cadence until its
//! cancellation flag is set, drains a fixed number of grace ticks, and
//! disconnects. Workers are never reused; a new session always gets a
//! new worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use brook_protocol::{ClientCommand, Severity};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::observer::DiagnosticSink;
use crate::transport::Connector;

/// Observable lifecycle of one worker. Transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Driving the connect attempt, checking cancellation each tick.
    Connecting,
    /// Ticking the handle at the configured cadence.
    Running,
    /// Cancellation observed; persistent sessions announce `SetOffline`.
    Cancelling,
    /// Grace ticks to flush in-flight traffic. A courtesy window, not a
    /// delivery guarantee.
    Draining,
    /// Disconnected and done.
    Terminated,
}

/// Handle to the background loop owning one connection.
pub struct PollWorker {
    cancel: Arc<AtomicBool>,
    phase: Arc<Mutex<WorkerPhase>>,
    handle: JoinHandle<()>,
}

impl PollWorker {
    /// Spawns the loop for a freshly created connection handle. `token`
    /// and `persistent` describe the session being opened: persistent
    /// sessions announce `SetOffline` during shutdown.
    pub(crate) fn spawn(
        connection: Arc<Connection>,
        connector: Arc<dyn Connector>,
        config: ClientConfig,
        token: Option<String>,
        persistent: bool,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let phase = Arc::new(Mutex::new(WorkerPhase::Connecting));

        let handle = tokio::spawn(run(
            connection,
            connector,
            config,
            token,
            persistent,
            diagnostics,
            Arc::clone(&cancel),
            Arc::clone(&phase),
        ));

        Self {
            cancel,
            phase,
            handle,
        }
    }

    /// Requests cooperative cancellation. Set once, never reset;
    /// observed by the loop within one tick interval.
    pub fn request_stop(&self) {
        if !self.cancel.swap(true, Ordering::AcqRel) {
            debug!(target: "brook.worker", "cancellation requested");
        }
    }

    /// Whether the loop has terminated.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> WorkerPhase {
        *self.phase.lock()
    }

    /// Waits for the loop to terminate. Must not be awaited from code
    /// running inside this worker's own tick (see [`crate::session`]).
    pub(crate) async fn join(self) {
        if self.handle.await.is_err() {
            error!(target: "brook.worker", "worker task panicked or was aborted");
        }
    }
}

fn set_phase(phase: &Mutex<WorkerPhase>, next: WorkerPhase) {
    *phase.lock() = next;
    debug!(target: "brook.worker", phase = ?next, "phase change");
}

#[allow(clippy::too_many_arguments)]
async fn run(
    connection: Arc<Connection>,
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    token: Option<String>,
    persistent: bool,
    diagnostics: Arc<dyn DiagnosticSink>,
    cancel: Arc<AtomicBool>,
    phase: Arc<Mutex<WorkerPhase>>,
) {
    let connect = connection.establish(connector.as_ref(), &config, token.as_deref());
    tokio::pin!(connect);

    loop {
        match tokio::time::timeout(config.tick_interval, connect.as_mut()).await {
            Ok(Ok(identity)) => {
                debug!(target: "brook.worker", identity = %identity, "link established");
                break;
            }
            Ok(Err(err)) => {
                // No retry: the connection stays in a terminal inactive
                // state and the failure goes out on the diagnostic stream.
                error!(target: "brook.worker", error = %err, "connect failed");
                diagnostics.publish(Severity::Error, &format!("connect failed: {err}"));
                set_phase(&phase, WorkerPhase::Terminated);
                return;
            }
            Err(_) => {
                if cancel.load(Ordering::Acquire) {
                    debug!(target: "brook.worker", "cancelled while connecting");
                    connection.disconnect();
                    set_phase(&phase, WorkerPhase::Terminated);
                    return;
                }
            }
        }
    }

    set_phase(&phase, WorkerPhase::Running);
    while !cancel.load(Ordering::Acquire) {
        connection.tick();
        tokio::time::sleep(config.tick_interval).await;
    }

    set_phase(&phase, WorkerPhase::Cancelling);
    if persistent {
        connection.send(ClientCommand::SetOffline);
    }

    set_phase(&phase, WorkerPhase::Draining);
    for _ in 0..config.drain_ticks {
        connection.tick();
        tokio::time::sleep(config.tick_interval).await;
    }

    set_phase(&phase, WorkerPhase::Terminated);
    connection.disconnect();
    if connection.is_active() {
        error!(target: "brook.worker", "transport did not honor disconnect");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionEvents;
    use crate::fake_transport::{ConnectScript, FakeHub};
    use crate::observer::LogSink;
    use std::time::Duration;

    fn config() -> ClientConfig {
        ClientConfig::new("wss://svc.example/db", "app")
    }

    fn spawn_worker(
        connector: Arc<crate::fake_transport::FakeConnector>,
        token: Option<&str>,
        persistent: bool,
    ) -> (Arc<Connection>, PollWorker) {
        let connection = Connection::new(ConnectionEvents::default());
        let worker = PollWorker::spawn(
            Arc::clone(&connection),
            connector,
            config(),
            token.map(str::to_string),
            persistent,
            Arc::new(LogSink),
        );
        (connection, worker)
    }

    async fn wait_until(mut probe: impl FnMut() -> bool) {
        for _ in 0..500 {
            if probe() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(start_paused = true)]
    async fn worker_connects_then_terminates_on_stop() {
        let (connector, hub) = FakeHub::new();
        let (connection, worker) = spawn_worker(connector, None, false);

        wait_until(|| worker.phase() == WorkerPhase::Running).await;
        assert!(connection.is_active());

        worker.request_stop();
        worker.join().await;

        assert!(!connection.is_active());
        assert_eq!(hub.link(0).close_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_runs_exactly_the_configured_ticks() {
        let (connector, hub) = FakeHub::new();
        let (_connection, worker) = spawn_worker(connector, None, false);

        wait_until(|| worker.phase() == WorkerPhase::Running).await;

        // On a paused current-thread runtime the worker is parked in its
        // sleep here, so no further running tick slips in before the
        // flag is observed.
        let before = hub.link(0).drain_calls();
        worker.request_stop();
        worker.join().await;

        assert_eq!(hub.link(0).drain_calls() - before, config().drain_ticks);
        assert_eq!(hub.link(0).close_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_sessions_announce_set_offline_once() {
        let (connector, hub) = FakeHub::new();
        let (_connection, worker) = spawn_worker(connector, Some("tok"), true);

        wait_until(|| worker.phase() == WorkerPhase::Running).await;
        worker.request_stop();
        worker.join().await;

        let sent = hub.link(0).take_sent();
        let offline = sent
            .iter()
            .filter(|c| matches!(c, ClientCommand::SetOffline))
            .count();
        assert_eq!(offline, 1);
        assert!(matches!(sent[0], ClientCommand::Subscribe { .. }));
        assert!(matches!(sent.last(), Some(ClientCommand::SetOffline)));
    }

    #[tokio::test(start_paused = true)]
    async fn temporary_sessions_skip_the_offline_announcement() {
        let (connector, hub) = FakeHub::new();
        let (_connection, worker) = spawn_worker(connector, None, false);

        wait_until(|| worker.phase() == WorkerPhase::Running).await;
        worker.request_stop();
        worker.join().await;

        assert!(
            !hub.link(0)
                .take_sent()
                .iter()
                .any(|c| matches!(c, ClientCommand::SetOffline))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_connect_terminates_without_a_link() {
        let (connector, hub) = FakeHub::new();
        hub.expect_connect(ConnectScript::Stall);
        let (connection, worker) = spawn_worker(connector, None, false);

        worker.request_stop();
        worker.join().await;

        assert_eq!(hub.links(), 0);
        assert!(!connection.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_goes_out_on_the_diagnostic_stream() {
        use parking_lot::Mutex as PlMutex;

        #[derive(Default)]
        struct CollectingSink(PlMutex<Vec<(Severity, String)>>);

        impl DiagnosticSink for CollectingSink {
            fn publish(&self, severity: Severity, message: &str) {
                self.0.lock().push((severity, message.to_string()));
            }
        }

        let (connector, hub) = FakeHub::new();
        hub.expect_connect(ConnectScript::Reject("bad credentials".to_string()));
        let sink = Arc::new(CollectingSink::default());

        let connection = Connection::new(ConnectionEvents::default());
        let worker = PollWorker::spawn(
            Arc::clone(&connection),
            connector,
            config(),
            None,
            false,
            Arc::clone(&sink) as Arc<dyn DiagnosticSink>,
        );
        worker.join().await;

        let published = sink.0.lock();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, Severity::Error);
        assert!(published[0].1.contains("bad credentials"));
        assert!(!connection.is_active());
    }
}
