//! The poll loop.
//!
//! [`Poller`] owns the [`DashboardState`], issues fetches on a fixed interval
//! and on request, and publishes every state change on a watch channel.
//! Each fetch runs as its own task and may overlap with others; completions
//! are tagged with a request sequence number so a slow, older response can
//! never overwrite a newer one.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::TelemetrySource;
use crate::error::Result;
use crate::state::{DashboardState, HistoryLimit, RequestSeq};
use crate::telemetry::Snapshot;

/// Requests sent to a running poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Change the history window and fetch immediately.
    SetHistoryLimit(HistoryLimit),
    /// Fetch immediately.
    Refresh,
}

/// Outcome of one fetch task.
#[derive(Debug)]
pub struct Completion {
    /// Sequence number the request was issued with.
    pub seq: RequestSeq,
    /// Snapshot fetch result.
    pub snapshot: Result<Snapshot>,
    /// Health probe result.
    pub connected: bool,
}

/// Owner of the dashboard state and driver of the fetch schedule.
pub struct Poller {
    source: Arc<dyn TelemetrySource>,
    interval: Duration,
    state: DashboardState,
    publish: watch::Sender<DashboardState>,
    next_seq: RequestSeq,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval)
            .field("state", &self.state)
            .field("next_seq", &self.next_seq)
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Create a poller and the receiver the renderer watches.
    #[must_use]
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        interval: Duration,
        history_limit: HistoryLimit,
    ) -> (Self, watch::Receiver<DashboardState>) {
        let state = DashboardState::new(history_limit);
        let (publish, receiver) = watch::channel(state.clone());
        let poller = Self {
            source,
            interval,
            state,
            publish,
            next_seq: 1,
        };
        (poller, receiver)
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Spawn one fetch of snapshot and health onto `tasks`.
    ///
    /// Returns the sequence number assigned to the request.
    pub fn issue(&mut self, tasks: &mut JoinSet<Completion>) -> RequestSeq {
        let seq = self.next_seq;
        self.next_seq += 1;

        let source = Arc::clone(&self.source);
        let limit = self.state.history_limit;
        debug!(seq, %limit, "issuing fetch");
        tasks.spawn(async move {
            let (snapshot, connected) =
                tokio::join!(source.fetch_snapshot(limit), source.fetch_health());
            Completion {
                seq,
                snapshot,
                connected,
            }
        });
        seq
    }

    /// Apply a finished fetch to the state and publish it.
    ///
    /// Completions older than the last applied one are dropped. Returns
    /// whether the state changed.
    pub fn apply(&mut self, completion: Completion) -> bool {
        let Completion {
            seq,
            snapshot,
            connected,
        } = completion;

        let applied = match snapshot {
            Ok(snapshot) => {
                let records = snapshot.history.len();
                let applied = self.state.apply_snapshot(seq, snapshot, Local::now());
                if applied {
                    debug!(seq, records, "snapshot applied");
                }
                applied
            }
            Err(e) => {
                let applied = self.state.apply_fetch_failure(seq, &e);
                if applied {
                    warn!(seq, error = %e, "fetch failed, keeping previous data");
                }
                applied
            }
        };

        if !applied {
            debug!(seq, applied = self.state.applied_seq, "discarding stale completion");
            return false;
        }

        self.state.apply_health(connected);
        self.publish.send_replace(self.state.clone());
        true
    }

    /// Change the history window and publish the change.
    pub fn set_history_limit(&mut self, limit: HistoryLimit) {
        info!(%limit, "history limit changed");
        self.state.set_history_limit(limit);
        self.publish.send_replace(self.state.clone());
    }

    /// Run until the control channel closes.
    ///
    /// Fetches once immediately, then on every interval tick and on every
    /// control message. Outstanding fetches are detached, not aborted, when
    /// the loop ends. Returns the final state.
    pub async fn run(mut self, mut control: mpsc::Receiver<Control>) -> DashboardState {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();

        info!(interval_ms = self.interval.as_millis(), "poll loop started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.issue(&mut tasks);
                }
                message = control.recv() => match message {
                    Some(Control::SetHistoryLimit(limit)) => {
                        self.set_history_limit(limit);
                        self.issue(&mut tasks);
                    }
                    Some(Control::Refresh) => {
                        self.issue(&mut tasks);
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next() => match joined {
                    Ok(completion) => {
                        self.apply(completion);
                    }
                    Err(e) => warn!(error = %e, "fetch task failed"),
                },
            }
        }

        tasks.detach_all();
        info!("poll loop stopped");
        self.state
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{FakeSource, Reply};
    use super::*;
    use crate::logging::init_test_logging;

    fn poller(source: FakeSource) -> (Poller, watch::Receiver<DashboardState>) {
        Poller::new(
            Arc::new(source),
            Duration::from_millis(1000),
            HistoryLimit::Last150,
        )
    }

    async fn drain(poller: &mut Poller, tasks: &mut JoinSet<Completion>) {
        while let Some(joined) = tasks.join_next().await {
            poller.apply(joined.unwrap());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_matches_each_limit() {
        for limit in HistoryLimit::ALL {
            let (mut poller, _rx) = poller(FakeSource::healthy());
            poller.set_history_limit(limit);
            let mut tasks = JoinSet::new();
            poller.issue(&mut tasks);
            drain(&mut poller, &mut tasks).await;
            assert_eq!(poller.state().history.len(), limit.as_usize());
            assert!(poller.state().is_connected());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_issued_resolving_first_wins() {
        init_test_logging();
        let (mut poller, _rx) = poller(FakeSource::with_script([
            Reply::Records {
                delay: Duration::from_millis(500),
                count: 11,
            },
            Reply::Records {
                delay: Duration::from_millis(100),
                count: 22,
            },
        ]));
        let mut tasks = JoinSet::new();
        let first = poller.issue(&mut tasks);
        let second = poller.issue(&mut tasks);
        assert!(second > first);

        let done = tasks.join_next().await.unwrap().unwrap();
        assert_eq!(done.seq, second);
        assert!(poller.apply(done));

        let late = tasks.join_next().await.unwrap().unwrap();
        assert_eq!(late.seq, first);
        assert!(!poller.apply(late));

        assert_eq!(poller.state().history.len(), 22);
        assert_eq!(poller.state().applied_seq, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_data() {
        let (mut poller, rx) = poller(FakeSource::with_script([
            Reply::Records {
                delay: Duration::ZERO,
                count: 5,
            },
            Reply::Fail {
                delay: Duration::from_millis(10),
            },
        ]));
        let mut tasks = JoinSet::new();
        poller.issue(&mut tasks);
        drain(&mut poller, &mut tasks).await;
        let before = poller.state().clone();
        assert!(before.is_connected());

        poller.issue(&mut tasks);
        drain(&mut poller, &mut tasks).await;

        let after = rx.borrow().clone();
        assert_eq!(after.history, before.history);
        assert_eq!(after.latest, before.latest);
        assert_eq!(after.last_update, before.last_update);
        assert!(!after.is_connected());
        assert!(after.last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_backend_reads_disconnected() {
        let source = FakeSource {
            healthy: false,
            ..FakeSource::default()
        };
        let (mut poller, _rx) = poller(source);
        let mut tasks = JoinSet::new();
        poller.issue(&mut tasks);
        drain(&mut poller, &mut tasks).await;
        assert!(poller.state().snapshot_ok);
        assert!(!poller.state().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fetches_on_limit_change_and_stops_on_close() {
        let (poller, mut rx) = poller(FakeSource::healthy());
        let (tx, control) = mpsc::channel(8);
        let handle = tokio::spawn(poller.run(control));

        rx.wait_for(|s| s.history.len() == 150).await.unwrap();

        tx.send(Control::SetHistoryLimit(HistoryLimit::Last50))
            .await
            .unwrap();
        rx.wait_for(|s| s.history_limit == HistoryLimit::Last50 && s.history.len() == 50)
            .await
            .unwrap();

        drop(tx);
        let last = handle.await.unwrap();
        assert_eq!(last.history_limit, HistoryLimit::Last50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_on_interval() {
        let (poller, mut rx) = poller(FakeSource::healthy());
        let (tx, control) = mpsc::channel(8);
        let handle = tokio::spawn(poller.run(control));

        rx.wait_for(|s| s.applied_seq >= 3).await.unwrap();
        drop(tx);
        let last = handle.await.unwrap();
        assert!(last.applied_seq >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_issues_immediately() {
        let (poller, mut rx) = Poller::new(
            Arc::new(FakeSource::healthy()),
            Duration::from_secs(3600),
            HistoryLimit::Last100,
        );
        let (tx, control) = mpsc::channel(8);
        let handle = tokio::spawn(poller.run(control));

        rx.wait_for(|s| s.applied_seq == 1).await.unwrap();
        tx.send(Control::Refresh).await.unwrap();
        rx.wait_for(|s| s.applied_seq == 2).await.unwrap();

        drop(tx);
        handle.await.unwrap();
    }
}
