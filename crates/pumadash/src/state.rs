//! Dashboard state for pumadash.
//!
//! [`DashboardState`] is the single authoritative holder of what the
//! dashboard shows. Only the poll loop mutates it; the renderer receives
//! clones through a watch channel.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::telemetry::{Snapshot, TelemetryRecord, EMPTY_TIME_LABEL};

/// The selectable history window sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum HistoryLimit {
    /// Last 50 points.
    Last50,
    /// Last 100 points.
    Last100,
    /// Last 150 points.
    #[default]
    Last150,
    /// Last 300 points.
    Last300,
}

impl HistoryLimit {
    /// All selectable limits, smallest first.
    pub const ALL: [Self; 4] = [Self::Last50, Self::Last100, Self::Last150, Self::Last300];

    /// The window size as a record count.
    #[must_use]
    pub fn get(self) -> u32 {
        match self {
            Self::Last50 => 50,
            Self::Last100 => 100,
            Self::Last150 => 150,
            Self::Last300 => 300,
        }
    }

    /// The window size as a `usize`.
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.get() as usize
    }

    /// The next larger limit, saturating at the largest.
    #[must_use]
    pub fn larger(self) -> Self {
        let i = self.index();
        Self::ALL[(i + 1).min(Self::ALL.len() - 1)]
    }

    /// The next smaller limit, saturating at the smallest.
    #[must_use]
    pub fn smaller(self) -> Self {
        Self::ALL[self.index().saturating_sub(1)]
    }

    /// Select by 1-based position in [`Self::ALL`].
    #[must_use]
    pub fn from_position(position: usize) -> Option<Self> {
        position
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|l| *l == self).unwrap_or(2)
    }
}

impl TryFrom<u32> for HistoryLimit {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|l| l.get() == value)
            .ok_or(Error::InvalidHistoryLimit(value))
    }
}

impl From<HistoryLimit> for u32 {
    fn from(limit: HistoryLimit) -> Self {
        limit.get()
    }
}

impl fmt::Display for HistoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Sequence number assigned to each issued snapshot request.
pub type RequestSeq = u64;

/// Everything the dashboard displays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    /// Oldest-first history window from the last applied snapshot.
    pub history: Vec<TelemetryRecord>,
    /// Latest record from the last applied snapshot.
    pub latest: Option<TelemetryRecord>,
    /// Result of the last health probe.
    pub connected: bool,
    /// Whether the last completed snapshot fetch succeeded.
    pub snapshot_ok: bool,
    /// Wall-clock time of the last applied snapshot.
    pub last_update: Option<DateTime<Local>>,
    /// The desired history window.
    pub history_limit: HistoryLimit,
    /// Description of the most recent fetch failure.
    pub last_error: Option<String>,
    /// Sequence number of the newest request whose outcome was applied.
    pub applied_seq: RequestSeq,
}

impl DashboardState {
    /// Create an empty, disconnected state.
    #[must_use]
    pub fn new(history_limit: HistoryLimit) -> Self {
        Self {
            history_limit,
            ..Self::default()
        }
    }

    /// The user-visible connectivity indicator.
    ///
    /// Both the health probe and the last snapshot fetch must have succeeded.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected && self.snapshot_ok
    }

    /// `HH:MM:SS` of the last applied snapshot, or a placeholder.
    #[must_use]
    pub fn last_update_label(&self) -> String {
        self.last_update.map_or_else(
            || EMPTY_TIME_LABEL.to_string(),
            |t| t.format("%H:%M:%S").to_string(),
        )
    }

    /// Replace history and latest with a successful fetch result.
    ///
    /// Outcomes of requests older than the last applied one are discarded.
    /// Returns whether the snapshot was applied.
    pub fn apply_snapshot(
        &mut self,
        seq: RequestSeq,
        snapshot: Snapshot,
        now: DateTime<Local>,
    ) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        self.history = snapshot.history;
        self.latest = snapshot.latest;
        self.snapshot_ok = true;
        self.last_error = None;
        self.last_update = Some(now);
        true
    }

    /// Record a failed fetch, keeping the previous history and latest.
    ///
    /// Returns whether the failure was applied.
    pub fn apply_fetch_failure(&mut self, seq: RequestSeq, error: &Error) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        self.snapshot_ok = false;
        self.last_error = Some(error.to_string());
        true
    }

    /// Record the result of a health probe.
    pub fn apply_health(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Change the desired window; held history is left as is.
    pub fn set_history_limit(&mut self, limit: HistoryLimit) {
        self.history_limit = limit;
    }

    /// Number of anomalous records in the held history.
    #[must_use]
    pub fn anomaly_count(&self) -> usize {
        self.history.iter().filter(|r| r.is_anomaly).count()
    }
}
