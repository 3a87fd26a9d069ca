//! Operational helpers: logging setup and acknowledgement tracking.

use chrono::{DateTime, Duration, Utc};
use scenedeck_types::{config::OpsConfig, Result, SceneDeckError};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| SceneDeckError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| SceneDeckError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    RemoveFromRecents,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub kind: PendingKind,
    pub path: String,
    pub sent_at: DateTime<Utc>,
    reported: bool,
}

/// Tracks fire-and-forget requests until the host acknowledges them.
///
/// Nothing is retried; overdue requests are reported once so the caller can
/// surface a transient indicator.
#[derive(Debug)]
pub struct RequestWatchdog {
    timeout: Duration,
    pending: Vec<PendingRequest>,
}

impl RequestWatchdog {
    pub fn new(timeout_ms: u64) -> Self {
        let timeout_ms = i64::try_from(timeout_ms).unwrap_or(i64::MAX);
        Self {
            timeout: Duration::milliseconds(timeout_ms),
            pending: Vec::new(),
        }
    }

    /// A repeated request for the same kind and path restarts its clock.
    pub fn track(&mut self, kind: PendingKind, path: impl Into<String>, now: DateTime<Utc>) {
        let path = path.into();
        self.pending
            .retain(|request| !(request.kind == kind && request.path == path));
        self.pending.push(PendingRequest {
            kind,
            path,
            sent_at: now,
            reported: false,
        });
    }

    pub fn acknowledge(&mut self, kind: PendingKind, path: &str) -> bool {
        let before = self.pending.len();
        self.pending
            .retain(|request| !(request.kind == kind && request.path == path));
        self.pending.len() != before
    }

    pub fn acknowledge_kind(&mut self, kind: PendingKind) -> usize {
        let before = self.pending.len();
        self.pending.retain(|request| request.kind != kind);
        before - self.pending.len()
    }

    /// Acknowledges pending requests of `kind` whose path `still_pending` rejects.
    pub fn acknowledge_where<F>(&mut self, kind: PendingKind, still_pending: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let before = self.pending.len();
        self.pending
            .retain(|request| request.kind != kind || still_pending(&request.path));
        before - self.pending.len()
    }

    pub fn pending(&self) -> &[PendingRequest] {
        &self.pending
    }

    /// Requests that crossed the timeout since the last call.
    pub fn overdue(&mut self, now: DateTime<Utc>) -> Vec<PendingRequest> {
        let mut overdue = Vec::new();
        for request in self.pending.iter_mut() {
            if request.reported || now - request.sent_at < self.timeout {
                continue;
            }
            request.reported = true;
            warn!(
                "{:?} request for {} unacknowledged after {}ms",
                request.kind,
                request.path,
                (now - request.sent_at).num_milliseconds()
            );
            overdue.push(request.clone());
        }
        overdue
    }
}
