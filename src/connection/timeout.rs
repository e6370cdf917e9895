//! Connection Timeout Module
//!
//! Enforces the two per-connection timeout policies.
//!
//! ## Design
//!
//! - **Idle**: time since the last successful receive
//! - **Receive**: time a single receive attempt may block
//!
//! Both are turned into absolute deadlines before each receive. The receive
//! is bounded by whichever deadline is earlier, and that deadline decides
//! the reported cause. Uses `tokio::time::Instant` so tests can drive the
//! clock with `tokio::time::pause`.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::error::ConnectionError;

/// Which policy a deadline belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Idle,
    Receive,
}

/// Per-connection timeout controller
#[derive(Debug, Clone)]
pub struct TimeoutGovernor {
    idle_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
    /// Last successful receive (or connection start)
    last_activity: Instant,
}

impl TimeoutGovernor {
    /// `None` disables the corresponding policy
    pub fn new(idle_timeout: Option<Duration>, receive_timeout: Option<Duration>) -> Self {
        TimeoutGovernor {
            idle_timeout,
            receive_timeout,
            last_activity: Instant::now(),
        }
    }

    /// Record a successful receive
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Time since the last successful receive
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Fails with `IdleTimeout` once the idle limit has been exceeded.
    ///
    /// Called before every blocking receive.
    pub fn check_idle(&self) -> Result<(), ConnectionError> {
        match self.idle_timeout {
            Some(limit) if self.idle_for() > limit => Err(self.expired(TimeoutKind::Idle)),
            _ => Ok(()),
        }
    }

    /// Earliest deadline for a receive starting now, and the policy it belongs to.
    ///
    /// Idle wins a tie so the more specific reason is reported.
    pub fn next_deadline(&self) -> Option<(Instant, TimeoutKind)> {
        let idle = self
            .idle_timeout
            .map(|limit| (self.last_activity + limit, TimeoutKind::Idle));
        let receive = self
            .receive_timeout
            .map(|limit| (Instant::now() + limit, TimeoutKind::Receive));

        match (idle, receive) {
            (Some(i), Some(r)) => Some(if i.0 <= r.0 { i } else { r }),
            (i, r) => i.or(r),
        }
    }

    /// Run one receive bounded by the earlier of the two deadlines.
    pub async fn bound<F: Future>(&self, receive: F) -> Result<F::Output, ConnectionError> {
        match self.next_deadline() {
            Some((deadline, kind)) => tokio::time::timeout_at(deadline, receive)
                .await
                .map_err(|_| self.expired(kind)),
            None => Ok(receive.await),
        }
    }

    fn expired(&self, kind: TimeoutKind) -> ConnectionError {
        match kind {
            TimeoutKind::Idle => ConnectionError::IdleTimeout {
                idle: self.idle_for(),
            },
            TimeoutKind::Receive => ConnectionError::ReceiveTimeout {
                timeout: self.receive_timeout.unwrap_or_default(),
            },
        }
    }
}
