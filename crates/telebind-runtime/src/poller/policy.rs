//! Knobs of the poll loop and its observable state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What the loop does when `getUpdates` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the loop and return the error.
    #[default]
    Stop,
    /// Log the error, wait `error_backoff`, poll again with the same offset.
    Continue,
}

/// When the handlers of a batch must have finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvancePolicy {
    /// Spawn handlers and poll again immediately.
    #[default]
    Unconditional,
    /// Wait for every handler of a batch before the next poll.
    ///
    /// The offset still advances before dispatch, so an update whose
    /// handler fails is not redelivered.
    AfterHandlers,
}

/// Lifecycle of a [`Poller`](super::Poller).
///
/// ```text
/// Idle ──▶ Polling ◀──▶ Dispatching
///             │              │
///             └──▶ Stopped ◀─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Built, never polled.
    Idle,
    /// A `getUpdates` call is outstanding.
    Polling,
    /// Handing a batch to the dispatcher.
    Dispatching,
    /// Terminal.
    Stopped,
}

impl PollerState {
    pub fn is_stopped(self) -> bool {
        self == Self::Stopped
    }
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Dispatching => "dispatching",
            Self::Stopped => "stopped",
        })
    }
}
