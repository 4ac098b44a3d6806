//! Polling policy and state transitions of the completion watcher.
//!
//! The async driver lives in the runner crate; everything that decides what
//! happens after a read is here so it can be exercised without a cluster.

use std::time::Duration;

use crate::model::BuildPhase;

/// Timing and budget of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchPolicy {
    /// Settling time between trigger and first read.
    pub initial_delay: Duration,
    /// Fixed sleep between polls.
    pub interval: Duration,
    /// Polls allowed after the initial read.
    pub max_attempts: u32,
}

impl Default for WatchPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            interval: Duration::from_secs(35),
            max_attempts: 60,
        }
    }
}

impl WatchPolicy {
    /// Upper bound on the time spent waiting for one build.
    pub fn worst_case(&self) -> Duration {
        self.initial_delay + self.interval * self.max_attempts
    }

    /// Decides the next state after a read.
    ///
    /// A terminal phase wins over an exhausted budget, so a build that
    /// finishes on the last allowed poll is reported as finished.
    pub fn transition(&self, read: PollRead, attempts: u32) -> WatchState {
        match read {
            PollRead::Phase(phase) if !phase.is_in_flight() => WatchState::Finished(phase),
            _ if attempts >= self.max_attempts => WatchState::TimedOut {
                last_phase: read.phase(),
            },
            PollRead::Failed => WatchState::Refreshing,
            PollRead::Phase(_) => WatchState::Polling,
        }
    }
}

/// What a single status read produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollRead {
    Phase(BuildPhase),
    /// The read errored; the phase is unknown.
    Failed,
}

impl PollRead {
    pub fn phase(self) -> BuildPhase {
        match self {
            Self::Phase(p) => p,
            Self::Failed => BuildPhase::Unknown,
        }
    }
}

/// Watcher states.
///
/// `Polling --read error--> Refreshing --> Polling` rebuilds the client
/// between polls; `Finished` and `TimedOut` end the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Polling,
    Refreshing,
    Finished(BuildPhase),
    TimedOut { last_phase: BuildPhase },
}
