//! Waits for a triggered build to finish.

use std::future::Future;

use harness_core::{BuildHandle, PollOutcome, PollRead, WatchPolicy, WatchState};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cluster::{BuildApiFactory, BuildStatusApi, ClusterError};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("error creating cluster client")]
    Connect(#[source] ClusterError),
    #[error(
        "timeout during build {build}: still {} after {} polls",
        .outcome.phase,
        .outcome.attempts
    )]
    Timeout {
        build: BuildHandle,
        outcome: PollOutcome,
    },
    #[error("wait for build {build} cancelled after {attempts} polls")]
    Cancelled { build: BuildHandle, attempts: u32 },
}

/// Polls a build until it leaves New/Pending/Running or the budget runs out.
///
/// Each watcher connects through its own factory; nothing is shared between
/// watchers of different builds.
pub struct CompletionWatcher<F> {
    factory: F,
    policy: WatchPolicy,
    cancel: Option<watch::Receiver<bool>>,
}

impl<F: BuildApiFactory> CompletionWatcher<F> {
    pub fn new(factory: F, policy: WatchPolicy) -> Self {
        Self {
            factory,
            policy,
            cancel: None,
        }
    }

    /// Stops the wait once `true` is sent on the channel.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn policy(&self) -> &WatchPolicy {
        &self.policy
    }

    /// Every wait point (connect, status read, sleep) is raced against the
    /// cancel channel, so a hung request cannot outlive a cancellation.
    pub async fn await_build(&self, handle: &BuildHandle) -> Result<PollOutcome, WatchError> {
        let mut cancel = self.cancel.clone();

        let mut api = cancellable(self.factory.connect(), &mut cancel, handle, 0)
            .await?
            .map_err(WatchError::Connect)?;
        cancellable(
            tokio::time::sleep(self.policy.initial_delay),
            &mut cancel,
            handle,
            0,
        )
        .await?;
        let mut read = cancellable(read_phase(&api, handle), &mut cancel, handle, 0).await?;
        let mut attempts = 0;

        loop {
            match self.policy.transition(read, attempts) {
                WatchState::Finished(phase) => {
                    info!(build = %handle, %phase, attempts, "build finished");
                    return Ok(PollOutcome {
                        phase,
                        attempts,
                        budget_exhausted: false,
                    });
                }
                WatchState::TimedOut { last_phase } => {
                    warn!(build = %handle, phase = %last_phase, attempts, "gave up waiting for build");
                    return Err(WatchError::Timeout {
                        build: handle.clone(),
                        outcome: PollOutcome {
                            phase: last_phase,
                            attempts,
                            budget_exhausted: true,
                        },
                    });
                }
                WatchState::Refreshing => {
                    match cancellable(self.factory.connect(), &mut cancel, handle, attempts).await? {
                        Ok(fresh) => {
                            info!(build = %handle, "refreshed cluster client");
                            api = fresh;
                        }
                        Err(e) => {
                            warn!(build = %handle, error = %e, "client refresh failed; keeping previous client");
                        }
                    }
                }
                WatchState::Polling => {}
            }

            cancellable(
                tokio::time::sleep(self.policy.interval),
                &mut cancel,
                handle,
                attempts,
            )
            .await?;
            read = cancellable(read_phase(&api, handle), &mut cancel, handle, attempts).await?;
            attempts += 1;
        }
    }
}

/// Runs `fut` to completion unless `true` arrives on `cancel` first.
///
/// A dropped sender means nobody can cancel any more; `fut` then runs out.
async fn cancellable<T>(
    fut: impl Future<Output = T>,
    cancel: &mut Option<watch::Receiver<bool>>,
    handle: &BuildHandle,
    attempts: u32,
) -> Result<T, WatchError> {
    let Some(rx) = cancel else {
        return Ok(fut.await);
    };

    tokio::pin!(fut);
    loop {
        if *rx.borrow_and_update() {
            return Err(WatchError::Cancelled {
                build: handle.clone(),
                attempts,
            });
        }
        tokio::select! {
            out = &mut fut => return Ok(out),
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(fut.await);
                }
            }
        }
    }
}

async fn read_phase<A: BuildStatusApi>(api: &A, handle: &BuildHandle) -> PollRead {
    match api.build_phase(handle).await {
        Ok(phase) => {
            info!(build = %handle, %phase, "waiting for build to complete");
            PollRead::Phase(phase)
        }
        Err(e) => {
            warn!(build = %handle, error = %e, "build is still not available");
            PollRead::Failed
        }
    }
}
