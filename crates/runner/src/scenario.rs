//! End-to-end helpers: trigger a pipeline, wait for it, collect its output.

use harness_core::{BuildHandle, RunRecord, TriggerSettings};
use tracing::warn;

use crate::cluster::BuildApiFactory;
use crate::collect::ResultCollector;
use crate::process::CommandRunner;
use crate::trigger::{NamedPipelineRun, PipelineFileRun, WebhookTrigger};
use crate::watcher::{CompletionWatcher, WatchError};
use crate::HarnessError;

pub struct Harness<F, R> {
    pub trigger: WebhookTrigger,
    pub watcher: CompletionWatcher<F>,
    pub collector: ResultCollector<R>,
}

impl<F: BuildApiFactory, R: CommandRunner> Harness<F, R> {
    pub fn new(
        trigger: WebhookTrigger,
        watcher: CompletionWatcher<F>,
        collector: ResultCollector<R>,
    ) -> Self {
        Self {
            trigger,
            watcher,
            collector,
        }
    }

    /// Runs a pipeline file and returns the executed stages and build name.
    pub async fn run_pipeline_file(
        &self,
        run: &PipelineFileRun,
        settings: &TriggerSettings,
    ) -> Result<RunRecord, HarnessError> {
        let handle = self.trigger.trigger_pipeline_file(run, settings).await?;
        self.finish(handle).await
    }

    pub async fn run_named_pipeline(&self, run: &NamedPipelineRun) -> Result<RunRecord, HarnessError> {
        let handle = self.trigger.trigger_named_pipeline(run).await?;
        self.finish(handle).await
    }

    /// Waits for `handle` and collects its output.
    ///
    /// A timed out build still gets its log fetched and logged before the
    /// timeout is returned.
    pub async fn finish(&self, handle: BuildHandle) -> Result<RunRecord, HarnessError> {
        let outcome = match self.watcher.await_build(&handle).await {
            Ok(outcome) => outcome,
            Err(e @ WatchError::Timeout { .. }) => {
                match self
                    .collector
                    .fetch_log(handle.namespace(), handle.name())
                    .await
                {
                    Ok(log) => warn!(build = %handle, "log of timed out build:\n{log}"),
                    Err(le) => warn!(build = %handle, error = %le, "no log for timed out build"),
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let collected = self
            .collector
            .collect(handle.namespace(), handle.name())
            .await?;
        Ok(RunRecord {
            handle,
            outcome,
            stage_trace: collected.stage_trace,
        })
    }
}
