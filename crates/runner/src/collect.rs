use std::path::{Path, PathBuf};

use harness_core::{CollectedRun, ScriptSettings};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::process::{CommandError, CommandRunner};

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("could not get log of build {build}")]
    Log {
        build: String,
        #[source]
        source: CommandError,
    },
    #[error("error getting stages for build {build}")]
    Stages {
        build: String,
        #[source]
        source: CommandError,
    },
}

/// Fetches the log and stage trace of a finished build through the
/// exporter scripts. Contents are passed through untouched.
#[derive(Debug, Clone)]
pub struct ResultCollector<R> {
    runner: R,
    log_script: PathBuf,
    stages_script: PathBuf,
}

impl<R: CommandRunner> ResultCollector<R> {
    pub fn new(runner: R, scripts: &ScriptSettings) -> Self {
        Self {
            runner,
            log_script: scripts.log.clone(),
            stages_script: scripts.stages.clone(),
        }
    }

    pub async fn collect(&self, namespace: &str, build: &str) -> Result<CollectedRun, CollectionError> {
        let log = self.fetch_log(namespace, build).await?;

        info!(build, namespace, "getting stages for build");
        let stages = self
            .runner
            .run(&self.stages_script, &[build, namespace])
            .await
            .map_err(|source| CollectionError::Stages {
                build: build.to_string(),
                source,
            })?;

        Ok(CollectedRun {
            log,
            stage_trace: stages.stdout,
        })
    }

    pub async fn fetch_log(&self, namespace: &str, build: &str) -> Result<String, CollectionError> {
        self.switch_namespace(namespace).await;
        let out = self
            .runner
            .run(&self.log_script, &[build])
            .await
            .map_err(|source| CollectionError::Log {
                build: build.to_string(),
                source,
            })?;
        debug!(build, "build log:\n{}", out.stdout);
        Ok(out.stdout)
    }

    /// The exporter scripts read the current `oc` project. Best-effort.
    async fn switch_namespace(&self, namespace: &str) {
        if let Err(e) = self.runner.run(Path::new("oc"), &["project", namespace]).await {
            warn!(namespace, error = %e, "could not switch project; continuing");
        }
    }
}
