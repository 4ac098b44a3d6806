#![forbid(unsafe_code)]

//! Drives CI pipeline runs for end-to-end tests: webhook trigger, completion
//! watcher, log/stage collection and artifact checks.

pub mod cluster;
pub mod collect;
pub mod process;
pub mod scenario;
pub mod trigger;
pub mod verify;
pub mod watcher;

use harness_core::{ConfigError, GoldenError};
use thiserror::Error;

pub use cluster::{
    BuildApiFactory, BuildStatusApi, ClusterCredential, ClusterError, OcBuildApiFactory,
    RestBuildApi,
};
pub use collect::{CollectionError, ResultCollector};
pub use process::{CommandError, CommandOutput, CommandRunner, ProcessRunner};
pub use scenario::Harness;
pub use trigger::{
    NamedPipelineRun, PipelineFileRun, TriggerError, WebhookTrigger, TRIGGER_TIMEOUT,
};
pub use verify::{ArtifactError, ArtifactVerifier};
pub use watcher::{CompletionWatcher, WatchError};

/// Any failure of a harness step.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Golden(#[from] GoldenError),
}
