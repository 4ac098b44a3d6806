use std::fmt;

use serde::{Deserialize, Serialize};

/// Environment variable handed to the pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvPair {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

impl EnvPair {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl std::str::FromStr for EnvPair {
    type Err = String;

    /// Parses `NAME=value`. The value may itself contain `=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => Ok(Self::new(name.trim(), value)),
            _ => Err(format!("expected NAME=value, got {s:?}")),
        }
    }
}

/// Body posted to the webhook proxy.
///
/// `env` is sent in order; duplicate names are not collapsed, the receiving
/// side decides which definition wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerRequest {
    pub repository: String,
    pub branch: String,
    pub project: String,
    pub env: Vec<EnvPair>,
}

/// Identifies one build created by one trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BuildHandle {
    namespace: String,
    name: String,
}

impl BuildHandle {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Namespace the build lives in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Generated build name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for BuildHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Phase of a cluster build resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BuildPhase {
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
    Cancelled,
    /// Unrecognized phase string, or no successful read yet.
    Unknown,
}

impl BuildPhase {
    /// Maps the cluster's phase string. Anything unrecognized is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "New" => Self::New,
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Complete" => Self::Complete,
            "Failed" => Self::Failed,
            "Error" => Self::Error,
            "Cancelled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    /// True while the build has not finished yet.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::New | Self::Pending | Self::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
            Self::Error => "Error",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a completed wait.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOutcome {
    /// Last phase observed.
    pub phase: BuildPhase,
    /// Polls made after the initial read.
    pub attempts: u32,
    /// True when the wait ended because the retry budget ran out.
    pub budget_exhausted: bool,
}

/// Kind of pipeline job the webhook proxy routes to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Pipeline file at the repository root.
    Run,
    /// Pipeline file in a subdirectory (provisioning pipelines).
    Provision,
}

impl JobKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Provision => "prov",
        }
    }
}

/// Job name the webhook proxy uses to route a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineJob {
    pub kind: JobKind,
    pub name: String,
}

impl PipelineJob {
    /// Derives the job name from the pipeline file path.
    ///
    /// `subdir/Jenkinsfile` in project `p` is `prov-subdir-p`; a bare
    /// `Jenkinsfile` in repository `r` is `run-r-p`.
    pub fn for_pipeline_path(pipeline_path: &str, repository: &str, project: &str) -> Self {
        let segments: Vec<&str> = pipeline_path.split('/').collect();
        let (kind, prefix) = if segments.len() > 1 {
            (JobKind::Provision, segments[0].to_lowercase())
        } else {
            (JobKind::Run, repository.to_string())
        };
        Self {
            kind,
            name: format!("{}-{}-{}", kind.prefix(), prefix, project),
        }
    }
}

/// Log and stage trace retrieved for a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedRun {
    pub log: String,
    /// Opaque; compared byte-for-byte against golden records.
    pub stage_trace: String,
}

/// Everything a scenario needs after a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub handle: BuildHandle,
    pub outcome: PollOutcome,
    pub stage_trace: String,
}
