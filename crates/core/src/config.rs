use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::watch::WatchPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration value {key} is missing")]
    Missing { key: String },
    #[error("configuration value {key} is invalid: {value:?}")]
    Invalid { key: String, value: String },
    #[error("read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Static key/value configuration (secrets, base domain, image tag, ...).
///
/// Read from an env-style file: one `KEY=VALUE` per line, `#` comments,
/// optional `export ` prefix and optional surrounding quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigValues {
    values: BTreeMap<String, String>,
}

impl ConfigValues {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&s))
    }

    /// Lines without `=` are ignored. Later keys override earlier ones.
    pub fn parse(s: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            values.insert(key.trim().to_string(), unquote(value.trim()).to_string());
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Like `get`, but a missing or empty value is a `ConfigError::Missing`.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        match self.get(key) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(ConfigError::Missing {
                key: key.to_string(),
            }),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl FromIterator<(String, String)> for ConfigValues {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn unquote(v: &str) -> &str {
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

/// Values the run trigger needs from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSettings {
    /// Appended to `webhook-proxy-<namespace>`, e.g. `.apps.example.com`.
    pub apps_base_domain: String,
    /// Secret placed in the webhook query string.
    pub trigger_secret: String,
    /// Base64 form of the secret, passed to the pipeline as env.
    pub trigger_secret_b64: String,
    pub cd_user_id_b64: String,
    pub git_ref: String,
    pub image_tag: String,
}

impl TriggerSettings {
    pub fn from_values(values: &ConfigValues) -> Result<Self, ConfigError> {
        Ok(Self {
            apps_base_domain: values.require("OPENSHIFT_APPS_BASEDOMAIN")?.to_string(),
            trigger_secret: values.require("PIPELINE_TRIGGER_SECRET")?.to_string(),
            trigger_secret_b64: values.require("PIPELINE_TRIGGER_SECRET_B64")?.to_string(),
            cd_user_id_b64: values.require("CD_USER_ID_B64")?.to_string(),
            git_ref: values.require("ODS_GIT_REF")?.to_string(),
            image_tag: values.require("ODS_IMAGE_TAG")?.to_string(),
        })
    }
}

/// Optional harness tuning file (TOML). Every field has a default.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessSettings {
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub scripts: ScriptSettings,
    #[serde(default)]
    pub cluster: ClusterSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchSettings {
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_delay_secs() -> u64 {
    10
}

fn default_interval_secs() -> u64 {
    35
}

fn default_max_attempts() -> u32 {
    60
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay_secs(),
            interval_secs: default_interval_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Helper scripts, relative to the harness base directory.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptSettings {
    #[serde(default = "default_log_script")]
    pub log: PathBuf,
    #[serde(default = "default_stages_script")]
    pub stages: PathBuf,
    #[serde(default = "default_artifact_script")]
    pub artifact: PathBuf,
}

fn default_log_script() -> PathBuf {
    PathBuf::from("tests/scripts/print-jenkins-log.sh")
}

fn default_stages_script() -> PathBuf {
    PathBuf::from("tests/scripts/print-jenkins-json-status.sh")
}

fn default_artifact_script() -> PathBuf {
    PathBuf::from("tests/scripts/get-artifact-from-jenkins-run.sh")
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            log: default_log_script(),
            stages: default_stages_script(),
            artifact: default_artifact_script(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterSettings {
    /// Skip certificate checks toward the cluster API (self-signed test clusters).
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
    /// Bound on a single build status request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            insecure_skip_tls_verify: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ClusterSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl HarnessSettings {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&s).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn watch_policy(&self) -> Result<WatchPolicy, ConfigError> {
        if self.watch.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "watch.max_attempts".into(),
                value: "0".into(),
            });
        }
        Ok(WatchPolicy {
            initial_delay: Duration::from_secs(self.watch.initial_delay_secs),
            interval: Duration::from_secs(self.watch.interval_secs),
            max_attempts: self.watch.max_attempts,
        })
    }
}
