//! Access to the cluster's build resources.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use harness_core::{BuildHandle, BuildPhase};
use serde::Deserialize;
use thiserror::Error;

use crate::process::{CommandError, CommandRunner};

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("could not obtain cluster credential")]
    Credential(#[source] CommandError),
    #[error("cluster credential is empty ({0})")]
    EmptyCredential(&'static str),
    #[error("could not create build client")]
    Client(#[source] reqwest::Error),
    #[error("could not get build {build}")]
    Request {
        build: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("get build {build} returned {status}: {body}")]
    Status {
        build: String,
        status: u16,
        body: String,
    },
}

/// Reads the phase of a build.
pub trait BuildStatusApi {
    fn build_phase(
        &self,
        handle: &BuildHandle,
    ) -> impl Future<Output = Result<BuildPhase, ClusterError>> + Send;
}

/// Builds a fresh credential and client. Called once per wait and again
/// whenever a status read fails.
pub trait BuildApiFactory {
    type Api: BuildStatusApi + Send + Sync;

    fn connect(&self) -> impl Future<Output = Result<Self::Api, ClusterError>> + Send;
}

/// API server and bearer token of the current cluster login.
#[derive(Clone)]
pub struct ClusterCredential {
    pub server: String,
    pub token: String,
}

impl fmt::Debug for ClusterCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterCredential")
            .field("server", &self.server)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct BuildResource {
    #[serde(default)]
    status: BuildResourceStatus,
}

#[derive(Deserialize, Default)]
struct BuildResourceStatus {
    #[serde(default)]
    phase: String,
}

/// Build API client over the cluster's REST endpoint.
#[derive(Debug, Clone)]
pub struct RestBuildApi {
    http: reqwest::Client,
    credential: ClusterCredential,
}

impl RestBuildApi {
    /// `timeout` bounds each status request end to end.
    pub fn new(
        credential: ClusterCredential,
        insecure_skip_tls_verify: bool,
        timeout: Duration,
    ) -> Result<Self, ClusterError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure_skip_tls_verify)
            .timeout(timeout)
            .build()
            .map_err(ClusterError::Client)?;
        Ok(Self { http, credential })
    }

    fn build_url(&self, handle: &BuildHandle) -> String {
        format!(
            "{}/apis/build.openshift.io/v1/namespaces/{}/builds/{}",
            self.credential.server.trim_end_matches('/'),
            handle.namespace(),
            handle.name()
        )
    }
}

impl BuildStatusApi for RestBuildApi {
    async fn build_phase(&self, handle: &BuildHandle) -> Result<BuildPhase, ClusterError> {
        let request = |source| ClusterError::Request {
            build: handle.to_string(),
            source,
        };
        let resp = self
            .http
            .get(self.build_url(handle))
            .bearer_auth(&self.credential.token)
            .send()
            .await
            .map_err(request)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClusterError::Status {
                build: handle.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        let build: BuildResource = resp.json().await.map_err(request)?;
        Ok(BuildPhase::parse(&build.status.phase))
    }
}

/// Reads the login of the `oc` CLI each time a client is needed, so an
/// expired token is replaced by whatever the CLI currently holds.
#[derive(Debug, Clone)]
pub struct OcBuildApiFactory<R> {
    runner: R,
    insecure_skip_tls_verify: bool,
    request_timeout: Duration,
}

impl<R: CommandRunner + Sync> OcBuildApiFactory<R> {
    pub fn new(runner: R, insecure_skip_tls_verify: bool, request_timeout: Duration) -> Self {
        Self {
            runner,
            insecure_skip_tls_verify,
            request_timeout,
        }
    }

    async fn whoami(&self, flag: &str, what: &'static str) -> Result<String, ClusterError> {
        let out = self
            .runner
            .run(Path::new("oc"), &["whoami", flag])
            .await
            .map_err(ClusterError::Credential)?;
        let value = out.stdout.trim().to_string();
        if value.is_empty() {
            return Err(ClusterError::EmptyCredential(what));
        }
        Ok(value)
    }
}

impl<R: CommandRunner + Sync> BuildApiFactory for OcBuildApiFactory<R> {
    type Api = RestBuildApi;

    async fn connect(&self) -> Result<RestBuildApi, ClusterError> {
        let server = self.whoami("--show-server", "server").await?;
        let token = self.whoami("--show-token", "token").await?;
        RestBuildApi::new(
            ClusterCredential { server, token },
            self.insecure_skip_tls_verify,
            self.request_timeout,
        )
    }
}
