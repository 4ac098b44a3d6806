//! Starts pipeline runs through the webhook proxy.

use std::time::Duration;

use harness_core::{
    parse_trigger_response, BuildHandle, EnvPair, PipelineJob, ResponseError, TriggerRequest,
    TriggerSettings,
};
use thiserror::Error;
use tracing::info;

/// Upper bound on one webhook round trip.
pub const TRIGGER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("could not create webhook client")]
    Client(#[source] reqwest::Error),
    #[error("invalid webhook url {url}: {reason}")]
    Url { url: String, reason: String },
    #[error("could not post to pipeline {job} ({endpoint})")]
    Transport {
        job: String,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// Trigger of a pipeline file in a repository.
#[derive(Debug, Clone)]
pub struct PipelineFileRun {
    pub repository: String,
    /// Bitbucket project holding the repository.
    pub repository_project: String,
    pub branch: String,
    /// Project the pipeline runs for; part of the job name.
    pub project: String,
    /// e.g. `Jenkinsfile` or `create-projects/Jenkinsfile`.
    pub pipeline_path: String,
    pub extra_env: Vec<EnvPair>,
}

/// Trigger of an already configured pipeline by name.
#[derive(Debug, Clone)]
pub struct NamedPipelineRun {
    pub repository_project: String,
    pub repository: String,
    pub pipeline_name: String,
    pub trigger_secret: String,
    pub extra_env: Vec<EnvPair>,
}

/// Request body for a pipeline file run: base env first, then overrides.
pub fn pipeline_file_request(run: &PipelineFileRun, settings: &TriggerSettings) -> TriggerRequest {
    let mut env = vec![
        EnvPair::new("PROJECT_ID", &run.project),
        EnvPair::new("CD_USER_TYPE", "general"),
        EnvPair::new("CD_USER_ID_B64", &settings.cd_user_id_b64),
        EnvPair::new("PIPELINE_TRIGGER_SECRET", &settings.trigger_secret_b64),
        EnvPair::new("ODS_GIT_REF", &settings.git_ref),
        EnvPair::new("ODS_IMAGE_TAG", &settings.image_tag),
    ];
    env.extend(run.extra_env.iter().cloned());
    TriggerRequest {
        repository: run.repository.clone(),
        branch: run.branch.clone(),
        project: run.repository_project.clone(),
        env,
    }
}

/// Webhook proxy client for one target namespace.
///
/// Owns a dedicated HTTP client with certificate verification disabled; no
/// other client in the process is affected.
#[derive(Debug, Clone)]
pub struct WebhookTrigger {
    http: reqwest::Client,
    namespace: String,
    endpoint: String,
}

impl WebhookTrigger {
    /// Targets `https://webhook-proxy-<namespace><apps_base_domain>/build`.
    pub fn new(namespace: &str, apps_base_domain: &str) -> Result<Self, TriggerError> {
        Self::with_endpoint(
            namespace,
            format!("https://webhook-proxy-{namespace}{apps_base_domain}/build"),
        )
    }

    pub fn with_endpoint(
        namespace: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, TriggerError> {
        Self::with_timeout(namespace, endpoint, TRIGGER_TIMEOUT)
    }

    pub fn with_timeout(
        namespace: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TriggerError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(TriggerError::Client)?;
        Ok(Self {
            http,
            namespace: namespace.into(),
            endpoint: endpoint.into(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn trigger_pipeline_file(
        &self,
        run: &PipelineFileRun,
        settings: &TriggerSettings,
    ) -> Result<BuildHandle, TriggerError> {
        info!(
            pipeline = %run.pipeline_path,
            project = %run.project,
            "starting build"
        );
        let job = PipelineJob::for_pipeline_path(&run.pipeline_path, &run.repository, &run.project);
        let request = pipeline_file_request(run, settings);
        self.post(
            &job.name,
            &[
                ("trigger_secret", settings.trigger_secret.as_str()),
                ("jenkinsfile_path", run.pipeline_path.as_str()),
                ("component", job.name.as_str()),
            ],
            &request,
        )
        .await
    }

    /// Sends only the caller's env pairs, on branch `master`.
    pub async fn trigger_named_pipeline(
        &self,
        run: &NamedPipelineRun,
    ) -> Result<BuildHandle, TriggerError> {
        info!(pipeline = %run.pipeline_name, namespace = %self.namespace, "starting build");
        let request = TriggerRequest {
            repository: run.repository.clone(),
            branch: "master".to_string(),
            project: run.repository_project.clone(),
            env: run.extra_env.clone(),
        };
        self.post(
            &run.pipeline_name,
            &[
                ("trigger_secret", run.trigger_secret.as_str()),
                ("component", run.pipeline_name.as_str()),
            ],
            &request,
        )
        .await
    }

    async fn post(
        &self,
        job: &str,
        query: &[(&str, &str)],
        request: &TriggerRequest,
    ) -> Result<BuildHandle, TriggerError> {
        let url = reqwest::Url::parse_with_params(&self.endpoint, query).map_err(|e| {
            TriggerError::Url {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        info!(job, "starting pipeline");

        let transport = |source| TriggerError::Transport {
            job: job.to_string(),
            endpoint: self.endpoint.clone(),
            source,
        };
        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(transport)?;
        info!(job, status, response = %body, "webhook response");

        let name = parse_trigger_response(job, status, &body)?;
        info!(job, build = %name, "build name from response");
        Ok(BuildHandle::new(self.namespace.clone(), name))
    }
}
