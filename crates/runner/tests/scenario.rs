use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{http::StatusCode, routing::post, Router};
use harness_core::{BuildHandle, BuildPhase, ScriptSettings, WatchPolicy};
use harness_runner::{
    BuildApiFactory, BuildStatusApi, ClusterError, CommandError, CommandOutput, CommandRunner,
    CompletionWatcher, Harness, HarnessError, NamedPipelineRun, ResultCollector, WatchError,
    WebhookTrigger,
};

/// Reports the same phase on every read.
struct StuckAt(BuildPhase);

impl BuildStatusApi for StuckAt {
    async fn build_phase(&self, _handle: &BuildHandle) -> Result<BuildPhase, ClusterError> {
        Ok(self.0)
    }
}

struct Fixed(BuildPhase);

impl BuildApiFactory for Fixed {
    type Api = StuckAt;

    async fn connect(&self) -> Result<StuckAt, ClusterError> {
        Ok(StuckAt(self.0))
    }
}

#[derive(Clone, Default)]
struct Scripts {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CommandRunner for Scripts {
    async fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let name = program.file_name().unwrap().to_string_lossy().to_string();
        self.calls.lock().unwrap().push(format!("{name} {}", args.join(" ")));
        let stdout = match name.as_str() {
            "print-jenkins-log.sh" => "Finished: SUCCESS\n",
            "print-jenkins-json-status.sh" => "stage-a\nstage-b\n",
            _ => "",
        };
        Ok(CommandOutput {
            stdout: stdout.into(),
            stderr: String::new(),
        })
    }
}

async fn proxy() -> WebhookTrigger {
    let app = Router::new().route(
        "/build",
        post(|| async { (StatusCode::OK, "{\"metadata\":{\"name\":\"ods-qs-be-golang-1\"}}") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    WebhookTrigger::with_endpoint("unitt-cd", format!("http://{addr}/build")).unwrap()
}

fn policy() -> WatchPolicy {
    WatchPolicy {
        initial_delay: Duration::ZERO,
        interval: Duration::ZERO,
        max_attempts: 3,
    }
}

fn named_run() -> NamedPipelineRun {
    NamedPipelineRun {
        repository_project: "unitt".into(),
        repository: "unitt-be-go".into(),
        pipeline_name: "ods-qs-be-golang".into(),
        trigger_secret: "secret".into(),
        extra_env: vec![],
    }
}

#[tokio::test]
async fn completed_run_yields_stage_trace() {
    let scripts = Scripts::default();
    let harness = Harness::new(
        proxy().await,
        CompletionWatcher::new(Fixed(BuildPhase::Complete), policy()),
        ResultCollector::new(scripts.clone(), &ScriptSettings::default()),
    );

    let record = harness.run_named_pipeline(&named_run()).await.unwrap();
    assert_eq!(record.handle, BuildHandle::new("unitt-cd", "ods-qs-be-golang-1"));
    assert_eq!(record.outcome.phase, BuildPhase::Complete);
    assert_eq!(record.stage_trace, "stage-a\nstage-b\n");
    assert_eq!(
        *scripts.calls.lock().unwrap(),
        vec![
            "oc project unitt-cd",
            "print-jenkins-log.sh ods-qs-be-golang-1",
            "print-jenkins-json-status.sh ods-qs-be-golang-1 unitt-cd",
        ]
    );
}

#[tokio::test]
async fn timed_out_run_fetches_log_but_not_stages() {
    let scripts = Scripts::default();
    let harness = Harness::new(
        proxy().await,
        CompletionWatcher::new(Fixed(BuildPhase::Running), policy()),
        ResultCollector::new(scripts.clone(), &ScriptSettings::default()),
    );

    let err = harness.run_named_pipeline(&named_run()).await.unwrap_err();
    match err {
        HarnessError::Watch(WatchError::Timeout { outcome, .. }) => {
            assert_eq!(outcome.attempts, 3);
            assert_eq!(outcome.phase, BuildPhase::Running);
        }
        other => panic!("unexpected {other:?}"),
    }
    let calls = scripts.calls.lock().unwrap();
    assert!(calls.iter().any(|c| c.starts_with("print-jenkins-log.sh")));
    assert!(!calls.iter().any(|c| c.starts_with("print-jenkins-json-status.sh")));
}
