//! Integration tests for the core crate.

use harness_core::{
    parse_trigger_response, BuildHandle, ConfigError, ConfigValues, EnvPair, HarnessSettings,
    JobKind, PipelineJob, ResponseError, TriggerRequest, TriggerSettings, WatchPolicy,
};
use std::time::Duration;

#[test]
fn test_provision_job_name_uses_first_segment() {
    let job = PipelineJob::for_pipeline_path("subdir/Jenkinsfile", "repoX", "proj1");
    assert_eq!(job.kind, JobKind::Provision);
    assert_eq!(job.name, "prov-subdir-proj1");
}

#[test]
fn test_provision_job_name_is_lowercased() {
    let job = PipelineJob::for_pipeline_path("Create-Projects/Jenkinsfile", "repoX", "proj1");
    assert_eq!(job.name, "prov-create-projects-proj1");
}

#[test]
fn test_run_job_name_uses_repository() {
    let job = PipelineJob::for_pipeline_path("Jenkinsfile", "repoX", "proj1");
    assert_eq!(job.kind, JobKind::Run);
    assert_eq!(job.name, "run-repoX-proj1");
}

#[test]
fn test_trigger_request_serde() {
    let req = TriggerRequest {
        repository: "repo".into(),
        branch: "master".into(),
        project: "opendevstack".into(),
        env: vec![EnvPair::new("A", "1"), EnvPair::new("A", "2")],
    };
    let serialized = serde_json::to_value(&req).unwrap();
    assert_eq!(
        serialized,
        serde_json::json!({
            "repository": "repo",
            "branch": "master",
            "project": "opendevstack",
            "env": [{"name": "A", "value": "1"}, {"name": "A", "value": "2"}],
        })
    );
}

#[test]
fn test_build_handle_display() {
    let handle = BuildHandle::new("proj1-cd", "run-repoX-proj1-3");
    assert_eq!(handle.to_string(), "proj1-cd/run-repoX-proj1-3");
}

#[test]
fn test_response_201_is_last_accepted_status() {
    let body = "{\"kind\":\"Build\",\"metadata\":{\"name\":\"b-1\"}}\nignored trailer";
    assert_eq!(parse_trigger_response("job", 201, body).unwrap(), "b-1");
}

#[test]
fn test_response_202_is_rejected_with_body() {
    let err = parse_trigger_response("job", 202, "{\"metadata\":{\"name\":\"b-1\"}}").unwrap_err();
    match err {
        ResponseError::Rejected { status, body, job } => {
            assert_eq!(status, 202);
            assert_eq!(job, "job");
            assert!(body.contains("b-1"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        parse_trigger_response("job", 500, "boom").unwrap_err(),
        ResponseError::Rejected { status: 500, .. }
    ));
}

#[test]
fn test_malformed_or_empty_body_is_parse_error() {
    for body in ["", "not json", "[1,2]", "\n{\"metadata\":{\"name\":\"x\"}}"] {
        assert!(
            matches!(
                parse_trigger_response("job", 200, body),
                Err(ResponseError::Parse { .. })
            ),
            "body {body:?}"
        );
    }
}

#[test]
fn test_missing_or_non_string_name_is_shape_error() {
    for body in [
        "{}",
        "{\"metadata\":{}}",
        "{\"metadata\":{\"name\":7}}",
        "{\"metadata\":\"x\"}",
    ] {
        assert!(
            matches!(
                parse_trigger_response("job", 200, body),
                Err(ResponseError::Shape { .. })
            ),
            "body {body:?}"
        );
    }
}

#[test]
fn test_config_values_parse_env_file() {
    let values = ConfigValues::parse(
        "# comment\n\nOPENSHIFT_APPS_BASEDOMAIN=.apps.example.com\nexport ODS_IMAGE_TAG=\"4.x\"\nODS_GIT_REF='master'\nBROKEN\nTOKEN=a=b\n",
    );
    assert_eq!(values.get("OPENSHIFT_APPS_BASEDOMAIN"), Some(".apps.example.com"));
    assert_eq!(values.get("ODS_IMAGE_TAG"), Some("4.x"));
    assert_eq!(values.get("ODS_GIT_REF"), Some("master"));
    assert_eq!(values.get("TOKEN"), Some("a=b"));
    assert_eq!(values.get("BROKEN"), None);
}

#[test]
fn test_trigger_settings_report_first_missing_key() {
    let mut values = ConfigValues::parse("OPENSHIFT_APPS_BASEDOMAIN=.apps.example.com\n");
    let err = TriggerSettings::from_values(&values).unwrap_err();
    assert!(matches!(err, ConfigError::Missing { ref key } if key == "PIPELINE_TRIGGER_SECRET"));

    for (k, v) in [
        ("PIPELINE_TRIGGER_SECRET", "s3cr3t"),
        ("PIPELINE_TRIGGER_SECRET_B64", "czNjcjN0"),
        ("CD_USER_ID_B64", "dXNlcg=="),
        ("ODS_GIT_REF", "master"),
        ("ODS_IMAGE_TAG", "latest"),
    ] {
        values.insert(k, v);
    }
    let settings = TriggerSettings::from_values(&values).unwrap();
    assert_eq!(settings.trigger_secret, "s3cr3t");
    assert_eq!(settings.image_tag, "latest");
}

#[test]
fn test_harness_settings_default_to_fixed_polling() {
    let settings: HarnessSettings = toml::from_str("").unwrap();
    assert_eq!(settings.watch_policy().unwrap(), WatchPolicy::default());
    assert_eq!(
        settings.scripts.log.to_str(),
        Some("tests/scripts/print-jenkins-log.sh")
    );
    assert!(!settings.cluster.insecure_skip_tls_verify);
    assert_eq!(settings.cluster.request_timeout(), Duration::from_secs(30));
}

#[test]
fn test_harness_settings_override_watch_timing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("harness.toml");
    std::fs::write(
        &path,
        "[watch]\ninterval_secs = 1\nmax_attempts = 5\n\n[scripts]\nstages = \"bin/stages.sh\"\n\n[cluster]\nrequest_timeout_secs = 5\n",
    )
    .unwrap();
    let settings = HarnessSettings::load_from(&path).unwrap();
    let policy = settings.watch_policy().unwrap();
    assert_eq!(policy.interval, Duration::from_secs(1));
    assert_eq!(policy.initial_delay, Duration::from_secs(10));
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(settings.scripts.stages.to_str(), Some("bin/stages.sh"));
    assert_eq!(settings.cluster.request_timeout(), Duration::from_secs(5));
}

#[test]
fn test_zero_attempt_budget_is_invalid() {
    let settings: HarnessSettings = toml::from_str("[watch]\nmax_attempts = 0\n").unwrap();
    assert!(matches!(
        settings.watch_policy(),
        Err(ConfigError::Invalid { .. })
    ));
}
