use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::Path, routing::get, Json, Router};
use harness_core::{BuildHandle, BuildPhase};
use harness_runner::{BuildStatusApi, ClusterCredential, ClusterError, RestBuildApi};

async fn spawn_api(delay: Duration) -> SocketAddr {
    let app = Router::new().route(
        "/apis/build.openshift.io/v1/namespaces/{namespace}/builds/{name}",
        get(move |Path((_ns, name)): Path<(String, String)>| async move {
            tokio::time::sleep(delay).await;
            Json(serde_json::json!({
                "metadata": {"name": name},
                "status": {"phase": "Running"},
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn api(addr: SocketAddr, timeout: Duration) -> RestBuildApi {
    let credential = ClusterCredential {
        server: format!("http://{addr}"),
        token: "sha256~abc".into(),
    };
    RestBuildApi::new(credential, false, timeout).unwrap()
}

#[tokio::test]
async fn status_read_decodes_phase() {
    let addr = spawn_api(Duration::ZERO).await;
    let phase = api(addr, Duration::from_secs(5))
        .build_phase(&BuildHandle::new("proj1-cd", "run-repoX-proj1-1"))
        .await
        .unwrap();
    assert_eq!(phase, BuildPhase::Running);
}

#[tokio::test]
async fn slow_status_read_fails_at_request_timeout() {
    let addr = spawn_api(Duration::from_secs(30)).await;
    let started = std::time::Instant::now();
    let err = api(addr, Duration::from_millis(200))
        .build_phase(&BuildHandle::new("proj1-cd", "run-repoX-proj1-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::Request { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}
