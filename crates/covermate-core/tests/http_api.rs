//! HTTP routes backed by a recording runner.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use covermate_core::http::{HttpState, router};
use covermate_test_utils::project::{SAMPLE_REPORT, TestProject};
use covermate_test_utils::runner::RecordingRunner;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

fn state(project: &TestProject, runner: Arc<RecordingRunner>) -> Arc<HttpState> {
    Arc::new(HttpState::new(Arc::new(project.registry(runner))))
}

async fn send(state: Arc<HttpState>, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_maven_test_without_body() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new().stdout("ok"));
    let req = Request::post("/maven/test").body(Body::empty()).unwrap();

    let (status, body) = send(state(&project, runner.clone()), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["returncode"], 0);
    assert_eq!(body["stdout_tail"], "ok");
    assert!(!body["command"].as_str().unwrap().contains("-Dtest"));
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_maven_test_with_filter() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new().exit_code(1));
    let req = Request::post("/maven/test")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"test_filter":"UtilTest"}"#))
        .unwrap();

    let (status, body) = send(state(&project, runner.clone()), req).await;
    assert_eq!(status, StatusCode::OK, "build failures are data, not errors");
    assert_eq!(body["returncode"], 1);
    assert!(
        body["command"]
            .as_str()
            .unwrap()
            .contains("-Dtest=UtilTest")
    );
}

#[tokio::test]
async fn test_maven_test_rejects_wrong_type() {
    let project = TestProject::new();
    let runner = Arc::new(RecordingRunner::new());
    let req = Request::post("/maven/test")
        .body(Body::from(r#"{"test_filter": 5}"#))
        .unwrap();

    let (status, body) = send(state(&project, runner.clone()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_uncovered_classes_over_http() {
    let project = TestProject::new();
    project.write_report(SAMPLE_REPORT).await;
    let req = Request::post("/tools/uncovered_classes")
        .body(Body::from(r#"{"threshold": 81}"#))
        .unwrap();

    let (status, body) = send(state(&project, Arc::new(RecordingRunner::new())), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"result": [
            {"class": "com.acme.Parser", "line_coverage_pct": 60.0},
            {"class": "com.acme.Util", "line_coverage_pct": 80.0}
        ]})
    );
}

#[tokio::test]
async fn test_malformed_report_is_server_error() {
    let project = TestProject::new();
    project.write_report("<report><counter type=\"LINE\"").await;
    let req = Request::post("/tools/uncovered_classes")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(state(&project, Arc::new(RecordingRunner::new())), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_bad_threshold_is_bad_request() {
    let project = TestProject::new();
    let req = Request::post("/tools/uncovered_classes")
        .body(Body::from(r#"{"threshold": -1}"#))
        .unwrap();

    let (status, body) = send(state(&project, Arc::new(RecordingRunner::new())), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("threshold"));
}
