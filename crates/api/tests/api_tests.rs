use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use fastgets_api::create_app;
use fastgets_coordinator::Services;
use fastgets_core::traits::RawPageRepository;
use fastgets_core::Traceback;
use fastgets_infrastructure::StoreHandles;
use fastgets_testing_utils::{TestEnv, UnreachableStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> (Router, Services) {
    let services = Services::new(&StoreHandles::in_memory(), &TestEnv::memory_config());
    (create_app(services.clone(), None), services)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, method, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = test_app();
    let (status, body) = send_json(&app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_add_job_replaces_by_name() {
    let (app, services) = test_app();

    let (status, body) =
        send_json(&app, "POST", "/job/add?name=daily&trigger=0%205%20*%20*%20*").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let payload = "%7B%22type%22%3A%22http%22%7D";
    let uri = format!("/job/add?name=daily&trigger=0%206%20*%20*%20*&payload={payload}");
    let (status, _) = send_json(&app, "POST", &uri).await;
    assert_eq!(status, StatusCode::OK);

    let (status, jobs) = send_json(&app, "GET", "/job/list").await;
    assert_eq!(status, StatusCode::OK);
    let jobs = jobs.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["trigger"], "0 6 * * *");
    assert_eq!(jobs[0]["payload"]["type"], "http");

    let job = services.registry.get("daily").await.unwrap();
    assert_eq!(job.trigger, "0 6 * * *");
}

#[tokio::test]
async fn test_invalid_trigger_is_bad_request() {
    let (app, services) = test_app();

    let (status, body) = send_json(&app, "POST", "/job/add?name=daily&trigger=nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_TRIGGER");
    assert!(services.registry.list().await.unwrap().is_empty());

    let (status, body) =
        send_json(&app, "POST", "/job/add?name=daily&trigger=*%20*%20*%20*%20*&payload=%7B").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_delete_job_by_id_is_idempotent() {
    let (app, services) = test_app();
    let job = services.registry.upsert("daily", "0 6 * * *").await.unwrap();

    let uri = format!("/job/delete?id={}", job.id);
    let (status, _) = send_json(&app, "POST", &uri).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&app, "POST", &uri).await;
    assert_eq!(status, StatusCode::OK);

    assert!(services.registry.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_processes_round_trip() {
    let (app, _) = test_app();

    let (status, body) = send_json(&app, "POST", "/process/add?name=sitemap&type=crawler").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (_, processes) = send_json(&app, "GET", "/process/list").await;
    let processes = processes.as_array().unwrap();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0]["name"], "sitemap");
    assert_eq!(processes[0]["process_type"], "crawler");
}

#[tokio::test]
async fn test_fatal_error_list_and_flush() {
    let (app, services) = test_app();
    for i in 0..105 {
        services
            .sink
            .report(Traceback::new(vec![format!("error {i}")]))
            .await
            .unwrap();
    }

    let (status, errors) = send_json(&app, "GET", "/fatal_error/list").await;
    assert_eq!(status, StatusCode::OK);
    let errors = errors.as_array().unwrap();
    assert_eq!(errors.len(), 100);
    assert_eq!(errors[0]["traceback"][0], "error 104");

    let (status, body) = send_json(&app, "GET", "/fatal_error/flushall").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (_, errors) = send_json(&app, "GET", "/fatal_error/list").await;
    assert!(errors.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_page_raw_passes_bytes_through() {
    let (app, services) = test_app();
    services
        .raw_pages
        .put("w1", "t1", b"<html>ok</html>")
        .await
        .unwrap();

    let request = Request::builder()
        .uri("/task/page_raw?task_id=t1&instance_id=w1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"<html>ok</html>");

    let (status, body) = send_json(&app, "GET", "/task/page_raw?task_id=t2&instance_id=w1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_task_list_by_instance() {
    let (app, services) = test_app();
    services.pool.enqueue("crawl", json!({"page": 1})).await.unwrap();
    services.pool.enqueue("crawl", json!({"page": 2})).await.unwrap();
    let claimed = services.pool.claim("w1").await.unwrap().unwrap();

    let (status, tasks) = send_json(&app, "GET", "/task/list?instance_id=w1").await;
    assert_eq!(status, StatusCode::OK);
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], claimed.id.as_str());

    let (status, body) = send_json(&app, "GET", "/task/list").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_missing_query_params_return_json_errors() {
    let (app, services) = test_app();

    for (method, uri) in [
        ("POST", "/job/add?name=daily"),
        ("POST", "/job/delete"),
        ("POST", "/process/add?name=sitemap"),
        ("GET", "/task/page_raw?task_id=t1"),
    ] {
        let (status, body) = send_json(&app, method, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "BAD_REQUEST", "{uri}");
        assert!(body["message"].as_str().unwrap().contains("missing field"), "{uri}");
    }

    assert!(services.registry.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_service_unavailable() {
    let services = Services::new(&UnreachableStore::handles(), &TestEnv::memory_config());
    let app = create_app(services, None);

    let (status, body) = send_json(&app, "GET", "/job/list").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "STORAGE_UNAVAILABLE");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = test_app();
    let (status, _) = send(&app, "GET", "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let handle = PrometheusBuilder::new().build_recorder().handle();
    let services = Services::in_memory(&TestEnv::memory_config());
    let app = create_app(services, Some(handle));
    let (status, _) = send(&app, "GET", "/metrics").await;
    assert_eq!(status, StatusCode::OK);
}
