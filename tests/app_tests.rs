use std::time::Duration;

use fastgets::{AppMode, Application, ShutdownManager};
use fastgets_coordinator::Services;
use fastgets_core::{JobDefinition, TaskState};
use fastgets_testing_utils::{TestEnv, UnreachableStore};
use serde_json::json;

fn application() -> Application {
    let config = TestEnv::memory_config();
    let services = Services::in_memory(&config);
    Application::with_services(config, services)
}

#[cfg(unix)]
#[tokio::test]
async fn test_worker_mode_runs_due_shell_job() {
    let app = application();
    let services = app.services().clone();
    services
        .registry
        .upsert_definition(
            JobDefinition::new("echo-every-second", "* * * * * *")
                .with_payload(json!({"type": "shell", "command": "echo", "args": ["fetched"]})),
        )
        .await
        .unwrap();

    let shutdown = ShutdownManager::new();
    let shutdown_rx = shutdown.subscribe().await;
    let handle = tokio::spawn(async move { app.run(AppMode::Worker, shutdown_rx).await });

    let done = TestEnv::wait_for(
        || {
            let services = services.clone();
            async move {
                services
                    .pool
                    .tasks_for_instance("test-worker")
                    .await
                    .map(|tasks| tasks.iter().any(|t| t.state == TaskState::Done))
                    .unwrap_or(false)
            }
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(done, "a due shell job should have completed");

    shutdown.shutdown().await;
    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());

    let tasks = services.pool.tasks_for_instance("test-worker").await.unwrap();
    let done = tasks.iter().find(|t| t.state == TaskState::Done).unwrap();
    assert_eq!(done.result.as_ref().unwrap()["stdout"], "fetched");
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_script_reports_failures() {
    let app = application();

    let result = app
        .run_script("shell", json!({"command": "echo", "args": ["ok"]}))
        .await
        .unwrap();
    assert_eq!(result["stdout"], "ok");

    let err = app
        .run_script("shell", json!({"command": "sh", "args": ["-c", "exit 2"]}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Some(2)"));
}

#[tokio::test]
async fn test_run_script_without_executor() {
    let app = application();
    let err = app.run_script("unknown", json!({})).await.unwrap_err();
    assert!(err.to_string().contains("unknown"));
}

#[tokio::test]
async fn test_all_mode_stops_when_worker_loses_storage() {
    let mut config = TestEnv::memory_config();
    config.api.bind_address = "127.0.0.1:0".to_string();
    let services = Services::new(&UnreachableStore::handles(), &config);
    let app = Application::with_services(config, services);

    let shutdown = ShutdownManager::new();
    let shutdown_rx = shutdown.subscribe().await;
    let handle = tokio::spawn(async move { app.run(AppMode::All, shutdown_rx).await });

    let result = tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("all mode should exit once the worker fails")
        .unwrap();
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("Worker"));
    assert!(!shutdown.is_shutdown().await);
}

#[tokio::test]
async fn test_all_mode_shuts_down_on_signal() {
    let mut config = TestEnv::memory_config();
    config.api.bind_address = "127.0.0.1:0".to_string();
    let services = Services::in_memory(&config);
    let app = Application::with_services(config, services);

    let shutdown = ShutdownManager::new();
    let shutdown_rx = shutdown.subscribe().await;
    let handle = tokio::spawn(async move { app.run(AppMode::All, shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.shutdown().await;
    let result = tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
