//! Redis 存储集成测试，需要本地 Docker，默认忽略：
//! `cargo test -p fastgets-infrastructure -- --ignored`

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use fastgets_core::config::StorageConfig;
use fastgets_core::models::{
    ErrorRecord, Job, JobDefinition, ScriptLog, Task, TaskCompletion, TaskState, Traceback,
};
use fastgets_core::traits::{
    BitStore, ErrorRepository, JobRepository, RawPageRepository, ScriptFinish,
    ScriptLogRepository, TaskRepository,
};
use fastgets_infrastructure::RedisStore;
use serde_json::json;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

struct RedisTestSetup {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    store: RedisStore,
}

impl RedisTestSetup {
    async fn new() -> Result<Self> {
        let container = Redis::default().with_tag("7-alpine").start().await?;
        let port = container.get_host_port_ipv4(6379).await?;

        let config = StorageConfig {
            redis_url: format!("redis://localhost:{port}"),
            key_prefix: "fastgets_test".to_string(),
            ..StorageConfig::default()
        };
        let store = RedisStore::connect(&config).await?;

        Ok(Self { container, store })
    }
}

#[tokio::test]
#[ignore]
async fn test_concurrent_claims_never_share_a_task() -> Result<()> {
    let setup = RedisTestSetup::new().await?;
    let store = setup.store;

    for i in 0..50 {
        TaskRepository::insert(
            &store,
            &Task::new("crawl", json!({ "n": i }), format!("fp{i}"), None),
        )
        .await?;
    }

    let mut handles = Vec::new();
    for worker in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let instance = format!("w{worker}");
            let mut claimed = Vec::new();
            while let Some(task) = store.claim_oldest(&instance, Utc::now()).await? {
                assert_eq!(task.state, TaskState::Running);
                assert_eq!(task.instance_id.as_deref(), Some(instance.as_str()));
                claimed.push(task.id);
            }
            Ok::<_, fastgets_core::FastgetsError>(claimed)
        }));
    }

    let mut seen = HashSet::new();
    for result in futures::future::join_all(handles).await {
        for id in result?? {
            assert!(seen.insert(id), "task claimed twice");
        }
    }
    assert_eq!(seen.len(), 50);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_finish_guard_and_instance_listing() -> Result<()> {
    let setup = RedisTestSetup::new().await?;
    let store = setup.store;

    let first = Task::new("crawl", json!({}), "a", Some("origin".to_string()));
    let second = Task::new("crawl", json!({}), "b", Some("origin".to_string()));
    TaskRepository::insert(&store, &first).await?;
    TaskRepository::insert(&store, &second).await?;

    let done = TaskCompletion::Done(json!({"pages": 3}));
    assert!(TaskRepository::finish(&store, &first.id, &done, Utc::now()).await?.is_none());

    let claimed = store.claim_oldest("w1", Utc::now()).await?.unwrap();
    assert_eq!(claimed.id, first.id);

    let finished = TaskRepository::finish(&store, &first.id, &done, Utc::now()).await?.unwrap();
    assert_eq!(finished.state, TaskState::Done);
    assert_eq!(finished.result, Some(json!({"pages": 3})));

    let failed = TaskCompletion::Failed(Traceback::new(vec!["late".to_string()]));
    assert!(TaskRepository::finish(&store, &first.id, &failed, Utc::now()).await?.is_none());

    let mine: Vec<String> = store
        .list_for_instance("w1")
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(mine, vec![first.id.clone()]);

    let origin: Vec<String> = store
        .list_for_instance("origin")
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(origin, vec![second.id.clone()]);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_job_replace_and_delete() -> Result<()> {
    let setup = RedisTestSetup::new().await?;
    let store = setup.store;

    let first = Job::from_definition(JobDefinition::new("nightly", "0 2 * * *"));
    let second = Job::from_definition(JobDefinition::new("nightly", "0 3 * * *"));
    assert_eq!(store.replace(&first).await?, None);
    assert_eq!(store.replace(&second).await?, Some(first.id.clone()));

    assert_eq!(JobRepository::list(&store).await?.len(), 1);
    assert_eq!(store.find_by_name("nightly").await?.unwrap().id, second.id);

    // 删除已被替换的旧ID不影响当前定义
    assert!(!store.delete_by_id(&first.id).await?);
    assert!(store.find_by_name("nightly").await?.is_some());

    assert!(store.delete_by_id(&second.id).await?);
    assert!(store.find_by_name("nightly").await?.is_none());
    assert!(!store.delete_by_name("nightly").await?);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_error_log_and_script_logs() -> Result<()> {
    let setup = RedisTestSetup::new().await?;
    let store = setup.store;

    for i in 0..3 {
        let record = ErrorRecord::new(Traceback::new(vec![format!("error {i}")]), "host-a");
        store.append(&record).await?;
    }
    let recent = store.list_recent(2).await?;
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].traceback.lines(), ["error 2".to_string()]);
    assert_eq!(store.clear().await?, 3);
    assert!(store.list_recent(100).await?.is_empty());

    let log = ScriptLog::start("backfill");
    ScriptLogRepository::insert(&store, &log).await?;
    let traceback = Traceback::new(vec!["partial".to_string()]);
    let finished = ScriptLogRepository::finish(&store, &log.id, Utc::now(), Some(&traceback)).await?;
    assert!(matches!(finished, ScriptFinish::Finished(ref l) if l.traceback == Some(traceback.clone())));

    let again = ScriptLogRepository::finish(&store, &log.id, Utc::now(), None).await?;
    assert!(matches!(again, ScriptFinish::AlreadyFinished(_)));
    assert_eq!(
        ScriptLogRepository::finish(&store, "missing", Utc::now(), None).await?,
        ScriptFinish::NotFound
    );
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_bits_and_raw_pages() -> Result<()> {
    let setup = RedisTestSetup::new().await?;
    let store = setup.store;

    let ttl = Some(Duration::from_secs(3600));
    assert!(!store.test_and_set_bits("dedup", &[3, 70, 4096], ttl).await?);
    assert!(store.test_and_set_bits("dedup", &[3, 70, 4096], ttl).await?);
    assert!(!store.test_and_set_bits("dedup", &[3, 71], ttl).await?);

    store.put("w1", "t1", b"<html></html>").await?;
    assert_eq!(
        RawPageRepository::get(&store, "w1", "t1").await?,
        Some(b"<html></html>".to_vec())
    );
    assert_eq!(RawPageRepository::get(&store, "w1", "t2").await?, None);
    Ok(())
}
