use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use fastgets_core::config::RegistryConfig;
use fastgets_core::models::{DueJob, Job, JobDefinition};
use fastgets_core::traits::JobRepository;
use fastgets_core::{FastgetsError, FastgetsResult};

use crate::cron_utils::CronTrigger;

/// 周期任务注册表
///
/// 任务定义按名称唯一。`upsert` 总是删除同名旧定义后重新创建，
/// 新定义拥有新的 `id` 与 `created_at`，因此旧定义尚未补发的触发点会被丢弃。
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<dyn JobRepository>,
    misfire_grace: Duration,
}

impl JobRegistry {
    pub fn new(jobs: Arc<dyn JobRepository>, config: &RegistryConfig) -> Self {
        Self {
            jobs,
            misfire_grace: config.misfire_grace(),
        }
    }

    pub async fn upsert(&self, name: &str, trigger: &str) -> FastgetsResult<Job> {
        self.upsert_definition(JobDefinition::new(name, trigger))
            .await
    }

    /// 先校验触发表达式，校验失败时不修改任何状态
    pub async fn upsert_definition(&self, definition: JobDefinition) -> FastgetsResult<Job> {
        CronTrigger::parse(&definition.trigger)?;

        let job = Job::from_definition(definition);
        let replaced = self.jobs.replace(&job).await?;

        match replaced {
            Some(previous_id) => info!(
                "替换任务定义: {} (旧ID: {}, 新ID: {}, 触发: {})",
                job.name, previous_id, job.id, job.trigger
            ),
            None => info!(
                "创建任务定义: {} (ID: {}, 触发: {})",
                job.name, job.id, job.trigger
            ),
        }

        Ok(job)
    }

    pub async fn get(&self, name: &str) -> FastgetsResult<Job> {
        self.jobs
            .find_by_name(name)
            .await?
            .ok_or_else(|| FastgetsError::JobNotFound {
                name: name.to_string(),
            })
    }

    pub async fn get_by_id(&self, id: &str) -> FastgetsResult<Job> {
        self.jobs
            .find_by_id(id)
            .await?
            .ok_or_else(|| FastgetsError::JobNotFound {
                name: id.to_string(),
            })
    }

    /// 删除不存在的任务不是错误
    pub async fn delete(&self, name: &str) -> FastgetsResult<()> {
        if self.jobs.delete_by_name(name).await? {
            info!("删除任务定义: {}", name);
        } else {
            debug!("任务定义不存在，忽略删除: {}", name);
        }
        Ok(())
    }

    pub async fn delete_by_id(&self, id: &str) -> FastgetsResult<()> {
        if self.jobs.delete_by_id(id).await? {
            info!("删除任务定义 ID: {}", id);
        } else {
            debug!("任务定义ID不存在，忽略删除: {}", id);
        }
        Ok(())
    }

    pub async fn list(&self) -> FastgetsResult<Vec<Job>> {
        self.jobs.list().await
    }

    /// 当前到期的任务
    ///
    /// 在调用时读取一次注册表快照，返回的迭代器按需计算每个任务的触发时间。
    /// 每次调用都从头开始，不保留游标。
    pub async fn due_jobs(&self, now: DateTime<Utc>) -> FastgetsResult<DueJobs> {
        let jobs = self.jobs.list().await?;
        Ok(DueJobs {
            jobs: jobs.into_iter(),
            now,
            misfire_grace: self.misfire_grace,
        })
    }

    pub async fn next_fire_time(
        &self,
        name: &str,
        after: DateTime<Utc>,
    ) -> FastgetsResult<Option<DateTime<Utc>>> {
        let job = self.get(name).await?;
        Ok(CronTrigger::parse(&job.trigger)?.next_after(after))
    }
}

/// [`JobRegistry::due_jobs`] 返回的惰性迭代器
///
/// 任务在区间 `(max(created_at, now - misfire_grace), now]` 内存在触发点时到期，
/// 产出的 `fire_at` 为该区间内最晚的触发点。
#[derive(Debug)]
pub struct DueJobs {
    jobs: std::vec::IntoIter<Job>,
    now: DateTime<Utc>,
    misfire_grace: Duration,
}

impl Iterator for DueJobs {
    type Item = DueJob;

    fn next(&mut self) -> Option<Self::Item> {
        for job in self.jobs.by_ref() {
            if !job.enabled {
                continue;
            }

            let trigger = match CronTrigger::parse(&job.trigger) {
                Ok(trigger) => trigger,
                Err(e) => {
                    warn!("跳过触发表达式无效的任务 {}: {}", job.name, e);
                    continue;
                }
            };

            let window_start = job.created_at.max(self.now - self.misfire_grace);
            if let Some(fire_at) = trigger.latest_fire_between(window_start, self.now) {
                debug!("任务到期: {} @ {}", job.name, fire_at);
                return Some(DueJob { job, fire_at });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fastgets_infrastructure::InMemoryStore;

    fn registry() -> (JobRegistry, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let registry = JobRegistry::new(store.clone(), &RegistryConfig::default());
        (registry, store)
    }

    fn job_created_at(name: &str, trigger: &str, created_at: DateTime<Utc>) -> Job {
        let mut job = Job::from_definition(JobDefinition::new(name, trigger));
        job.created_at = created_at;
        job
    }

    #[tokio::test]
    async fn invalid_trigger_leaves_registry_untouched() {
        let (registry, _) = registry();
        registry.upsert("daily", "0 0 * * *").await.unwrap();

        let err = registry.upsert("daily", "whenever").await.unwrap_err();
        assert!(matches!(err, FastgetsError::InvalidTrigger { .. }));
        assert_eq!(registry.get("daily").await.unwrap().trigger, "0 0 * * *");

        let err = registry.upsert("other", "").await.unwrap_err();
        assert!(matches!(err, FastgetsError::InvalidTrigger { .. }));
        assert!(matches!(
            registry.get("other").await,
            Err(FastgetsError::JobNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn upsert_replaces_existing_definition() {
        let (registry, _) = registry();
        let first = registry.upsert("daily", "0 0 * * *").await.unwrap();
        let second = registry.upsert("daily", "0 6 * * *").await.unwrap();

        assert_ne!(first.id, second.id);
        let jobs = registry.list().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].trigger, "0 6 * * *");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (registry, _) = registry();
        let job = registry.upsert("hourly", "0 * * * *").await.unwrap();

        registry.delete_by_id(&job.id).await.unwrap();
        registry.delete_by_id(&job.id).await.unwrap();
        registry.delete("hourly").await.unwrap();
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn due_jobs_respects_creation_time_and_grace() {
        let (registry, store) = registry();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 30).unwrap();
        let long_ago = now - Duration::days(1);

        store
            .replace(&job_created_at("every-minute", "* * * * *", long_ago))
            .await
            .unwrap();
        // 创建于本次触发点之后，不补发
        store
            .replace(&job_created_at("fresh", "* * * * *", now - Duration::seconds(10)))
            .await
            .unwrap();
        // 上次触发点早于回看窗口
        store
            .replace(&job_created_at("nightly", "0 2 * * *", long_ago))
            .await
            .unwrap();
        let mut disabled = job_created_at("disabled", "* * * * *", long_ago);
        disabled.enabled = false;
        store.replace(&disabled).await.unwrap();

        let due: Vec<DueJob> = registry.due_jobs(now).await.unwrap().collect();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].job.name, "every-minute");
        assert_eq!(
            due[0].fire_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn due_jobs_is_restartable() {
        let (registry, store) = registry();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 30).unwrap();
        store
            .replace(&job_created_at("a", "* * * * *", now - Duration::hours(1)))
            .await
            .unwrap();

        let mut first = registry.due_jobs(now).await.unwrap();
        assert!(first.next().is_some());
        assert!(first.next().is_none());

        let again: Vec<_> = registry.due_jobs(now).await.unwrap().collect();
        assert_eq!(again.len(), 1);
    }

    #[tokio::test]
    async fn next_fire_time_uses_stored_trigger() {
        let (registry, _) = registry();
        registry.upsert("six", "0 6 * * *").await.unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        assert_eq!(
            registry.next_fire_time("six", after).await.unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 6, 0, 0).unwrap())
        );
    }
}
