use async_trait::async_trait;
use fastgets_core::models::Job;
use fastgets_core::traits::JobRepository;
use fastgets_core::FastgetsResult;

use super::{storage_error, RedisStore};

#[async_trait]
impl JobRepository for RedisStore {
    async fn replace(&self, job: &Job) -> FastgetsResult<Option<String>> {
        let doc = serde_json::to_string(job)?;
        let mut conn = self.connection();
        let previous: Option<String> = self
            .scripts
            .replace_job
            .prepare_invoke()
            .key(self.keys.job_docs())
            .key(self.keys.job_names())
            .arg(&job.id)
            .arg(&job.name)
            .arg(doc)
            .invoke_async(&mut conn)
            .await
            .map_err(storage_error("job replace"))?;
        Ok(previous)
    }

    async fn find_by_name(&self, name: &str) -> FastgetsResult<Option<Job>> {
        let mut conn = self.connection();
        let id: Option<String> = redis::cmd("HGET")
            .arg(self.keys.job_names())
            .arg(name)
            .query_async(&mut conn)
            .await
            .map_err(storage_error("HGET"))?;
        match id {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: &str) -> FastgetsResult<Option<Job>> {
        let mut conn = self.connection();
        let doc: Option<String> = redis::cmd("HGET")
            .arg(self.keys.job_docs())
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(storage_error("HGET"))?;
        doc.map(|doc| serde_json::from_str(&doc).map_err(Into::into))
            .transpose()
    }

    async fn delete_by_name(&self, name: &str) -> FastgetsResult<bool> {
        let mut conn = self.connection();
        let removed: i64 = self
            .scripts
            .delete_job_by_name
            .prepare_invoke()
            .key(self.keys.job_docs())
            .key(self.keys.job_names())
            .arg(name)
            .invoke_async(&mut conn)
            .await
            .map_err(storage_error("job delete"))?;
        Ok(removed == 1)
    }

    async fn delete_by_id(&self, id: &str) -> FastgetsResult<bool> {
        let mut conn = self.connection();
        let removed: i64 = self
            .scripts
            .delete_job_by_id
            .prepare_invoke()
            .key(self.keys.job_docs())
            .key(self.keys.job_names())
            .arg(id)
            .invoke_async(&mut conn)
            .await
            .map_err(storage_error("job delete"))?;
        Ok(removed == 1)
    }

    async fn list(&self) -> FastgetsResult<Vec<Job>> {
        let mut conn = self.connection();
        let docs: Vec<String> = redis::cmd("HVALS")
            .arg(self.keys.job_docs())
            .query_async(&mut conn)
            .await
            .map_err(storage_error("HVALS"))?;
        let mut jobs = docs
            .iter()
            .map(|doc| serde_json::from_str::<Job>(doc))
            .collect::<Result<Vec<_>, _>>()?;
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }
}
