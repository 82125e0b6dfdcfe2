use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fastgets_core::models::{Task, TaskCompletion};
use fastgets_core::traits::TaskRepository;
use fastgets_core::FastgetsResult;

use super::codec::{decode_task, encode_task, encode_time, queue_score};
use super::{storage_error, RedisStore};

#[async_trait]
impl TaskRepository for RedisStore {
    async fn insert(&self, task: &Task) -> FastgetsResult<()> {
        let fields = encode_task(task)?;
        let score = queue_score(&task.enqueued_at);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("HSET")
            .arg(self.keys.task(&task.id))
            .arg(fields)
            .ignore()
            .cmd("ZADD")
            .arg(self.keys.queued())
            .arg(score)
            .arg(&task.id)
            .ignore();
        if let Some(origin) = &task.origin_instance {
            pipe.cmd("ZADD")
                .arg(self.keys.instance_tasks(origin))
                .arg(score)
                .arg(&task.id)
                .ignore();
        }

        let mut conn = self.connection();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(storage_error("task insert"))
    }

    async fn claim_oldest(
        &self,
        instance_id: &str,
        started_at: DateTime<Utc>,
    ) -> FastgetsResult<Option<Task>> {
        let mut conn = self.connection();
        let fields: Option<HashMap<String, String>> = self
            .scripts
            .claim_oldest
            .prepare_invoke()
            .key(self.keys.queued())
            .arg(self.keys.task_prefix())
            .arg(self.keys.instance_tasks(instance_id))
            .arg(instance_id)
            .arg(encode_time(&started_at))
            .invoke_async(&mut conn)
            .await
            .map_err(storage_error("task claim"))?;
        fields.as_ref().map(decode_task).transpose()
    }

    async fn finish(
        &self,
        task_id: &str,
        completion: &TaskCompletion,
        finished_at: DateTime<Utc>,
    ) -> FastgetsResult<Option<Task>> {
        let (field, outcome) = match completion {
            TaskCompletion::Done(result) => ("result", serde_json::to_string(result)?),
            TaskCompletion::Failed(traceback) => ("traceback", serde_json::to_string(traceback)?),
        };

        let mut conn = self.connection();
        let fields: Option<HashMap<String, String>> = self
            .scripts
            .finish_task
            .prepare_invoke()
            .key(self.keys.task(task_id))
            .arg(completion.target_state().as_str())
            .arg(encode_time(&finished_at))
            .arg(field)
            .arg(outcome)
            .invoke_async(&mut conn)
            .await
            .map_err(storage_error("task finish"))?;
        fields.as_ref().map(decode_task).transpose()
    }

    async fn get(&self, task_id: &str) -> FastgetsResult<Option<Task>> {
        let mut conn = self.connection();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.keys.task(task_id))
            .query_async(&mut conn)
            .await
            .map_err(storage_error("HGETALL"))?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_task(&fields).map(Some)
    }

    async fn list_for_instance(&self, instance_id: &str) -> FastgetsResult<Vec<Task>> {
        let mut conn = self.connection();
        let ids: Vec<String> = redis::cmd("ZRANGE")
            .arg(self.keys.instance_tasks(instance_id))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .map_err(storage_error("ZRANGE"))?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.cmd("HGETALL").arg(self.keys.task(id));
        }
        let rows: Vec<HashMap<String, String>> = pipe
            .query_async(&mut conn)
            .await
            .map_err(storage_error("HGETALL"))?;

        let mut tasks = Vec::with_capacity(rows.len());
        for fields in rows.iter().filter(|fields| !fields.is_empty()) {
            let task = decode_task(fields)?;
            // the origin index keeps ids that another instance has since claimed
            if task.belongs_to(instance_id) {
                tasks.push(task);
            }
        }
        tasks.sort_by(|a, b| a.claim_order().cmp(&b.claim_order()));
        Ok(tasks)
    }
}
