use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fastgets_core::models::{ErrorRecord, ProcessDescriptor, ScriptLog, Traceback};
use fastgets_core::traits::{
    ErrorRepository, ProcessRepository, RawPageRepository, ScriptFinish, ScriptLogRepository,
};
use fastgets_core::FastgetsResult;

use super::codec::{decode_script_log, encode_script_log, encode_time};
use super::{storage_error, RedisStore};

#[async_trait]
impl ErrorRepository for RedisStore {
    async fn append(&self, record: &ErrorRecord) -> FastgetsResult<()> {
        let doc = serde_json::to_string(record)?;
        let mut conn = self.connection();
        redis::cmd("LPUSH")
            .arg(self.keys.fatal_errors())
            .arg(doc)
            .query_async::<()>(&mut conn)
            .await
            .map_err(storage_error("LPUSH"))
    }

    async fn list_recent(&self, limit: usize) -> FastgetsResult<Vec<ErrorRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection();
        let docs: Vec<String> = redis::cmd("LRANGE")
            .arg(self.keys.fatal_errors())
            .arg(0)
            .arg(limit as i64 - 1)
            .query_async(&mut conn)
            .await
            .map_err(storage_error("LRANGE"))?;
        docs.iter()
            .map(|doc| serde_json::from_str(doc).map_err(Into::into))
            .collect()
    }

    async fn clear(&self) -> FastgetsResult<u64> {
        let key = self.keys.fatal_errors();
        let mut conn = self.connection();
        let (removed,): (u64,) = redis::pipe()
            .atomic()
            .cmd("LLEN")
            .arg(&key)
            .cmd("DEL")
            .arg(&key)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(storage_error("fatal error clear"))?;
        Ok(removed)
    }
}

#[async_trait]
impl ScriptLogRepository for RedisStore {
    async fn insert(&self, log: &ScriptLog) -> FastgetsResult<()> {
        let fields = encode_script_log(log)?;
        let mut conn = self.connection();
        redis::cmd("HSET")
            .arg(self.keys.script_log(&log.id))
            .arg(fields)
            .query_async::<()>(&mut conn)
            .await
            .map_err(storage_error("HSET"))
    }

    async fn finish(
        &self,
        id: &str,
        end_at: DateTime<Utc>,
        traceback: Option<&Traceback>,
    ) -> FastgetsResult<ScriptFinish> {
        let traceback = match traceback {
            Some(traceback) => serde_json::to_string(traceback)?,
            None => String::new(),
        };

        let mut conn = self.connection();
        let outcome: i64 = self
            .scripts
            .finish_script
            .prepare_invoke()
            .key(self.keys.script_log(id))
            .arg(encode_time(&end_at))
            .arg(traceback)
            .invoke_async(&mut conn)
            .await
            .map_err(storage_error("script finish"))?;

        if outcome < 0 {
            return Ok(ScriptFinish::NotFound);
        }
        // a finished log never changes again, so a plain read is consistent
        let Some(log) = ScriptLogRepository::get(self, id).await? else {
            return Ok(ScriptFinish::NotFound);
        };
        Ok(if outcome == 1 {
            ScriptFinish::Finished(log)
        } else {
            ScriptFinish::AlreadyFinished(log)
        })
    }

    async fn get(&self, id: &str) -> FastgetsResult<Option<ScriptLog>> {
        let mut conn = self.connection();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.keys.script_log(id))
            .query_async(&mut conn)
            .await
            .map_err(storage_error("HGETALL"))?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_script_log(&fields).map(Some)
    }
}

#[async_trait]
impl ProcessRepository for RedisStore {
    async fn insert(&self, process: &ProcessDescriptor) -> FastgetsResult<()> {
        let doc = serde_json::to_string(process)?;
        let mut conn = self.connection();
        redis::cmd("HSET")
            .arg(self.keys.processes())
            .arg(&process.id)
            .arg(doc)
            .query_async::<()>(&mut conn)
            .await
            .map_err(storage_error("HSET"))
    }

    async fn list(&self) -> FastgetsResult<Vec<ProcessDescriptor>> {
        let mut conn = self.connection();
        let docs: Vec<String> = redis::cmd("HVALS")
            .arg(self.keys.processes())
            .query_async(&mut conn)
            .await
            .map_err(storage_error("HVALS"))?;
        let mut processes = docs
            .iter()
            .map(|doc| serde_json::from_str::<ProcessDescriptor>(doc))
            .collect::<Result<Vec<_>, _>>()?;
        processes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(processes)
    }
}

#[async_trait]
impl RawPageRepository for RedisStore {
    async fn put(&self, instance_id: &str, task_id: &str, body: &[u8]) -> FastgetsResult<()> {
        let mut conn = self.connection();
        redis::cmd("SET")
            .arg(self.keys.raw_page(instance_id, task_id))
            .arg(body)
            .query_async::<()>(&mut conn)
            .await
            .map_err(storage_error("SET"))
    }

    async fn get(&self, instance_id: &str, task_id: &str) -> FastgetsResult<Option<Vec<u8>>> {
        let mut conn = self.connection();
        redis::cmd("GET")
            .arg(self.keys.raw_page(instance_id, task_id))
            .query_async(&mut conn)
            .await
            .map_err(storage_error("GET"))
    }
}
