/// Key layout for everything fastgets stores in Redis.
///
/// All keys share a configurable prefix so several deployments can use one
/// Redis database.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Hash of job id -> job JSON
    pub fn job_docs(&self) -> String {
        format!("{}:job:docs", self.prefix)
    }

    /// Hash of job name -> job id
    pub fn job_names(&self) -> String {
        format!("{}:job:names", self.prefix)
    }

    /// Prefix shared by all task hashes, used inside Lua scripts
    pub fn task_prefix(&self) -> String {
        format!("{}:task:", self.prefix)
    }

    pub fn task(&self, task_id: &str) -> String {
        format!("{}:task:{}", self.prefix, task_id)
    }

    /// Sorted set of queued task ids scored by enqueue time in microseconds
    pub fn queued(&self) -> String {
        format!("{}:task:queued", self.prefix)
    }

    pub fn instance_tasks(&self, instance_id: &str) -> String {
        format!("{}:task:instance:{}", self.prefix, instance_id)
    }

    pub fn fatal_errors(&self) -> String {
        format!("{}:fatal_error", self.prefix)
    }

    pub fn script_log(&self, id: &str) -> String {
        format!("{}:script_log:{}", self.prefix, id)
    }

    pub fn processes(&self) -> String {
        format!("{}:process", self.prefix)
    }

    pub fn raw_page(&self, instance_id: &str, task_id: &str) -> String {
        format!("{}:page_raw:{}:{}", self.prefix, instance_id, task_id)
    }

    pub fn bitmap(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_share_prefix() {
        let keys = KeySpace::new("crawl");
        assert_eq!(keys.task("abc"), "crawl:task:abc");
        assert!(keys.task("abc").starts_with(&keys.task_prefix()));
        assert_eq!(keys.instance_tasks("w1"), "crawl:task:instance:w1");
        assert_eq!(keys.raw_page("w1", "t1"), "crawl:page_raw:w1:t1");
        assert_eq!(keys.bitmap("dedup"), "crawl:dedup");
    }
}
