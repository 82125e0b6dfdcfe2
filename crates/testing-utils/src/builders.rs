//! Test data builders with sensible defaults.

use chrono::{DateTime, Utc};
use fastgets_core::models::{Job, JobDefinition, Task, TaskState};

/// Builder for [`Job`] entities written straight to a repository
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            job: Job::from_definition(JobDefinition::new(name, "* * * * *")),
        }
    }

    pub fn with_trigger(mut self, trigger: &str) -> Self {
        self.job.trigger = trigger.to_string();
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.job.payload = payload;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.job.created_at = created_at;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.job.enabled = false;
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

/// Builder for [`Task`] entities
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(job_name: &str) -> Self {
        Self {
            task: Task::new(job_name, serde_json::json!({}), "test-fingerprint", None),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.task.id = id.to_string();
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.task.payload = payload;
        self
    }

    pub fn from_origin(mut self, instance_id: &str) -> Self {
        self.task.origin_instance = Some(instance_id.to_string());
        self
    }

    pub fn enqueued_at(mut self, enqueued_at: DateTime<Utc>) -> Self {
        self.task.enqueued_at = enqueued_at;
        self
    }

    pub fn running_on(mut self, instance_id: &str) -> Self {
        self.task.state = TaskState::Running;
        self.task.instance_id = Some(instance_id.to_string());
        self.task.started_at = Some(Utc::now());
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}
