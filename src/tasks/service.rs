//! Task Service
//! Mission: Create and list tasks for the authenticated owner, within the operation timeout

use crate::tasks::models::{Task, TaskError};
use crate::tasks::store::TaskRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    timeout: Duration,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskRepository>, timeout: Duration) -> Self {
        Self { tasks, timeout }
    }

    pub async fn create(&self, subject_id: &str, title: &str) -> Result<Task, TaskError> {
        let user_id = parse_owner(subject_id)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(TaskError::EmptyTitle);
        }

        let task = timeout(self.timeout, self.tasks.create(user_id, title))
            .await
            .map_err(|_| anyhow::anyhow!("create task timed out"))??;

        info!("Task {} created for user {}", task.id, user_id);
        Ok(task)
    }

    pub async fn fetch_by_user_id(&self, subject_id: &str) -> Result<Vec<Task>, TaskError> {
        let user_id = parse_owner(subject_id)?;
        let tasks = timeout(self.timeout, self.tasks.fetch_by_user_id(user_id))
            .await
            .map_err(|_| anyhow::anyhow!("fetch tasks timed out"))??;
        Ok(tasks)
    }
}

fn parse_owner(subject_id: &str) -> Result<i64, TaskError> {
    subject_id.parse().map_err(|_| TaskError::InvalidOwner)
}
