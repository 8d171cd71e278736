use chrono::Utc;

use crate::db::Database;
use crate::error::AppResult;
use crate::models::ReviewTask;

/// Read-side of the review task registry.
///
/// Tasks are created by the submit transition and resolved by the review
/// transition, always in lockstep with the file; this wrapper only exposes
/// the queries built on top of that bookkeeping.
#[derive(Clone)]
pub struct ReviewRegistry {
    db: Database,
}

impl ReviewRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn find_by_file(&self, file_id: &str) -> AppResult<Option<ReviewTask>> {
        self.db.find_task_by_file(file_id)
    }

    pub fn list_pending(&self) -> AppResult<Vec<ReviewTask>> {
        self.db.list_pending_tasks()
    }

    /// Pending tasks that have blown their review deadline.
    pub fn list_overdue(&self) -> AppResult<Vec<ReviewTask>> {
        self.db.list_overdue_tasks(&Utc::now().to_rfc3339())
    }
}
