//! Deferred-work backend.

use std::sync::Arc;

use rusqlite::params;
use uuid::Uuid;

use super::{BackgroundRequest, BackgroundScheduler, BackgroundStrategy, JobId, PendingJob};
use crate::error::SchedulerError;
use crate::storage::Database;

/// Work items enqueued with an initial delay, keyed by UUID.
pub struct WorkScheduler {
    db: Arc<Database>,
}

impl WorkScheduler {
    pub fn new(db: Arc<Database>) -> Result<Self, SchedulerError> {
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS work_items (
                    id               TEXT PRIMARY KEY,
                    enqueued_at_ms   INTEGER NOT NULL,
                    initial_delay_ms INTEGER NOT NULL
                );",
            )
        })?;
        Ok(Self { db })
    }
}

impl BackgroundScheduler for WorkScheduler {
    fn strategy(&self) -> BackgroundStrategy {
        BackgroundStrategy::Work
    }

    fn schedule(&self, request: &BackgroundRequest) -> Result<JobId, SchedulerError> {
        let id = Uuid::new_v4();
        let delay_ms = request.delay_ms().min(i64::MAX as u64) as i64;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO work_items (id, enqueued_at_ms, initial_delay_ms)
                 VALUES (?1, ?2, ?3)",
                params![id.to_string(), request.now_ms, delay_ms],
            )
        })?;
        tracing::info!(%id, delay_ms, "deferred work enqueued");
        Ok(JobId::Work(id))
    }

    fn cancel(&self, job: &JobId) -> Result<bool, SchedulerError> {
        let JobId::Work(id) = job else {
            return Err(SchedulerError::ForeignJob {
                job: job.to_string(),
                strategy: self.strategy().to_string(),
            });
        };
        let removed = self.db.with_conn(|conn| {
            conn.execute("DELETE FROM work_items WHERE id = ?1", params![id.to_string()])
        })?;
        Ok(removed > 0)
    }

    fn cancel_due(&self, job: &JobId, now_ms: i64) -> Result<bool, SchedulerError> {
        let JobId::Work(id) = job else {
            return Err(SchedulerError::ForeignJob {
                job: job.to_string(),
                strategy: self.strategy().to_string(),
            });
        };
        let removed = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM work_items
                 WHERE id = ?1 AND enqueued_at_ms + initial_delay_ms <= ?2",
                params![id.to_string(), now_ms],
            )
        })?;
        Ok(removed > 0)
    }

    fn pending(&self) -> Result<Vec<PendingJob>, SchedulerError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, enqueued_at_ms + initial_delay_ms AS due_at_ms
                 FROM work_items ORDER BY due_at_ms",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let rows = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut pending = Vec::with_capacity(rows.len());
        for (id, due_at_ms) in rows {
            let id = Uuid::parse_str(&id).map_err(|_| SchedulerError::InvalidJobId(id.clone()))?;
            pending.push(PendingJob {
                job_id: JobId::Work(id),
                due_at_ms,
            });
        }
        Ok(pending)
    }
}
