//! Wake-alarm backend.

use std::sync::Arc;

use rusqlite::params;

use super::{BackgroundRequest, BackgroundScheduler, BackgroundStrategy, JobId, PendingJob};
use crate::error::SchedulerError;
use crate::storage::Database;

/// The app only ever holds one alarm; re-arming replaces it.
pub const ALARM_REQUEST_CODE: i32 = 0;

/// One-shot triggers at absolute instants, keyed by request code.
pub struct AlarmScheduler {
    db: Arc<Database>,
}

impl AlarmScheduler {
    pub fn new(db: Arc<Database>) -> Result<Self, SchedulerError> {
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS alarms (
                    request_code  INTEGER PRIMARY KEY,
                    trigger_at_ms INTEGER NOT NULL,
                    armed_at_ms   INTEGER NOT NULL
                );",
            )
        })?;
        Ok(Self { db })
    }
}

impl BackgroundScheduler for AlarmScheduler {
    fn strategy(&self) -> BackgroundStrategy {
        BackgroundStrategy::Alarm
    }

    fn schedule(&self, request: &BackgroundRequest) -> Result<JobId, SchedulerError> {
        let trigger_at_ms = request.due_at_ms();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO alarms (request_code, trigger_at_ms, armed_at_ms)
                 VALUES (?1, ?2, ?3)",
                params![ALARM_REQUEST_CODE, trigger_at_ms, request.now_ms],
            )
        })?;
        tracing::info!(request_code = ALARM_REQUEST_CODE, trigger_at_ms, "wake alarm armed");
        Ok(JobId::Alarm(ALARM_REQUEST_CODE))
    }

    fn cancel(&self, job: &JobId) -> Result<bool, SchedulerError> {
        let JobId::Alarm(code) = job else {
            return Err(SchedulerError::ForeignJob {
                job: job.to_string(),
                strategy: self.strategy().to_string(),
            });
        };
        let removed = self.db.with_conn(|conn| {
            conn.execute("DELETE FROM alarms WHERE request_code = ?1", params![code])
        })?;
        Ok(removed > 0)
    }

    fn cancel_due(&self, job: &JobId, now_ms: i64) -> Result<bool, SchedulerError> {
        let JobId::Alarm(code) = job else {
            return Err(SchedulerError::ForeignJob {
                job: job.to_string(),
                strategy: self.strategy().to_string(),
            });
        };
        let removed = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM alarms WHERE request_code = ?1 AND trigger_at_ms <= ?2",
                params![code, now_ms],
            )
        })?;
        Ok(removed > 0)
    }

    fn pending(&self) -> Result<Vec<PendingJob>, SchedulerError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT request_code, trigger_at_ms FROM alarms ORDER BY trigger_at_ms",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(PendingJob {
                    job_id: JobId::Alarm(row.get(0)?),
                    due_at_ms: row.get(1)?,
                })
            })?;
            let rows = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        Ok(rows)
    }
}
