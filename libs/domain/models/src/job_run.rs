// [libs/domain/models/src/job_run.rs]
/*!
 * Estado efimero de una ejecucion de job, solo en memoria (spec 3).
 * Nunca se persiste; vive mientras dura el runner (componente H).
 */

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct JobRun {
    pub run_id: String,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub processed_count: u64,
    pub error_count: u64,
    pub batch_size: usize,
}

impl JobRun {
    pub fn start(run_id: String, job_name: impl Into<String>, started_at: DateTime<Utc>, batch_size: usize) -> Self {
        Self {
            run_id,
            job_name: job_name.into(),
            started_at,
            processed_count: 0,
            error_count: 0,
            batch_size,
        }
    }

    pub fn record_success(&mut self) {
        self.processed_count += 1;
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }
}
