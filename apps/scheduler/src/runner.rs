// [apps/scheduler/src/runner.rs]
/*!
 * Componente H: runner de jobs. Envuelve cada invocacion con un
 * presupuesto de tiempo blando (spec 4.H): si el job no termina antes
 * del timeout, el runner deja de esperarlo y registra
 * `SchedulerError::DeadlineExceeded`, pero esto NO implica que el
 * trabajo subyacente haya fallado — puede seguir corriendo hasta su
 * proximo checkpoint transaccional y completar en segundo plano. Por
 * eso un timeout nunca se cuenta como `job_errors`, solo como
 * `job_timeouts`: es una senal de presion, no de corrupcion.
 */

use cadence_domain_billing::SchedulerError;
use cadence_domain_models::JobRun;
use cadence_shared_metrics::SchedulerMetrics;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct JobRunner {
    metrics: std::sync::Arc<SchedulerMetrics>,
    timeout: Duration,
}

impl JobRunner {
    pub fn new(metrics: std::sync::Arc<SchedulerMetrics>, timeout: Duration) -> Self {
        Self { metrics, timeout }
    }

    /// Ejecuta `task` como una tarea de Tokio separada y espera su
    /// finalizacion hasta `self.timeout`. Al vencer el plazo el runner
    /// deja de esperar pero NO aborta la tarea: sigue corriendo en el
    /// pool de Tokio hasta su proximo punto de commit transaccional.
    #[instrument(skip(self, task), fields(job = job_name))]
    pub async fn run<Fut>(&self, job_name: &'static str, batch_size: usize, task: Fut) -> JobRun
    where
        Fut: Future<Output = Result<(u64, u64), SchedulerError>> + Send + 'static,
    {
        let started_at = Utc::now();
        let run_id = format!("{job_name}-{}", started_at.timestamp_nanos_opt().unwrap_or_default());
        let mut run = JobRun::start(run_id, job_name, started_at, batch_size);

        self.metrics.job_runs.with_label_values(&[job_name]).inc();
        let timer = self.metrics.job_duration_seconds.with_label_values(&[job_name]).start_timer();

        let handle = tokio::spawn(task);

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(Ok((processed, errors)))) => {
                run.processed_count = processed;
                run.error_count = errors;
                info!(processed, errors, "job completed");
            }
            Ok(Ok(Err(error))) => {
                run.record_error();
                self.metrics
                    .job_errors
                    .with_label_values(&[job_name, error.metric_label()])
                    .inc();
                warn!(%error, "job returned an error");
            }
            Ok(Err(join_error)) => {
                run.record_error();
                self.metrics.job_errors.with_label_values(&[job_name, "unknown"]).inc();
                warn!(%join_error, "job task panicked");
            }
            Err(_elapsed) => {
                self.metrics.job_timeouts.with_label_values(&[job_name]).inc();
                warn!(
                    timeout_seconds = self.timeout.as_secs(),
                    "job exceeded its time budget, letting it run to completion in the background"
                );
            }
        }

        drop(timer);
        run
    }
}
