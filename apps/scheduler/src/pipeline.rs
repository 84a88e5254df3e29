// [apps/scheduler/src/pipeline.rs]
//! Componente I: orquestador del pipeline. Ejecuta los siete jobs fijos
//! en el orden de spec 4.I cada tick; ninguno corta la corrida ante el
//! fallo de otro -cada job corre bajo el runner (componente H) y sus
//! resultados se agregan a un resumen de corrida, nunca se abortan en
//! cadena.

use crate::jobs;
use crate::runner::JobRunner;
use crate::state::AppState;
use cadence_domain_models::JobRun;
use cadence_shared_metrics::SchedulerMetrics;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Orden fijo de spec 4.I. No es configurable, salvo por el subconjunto
/// habilitado en `ENABLED_JOBS`.
const PIPELINE_ORDER: &[&str] = &[
    "ensure_cycles",
    "close_cycles",
    "rating",
    "close_after_rating",
    "invoice",
    "end_canceled_subs",
    "recovery_sweep",
];

pub struct Pipeline {
    state: AppState,
    runner: JobRunner,
}

impl Pipeline {
    pub fn new(state: AppState) -> Self {
        let runner = JobRunner::new(state.metrics.clone(), state.config.job_timeout());
        Self { state, runner }
    }

    fn is_enabled(&self, job_name: &str) -> bool {
        match self.state.config.enabled_jobs_list() {
            Some(allowed) => allowed.iter().any(|name| name == job_name),
            None => true,
        }
    }

    /// Ejecuta un tick completo: cada job habilitado corre una vez, en el
    /// orden fijo, sin importar el resultado de los anteriores.
    pub async fn tick(&self) -> Vec<JobRun> {
        let now = self.state.clock.now();
        let mut summaries = Vec::with_capacity(PIPELINE_ORDER.len());

        for job_name in PIPELINE_ORDER {
            if !self.is_enabled(job_name) {
                continue;
            }

            let batch_size = self.state.config.batch_size_for(job_name) as usize;
            let state = self.state.clone();

            let run = match *job_name {
                "ensure_cycles" => self.runner.run(job_name, batch_size, jobs::ensure_cycles::run(state, now)).await,
                "close_cycles" => self.runner.run(job_name, batch_size, jobs::close_cycles::run(state, now)).await,
                "rating" => self.runner.run(job_name, batch_size, jobs::rating::run(state, now)).await,
                "close_after_rating" => self.runner.run(job_name, batch_size, jobs::close_after_rating::run(state, now)).await,
                "invoice" => self.runner.run(job_name, batch_size, jobs::invoice::run(state, now)).await,
                "end_canceled_subs" => self.runner.run(job_name, batch_size, jobs::terminate::run(state, now)).await,
                "recovery_sweep" => self.runner.run(job_name, batch_size, jobs::recovery::run(state, now)).await,
                _ => unreachable!("PIPELINE_ORDER is a fixed constant"),
            };
            summaries.push(run);
        }

        info!(
            tick_at = %now,
            jobs_run = summaries.len(),
            total_processed = summaries.iter().map(|r| r.processed_count).sum::<u64>(),
            total_errors = summaries.iter().map(|r| r.error_count).sum::<u64>(),
            "scheduler tick complete"
        );

        summaries
    }
}

/// Bucle de ticks del componente I: dispara `Pipeline::tick` en cada
/// intervalo configurado y reporta `runloop_lag_seconds` (spec 5) como
/// el desvio entre el instante programado y el instante efectivo.
///
/// `next_scheduled` avanza en `interval` fijos en cada vuelta,
/// independientemente de cuando `ticker.tick()` efectivamente retorne:
/// con `MissedTickBehavior::Delay`, si el pipeline viene atrasado
/// `tick()` retorna de inmediato y reprograma su propio deadline a
/// "ahora + interval", asi que medir el desvio contra el instante
/// capturado justo antes del `await` reportaria ~0 de lag exactamente
/// cuando el atraso real es mayor. Medir contra el calendario fijo
/// evita esa inversion.
pub async fn run_ticker(pipeline: Arc<Pipeline>, interval: Duration, metrics: Arc<SchedulerMetrics>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut next_scheduled = Utc::now() + interval;

    loop {
        ticker.tick().await;
        let actual = Utc::now();
        let lag_seconds = (actual - next_scheduled).num_milliseconds().max(0) as f64 / 1000.0;
        metrics.runloop_lag_seconds.with_label_values(&["scheduler"]).observe(lag_seconds);
        next_scheduled += interval;

        pipeline.tick().await;
    }
}
