// [libs/shared/metrics/src/lib.rs]
/*!
 * =================================================================
 * APARATO: SCHEDULER METRICS
 * CLASIFICACION: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: CONTADORES E HISTOGRAMAS PROMETHEUS DEL RUNNER
 *
 * Un `SchedulerMetrics` por proceso, registrado en un `prometheus::Registry`
 * propio (no el `default_registry()` global) para que el arranque en
 * pruebas no colisione con registros de procesos hermanos.
 * =================================================================
 */

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec, HistogramVec, Registry,
};

#[derive(Clone)]
pub struct SchedulerMetrics {
    registry: Registry,
    pub job_runs: CounterVec,
    pub job_timeouts: CounterVec,
    pub job_errors: CounterVec,
    pub batch_processed: CounterVec,
    pub batch_deferred: CounterVec,
    pub cycle_transitions: CounterVec,
    pub cycle_errors: CounterVec,
    pub job_duration_seconds: HistogramVec,
    pub db_lock_wait_seconds: HistogramVec,
    pub runloop_lag_seconds: HistogramVec,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let job_runs = register_counter_vec_with_registry!(
            "job_runs_total",
            "Total de ejecuciones de job iniciadas, una por tick del runner",
            &["job"],
            registry
        )
        .expect("job_runs_total registers once per process");

        let job_timeouts = register_counter_vec_with_registry!(
            "job_timeouts_total",
            "Total de ejecuciones que excedieron su presupuesto de tiempo",
            &["job"],
            registry
        )
        .expect("job_timeouts_total registers once per process");

        let job_errors = register_counter_vec_with_registry!(
            "job_errors_total",
            "Total de errores observados durante la ejecucion de un job, por razon",
            &["job", "reason"],
            registry
        )
        .expect("job_errors_total registers once per process");

        let batch_processed = register_counter_vec_with_registry!(
            "batch_processed_total",
            "Total de filas procesadas exitosamente por tipo de recurso",
            &["resource"],
            registry
        )
        .expect("batch_processed_total registers once per process");

        let batch_deferred = register_counter_vec_with_registry!(
            "batch_deferred_total",
            "Total de filas diferidas al siguiente tick, por razon",
            &["resource", "reason"],
            registry
        )
        .expect("batch_deferred_total registers once per process");

        let cycle_transitions = register_counter_vec_with_registry!(
            "cycle_transitions_total",
            "Total de transiciones de estado de ciclo de facturacion",
            &["from", "to"],
            registry
        )
        .expect("cycle_transitions_total registers once per process");

        let cycle_errors = register_counter_vec_with_registry!(
            "cycle_errors_total",
            "Total de errores de ciclo por etapa del pipeline y tipo de error",
            &["stage", "error_type"],
            registry
        )
        .expect("cycle_errors_total registers once per process");

        let job_duration_seconds = register_histogram_vec_with_registry!(
            "job_duration_seconds",
            "Duracion de una ejecucion de job completa",
            &["job"],
            registry
        )
        .expect("job_duration_seconds registers once per process");

        let db_lock_wait_seconds = register_histogram_vec_with_registry!(
            "db_lock_wait_seconds",
            "Tiempo de espera para adquirir un lock de fila, por recurso",
            &["resource"],
            registry
        )
        .expect("db_lock_wait_seconds registers once per process");

        let runloop_lag_seconds = register_histogram_vec_with_registry!(
            "runloop_lag_seconds",
            "Retraso entre el tick programado y el tick efectivo del pipeline",
            &["pipeline"],
            registry
        )
        .expect("runloop_lag_seconds registers once per process");

        Self {
            registry,
            job_runs,
            job_timeouts,
            job_errors,
            batch_processed,
            batch_deferred,
            cycle_transitions,
            cycle_errors,
            job_duration_seconds,
            db_lock_wait_seconds,
            runloop_lag_seconds,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_job_run_and_duration() {
        let metrics = SchedulerMetrics::new();
        metrics.job_runs.with_label_values(&["ensure_cycles"]).inc();
        metrics
            .job_duration_seconds
            .with_label_values(&["ensure_cycles"])
            .observe(0.42);

        assert_eq!(metrics.job_runs.with_label_values(&["ensure_cycles"]).get(), 1.0);
    }

    #[test]
    fn distinct_registries_do_not_collide() {
        let a = SchedulerMetrics::new();
        let b = SchedulerMetrics::new();
        a.job_runs.with_label_values(&["rating"]).inc();
        assert_eq!(b.job_runs.with_label_values(&["rating"]).get(), 0.0);
    }
}
