// [apps/scheduler/src/jobs/support.rs]
//! Rutinas compartidas por los jobs: verificacion de autorizacion antes
//! de cualquier transicion mutante (spec 4.O), registro de auditoria
//! (spec 4.M) y marcado de fallos sobre el ciclo (spec 4.D, 4.N).

use crate::state::AppState;
use cadence_domain_billing::SchedulerError;
use cadence_domain_models::{AuditEvent, Snowflake};
use cadence_shared_telemetry::TenantContext;
use chrono::{DateTime, Utc};
use serde_json::json;

/// Verifica que `tenant.actor` puede ejecutar `action` antes de
/// cualquier mutacion. El scheduler siempre propaga `TenantContext::
/// system(org_id)`: no hay otro originador posible para un job de
/// fondo, pero el `org_id` del tenant si varia fila a fila.
pub async fn authorize(state: &AppState, tenant: &TenantContext, action: &str) -> Result<(), SchedulerError> {
    state.authorization.authorize(&tenant.actor, action).await.map_err(SchedulerError::from)
}

/// Emite un evento de auditoria best-effort. Un fallo al escribirlo no
/// deshace la transicion ya confirmada: solo se registra en el log.
pub async fn audit(
    state: &AppState,
    tenant: &TenantContext,
    action: &str,
    target_type: &str,
    target_id: Option<Snowflake>,
    metadata: serde_json::Value,
    now: DateTime<Utc>,
) {
    let event = AuditEvent::for_actor(state.next_id(), tenant.org_id, &tenant.actor, action, target_type, target_id, metadata, now);
    if let Err(error) = state.audit.record(&event).await {
        tracing::warn!(%error, action, "audit write failed, state transition already committed");
    }
}

/// Span de tenant (spec 4.O): entra en alcance al principio de cada
/// `advance`/`try_open_cycle` por fila, de modo que cada linea de log
/// emitida mientras esa fila se procesa lleve su `org_id`.
pub fn tenant_span(tenant: &TenantContext) -> tracing::Span {
    tracing::info_span!("tenant", org_id = %tenant.org_id)
}

/// Registra el fallo sobre el ciclo y cuenta la metrica de error de
/// etapa, sin abortar el job (spec 4.D: "errors are recorded per-row").
pub async fn record_cycle_failure(state: &AppState, stage: &'static str, cycle_id: Snowflake, error: &SchedulerError, now: DateTime<Utc>) {
    state.metrics.cycle_errors.with_label_values(&[stage, error.metric_label()]).inc();
    if let Err(db_error) = state.cycles.record_error(cycle_id, &error.to_string(), now).await {
        tracing::warn!(%db_error, stage, %cycle_id, "failed to persist cycle error marker");
    }
}

pub fn period_metadata(period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> serde_json::Value {
    json!({ "period_start": period_start, "period_end": period_end })
}

/// Envuelve un claim (`SELECT ... FOR UPDATE SKIP LOCKED`) con el
/// histograma `db_lock_wait_seconds{resource}` (spec 4.C, 4.N): el
/// tiempo medido incluye la espera de lock y el propio round-trip de
/// red, ya que el driver no expone ambos por separado.
pub async fn time_claim<T>(state: &AppState, resource: &str, fut: impl std::future::Future<Output = T>) -> T {
    let timer = state.metrics.db_lock_wait_seconds.with_label_values(&[resource]).start_timer();
    let result = fut.await;
    drop(timer);
    result
}
