// [apps/scheduler/src/jobs/ensure_cycles.rs]
//! Job `ensure_cycles` (spec 4.D): abre el siguiente ciclo de
//! facturacion para cada suscripcion ACTIVE que todavia no tenga un
//! ciclo OPEN o CLOSING en curso.
//!
//! El claim de `active_without_open_cycle` ya excluye cualquier
//! suscripcion con un ciclo en vuelo, asi que el caso "cerrar el ciclo
//! OPEN existente antes de abrir el siguiente" de spec 4.D no puede
//! ocurrir dentro de este job: esa transicion es responsabilidad
//! exclusiva de `close_cycles`.

use super::support::{audit, authorize, period_metadata, tenant_span, time_claim};
use crate::state::AppState;
use cadence_domain_billing::{guards, period, SchedulerError};
use cadence_domain_models::{BillingCycle, CycleStatus, Subscription};
use cadence_shared_telemetry::TenantContext;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::Instrument;

pub async fn run(state: AppState, now: DateTime<Utc>) -> Result<(u64, u64), SchedulerError> {
    let limit = state.config.batch_size;
    let subscriptions = time_claim(&state, "subscription", state.subscriptions.active_without_open_cycle(limit)).await?;

    let results = join_all(subscriptions.iter().map(|subscription| {
        let tenant = TenantContext::system(subscription.org_id);
        let span = tenant_span(&tenant);
        try_open_cycle(&state, tenant, subscription, now).instrument(span)
    }))
    .await;

    let mut processed = 0u64;
    let mut errors = 0u64;

    for (subscription, result) in subscriptions.iter().zip(results) {
        match result {
            Ok(OpenOutcome::Opened) => processed += 1,
            Ok(OpenOutcome::NotYetDue) => {
                state.metrics.batch_deferred.with_label_values(&["subscription", "not_yet_due"]).inc();
            }
            Ok(OpenOutcome::LostRace) => {
                state.metrics.batch_deferred.with_label_values(&["subscription", "lost_race"]).inc();
            }
            Err(error) => {
                errors += 1;
                tracing::warn!(%error, subscription_id = %subscription.id, "ensure_cycles failed for subscription");
            }
        }
    }

    state.metrics.batch_processed.with_label_values(&["subscription"]).inc_by(processed as f64);
    Ok((processed, errors))
}

enum OpenOutcome {
    /// Se abrio un ciclo nuevo.
    Opened,
    /// La suscripcion aun no alcanza su proximo `period_start`.
    NotYetDue,
    /// Otra replica ya sostenia el candado puntual de esta suscripcion
    /// cuando se intento abrir el ciclo (spec 4.C); se reintenta en el
    /// proximo tick.
    LostRace,
}

async fn try_open_cycle(state: &AppState, tenant: TenantContext, subscription: &Subscription, now: DateTime<Utc>) -> Result<OpenOutcome, SchedulerError> {
    if !guards::may_open_cycle(subscription, now) {
        return Ok(OpenOutcome::NotYetDue);
    }

    let cycle_type = subscription
        .billing_cycle_type
        .ok_or_else(|| SchedulerError::BusinessRule(format!("subscription {} has no billing_cycle_type", subscription.id)))?;
    let activated_at = subscription
        .activated_at
        .ok_or_else(|| SchedulerError::BusinessRule(format!("subscription {} has no activated_at", subscription.id)))?;

    let period_start = match state.cycles.latest_period_end(subscription.id).await? {
        Some(last_end) => last_end.max(activated_at),
        None => activated_at,
    };

    if period_start > now {
        return Ok(OpenOutcome::NotYetDue);
    }

    let period_end = period::next_period_end(period_start, cycle_type);
    if period_end <= period_start {
        return Err(SchedulerError::BusinessRule(format!(
            "computed period_end {period_end} does not advance past period_start {period_start}"
        )));
    }

    authorize(state, &tenant, "billing_cycle.open").await?;

    let cycle = BillingCycle {
        id: state.next_id(),
        org_id: subscription.org_id,
        subscription_id: subscription.id,
        period_start,
        period_end,
        status: CycleStatus::Open,
        opened_at: now,
        closing_started_at: None,
        rating_completed_at: None,
        closed_at: None,
        invoiced_at: None,
        invoice_finalized_at: None,
        last_error: None,
        last_error_at: None,
    };

    // Vuelve a bloquear la suscripcion por id y, en la misma transaccion,
    // inserta el ciclo (spec 4.C): `None` significa que otra replica ya
    // tiene esa fila bloqueada en este instante.
    let inserted = match state.subscriptions.open_cycle_for_subscription(&cycle).await? {
        None => return Ok(OpenOutcome::LostRace),
        Some(inserted) => inserted,
    };

    if inserted {
        state.metrics.cycle_transitions.with_label_values(&["none", "open"]).inc();
        audit(
            state,
            &tenant,
            "billing_cycle.opened",
            "billing_cycle",
            Some(cycle.id),
            period_metadata(cycle.period_start, cycle.period_end),
            now,
        )
        .await;
        Ok(OpenOutcome::Opened)
    } else {
        Ok(OpenOutcome::NotYetDue)
    }
}
