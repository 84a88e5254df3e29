// [apps/scheduler/src/jobs/terminate.rs]
//! Job `end_canceled_subs` (spec 4.K): termina suscripciones CANCELED
//! una vez que todos sus ciclos cerrados liquidaron factura.

use super::support::{audit, authorize, tenant_span, time_claim};
use crate::state::AppState;
use cadence_domain_billing::{guards, SchedulerError};
use cadence_domain_models::Subscription;
use cadence_shared_telemetry::TenantContext;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use tracing::Instrument;

pub async fn run(state: AppState, now: DateTime<Utc>) -> Result<(u64, u64), SchedulerError> {
    let limit = state.config.batch_size;
    let subscriptions = time_claim(&state, "subscription", state.subscriptions.canceled_candidates(limit)).await?;

    let results = join_all(subscriptions.iter().map(|subscription| {
        let tenant = TenantContext::system(subscription.org_id);
        let span = tenant_span(&tenant);
        advance(&state, tenant, subscription, now).instrument(span)
    }))
    .await;

    let mut processed = 0u64;
    let mut errors = 0u64;

    for (subscription, result) in subscriptions.iter().zip(results) {
        match result {
            Ok(TerminateOutcome::Ended) => processed += 1,
            Ok(TerminateOutcome::Unsettled) => {
                state.metrics.batch_deferred.with_label_values(&["subscription", "unsettled_cycles"]).inc();
            }
            Ok(TerminateOutcome::LostRace) => {
                state.metrics.batch_deferred.with_label_values(&["subscription", "lost_race"]).inc();
            }
            Err(error) => {
                errors += 1;
                tracing::warn!(%error, subscription_id = %subscription.id, "end_canceled_subs failed for subscription");
            }
        }
    }

    state.metrics.batch_processed.with_label_values(&["subscription"]).inc_by(processed as f64);
    Ok((processed, errors))
}

enum TerminateOutcome {
    /// La suscripcion paso a ENDED.
    Ended,
    /// Todavia tiene ciclos sin liquidar.
    Unsettled,
    /// Otra replica ya sostenia el candado puntual de esta suscripcion
    /// cuando se intento terminarla (spec 4.C); se reintenta en el
    /// proximo tick.
    LostRace,
}

async fn advance(state: &AppState, tenant: TenantContext, subscription: &Subscription, now: DateTime<Utc>) -> Result<TerminateOutcome, SchedulerError> {
    let unsettled = state.subscriptions.count_unsettled_cycles(subscription.id).await?;
    if !guards::may_terminate_subscription(subscription, unsettled as usize) {
        return Ok(TerminateOutcome::Unsettled);
    }

    authorize(state, &tenant, "subscription.end").await?;

    match state.subscriptions.end_subscription(subscription.id).await? {
        None => Ok(TerminateOutcome::LostRace),
        Some(true) => {
            audit(state, &tenant, "subscription.end", "subscription", Some(subscription.id), json!({ "reason": "settled" }), now).await;
            Ok(TerminateOutcome::Ended)
        }
        Some(false) => Ok(TerminateOutcome::Unsettled),
    }
}
