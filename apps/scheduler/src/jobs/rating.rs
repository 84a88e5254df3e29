// [apps/scheduler/src/jobs/rating.rs]
//! Job `rating` (spec 4.C, 4.F): invoca al colaborador de tarificacion
//! para cada ciclo CLOSING sin `rating_completed_at` y estampa
//! `mark_rating_completed` al terminar.

use super::support::{audit, authorize, record_cycle_failure, tenant_span, time_claim};
use crate::state::AppState;
use cadence_domain_billing::SchedulerError;
use cadence_domain_models::BillingCycle;
use cadence_shared_telemetry::TenantContext;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::Instrument;

const STAGE: &str = "rating";

pub async fn run(state: AppState, now: DateTime<Utc>) -> Result<(u64, u64), SchedulerError> {
    let limit = state.config.batch_size_for("rating");
    let cycles = time_claim(&state, "billing_cycle", state.cycles.claim_closing_unrated(limit)).await?;

    let mut processed = 0u64;
    let mut errors = 0u64;

    for cycle in cycles {
        let cycle_id = cycle.id;
        match advance(&state, cycle, now).await {
            Ok(true) => processed += 1,
            Ok(false) => {
                state.metrics.batch_deferred.with_label_values(&["billing_cycle", "lost_race"]).inc();
            }
            Err(error) => {
                errors += 1;
                record_cycle_failure(&state, STAGE, cycle_id, &error, now).await;
            }
        }
    }

    state.metrics.batch_processed.with_label_values(&["billing_cycle"]).inc_by(processed as f64);
    Ok((processed, errors))
}

pub(crate) async fn advance(state: &AppState, cycle: BillingCycle, now: DateTime<Utc>) -> Result<bool, SchedulerError> {
    let tenant = TenantContext::system(cycle.org_id);
    advance_in_tenant(state, &tenant, cycle, now).instrument(tenant_span(&tenant)).await
}

async fn advance_in_tenant(state: &AppState, tenant: &TenantContext, cycle: BillingCycle, now: DateTime<Utc>) -> Result<bool, SchedulerError> {
    authorize(state, tenant, "billing_cycle.rate").await?;

    let ids = state.ids.clone();
    let mut next_result_id = move || ids.next_id();
    let ids = state.ids.clone();
    let mut next_line_item_id = move || ids.next_id();

    let results = state.rating.rate_cycle(&cycle, &mut next_result_id, &mut next_line_item_id, now).await?;
    if results.is_empty() {
        return Err(SchedulerError::BusinessRule(format!("rating produced no results for cycle {}", cycle.id)));
    }

    match state.cycles.try_mark_rated(cycle, now).await? {
        Some(updated) => {
            state.metrics.cycle_transitions.with_label_values(&["closing", "closing"]).inc();
            audit(
                state,
                tenant,
                "billing_cycle.rated",
                "billing_cycle",
                Some(updated.id),
                json!({
                    "rating_result_ids": results.iter().map(|(result, _)| result.id.as_i64()).collect::<Vec<_>>(),
                    "line_count": results.iter().map(|(_, lines)| lines.len()).sum::<usize>(),
                }),
                now,
            )
            .await;
            Ok(true)
        }
        None => Ok(false),
    }
}
