// [apps/scheduler/src/jobs/close_cycles.rs]
//! Job `close_cycles` (spec 4.D `mark_closing`): ciclos OPEN cuyo
//! `period_end` ya paso avanzan a CLOSING.

use super::support::{audit, authorize, period_metadata, record_cycle_failure, tenant_span, time_claim};
use crate::state::AppState;
use cadence_domain_billing::SchedulerError;
use cadence_domain_models::BillingCycle;
use cadence_shared_telemetry::TenantContext;
use chrono::{DateTime, Utc};
use tracing::Instrument;

const STAGE: &str = "close_cycles";

pub async fn run(state: AppState, now: DateTime<Utc>) -> Result<(u64, u64), SchedulerError> {
    let limit = state.config.batch_size_for("close_cycles");
    let cycles = time_claim(&state, "billing_cycle", state.cycles.claim_open_past_period_end(now, limit)).await?;

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
    authorize(state, tenant, "billing_cycle.close").await?;

    let period = (cycle.period_start, cycle.period_end);

    match state.cycles.try_mark_closing(cycle, now).await? {
        Some(updated) => {
            state.metrics.cycle_transitions.with_label_values(&["open", "closing"]).inc();
            audit(state, tenant, "billing_cycle.closing_started", "billing_cycle", Some(updated.id), period_metadata(period.0, period.1), now).await;
            Ok(true)
        }
        None => Ok(false),
    }
}
