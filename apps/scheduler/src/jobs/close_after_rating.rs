// [apps/scheduler/src/jobs/close_after_rating.rs]
//! Job `close_after_rating` (spec 4.F, 4.D `mark_closed`): postea el
//! asiento contable derivado del resultado de tarificacion ya
//! persistido y cierra el ciclo.

use super::support::{audit, authorize, record_cycle_failure, tenant_span, time_claim};
use crate::state::AppState;
use cadence_domain_billing::{ledger as ledger_logic, SchedulerError};
use cadence_domain_models::{BillingCycle, LedgerEntry, LEDGER_SOURCE_BILLING_CYCLE};
use cadence_shared_telemetry::TenantContext;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::Instrument;

const STAGE: &str = "close_after_rating";

pub async fn run(state: AppState, now: DateTime<Utc>) -> Result<(u64, u64), SchedulerError> {
    let limit = state.config.batch_size;
    let cycles = time_claim(&state, "billing_cycle", state.cycles.claim_closing_rated(limit)).await?;

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
    post_ledger_entry(state, &cycle).await?;

    match state.cycles.try_mark_closed(cycle, now).await? {
        Some(updated) => {
            state.metrics.cycle_transitions.with_label_values(&["closing", "closed"]).inc();
            audit(state, tenant, "billing_cycle.closed", "billing_cycle", Some(updated.id), json!({}), now).await;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Algoritmo de 5 pasos de spec 4.F. Idempotente via el indice unico
/// `(org_id, source_type, source_id)` de `ledger_entries`.
async fn post_ledger_entry(state: &AppState, cycle: &BillingCycle) -> Result<(), SchedulerError> {
    if state.ledger.find_entry_by_source(cycle.org_id, LEDGER_SOURCE_BILLING_CYCLE, cycle.id).await?.is_some() {
        return Ok(());
    }

    let results = state.rating_results.find_by_cycle(cycle.id).await?;
    if results.is_empty() {
        return Err(SchedulerError::BusinessRule(format!(
            "cycle {} has no rating result despite rating_completed_at",
            cycle.id
        )));
    }

    let mut entries = Vec::with_capacity(results.len());
    for result in results {
        let lines = state.rating_results.line_items(result.id).await?;
        entries.push((result, lines));
    }
    let summary = ledger_logic::summarize_rating(&entries)?;

    if summary.grand_total() <= 0 {
        return Ok(());
    }

    let account_ids = state.ledger.ensure_standard_accounts(cycle.org_id, || state.next_id()).await?;

    let entry_id = state.next_id();
    let entry_lines = ledger_logic::build_entry_lines(entry_id, &summary, || state.next_id(), |code| account_ids.get(code).copied())?;

    if entry_lines.is_empty() {
        return Ok(());
    }

    let entry = LedgerEntry {
        id: entry_id,
        org_id: cycle.org_id,
        source_type: LEDGER_SOURCE_BILLING_CYCLE.to_string(),
        source_id: cycle.id,
        currency: summary.currency.clone(),
        occurred_at: cycle.period_end,
    };

    state.ledger.post_entry(&entry, &entry_lines).await?;
    Ok(())
}
