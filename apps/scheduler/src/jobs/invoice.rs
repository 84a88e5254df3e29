// [apps/scheduler/src/jobs/invoice.rs]
//! Job `invoice` (spec 4.G): coordina con el servicio externo de
//! facturacion y estampa `invoiced_at` / `invoice_finalized_at`.

use super::support::{audit, authorize, record_cycle_failure, tenant_span, time_claim};
use crate::state::AppState;
use cadence_domain_billing::SchedulerError;
use cadence_domain_models::{BillingCycle, InvoiceStatus};
use cadence_shared_telemetry::TenantContext;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::Instrument;

const STAGE: &str = "invoice";

pub async fn run(state: AppState, now: DateTime<Utc>) -> Result<(u64, u64), SchedulerError> {
    let limit = state.config.batch_size_for("invoice");
    let cycles = time_claim(&state, "billing_cycle", state.cycles.claim_closed_uninvoiced(limit)).await?;

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

/// Protocolo de tres pasos de spec 4.G: generar, estampar `invoiced_at`,
/// y -salvo que `FINALIZE_INVOICES` este desactivado- finalizar.
pub(crate) async fn advance(state: &AppState, cycle: BillingCycle, now: DateTime<Utc>) -> Result<bool, SchedulerError> {
    let tenant = TenantContext::system(cycle.org_id);
    advance_in_tenant(state, &tenant, cycle, now).instrument(tenant_span(&tenant)).await
}

async fn advance_in_tenant(state: &AppState, tenant: &TenantContext, cycle: BillingCycle, now: DateTime<Utc>) -> Result<bool, SchedulerError> {
    authorize(state, tenant, "billing_cycle.invoice").await?;

    let invoice_id = state.next_id();
    let invoice = state.invoicing.generate_invoice(&cycle, invoice_id).await?;

    let invoiced_cycle = match state.cycles.try_mark_invoiced(cycle, now).await? {
        Some(updated) => {
            state.metrics.cycle_transitions.with_label_values(&["closed", "closed"]).inc();
            audit(state, tenant, "billing_cycle.invoiced", "billing_cycle", Some(updated.id), json!({ "invoice_id": invoice.id }), now).await;
            updated
        }
        None => return Ok(false),
    };

    if !state.config.finalize_invoices {
        return Ok(true);
    }

    let finalized = match invoice.status {
        InvoiceStatus::Draft => state.invoicing.finalize_invoice(&invoice, now).await?,
        _ => invoice,
    };

    if let Some(finalized_cycle) = state.cycles.try_mark_finalized(invoiced_cycle, &finalized, now).await? {
        state.metrics.cycle_transitions.with_label_values(&["closed", "closed"]).inc();
        audit(state, tenant, "billing_cycle.invoice_finalized", "billing_cycle", Some(finalized_cycle.id), json!({ "invoice_id": finalized.id }), now).await;
    }

    Ok(true)
}
