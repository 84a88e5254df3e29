// [libs/domain/billing/src/state_machine.rs]
/*!
 * Transiciones puras sobre `BillingCycle`. Cada funcion recibe el ciclo
 * por valor, valida la guarda correspondiente y devuelve la copia
 * actualizada o un `SchedulerError::BusinessRule`. Las funciones no
 * tocan la base de datos: el repositorio (componente C/D) es quien
 * traduce esto en un `UPDATE ... WHERE status = <esperado>` y decide
 * que hacer si la fila ya no cumple la guarda (spec 4.D: otra replica
 * gano la carrera, tratar como exito silencioso).
 */

use crate::error::SchedulerError;
use crate::guards;
use cadence_domain_models::{BillingCycle, CycleStatus, Invoice};
use chrono::{DateTime, Utc};

fn business_rule(message: impl Into<String>) -> SchedulerError {
    SchedulerError::BusinessRule(message.into())
}

pub fn mark_closing(mut cycle: BillingCycle, now: DateTime<Utc>) -> Result<BillingCycle, SchedulerError> {
    if !guards::may_close(&cycle, now) {
        return Err(business_rule(format!(
            "cycle {} is not eligible for closing at {now}",
            cycle.id
        )));
    }
    cycle.status = CycleStatus::Closing;
    cycle.closing_started_at = Some(now);
    Ok(cycle)
}

pub fn mark_rating_completed(mut cycle: BillingCycle, now: DateTime<Utc>) -> Result<BillingCycle, SchedulerError> {
    if !guards::may_mark_rated(&cycle) {
        return Err(business_rule(format!(
            "cycle {} already has a rating result or is not CLOSING",
            cycle.id
        )));
    }
    cycle.rating_completed_at = Some(now);
    Ok(cycle)
}

pub fn mark_closed(mut cycle: BillingCycle, now: DateTime<Utc>) -> Result<BillingCycle, SchedulerError> {
    if !guards::may_close_after_rating(&cycle) {
        return Err(business_rule(format!(
            "cycle {} is not rated or is not CLOSING",
            cycle.id
        )));
    }
    cycle.status = CycleStatus::Closed;
    cycle.closed_at = Some(now);
    Ok(cycle)
}

pub fn mark_invoiced(mut cycle: BillingCycle, now: DateTime<Utc>) -> Result<BillingCycle, SchedulerError> {
    if !guards::may_invoice(&cycle) {
        return Err(business_rule(format!(
            "cycle {} is not CLOSED or already invoiced",
            cycle.id
        )));
    }
    cycle.invoiced_at = Some(now);
    Ok(cycle)
}

pub fn mark_invoice_finalized(
    mut cycle: BillingCycle,
    invoice: &Invoice,
    now: DateTime<Utc>,
) -> Result<BillingCycle, SchedulerError> {
    if !guards::may_finalize(&cycle, invoice) {
        return Err(business_rule(format!(
            "cycle {} invoice is not settled or cycle already finalized",
            cycle.id
        )));
    }
    cycle.invoice_finalized_at = Some(now);
    Ok(cycle)
}

/// Registra un fallo sobre el ciclo sin mutar su `status`: el ciclo
/// permanece elegible para reintento en el proximo tick (spec 4.D, 4.L).
pub fn record_failure(mut cycle: BillingCycle, message: &str, now: DateTime<Utc>) -> BillingCycle {
    cycle.last_error = Some(BillingCycle::truncate_error(message));
    cycle.last_error_at = Some(now);
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_domain_models::{InvoiceStatus, Snowflake};
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, hour, 0, 0).unwrap()
    }

    fn open_cycle() -> BillingCycle {
        BillingCycle {
            id: Snowflake(1),
            org_id: Snowflake(1),
            subscription_id: Snowflake(1),
            period_start: ts(0),
            period_end: ts(1),
            status: CycleStatus::Open,
            opened_at: ts(0),
            closing_started_at: None,
            rating_completed_at: None,
            closed_at: None,
            invoiced_at: None,
            invoice_finalized_at: None,
            last_error: None,
            last_error_at: None,
        }
    }

    #[test]
    fn full_pipeline_advances_through_each_stage() {
        let cycle = open_cycle();
        let cycle = mark_closing(cycle, ts(1)).unwrap();
        assert_eq!(cycle.status, CycleStatus::Closing);
        let cycle = mark_rating_completed(cycle, ts(2)).unwrap();
        let cycle = mark_closed(cycle, ts(3)).unwrap();
        assert_eq!(cycle.status, CycleStatus::Closed);
        let cycle = mark_invoiced(cycle, ts(4)).unwrap();
        let invoice = Invoice {
            id: Snowflake(9),
            billing_cycle_id: cycle.id,
            status: InvoiceStatus::Finalized,
            finalized_at: Some(ts(4)),
        };
        let cycle = mark_invoice_finalized(cycle, &invoice, ts(5)).unwrap();
        assert!(cycle.stamps_are_monotone());
    }

    #[test]
    fn cannot_close_before_period_end() {
        let cycle = open_cycle();
        assert!(mark_closing(cycle, ts(0)).is_err());
    }

    #[test]
    fn cannot_rate_twice() {
        let cycle = open_cycle();
        let cycle = mark_closing(cycle, ts(1)).unwrap();
        let cycle = mark_rating_completed(cycle, ts(2)).unwrap();
        assert!(mark_rating_completed(cycle, ts(3)).is_err());
    }
}
