// [libs/domain/billing/src/guards.rs]
/*!
 * Predicados puros de elegibilidad (spec 4.D, 4.K). Ninguna funcion de
 * este modulo toca la base de datos; se usan tanto para decidir el
 * `WHERE status = <esperado>` de la actualizacion condicional como para
 * explicar, en pruebas, por que una transicion fue rechazada.
 */

use cadence_domain_models::{BillingCycle, CycleStatus, Invoice, Subscription, SubscriptionStatus};
use chrono::{DateTime, Utc};

/// Un ciclo puede abrirse para una suscripcion ACTIVE cuyo periodo vigente
/// aun no tiene ciclo (spec 4.D `ensure_cycles`).
pub fn may_open_cycle(subscription: &Subscription, now: DateTime<Utc>) -> bool {
    subscription.status == SubscriptionStatus::Active
        && subscription.activated_at.map(|at| at <= now).unwrap_or(false)
        && subscription.billing_cycle_type.is_some()
}

/// Un ciclo OPEN puede pasar a CLOSING cuando su `period_end` ya paso
/// (spec 4.D `close_cycles`).
pub fn may_close(cycle: &BillingCycle, now: DateTime<Utc>) -> bool {
    cycle.status == CycleStatus::Open && cycle.period_end <= now
}

/// Un ciclo CLOSING puede recibir `rating_completed_at` una sola vez.
pub fn may_mark_rated(cycle: &BillingCycle) -> bool {
    cycle.status == CycleStatus::Closing && cycle.rating_completed_at.is_none()
}

/// Un ciclo CLOSING con tarificacion completa puede cerrarse (CLOSED).
pub fn may_close_after_rating(cycle: &BillingCycle) -> bool {
    cycle.status == CycleStatus::Closing && cycle.rating_completed_at.is_some()
}

/// Un ciclo CLOSED sin `invoiced_at` puede enviarse a facturar.
pub fn may_invoice(cycle: &BillingCycle) -> bool {
    cycle.status == CycleStatus::Closed && cycle.invoiced_at.is_none()
}

/// Un ciclo ya facturado, pendiente de finalizacion, puede finalizarse.
pub fn may_finalize(cycle: &BillingCycle, invoice: &Invoice) -> bool {
    cycle.status == CycleStatus::Closed
        && cycle.invoiced_at.is_some()
        && cycle.invoice_finalized_at.is_none()
        && invoice.settles_for_termination()
}

/// Una suscripcion CANCELED puede terminarse (ENDED) solo cuando todos
/// sus ciclos cerrados ya liquidaron factura (spec 4.K).
pub fn may_terminate_subscription(subscription: &Subscription, open_or_unsettled: usize) -> bool {
    subscription.status == SubscriptionStatus::Canceled && open_or_unsettled == 0
}

/// Un ciclo esta "estancado" si lleva mas de `threshold` sin avanzar desde
/// su ultimo stamp no nulo (spec 4.L, recovery sweeper).
pub fn is_stranded(cycle: &BillingCycle, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
    if cycle.status == CycleStatus::Closed && cycle.invoice_finalized_at.is_some() {
        return false;
    }
    let last_stamp = [
        cycle.invoice_finalized_at,
        cycle.invoiced_at,
        cycle.closed_at,
        cycle.rating_completed_at,
        cycle.closing_started_at,
        Some(cycle.opened_at),
    ]
    .into_iter()
    .flatten()
    .next();

    match last_stamp {
        Some(stamp) => now.signed_duration_since(stamp) > threshold,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_domain_models::Snowflake;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, hour, 0, 0).unwrap()
    }

    fn base_cycle(status: CycleStatus) -> BillingCycle {
        BillingCycle {
            id: Snowflake(1),
            org_id: Snowflake(1),
            subscription_id: Snowflake(1),
            period_start: ts(0),
            period_end: ts(1),
            status,
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
    fn open_cycle_closes_only_after_period_end() {
        let cycle = base_cycle(CycleStatus::Open);
        assert!(!may_close(&cycle, ts(0)));
        assert!(may_close(&cycle, ts(1)));
        assert!(may_close(&cycle, ts(2)));
    }

    #[test]
    fn stranded_detection_respects_threshold() {
        let mut cycle = base_cycle(CycleStatus::Closing);
        cycle.closing_started_at = Some(ts(1));
        assert!(!is_stranded(&cycle, ts(2), chrono::Duration::hours(2)));
        assert!(is_stranded(&cycle, ts(10), chrono::Duration::hours(2)));
    }

    #[test]
    fn finalized_closed_cycle_is_never_stranded() {
        let mut cycle = base_cycle(CycleStatus::Closed);
        cycle.invoice_finalized_at = Some(ts(0));
        assert!(!is_stranded(&cycle, ts(100), chrono::Duration::hours(1)));
    }
}
