// [libs/domain/models/src/billing_cycle.rs]
/*!
 * Ciclo de facturacion: unica clave de exclusion mutua del scheduler.
 * A lo sumo un ciclo en {OPEN, CLOSING} por suscripcion (invariante 1).
 */

use crate::Snowflake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum CycleStatus {
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingCycle {
    pub id: Snowflake,
    pub org_id: Snowflake,
    pub subscription_id: Snowflake,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub status: CycleStatus,
    pub opened_at: DateTime<Utc>,
    pub closing_started_at: Option<DateTime<Utc>>,
    pub rating_completed_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub invoiced_at: Option<DateTime<Utc>>,
    pub invoice_finalized_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

/// Longitud maxima de `last_error` antes de truncar (spec 4.D).
pub const LAST_ERROR_MAX_LEN: usize = 256;

impl BillingCycle {
    /// Invariante 2: los stamps presentes deben ser monotonos no decrecientes.
    pub fn stamps_are_monotone(&self) -> bool {
        let stamps: Vec<DateTime<Utc>> = [
            Some(self.opened_at),
            self.closing_started_at,
            self.rating_completed_at,
            self.closed_at,
            self.invoiced_at,
            self.invoice_finalized_at,
        ]
        .into_iter()
        .flatten()
        .collect();

        stamps.windows(2).all(|pair| pair[0] <= pair[1])
    }

    pub fn truncate_error(message: &str) -> String {
        if message.chars().count() <= LAST_ERROR_MAX_LEN {
            message.to_string()
        } else {
            message.chars().take(LAST_ERROR_MAX_LEN).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn monotone_stamps_pass() {
        let cycle = BillingCycle {
            id: Snowflake(1),
            org_id: Snowflake(1),
            subscription_id: Snowflake(1),
            period_start: ts(0),
            period_end: ts(1),
            status: CycleStatus::Closed,
            opened_at: ts(0),
            closing_started_at: Some(ts(1)),
            rating_completed_at: Some(ts(2)),
            closed_at: Some(ts(3)),
            invoiced_at: Some(ts(4)),
            invoice_finalized_at: Some(ts(5)),
            last_error: None,
            last_error_at: None,
        };
        assert!(cycle.stamps_are_monotone());
    }

    #[test]
    fn out_of_order_stamps_fail() {
        let mut cycle = BillingCycle {
            id: Snowflake(1),
            org_id: Snowflake(1),
            subscription_id: Snowflake(1),
            period_start: ts(0),
            period_end: ts(1),
            status: CycleStatus::Closing,
            opened_at: ts(0),
            closing_started_at: Some(ts(5)),
            rating_completed_at: Some(ts(1)),
            closed_at: None,
            invoiced_at: None,
            invoice_finalized_at: None,
            last_error: None,
            last_error_at: None,
        };
        assert!(!cycle.stamps_are_monotone());
        cycle.closing_started_at = Some(ts(0));
        assert!(cycle.stamps_are_monotone());
    }

    #[test]
    fn truncates_long_errors() {
        let long = "x".repeat(400);
        let truncated = BillingCycle::truncate_error(&long);
        assert_eq!(truncated.chars().count(), LAST_ERROR_MAX_LEN);
    }
}
