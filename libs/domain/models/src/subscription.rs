// [libs/domain/models/src/subscription.rs]
/*!
 * Suscripcion: entidad cuya propiedad de ciclo de vida es externa al
 * scheduler. El scheduler solo lee filas ACTIVE y CANCELED (spec 3).
 */

use crate::Snowflake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Draft,
    Active,
    Paused,
    Canceled,
    Ended,
}

/// Cadencia de periodo de facturacion. El conjunto es cerrado: cualquier
/// otro valor debe fallar la creacion de ciclos (spec 4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum BillingCycleType {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Snowflake,
    pub org_id: Snowflake,
    pub status: SubscriptionStatus,
    pub activated_at: Option<DateTime<Utc>>,
    pub billing_cycle_type: Option<BillingCycleType>,
}

impl Subscription {
    /// Invariante de dato (spec 3): ACTIVE implica activated_at y tipo de ciclo.
    pub fn is_well_formed(&self) -> bool {
        if self.status == SubscriptionStatus::Active {
            self.activated_at.is_some() && self.billing_cycle_type.is_some()
        } else {
            true
        }
    }
}
