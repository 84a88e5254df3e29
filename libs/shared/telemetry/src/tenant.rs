// [libs/shared/telemetry/src/tenant.rs]
/*!
 * Contexto de tenant/actor propagado a traves del runner hacia cada
 * job y cada asiento de auditoria (spec 4.M, 4.O).
 */

use cadence_domain_models::{Actor, Snowflake};

#[derive(Debug, Clone)]
pub struct TenantContext {
    pub org_id: Snowflake,
    pub actor: Actor,
}

impl TenantContext {
    pub fn system(org_id: Snowflake) -> Self {
        Self {
            org_id,
            actor: Actor::system(),
        }
    }
}
