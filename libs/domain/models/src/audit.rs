// [libs/domain/models/src/audit.rs]
/*!
 * Rastro de auditoria append-only (spec 3, 4.M). Cada transicion de
 * estado y cada accion administrativa deja una fila aqui.
 */

use crate::{Actor, ActorType, Snowflake};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Snowflake,
    pub org_id: Snowflake,
    pub actor_type: ActorType,
    pub actor_id: Option<Snowflake>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<Snowflake>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn for_actor(
        id: Snowflake,
        org_id: Snowflake,
        actor: &Actor,
        action: impl Into<String>,
        target_type: impl Into<String>,
        target_id: Option<Snowflake>,
        metadata: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            org_id,
            actor_type: actor.actor_type,
            actor_id: actor.id,
            action: action.into(),
            target_type: target_type.into(),
            target_id,
            metadata,
            created_at,
        }
    }
}
