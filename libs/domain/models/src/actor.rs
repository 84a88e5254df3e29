// [libs/domain/models/src/actor.rs]
/*!
 * Identidad del originador de una accion auditable: el scheduler mismo
 * o un usuario humano que actua a traves de un endpoint administrativo
 * (spec 3, 4.M).
 */

use crate::Snowflake;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ActorType {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub actor_type: ActorType,
    pub id: Option<Snowflake>,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            actor_type: ActorType::System,
            id: None,
        }
    }

    pub fn user(id: Snowflake) -> Self {
        Self {
            actor_type: ActorType::User,
            id: Some(id),
        }
    }
}
