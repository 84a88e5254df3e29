// [libs/infra/collab/src/authorization_service.rs]
/*!
 * Colaboracion con el sistema de autorizacion externo (spec 4.M).
 * Cada accion administrativa (pausar un job, forzar un recovery sweep)
 * pasa por aqui antes de ejecutarse. La implementacion determinista
 * usada en pruebas y en el arranque por defecto solo permite al actor
 * `system`; cualquier actor humano requiere una implementacion real
 * conectada al proveedor de identidad de la organizacion.
 */

use crate::error::CollabError;
use async_trait::async_trait;
use cadence_domain_models::{Actor, ActorType};

#[async_trait]
pub trait AuthorizationService: Send + Sync {
    async fn authorize(&self, actor: &Actor, action: &str) -> Result<(), CollabError>;
}

pub struct SystemOnlyAuthorizationService;

#[async_trait]
impl AuthorizationService for SystemOnlyAuthorizationService {
    async fn authorize(&self, actor: &Actor, action: &str) -> Result<(), CollabError> {
        match actor.actor_type {
            ActorType::System => Ok(()),
            ActorType::User => Err(CollabError::Forbidden(format!(
                "actor {:?} is not authorized to perform {action}",
                actor.id
            ))),
        }
    }
}
