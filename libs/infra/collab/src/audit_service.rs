// [libs/infra/collab/src/audit_service.rs]
/*!
 * Colaboracion con el rastro de auditoria (spec 4.L). Envuelve el
 * repositorio append-only detras de un trait para que el pipeline
 * pueda inyectar una implementacion de prueba que capture eventos en
 * memoria en lugar de escribirlos a Postgres.
 */

use crate::error::CollabError;
use async_trait::async_trait;
use cadence_domain_models::AuditEvent;
use cadence_infra_db::repositories::AuditRepository;

#[async_trait]
pub trait AuditService: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), CollabError>;
}

pub struct PostgresAuditService {
    repository: AuditRepository,
}

impl PostgresAuditService {
    pub fn new(repository: AuditRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AuditService for PostgresAuditService {
    async fn record(&self, event: &AuditEvent) -> Result<(), CollabError> {
        self.repository.record(event).await?;
        Ok(())
    }
}
