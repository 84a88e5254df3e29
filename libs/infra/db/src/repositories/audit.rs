// [libs/infra/db/src/repositories/audit.rs]
/*!
 * Rastro de auditoria append-only (spec 4.M). Nunca se actualiza ni
 * se borra una fila; cada transicion de estado y cada accion
 * administrativa agrega exactamente una.
 */

use crate::errors::DbError;
use cadence_domain_models::AuditEvent;
use sqlx::postgres::PgPool;

mod sql {
    pub const INSERT_EVENT: &str = r#"
        INSERT INTO audit_events
            (id, org_id, actor_type, actor_id, action, target_type, target_id, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    "#;
}

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, event: &AuditEvent) -> Result<(), DbError> {
        sqlx::query(sql::INSERT_EVENT)
            .bind(event.id.as_i64())
            .bind(event.org_id.as_i64())
            .bind(event.actor_type)
            .bind(event.actor_id.map(|id| id.as_i64()))
            .bind(&event.action)
            .bind(&event.target_type)
            .bind(event.target_id.map(|id| id.as_i64()))
            .bind(&event.metadata)
            .bind(event.created_at)
            .execute(&self.pool)
            .await
            .map_err(DbError::classify)?;
        Ok(())
    }
}
