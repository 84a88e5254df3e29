// INICIO DEL ARCHIVO [libs/infra/db/src/client.rs]
/*!
 * =================================================================
 * APARATO: DATABASE CONNECTION CLIENT
 * CLASIFICACION: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTION DEL POOL DE CONEXIONES Y MIGRACIONES
 * =================================================================
 */

use crate::errors::DbError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Envuelve un pool ya abierto (por ejemplo, el que entrega
    /// `#[sqlx::test]` a cada caso) sin pasar por `connect`.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        if database_url.is_empty() {
            return Err(DbError::ConfigurationError("DATABASE_URL is empty".into()));
        }

        info!(max_connections, "connecting to postgres pool");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), DbError> {
        crate::schema::MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
// FIN DEL ARCHIVO [libs/infra/db/src/client.rs]
