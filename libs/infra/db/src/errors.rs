// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG
 * CLASIFICACION: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACION SEMANTICA DE FALLOS DE PERSISTENCIA
 *
 * Clasifica `sqlx::Error` (y sus SQLSTATE de Postgres) en la taxonomia
 * de `SchedulerError` para que el runner (componente H) y las metricas
 * (componente N) vean una unica nomenclatura de error en todo el
 * workspace, sin importar si el fallo se origino en el dominio puro o
 * en la base de datos.
 * =================================================================
 */

use cadence_domain_billing::SchedulerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("[L3_DB_NET_FAULT]: connection pool unavailable -> {0}")]
    ConnectionError(String),

    #[error("[L3_DB_CONFIG_FAULT]: missing or malformed configuration -> {0}")]
    ConfigurationError(String),

    #[error("[L3_DB_LOCK_FAULT]: row lock not acquired within timeout -> {0}")]
    LockTimeout(String),

    #[error("[L3_DB_SERIALIZATION_FAULT]: transaction could not be serialized -> {0}")]
    SerializationFailure(String),

    #[error("[L3_DB_UNIQUE_FAULT]: unique constraint violated -> {0}")]
    UniqueViolation(String),

    #[error("[L3_DB_QUERY_FAULT]: query rejected -> {0}")]
    Query(#[from] sqlx::Error),

    #[error("[L3_DB_MAPPING_FAULT]: row did not map to the expected domain shape -> {0}")]
    MappingError(String),

    #[error("[L3_DB_MIGRATE_FAULT]: schema migration failed -> {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Clasifica un `sqlx::Error` crudo consultando su SQLSTATE cuando
    /// el driver lo expone, envolviendolo en la variante correspondiente.
    pub fn classify(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = error {
            match db_err.code().as_deref() {
                Some("40001") => return Self::SerializationFailure(db_err.message().to_string()),
                Some("23505") => return Self::UniqueViolation(db_err.message().to_string()),
                Some("55P03") => return Self::LockTimeout(db_err.message().to_string()),
                _ => {}
            }
        }
        Self::Query(error)
    }
}

impl From<DbError> for SchedulerError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::LockTimeout(msg) => SchedulerError::DbLockTimeout(msg),
            DbError::SerializationFailure(msg) => SchedulerError::SerializationFailure(msg),
            DbError::UniqueViolation(msg) => SchedulerError::UniqueViolation(msg),
            other => SchedulerError::Unknown(other.to_string()),
        }
    }
}
