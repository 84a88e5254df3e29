// [libs/domain/billing/src/error.rs]
/*!
 * Taxonomia de errores del scheduler (spec 7). Cada variante mapea a
 * una clase de fallo observable por el runner y por las metricas
 * `job_errors{reason}` / `cycle_errors{stage,error_type}`.
 */

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// El job excedio su presupuesto de tiempo (spec 4.H). No implica que
    /// el efecto subyacente haya fallado: puede seguir en vuelo.
    #[error("[deadline_exceeded] job exceeded its time budget")]
    DeadlineExceeded,

    /// `SELECT ... FOR UPDATE` no pudo adquirir el lock dentro del timeout
    /// configurado de la base de datos.
    #[error("[db_lock_timeout] failed to acquire row lock: {0}")]
    DbLockTimeout(String),

    /// Conflicto de serializacion reportado por Postgres (SQLSTATE 40001).
    #[error("[serialization_failure] transaction could not be serialized: {0}")]
    SerializationFailure(String),

    /// Violacion de una restriccion unica (SQLSTATE 23505), tipicamente
    /// absorbida como exito idempotente segun el contexto del llamador.
    #[error("[unique_violation] unique constraint violated: {0}")]
    UniqueViolation(String),

    /// El actor no tiene autorizacion para la accion solicitada (spec 4.O).
    #[error("[forbidden] actor is not authorized for this action")]
    Forbidden,

    /// Una regla de negocio del dominio de facturacion fue violada
    /// (transicion invalida, suscripcion mal formada, etc).
    #[error("[business_rule] {0}")]
    BusinessRule(String),

    /// Cualquier otro fallo no clasificado, incluyendo errores de
    /// infraestructura no reconocidos.
    #[error("[unknown] {0}")]
    Unknown(String),
}

impl SchedulerError {
    /// Etiqueta estable usada como valor de la dimension `reason`/`error_type`
    /// en las metricas Prometheus (spec 4.N).
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::DbLockTimeout(_) => "db_lock_timeout",
            Self::SerializationFailure(_) => "serialization_failure",
            Self::UniqueViolation(_) => "unique_violation",
            Self::Forbidden => "forbidden",
            Self::BusinessRule(_) => "business_rule",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Errores transitorios que ameritan reintento en el siguiente tick
    /// del runner en vez de escalar (spec 4.D, 4.H).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DeadlineExceeded | Self::DbLockTimeout(_) | Self::SerializationFailure(_)
        )
    }
}
