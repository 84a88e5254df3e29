// [libs/infra/collab/src/error.rs]
/*!
 * Errores de colaboracion con sistemas externos. Se traducen a
 * `SchedulerError` en el limite del pipeline (spec 7).
 */

use cadence_domain_billing::SchedulerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("[forbidden] {0}")]
    Forbidden(String),

    #[error("[business_rule] {0}")]
    BusinessRule(String),

    #[error(transparent)]
    Db(#[from] cadence_infra_db::DbError),
}

impl From<CollabError> for SchedulerError {
    fn from(error: CollabError) -> Self {
        match error {
            CollabError::Forbidden(_) => SchedulerError::Forbidden,
            CollabError::BusinessRule(msg) => SchedulerError::BusinessRule(msg),
            CollabError::Db(db_err) => db_err.into(),
        }
    }
}
