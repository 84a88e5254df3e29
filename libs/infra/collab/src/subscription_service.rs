// [libs/infra/collab/src/subscription_service.rs]
/*!
 * Colaboracion con el sistema de gestion de suscripciones (spec 3, 6).
 * El scheduler nunca crea ni modifica el estado de una suscripcion
 * salvo la transicion terminal CANCELED -> ENDED, que hace explicita
 * aqui para mantener el mismo patron de capacidad que el resto de
 * colaboradores. `open_cycle_for_subscription`/`end_subscription`
 * vuelven a bloquear la fila puntual por id, dentro de una transaccion,
 * inmediatamente antes de escribir (spec 4.C) — ver el comentario de
 * modulo de `subscriptions.rs` para el porque.
 */

use crate::error::CollabError;
use async_trait::async_trait;
use cadence_domain_models::{BillingCycle, Subscription};
use cadence_infra_db::repositories::SubscriptionRepository;

#[async_trait]
pub trait SubscriptionService: Send + Sync {
    async fn active_without_open_cycle(&self, limit: i64) -> Result<Vec<Subscription>, CollabError>;
    async fn canceled_candidates(&self, limit: i64) -> Result<Vec<Subscription>, CollabError>;
    async fn count_unsettled_cycles(&self, subscription_id: cadence_core_idgen::Snowflake) -> Result<i64, CollabError>;
    /// Vuelve a bloquear la suscripcion del ciclo por id y lo inserta en
    /// la misma transaccion (spec 4.C/4.D). `Ok(None)` si otra replica
    /// sostiene el candado sobre esa fila en este instante.
    async fn open_cycle_for_subscription(&self, cycle: &BillingCycle) -> Result<Option<bool>, CollabError>;
    /// Vuelve a bloquear la suscripcion por id y la termina en la misma
    /// transaccion (spec 4.C/4.K). `Ok(None)` si otra replica sostiene el
    /// candado sobre esa fila en este instante.
    async fn end_subscription(&self, subscription_id: cadence_core_idgen::Snowflake) -> Result<Option<bool>, CollabError>;
}

pub struct PostgresSubscriptionService {
    repository: SubscriptionRepository,
}

impl PostgresSubscriptionService {
    pub fn new(repository: SubscriptionRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl SubscriptionService for PostgresSubscriptionService {
    async fn active_without_open_cycle(&self, limit: i64) -> Result<Vec<Subscription>, CollabError> {
        Ok(self.repository.active_without_open_cycle(limit).await?)
    }

    async fn canceled_candidates(&self, limit: i64) -> Result<Vec<Subscription>, CollabError> {
        Ok(self.repository.canceled_candidates(limit).await?)
    }

    async fn count_unsettled_cycles(&self, subscription_id: cadence_core_idgen::Snowflake) -> Result<i64, CollabError> {
        Ok(self.repository.count_unsettled_cycles(subscription_id).await?)
    }

    async fn open_cycle_for_subscription(&self, cycle: &BillingCycle) -> Result<Option<bool>, CollabError> {
        Ok(self.repository.open_cycle_for_subscription(cycle).await?)
    }

    async fn end_subscription(&self, subscription_id: cadence_core_idgen::Snowflake) -> Result<Option<bool>, CollabError> {
        Ok(self.repository.end_subscription(subscription_id).await?)
    }
}
