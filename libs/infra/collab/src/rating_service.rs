// [libs/infra/collab/src/rating_service.rs]
/*!
 * Componente de colaboracion con el motor de tarificacion externo
 * (spec 4.F, 6). El contrato real de tarificacion (consumo medido,
 * tablas de precio) vive fuera del scheduler; aqui solo se modela la
 * forma de la llamada y una implementacion determinista respaldada
 * por Postgres para pruebas y para los escenarios S1-S6.
 */

use crate::error::CollabError;
use async_trait::async_trait;
use cadence_domain_models::{BillingCycle, ChargeType, RatingLineItem, RatingResult};
use cadence_infra_db::repositories::RatingRepository;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait RatingService: Send + Sync {
    /// Produce (o recupera, si ya existia) los resultados de tarificacion
    /// del ciclo: spec 3 solo exige "al menos un resultado", no exactamente
    /// uno — un periodo puede acumular un cargo plano y uno de uso a la
    /// vez. Debe ser idempotente por `charge_type`: llamar dos veces para
    /// el mismo ciclo nunca debe duplicar un resultado ya producido
    /// (invariante 4).
    async fn rate_cycle(
        &self,
        cycle: &BillingCycle,
        next_result_id: &mut dyn FnMut() -> cadence_core_idgen::Snowflake,
        next_line_item_id: &mut dyn FnMut() -> cadence_core_idgen::Snowflake,
        now: DateTime<Utc>,
    ) -> Result<Vec<(RatingResult, Vec<RatingLineItem>)>, CollabError>;
}

/// Implementacion determinista: cada suscripcion acumula un cargo
/// plano fijo por periodo. Sirve como doble de prueba y como base
/// razonable para desarrollo antes de que un motor de rating real
/// reemplace esta clase via el mismo trait.
pub struct FlatRateRatingService {
    repository: RatingRepository,
    flat_amount_minor: i64,
    currency: String,
}

impl FlatRateRatingService {
    pub fn new(repository: RatingRepository, flat_amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            repository,
            flat_amount_minor,
            currency: currency.into(),
        }
    }
}

#[async_trait]
impl RatingService for FlatRateRatingService {
    async fn rate_cycle(
        &self,
        cycle: &BillingCycle,
        next_result_id: &mut dyn FnMut() -> cadence_core_idgen::Snowflake,
        next_line_item_id: &mut dyn FnMut() -> cadence_core_idgen::Snowflake,
        now: DateTime<Utc>,
    ) -> Result<Vec<(RatingResult, Vec<RatingLineItem>)>, CollabError> {
        if let Some(existing) = self.repository.find_by_cycle_and_charge_type(cycle.id, ChargeType::Flat).await? {
            let lines = self.repository.line_items(existing.id).await?;
            return Ok(vec![(existing, lines)]);
        }

        let result = RatingResult {
            id: next_result_id(),
            billing_cycle_id: cycle.id,
            org_id: cycle.org_id,
            currency: self.currency.clone(),
            charge_type: ChargeType::Flat,
            created_at: now,
        };
        let lines = vec![RatingLineItem {
            id: next_line_item_id(),
            rating_result_id: result.id,
            amount_minor: self.flat_amount_minor,
        }];

        self.repository.insert_result(&result, &lines).await?;
        Ok(vec![(result, lines)])
    }
}
