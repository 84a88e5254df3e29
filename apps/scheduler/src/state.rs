// [apps/scheduler/src/state.rs]
/*!
 * Estado compartido del proceso: un `AppState` por binario, clonado
 * (barato, todo detras de `Arc`) hacia cada tarea del runner.
 */

use crate::config::SchedulerConfig;
use cadence_core_clock::Clock;
use cadence_core_idgen::IdGenerator;
use cadence_infra_collab::{AuditService, AuthorizationService, InvoiceService, RatingService, SubscriptionService};
use cadence_infra_db::repositories::{CycleRepository, LedgerRepository, RatingRepository};
use cadence_infra_db::PostgresClient;
use cadence_shared_metrics::SchedulerMetrics;
use std::sync::Arc;

/// Estado compartido de un replica del scheduler. Barato de clonar: todo
/// vive detras de un `Arc` o es ya un handle liviano (`PgPool` interno de
/// `PostgresClient`, repositorios que solo envuelven ese mismo pool).
///
/// `cycles` y `ledger` se exponen como repositorios concretos en lugar de
/// traits de capacidad: spec 3 ("ownership summary") es explicito en que
/// el scheduler es el unico duenio de las transiciones de `BillingCycle` y
/// de la creacion de `LedgerEntry`, a diferencia de rating/invoicing/
/// subscriptions/authorization/audit, que son colaboradores externos
/// sustituibles (de ahi el `Arc<dyn Trait>`).
#[derive(Clone)]
pub struct AppState {
    pub db: PostgresClient,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<IdGenerator>,
    pub metrics: Arc<SchedulerMetrics>,
    pub config: Arc<SchedulerConfig>,
    pub cycles: CycleRepository,
    pub ledger: LedgerRepository,
    /// Lectura directa de resultados de tarificacion ya persistidos, para
    /// el posteo del asiento contable (spec 4.F) — distinto de `rating`,
    /// que es el colaborador que los produce.
    pub rating_results: RatingRepository,
    pub rating: Arc<dyn RatingService>,
    pub invoicing: Arc<dyn InvoiceService>,
    pub subscriptions: Arc<dyn SubscriptionService>,
    pub authorization: Arc<dyn AuthorizationService>,
    pub audit: Arc<dyn AuditService>,
}

impl AppState {
    pub fn next_id(&self) -> cadence_core_idgen::Snowflake {
        self.ids.next_id()
    }
}
