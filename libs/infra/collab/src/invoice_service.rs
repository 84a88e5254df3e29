// [libs/infra/collab/src/invoice_service.rs]
/*!
 * Colaboracion con el servicio de facturacion externo (spec 4.G, 6).
 * El scheduler delega la generacion real del documento de factura;
 * solo necesita que el colaborador le confirme el estado resultante
 * para decidir si el ciclo puede avanzar a INVOICED/FINALIZED.
 */

use crate::error::CollabError;
use async_trait::async_trait;
use cadence_core_idgen::Snowflake;
use cadence_domain_models::{BillingCycle, Invoice};
use cadence_infra_db::repositories::InvoiceRepository;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait InvoiceService: Send + Sync {
    /// Solicita la generacion (o recuperacion idempotente) de la factura
    /// de un ciclo cerrado. Debe devolver siempre el mismo `Invoice.id`
    /// para el mismo `billing_cycle_id` (spec 4.G, invariante de unicidad).
    async fn generate_invoice(&self, cycle: &BillingCycle, invoice_id: Snowflake) -> Result<Invoice, CollabError>;

    /// Finaliza una factura DRAFT existente.
    async fn finalize_invoice(&self, invoice: &Invoice, now: DateTime<Utc>) -> Result<Invoice, CollabError>;
}

/// Implementacion determinista respaldada por Postgres: genera facturas
/// DRAFT inmediatamente y las finaliza sin intervencion externa. Sirve
/// de doble de prueba para un proveedor de facturacion real que
/// implementaria el mismo trait contra su propia API.
pub struct PostgresInvoiceService {
    repository: InvoiceRepository,
}

impl PostgresInvoiceService {
    pub fn new(repository: InvoiceRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl InvoiceService for PostgresInvoiceService {
    async fn generate_invoice(&self, cycle: &BillingCycle, invoice_id: Snowflake) -> Result<Invoice, CollabError> {
        self.repository.ensure_draft(invoice_id, cycle.id).await?;
        let invoice = self
            .repository
            .find_by_cycle(cycle.id)
            .await?
            .ok_or_else(|| CollabError::BusinessRule("invoice vanished immediately after insertion".into()))?;
        Ok(invoice)
    }

    async fn finalize_invoice(&self, invoice: &Invoice, now: DateTime<Utc>) -> Result<Invoice, CollabError> {
        self.repository.mark_finalized(invoice.id, now).await?;
        let mut finalized = invoice.clone();
        finalized.status = cadence_domain_models::InvoiceStatus::Finalized;
        finalized.finalized_at = Some(now);
        Ok(finalized)
    }
}
