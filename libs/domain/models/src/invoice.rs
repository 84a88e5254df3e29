// [libs/domain/models/src/invoice.rs]
/*!
 * Vista del scheduler sobre la factura gestionada por el servicio de
 * facturacion externo (spec 3, 4.G). El scheduler nunca escribe estas
 * filas directamente salvo a traves de la coleccion de cobaboradores.
 */

use crate::Snowflake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    Draft,
    Finalized,
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Snowflake,
    pub billing_cycle_id: Snowflake,
    pub status: InvoiceStatus,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Elegibilidad de terminacion de suscripcion (spec 4.K): la factura
    /// de cada ciclo cerrado debe estar FINALIZED o VOID.
    pub fn settles_for_termination(&self) -> bool {
        matches!(self.status, InvoiceStatus::Finalized | InvoiceStatus::Void)
    }
}
