// [libs/domain/models/src/rating.rs]
/*!
 * Resultado de tarificacion: producido por el servicio de rating externo,
 * consumido unicamente aqui para construir el asiento contable (spec 3, 4.F).
 */

use crate::Snowflake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ChargeType {
    Usage,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingResult {
    pub id: Snowflake,
    pub billing_cycle_id: Snowflake,
    pub org_id: Snowflake,
    pub currency: String,
    pub charge_type: ChargeType,
    pub created_at: DateTime<Utc>,
}

/// Linea de importe asociada a un `RatingResult`, en unidades minimas
/// (centavos) para evitar errores de redondeo en coma flotante.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingLineItem {
    pub id: Snowflake,
    pub rating_result_id: Snowflake,
    pub amount_minor: i64,
}
