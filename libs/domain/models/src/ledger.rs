// [libs/domain/models/src/ledger.rs]
/*!
 * Libro mayor de doble entrada. `LedgerEntry` es unico por
 * (org_id, source_type, source_id) y cada entrada debe balancear
 * (suma de debitos = suma de creditos), invariante 3.
 */

use crate::Snowflake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Codigo de cuenta contable. Conjunto abierto (spec 3 usa "..."),
/// modelado como newtype con constructores para los codigos conocidos.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerAccountCode(pub String);

impl LedgerAccountCode {
    pub fn accounts_receivable() -> Self {
        Self("accounts_receivable".to_string())
    }
    pub fn revenue_usage() -> Self {
        Self("revenue_usage".to_string())
    }
    pub fn revenue_flat() -> Self {
        Self("revenue_flat".to_string())
    }
    pub fn tax_payable() -> Self {
        Self("tax_payable".to_string())
    }
}

impl fmt::Display for LedgerAccountCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub id: Snowflake,
    pub org_id: Snowflake,
    pub code: LedgerAccountCode,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Direction {
    Debit,
    Credit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Snowflake,
    pub org_id: Snowflake,
    pub source_type: String,
    pub source_id: Snowflake,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
}

/// `source_type` usado para todo asiento creado por el scheduler.
pub const LEDGER_SOURCE_BILLING_CYCLE: &str = "billing_cycle";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntryLine {
    pub id: Snowflake,
    pub entry_id: Snowflake,
    pub account_id: Snowflake,
    pub direction: Direction,
    /// Monto en unidades minimas, siempre positivo (invariante 3).
    pub amount_minor: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_are_stable() {
        assert_eq!(LedgerAccountCode::accounts_receivable().0, "accounts_receivable");
        assert_eq!(LedgerAccountCode::revenue_usage().0, "revenue_usage");
        assert_eq!(LedgerAccountCode::revenue_flat().0, "revenue_flat");
    }
}
