// [libs/infra/db/src/repositories/ledger.rs]
/*!
 * Posteo de asientos contables (spec 4.F). `ledger_entries` tiene un
 * indice unico en `(org_id, source_type, source_id)`: postear dos
 * veces para el mismo ciclo es una operacion idempotente, nunca un
 * doble asiento (invariante 3/4).
 */

use crate::errors::DbError;
use cadence_domain_models::{LedgerAccount, LedgerAccountCode, LedgerEntry, LedgerEntryLine, Snowflake};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::HashMap;

mod sql {
    pub const SELECT_ACCOUNTS_FOR_ORG: &str = r#"
        SELECT id, org_id, code, name FROM ledger_accounts WHERE org_id = $1
    "#;

    pub const INSERT_ACCOUNT: &str = r#"
        INSERT INTO ledger_accounts (id, org_id, code, name) VALUES ($1, $2, $3, $4)
        ON CONFLICT (org_id, code) DO NOTHING
    "#;

    pub const INSERT_ENTRY: &str = r#"
        INSERT INTO ledger_entries (id, org_id, source_type, source_id, currency, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (org_id, source_type, source_id) DO NOTHING
    "#;

    pub const INSERT_ENTRY_LINE: &str = r#"
        INSERT INTO ledger_entry_lines (id, entry_id, account_id, direction, amount_minor)
        VALUES ($1, $2, $3, $4, $5)
    "#;

    pub const SELECT_ENTRY_BY_SOURCE: &str = r#"
        SELECT id FROM ledger_entries WHERE org_id = $1 AND source_type = $2 AND source_id = $3
    "#;
}

#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Devuelve el mapa codigo -> cuenta de la organizacion, creando las
    /// cuentas estandar que falten (spec 4.F: cuentas se provisionan de forma perezosa).
    pub async fn ensure_standard_accounts(
        &self,
        org_id: Snowflake,
        mut next_account_id: impl FnMut() -> Snowflake,
    ) -> Result<HashMap<LedgerAccountCode, Snowflake>, DbError> {
        let standard = [
            (LedgerAccountCode::accounts_receivable(), "Accounts Receivable"),
            (LedgerAccountCode::revenue_usage(), "Usage Revenue"),
            (LedgerAccountCode::revenue_flat(), "Flat Revenue"),
            (LedgerAccountCode::tax_payable(), "Tax Payable"),
        ];

        for (code, name) in &standard {
            sqlx::query(sql::INSERT_ACCOUNT)
                .bind(next_account_id().as_i64())
                .bind(org_id.as_i64())
                .bind(code.to_string())
                .bind(*name)
                .execute(&self.pool)
                .await
                .map_err(DbError::classify)?;
        }

        let rows = sqlx::query(sql::SELECT_ACCOUNTS_FOR_ORG)
            .bind(org_id.as_i64())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::classify)?;

        let mut map = HashMap::new();
        for row in &rows {
            let account = row_to_account(row)?;
            map.insert(account.code, account.id);
        }
        Ok(map)
    }

    /// Devuelve el id de entrada existente para el origen dado, si existe
    /// (lo usa la capa de dominio para decidir si ya hay un asiento posteado).
    pub async fn find_entry_by_source(
        &self,
        org_id: Snowflake,
        source_type: &str,
        source_id: Snowflake,
    ) -> Result<Option<Snowflake>, DbError> {
        let row = sqlx::query(sql::SELECT_ENTRY_BY_SOURCE)
            .bind(org_id.as_i64())
            .bind(source_type)
            .bind(source_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::classify)?;
        row.map(|r| r.try_get::<i64, _>("id").map(Snowflake).map_err(DbError::from))
            .transpose()
    }

    /// Postea la entrada y sus lineas en una sola transaccion. Devuelve
    /// `true` si esta llamada creo el asiento (idempotencia via unique index).
    pub async fn post_entry(&self, entry: &LedgerEntry, lines: &[LedgerEntryLine]) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await.map_err(DbError::classify)?;

        let inserted = sqlx::query(sql::INSERT_ENTRY)
            .bind(entry.id.as_i64())
            .bind(entry.org_id.as_i64())
            .bind(&entry.source_type)
            .bind(entry.source_id.as_i64())
            .bind(&entry.currency)
            .bind(entry.occurred_at)
            .execute(&mut *tx)
            .await
            .map_err(DbError::classify)?
            .rows_affected()
            == 1;

        if inserted {
            for line in lines {
                sqlx::query(sql::INSERT_ENTRY_LINE)
                    .bind(line.id.as_i64())
                    .bind(line.entry_id.as_i64())
                    .bind(line.account_id.as_i64())
                    .bind(line.direction)
                    .bind(line.amount_minor)
                    .execute(&mut *tx)
                    .await
                    .map_err(DbError::classify)?;
            }
        }

        tx.commit().await.map_err(DbError::classify)?;
        Ok(inserted)
    }
}

fn row_to_account(row: &sqlx::postgres::PgRow) -> Result<LedgerAccount, DbError> {
    Ok(LedgerAccount {
        id: Snowflake(row.try_get::<i64, _>("id")?),
        org_id: Snowflake(row.try_get::<i64, _>("org_id")?),
        code: LedgerAccountCode(row.try_get("code")?),
        name: row.try_get("name")?,
    })
}
