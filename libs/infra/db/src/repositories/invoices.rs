// [libs/infra/db/src/repositories/invoices.rs]
/*!
 * Vista del scheduler sobre `invoices`. El contenido real de una
 * factura (lineas, moneda, PDF) pertenece al servicio de facturacion
 * externo (spec 4.G); aqui solo persistimos el estado que el
 * scheduler necesita para decidir si puede finalizar o terminar una
 * suscripcion.
 */

use crate::errors::DbError;
use cadence_domain_models::{Invoice, InvoiceStatus, Snowflake};
use sqlx::postgres::PgPool;
use sqlx::Row;

mod sql {
    pub const SELECT_BY_CYCLE: &str = r#"
        SELECT id, billing_cycle_id, status, finalized_at FROM invoices WHERE billing_cycle_id = $1
    "#;

    pub const UPSERT_DRAFT: &str = r#"
        INSERT INTO invoices (id, billing_cycle_id, status) VALUES ($1, $2, 'DRAFT')
        ON CONFLICT (billing_cycle_id) DO NOTHING
    "#;

    pub const MARK_FINALIZED: &str = r#"
        UPDATE invoices SET status = 'FINALIZED', finalized_at = $2
        WHERE id = $1 AND status = 'DRAFT'
    "#;
}

#[derive(Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_cycle(&self, cycle_id: Snowflake) -> Result<Option<Invoice>, DbError> {
        let row = sqlx::query(sql::SELECT_BY_CYCLE)
            .bind(cycle_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::classify)?;
        row.as_ref().map(row_to_invoice).transpose()
    }

    pub async fn ensure_draft(&self, id: Snowflake, cycle_id: Snowflake) -> Result<(), DbError> {
        sqlx::query(sql::UPSERT_DRAFT)
            .bind(id.as_i64())
            .bind(cycle_id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(DbError::classify)?;
        Ok(())
    }

    pub async fn mark_finalized(
        &self,
        invoice_id: Snowflake,
        finalized_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, DbError> {
        let affected = sqlx::query(sql::MARK_FINALIZED)
            .bind(invoice_id.as_i64())
            .bind(finalized_at)
            .execute(&self.pool)
            .await
            .map_err(DbError::classify)?
            .rows_affected();
        Ok(affected == 1)
    }
}

fn row_to_invoice(row: &sqlx::postgres::PgRow) -> Result<Invoice, DbError> {
    Ok(Invoice {
        id: Snowflake(row.try_get::<i64, _>("id")?),
        billing_cycle_id: Snowflake(row.try_get::<i64, _>("billing_cycle_id")?),
        status: row.try_get::<InvoiceStatus, _>("status")?,
        finalized_at: row.try_get("finalized_at")?,
    })
}
