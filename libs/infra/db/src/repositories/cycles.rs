// [libs/infra/db/src/repositories/cycles.rs]
/*!
 * Componente C (capa de reclamo de trabajo) y D (transiciones
 * condicionales) para `billing_cycles`.
 *
 * `claim()` ejecuta `SELECT ... FOR UPDATE SKIP LOCKED` como una
 * sentencia suelta sobre `&self.pool`: Postgres la autocomita al
 * terminar, asi que el candado de fila que toma ya se libero para
 * cuando el job que llamo a `claim()` procesa la fila devuelta. Eso es
 * deliberado, no un descuido: entre el claim y el `try_mark_*` que
 * cierra la etapa, varios jobs invocan un colaborador externo (rating,
 * generacion/finalizacion de factura) que spec 5 exige correr fuera de
 * cualquier transaccion sostenida ("las transacciones son cortas; los
 * candados se liberan antes de cualquier llamada externa lenta"), asi
 * que `claim` y `try_mark_*` nunca podrian compartir una unica
 * transaccion sin violar esa regla para esos jobs.
 *
 * La exclusion real no viene entonces del candado del `SELECT`, sino de
 * que cada `try_mark_*` es un `UPDATE ... WHERE status = $expected`
 * independiente: si dos replicas reclaman la misma fila (posible,
 * porque el candado ya se solto), solo el primer `UPDATE` en llegar
 * encuentra la fila todavia en el estado esperado y la afecta; el
 * segundo afecta cero filas y se trata como exito silencioso (`Ok(None)`
 * en vez de error) — exactamente el diseño de spec 9: "la idempotencia
 * como estrategia de correccion primaria", no la coordinacion
 * distribuida via candados sostenidos.
 */

use crate::errors::DbError;
use cadence_domain_billing::state_machine;
use cadence_domain_models::{BillingCycle, CycleStatus, Snowflake};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;

mod sql {
    pub const CLAIM_OPEN_PAST_PERIOD_END: &str = r#"
        SELECT id, org_id, subscription_id, period_start, period_end, status,
               opened_at, closing_started_at, rating_completed_at, closed_at,
               invoiced_at, invoice_finalized_at, last_error, last_error_at
        FROM billing_cycles
        WHERE status = 'OPEN' AND period_end <= $1
        ORDER BY period_end
        LIMIT $2
        FOR UPDATE SKIP LOCKED
    "#;

    pub const CLAIM_CLOSING_UNRATED: &str = r#"
        SELECT id, org_id, subscription_id, period_start, period_end, status,
               opened_at, closing_started_at, rating_completed_at, closed_at,
               invoiced_at, invoice_finalized_at, last_error, last_error_at
        FROM billing_cycles
        WHERE status = 'CLOSING' AND rating_completed_at IS NULL
        ORDER BY closing_started_at
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    "#;

    pub const CLAIM_CLOSING_RATED: &str = r#"
        SELECT id, org_id, subscription_id, period_start, period_end, status,
               opened_at, closing_started_at, rating_completed_at, closed_at,
               invoiced_at, invoice_finalized_at, last_error, last_error_at
        FROM billing_cycles
        WHERE status = 'CLOSING' AND rating_completed_at IS NOT NULL
        ORDER BY rating_completed_at
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    "#;

    pub const CLAIM_CLOSED_UNINVOICED: &str = r#"
        SELECT id, org_id, subscription_id, period_start, period_end, status,
               opened_at, closing_started_at, rating_completed_at, closed_at,
               invoiced_at, invoice_finalized_at, last_error, last_error_at
        FROM billing_cycles
        WHERE status = 'CLOSED' AND invoiced_at IS NULL
        ORDER BY closed_at
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    "#;

    pub const CLAIM_STRANDED_CLOSING_UNRATED: &str = r#"
        SELECT id, org_id, subscription_id, period_start, period_end, status,
               opened_at, closing_started_at, rating_completed_at, closed_at,
               invoiced_at, invoice_finalized_at, last_error, last_error_at
        FROM billing_cycles
        WHERE status = 'CLOSING' AND rating_completed_at IS NULL AND closing_started_at <= $1
        ORDER BY closing_started_at
        LIMIT $2
        FOR UPDATE SKIP LOCKED
    "#;

    pub const CLAIM_STRANDED_CLOSED_UNINVOICED: &str = r#"
        SELECT id, org_id, subscription_id, period_start, period_end, status,
               opened_at, closing_started_at, rating_completed_at, closed_at,
               invoiced_at, invoice_finalized_at, last_error, last_error_at
        FROM billing_cycles
        WHERE status = 'CLOSED' AND invoiced_at IS NULL AND closed_at <= $1
        ORDER BY closed_at
        LIMIT $2
        FOR UPDATE SKIP LOCKED
    "#;

    pub const SELECT_LATEST_PERIOD_END: &str = r#"
        SELECT period_end FROM billing_cycles
        WHERE subscription_id = $1
        ORDER BY period_end DESC
        LIMIT 1
    "#;

    pub const UPDATE_CLOSING: &str = r#"
        UPDATE billing_cycles
        SET status = 'CLOSING', closing_started_at = $2
        WHERE id = $1 AND status = 'OPEN'
    "#;

    pub const UPDATE_RATED: &str = r#"
        UPDATE billing_cycles
        SET rating_completed_at = $2
        WHERE id = $1 AND status = 'CLOSING' AND rating_completed_at IS NULL
    "#;

    pub const UPDATE_CLOSED: &str = r#"
        UPDATE billing_cycles
        SET status = 'CLOSED', closed_at = $2
        WHERE id = $1 AND status = 'CLOSING' AND rating_completed_at IS NOT NULL
    "#;

    pub const UPDATE_INVOICED: &str = r#"
        UPDATE billing_cycles
        SET invoiced_at = $2
        WHERE id = $1 AND status = 'CLOSED' AND invoiced_at IS NULL
    "#;

    pub const UPDATE_FINALIZED: &str = r#"
        UPDATE billing_cycles
        SET invoice_finalized_at = $2
        WHERE id = $1 AND status = 'CLOSED' AND invoiced_at IS NOT NULL AND invoice_finalized_at IS NULL
    "#;

    pub const UPDATE_LAST_ERROR: &str = r#"
        UPDATE billing_cycles SET last_error = $2, last_error_at = $3 WHERE id = $1
    "#;
}

fn row_to_cycle(row: &sqlx::postgres::PgRow) -> Result<BillingCycle, DbError> {
    Ok(BillingCycle {
        id: Snowflake(row.try_get::<i64, _>("id")?),
        org_id: Snowflake(row.try_get::<i64, _>("org_id")?),
        subscription_id: Snowflake(row.try_get::<i64, _>("subscription_id")?),
        period_start: row.try_get("period_start")?,
        period_end: row.try_get("period_end")?,
        status: row.try_get::<CycleStatus, _>("status")?,
        opened_at: row.try_get("opened_at")?,
        closing_started_at: row.try_get("closing_started_at")?,
        rating_completed_at: row.try_get("rating_completed_at")?,
        closed_at: row.try_get("closed_at")?,
        invoiced_at: row.try_get("invoiced_at")?,
        invoice_finalized_at: row.try_get("invoice_finalized_at")?,
        last_error: row.try_get("last_error")?,
        last_error_at: row.try_get("last_error_at")?,
    })
}

#[derive(Clone)]
pub struct CycleRepository {
    pool: PgPool,
}

impl CycleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn claim_open_past_period_end(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<BillingCycle>, DbError> {
        self.claim(sql::CLAIM_OPEN_PAST_PERIOD_END, Some(now), limit).await
    }

    pub async fn claim_closing_unrated(&self, limit: i64) -> Result<Vec<BillingCycle>, DbError> {
        self.claim(sql::CLAIM_CLOSING_UNRATED, None, limit).await
    }

    pub async fn claim_closing_rated(&self, limit: i64) -> Result<Vec<BillingCycle>, DbError> {
        self.claim(sql::CLAIM_CLOSING_RATED, None, limit).await
    }

    pub async fn claim_closed_uninvoiced(&self, limit: i64) -> Result<Vec<BillingCycle>, DbError> {
        self.claim(sql::CLAIM_CLOSED_UNINVOICED, None, limit).await
    }

    async fn claim(
        &self,
        query: &str,
        timestamp: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<BillingCycle>, DbError> {
        let mut builder = sqlx::query(query);
        if let Some(ts) = timestamp {
            builder = builder.bind(ts);
        }
        builder = builder.bind(limit);
        let rows = builder.fetch_all(&self.pool).await.map_err(DbError::classify)?;
        rows.iter().map(row_to_cycle).collect()
    }

    /// Recovery.rating (spec 4.J): ciclos CLOSING sin tarificar varados
    /// mas alla del umbral de recuperacion.
    pub async fn claim_stranded_closing_unrated(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<BillingCycle>, DbError> {
        let rows = sqlx::query(sql::CLAIM_STRANDED_CLOSING_UNRATED)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::classify)?;
        rows.iter().map(row_to_cycle).collect()
    }

    /// Recovery.invoice (spec 4.J): ciclos CLOSED sin facturar varados
    /// mas alla del umbral de recuperacion.
    pub async fn claim_stranded_closed_uninvoiced(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<BillingCycle>, DbError> {
        let rows = sqlx::query(sql::CLAIM_STRANDED_CLOSED_UNINVOICED)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::classify)?;
        rows.iter().map(row_to_cycle).collect()
    }

    /// `period_end` del ciclo mas reciente (de cualquier estado) de la
    /// suscripcion, usado por `ensure_cycles` para anclar el siguiente
    /// `period_start` (spec 4.D).
    pub async fn latest_period_end(&self, subscription_id: Snowflake) -> Result<Option<DateTime<Utc>>, DbError> {
        let row = sqlx::query(sql::SELECT_LATEST_PERIOD_END)
            .bind(subscription_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::classify)?;
        row.map(|r| r.try_get::<DateTime<Utc>, _>("period_end").map_err(DbError::from))
            .transpose()
    }

    /// Aplica `mark_closing` en memoria y persiste condicionalmente.
    /// `Ok(None)` significa que otra replica ya transiciono esta fila.
    pub async fn try_mark_closing(
        &self,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> Result<Option<BillingCycle>, DbError> {
        let transitioned = state_machine::mark_closing(cycle, now).map_err(|e| DbError::MappingError(e.to_string()))?;
        let affected = sqlx::query(sql::UPDATE_CLOSING)
            .bind(transitioned.id.as_i64())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DbError::classify)?
            .rows_affected();
        Ok((affected == 1).then_some(transitioned))
    }

    pub async fn try_mark_rated(
        &self,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> Result<Option<BillingCycle>, DbError> {
        let transitioned =
            state_machine::mark_rating_completed(cycle, now).map_err(|e| DbError::MappingError(e.to_string()))?;
        let affected = sqlx::query(sql::UPDATE_RATED)
            .bind(transitioned.id.as_i64())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DbError::classify)?
            .rows_affected();
        Ok((affected == 1).then_some(transitioned))
    }

    pub async fn try_mark_closed(
        &self,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> Result<Option<BillingCycle>, DbError> {
        let transitioned = state_machine::mark_closed(cycle, now).map_err(|e| DbError::MappingError(e.to_string()))?;
        let affected = sqlx::query(sql::UPDATE_CLOSED)
            .bind(transitioned.id.as_i64())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DbError::classify)?
            .rows_affected();
        Ok((affected == 1).then_some(transitioned))
    }

    pub async fn try_mark_invoiced(
        &self,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> Result<Option<BillingCycle>, DbError> {
        let transitioned = state_machine::mark_invoiced(cycle, now).map_err(|e| DbError::MappingError(e.to_string()))?;
        let affected = sqlx::query(sql::UPDATE_INVOICED)
            .bind(transitioned.id.as_i64())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DbError::classify)?
            .rows_affected();
        Ok((affected == 1).then_some(transitioned))
    }

    pub async fn try_mark_finalized(
        &self,
        cycle: BillingCycle,
        invoice: &cadence_domain_models::Invoice,
        now: DateTime<Utc>,
    ) -> Result<Option<BillingCycle>, DbError> {
        let transitioned = state_machine::mark_invoice_finalized(cycle, invoice, now)
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        let affected = sqlx::query(sql::UPDATE_FINALIZED)
            .bind(transitioned.id.as_i64())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DbError::classify)?
            .rows_affected();
        Ok((affected == 1).then_some(transitioned))
    }

    pub async fn record_error(&self, cycle_id: Snowflake, message: &str, now: DateTime<Utc>) -> Result<(), DbError> {
        sqlx::query(sql::UPDATE_LAST_ERROR)
            .bind(cycle_id.as_i64())
            .bind(BillingCycle::truncate_error(message))
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DbError::classify)?;
        Ok(())
    }
}
