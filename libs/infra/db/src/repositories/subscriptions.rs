// [libs/infra/db/src/repositories/subscriptions.rs]
/*!
 * Lecturas de suscripciones. El scheduler nunca escribe esta tabla:
 * su ciclo de vida (DRAFT/ACTIVE/PAUSED/CANCELED/ENDED, salvo la
 * transicion final a ENDED) pertenece a un servicio externo (spec 3).
 *
 * El reclamo por lote (`active_without_open_cycle`/`canceled_candidates`)
 * usa `FOR UPDATE SKIP LOCKED` igual que `cycles.rs`, pero ese candado se
 * libera al terminar el propio `SELECT` (no hay transaccion abierta que
 * lo sostenga a traves de la llamada de `authorize` y el computo de
 * periodo que corren en la capa de job). Para que el reclamo no dependa
 * solo del indice unico aguas abajo como arbitro, `open_cycle_for_subscription`
 * y `end_subscription` vuelven a tomar el candado puntual de esa fila
 * -esta vez dentro de la misma transaccion que su mutacion- inmediatamente
 * antes de escribir: si otra replica ya la tiene bloqueada, `SKIP LOCKED`
 * hace que el `SELECT` devuelva cero filas y esta llamada se trata como
 * "la carrera la gano otro", igual que el `rows_affected() == 0` de los
 * `try_mark_*` condicionales de `cycles.rs`.
 */

use crate::errors::DbError;
use cadence_domain_models::{BillingCycle, BillingCycleType, Snowflake, Subscription, SubscriptionStatus};
use sqlx::postgres::PgPool;
use sqlx::Row;

mod sql {
    pub const SELECT_ACTIVE_WITHOUT_OPEN_CYCLE: &str = r#"
        SELECT s.id, s.org_id, s.status, s.activated_at, s.billing_cycle_type
        FROM subscriptions s
        WHERE s.status = 'ACTIVE'
          AND NOT EXISTS (
              SELECT 1 FROM billing_cycles c
              WHERE c.subscription_id = s.id AND c.status IN ('OPEN', 'CLOSING')
          )
        ORDER BY s.id
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    "#;

    pub const SELECT_CANCELED_CANDIDATES: &str = r#"
        SELECT id, org_id, status, activated_at, billing_cycle_type
        FROM subscriptions
        WHERE status = 'CANCELED'
        ORDER BY id
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    "#;

    pub const COUNT_UNSETTLED_CYCLES: &str = r#"
        SELECT count(*) AS unsettled
        FROM billing_cycles c
        LEFT JOIN invoices i ON i.billing_cycle_id = c.id
        WHERE c.subscription_id = $1
          AND (c.status != 'CLOSED' OR i.id IS NULL OR i.status = 'DRAFT')
    "#;

    pub const LOCK_SUBSCRIPTION_FOR_OPEN: &str = r#"
        SELECT id FROM subscriptions WHERE id = $1 AND status = 'ACTIVE' FOR UPDATE SKIP LOCKED
    "#;

    pub const INSERT_OPEN_CYCLE: &str = r#"
        INSERT INTO billing_cycles
            (id, org_id, subscription_id, period_start, period_end, status, opened_at)
        VALUES ($1, $2, $3, $4, $5, 'OPEN', $6)
        ON CONFLICT (subscription_id, period_start, period_end) DO NOTHING
    "#;

    pub const LOCK_SUBSCRIPTION_FOR_END: &str = r#"
        SELECT id FROM subscriptions WHERE id = $1 AND status = 'CANCELED' FOR UPDATE SKIP LOCKED
    "#;

    pub const MARK_ENDED: &str = r#"
        UPDATE subscriptions SET status = 'ENDED', updated_at = now()
        WHERE id = $1 AND status = 'CANCELED'
    "#;
}

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Result<Subscription, DbError> {
    Ok(Subscription {
        id: Snowflake(row.try_get::<i64, _>("id").map_err(DbError::from)?),
        org_id: Snowflake(row.try_get::<i64, _>("org_id").map_err(DbError::from)?),
        status: row.try_get::<SubscriptionStatus, _>("status").map_err(DbError::from)?,
        activated_at: row.try_get("activated_at").map_err(DbError::from)?,
        billing_cycle_type: row
            .try_get::<Option<BillingCycleType>, _>("billing_cycle_type")
            .map_err(DbError::from)?,
    })
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Suscripciones ACTIVE sin un ciclo abierto vigente (spec 4.D `ensure_cycles`).
    pub async fn active_without_open_cycle(&self, limit: i64) -> Result<Vec<Subscription>, DbError> {
        let rows = sqlx::query(sql::SELECT_ACTIVE_WITHOUT_OPEN_CYCLE)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::classify)?;
        rows.iter().map(row_to_subscription).collect()
    }

    /// Suscripciones CANCELED, candidatas a terminacion (spec 4.K).
    pub async fn canceled_candidates(&self, limit: i64) -> Result<Vec<Subscription>, DbError> {
        let rows = sqlx::query(sql::SELECT_CANCELED_CANDIDATES)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::classify)?;
        rows.iter().map(row_to_subscription).collect()
    }

    /// Cuenta ciclos del subscriptor que aun no liquidaron su factura.
    pub async fn count_unsettled_cycles(&self, subscription_id: Snowflake) -> Result<i64, DbError> {
        let row = sqlx::query(sql::COUNT_UNSETTLED_CYCLES)
            .bind(subscription_id.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::classify)?;
        row.try_get::<i64, _>("unsettled").map_err(DbError::from)
    }

    /// Vuelve a bloquear la fila de la suscripcion por id y, si nadie mas
    /// la tiene tomada, inserta el ciclo ya calculado por el job en la
    /// misma transaccion (spec 4.C/4.D). `Ok(None)` significa que otra
    /// replica sostiene el candado sobre esta suscripcion en este
    /// instante (se reintenta en el proximo tick); `Ok(Some(false))`
    /// significa que la fila se bloqueo pero el ciclo ya existia
    /// (idempotencia via el indice unico de periodo).
    pub async fn open_cycle_for_subscription(&self, cycle: &BillingCycle) -> Result<Option<bool>, DbError> {
        let mut tx = self.pool.begin().await.map_err(DbError::classify)?;

        let locked = sqlx::query(sql::LOCK_SUBSCRIPTION_FOR_OPEN)
            .bind(cycle.subscription_id.as_i64())
            .fetch_optional(&mut *tx)
            .await
            .map_err(DbError::classify)?;

        if locked.is_none() {
            tx.rollback().await.map_err(DbError::classify)?;
            return Ok(None);
        }

        let inserted = sqlx::query(sql::INSERT_OPEN_CYCLE)
            .bind(cycle.id.as_i64())
            .bind(cycle.org_id.as_i64())
            .bind(cycle.subscription_id.as_i64())
            .bind(cycle.period_start)
            .bind(cycle.period_end)
            .bind(cycle.opened_at)
            .execute(&mut *tx)
            .await
            .map_err(DbError::classify)?
            .rows_affected()
            == 1;

        tx.commit().await.map_err(DbError::classify)?;
        Ok(Some(inserted))
    }

    /// Vuelve a bloquear la fila de la suscripcion por id y, si nadie mas
    /// la tiene tomada, la termina condicionalmente en la misma
    /// transaccion (spec 4.C/4.K). `Ok(None)` significa que otra replica
    /// sostiene el candado sobre esta suscripcion en este instante.
    pub async fn end_subscription(&self, subscription_id: Snowflake) -> Result<Option<bool>, DbError> {
        let mut tx = self.pool.begin().await.map_err(DbError::classify)?;

        let locked = sqlx::query(sql::LOCK_SUBSCRIPTION_FOR_END)
            .bind(subscription_id.as_i64())
            .fetch_optional(&mut *tx)
            .await
            .map_err(DbError::classify)?;

        if locked.is_none() {
            tx.rollback().await.map_err(DbError::classify)?;
            return Ok(None);
        }

        let affected = sqlx::query(sql::MARK_ENDED)
            .bind(subscription_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(DbError::classify)?
            .rows_affected();

        tx.commit().await.map_err(DbError::classify)?;
        Ok(Some(affected == 1))
    }
}
