// [libs/infra/db/src/repositories/rating.rs]
/*!
 * Persistencia de resultados de tarificacion. `rating_results` tiene
 * un indice unico por `(billing_cycle_id, charge_type)`: un ciclo puede
 * acumular un resultado `usage` y uno `flat` a la vez (spec 3, "at least
 * one rating result exists"), pero una segunda llamada para el mismo
 * `charge_type` es idempotente (spec 4.F, invariante 4).
 */

use crate::errors::DbError;
use cadence_domain_models::{ChargeType, RatingLineItem, RatingResult, Snowflake};
use sqlx::postgres::PgPool;
use sqlx::Row;

mod sql {
    pub const SELECT_BY_CYCLE: &str = r#"
        SELECT id, billing_cycle_id, org_id, currency, charge_type, created_at
        FROM rating_results WHERE billing_cycle_id = $1
    "#;

    pub const SELECT_BY_CYCLE_AND_CHARGE_TYPE: &str = r#"
        SELECT id, billing_cycle_id, org_id, currency, charge_type, created_at
        FROM rating_results WHERE billing_cycle_id = $1 AND charge_type = $2
    "#;

    pub const INSERT_RESULT: &str = r#"
        INSERT INTO rating_results (id, billing_cycle_id, org_id, currency, charge_type, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (billing_cycle_id, charge_type) DO NOTHING
    "#;

    pub const INSERT_LINE_ITEM: &str = r#"
        INSERT INTO rating_line_items (id, rating_result_id, amount_minor) VALUES ($1, $2, $3)
    "#;

    pub const SELECT_LINE_ITEMS: &str = r#"
        SELECT id, rating_result_id, amount_minor FROM rating_line_items WHERE rating_result_id = $1
    "#;
}

#[derive(Clone)]
pub struct RatingRepository {
    pool: PgPool,
}

impl RatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Todos los resultados de tarificacion de un ciclo (spec 4.F step 1:
    /// "join de rating_results con sus lineas"), usualmente uno por
    /// `charge_type` presente en el periodo.
    pub async fn find_by_cycle(&self, cycle_id: Snowflake) -> Result<Vec<RatingResult>, DbError> {
        let rows = sqlx::query(sql::SELECT_BY_CYCLE)
            .bind(cycle_id.as_i64())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::classify)?;
        rows.iter().map(row_to_result).collect()
    }

    /// El resultado de un `charge_type` especifico, si ya fue producido
    /// para este ciclo. Usado por cada rama del colaborador de rating
    /// para decidir si su propia porcion del trabajo ya es idempotente.
    pub async fn find_by_cycle_and_charge_type(
        &self,
        cycle_id: Snowflake,
        charge_type: ChargeType,
    ) -> Result<Option<RatingResult>, DbError> {
        let row = sqlx::query(sql::SELECT_BY_CYCLE_AND_CHARGE_TYPE)
            .bind(cycle_id.as_i64())
            .bind(charge_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::classify)?;
        row.as_ref().map(row_to_result).transpose()
    }

    /// Inserta el resultado y sus lineas en una unica transaccion.
    /// Devuelve `true` si esta llamada creo el resultado (no existia antes).
    pub async fn insert_result(
        &self,
        result: &RatingResult,
        lines: &[RatingLineItem],
    ) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await.map_err(DbError::classify)?;

        let inserted = sqlx::query(sql::INSERT_RESULT)
            .bind(result.id.as_i64())
            .bind(result.billing_cycle_id.as_i64())
            .bind(result.org_id.as_i64())
            .bind(&result.currency)
            .bind(result.charge_type)
            .bind(result.created_at)
            .execute(&mut *tx)
            .await
            .map_err(DbError::classify)?
            .rows_affected()
            == 1;

        if inserted {
            for line in lines {
                sqlx::query(sql::INSERT_LINE_ITEM)
                    .bind(line.id.as_i64())
                    .bind(line.rating_result_id.as_i64())
                    .bind(line.amount_minor)
                    .execute(&mut *tx)
                    .await
                    .map_err(DbError::classify)?;
            }
        }

        tx.commit().await.map_err(DbError::classify)?;
        Ok(inserted)
    }

    pub async fn line_items(&self, rating_result_id: Snowflake) -> Result<Vec<RatingLineItem>, DbError> {
        let rows = sqlx::query(sql::SELECT_LINE_ITEMS)
            .bind(rating_result_id.as_i64())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::classify)?;
        rows.iter()
            .map(|row| {
                Ok(RatingLineItem {
                    id: Snowflake(row.try_get::<i64, _>("id")?),
                    rating_result_id: Snowflake(row.try_get::<i64, _>("rating_result_id")?),
                    amount_minor: row.try_get("amount_minor")?,
                })
            })
            .collect()
    }
}

fn row_to_result(row: &sqlx::postgres::PgRow) -> Result<RatingResult, DbError> {
    Ok(RatingResult {
        id: Snowflake(row.try_get::<i64, _>("id")?),
        billing_cycle_id: Snowflake(row.try_get::<i64, _>("billing_cycle_id")?),
        org_id: Snowflake(row.try_get::<i64, _>("org_id")?),
        currency: row.try_get("currency")?,
        charge_type: row.try_get::<ChargeType, _>("charge_type")?,
        created_at: row.try_get("created_at")?,
    })
}
