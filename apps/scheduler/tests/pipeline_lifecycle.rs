// [apps/scheduler/tests/pipeline_lifecycle.rs]
//! Pruebas de escenario de punta a punta (S1-S6) contra un Postgres real.
//! Cada caso recibe una base de datos efimera ya migrada de
//! `cadence-infra-db` via `#[sqlx::test]`, asi que no hay fixtures SQL
//! manuales fuera de este archivo ni estado compartido entre casos.

use async_trait::async_trait;
use cadence_core_clock::{Clock, FixedClock};
use cadence_core_idgen::IdGenerator;
use cadence_domain_models::{
    BillingCycle, BillingCycleType, ChargeType, RatingLineItem, RatingResult, Snowflake, SubscriptionStatus,
};
use cadence_infra_collab::{
    CollabError, FlatRateRatingService, PostgresAuditService, PostgresInvoiceService, PostgresSubscriptionService,
    RatingService, SystemOnlyAuthorizationService,
};
use cadence_infra_db::repositories::{
    AuditRepository, CycleRepository, InvoiceRepository, LedgerRepository, RatingRepository, SubscriptionRepository,
};
use cadence_infra_db::PostgresClient;
use cadence_scheduler::config::SchedulerConfig;
use cadence_scheduler::{jobs, AppState, Pipeline};
use cadence_shared_metrics::SchedulerMetrics;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::sync::Arc;

fn ts(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
}

async fn seed_subscription(
    pool: &PgPool,
    id: Snowflake,
    org_id: Snowflake,
    status: SubscriptionStatus,
    activated_at: Option<DateTime<Utc>>,
    cycle_type: Option<BillingCycleType>,
) {
    let status_str = match status {
        SubscriptionStatus::Draft => "DRAFT",
        SubscriptionStatus::Active => "ACTIVE",
        SubscriptionStatus::Paused => "PAUSED",
        SubscriptionStatus::Canceled => "CANCELED",
        SubscriptionStatus::Ended => "ENDED",
    };
    let cycle_type_str = cycle_type.map(|t| match t {
        BillingCycleType::Daily => "daily",
        BillingCycleType::Weekly => "weekly",
        BillingCycleType::Monthly => "monthly",
    });

    sqlx::query(
        "INSERT INTO subscriptions (id, org_id, status, activated_at, billing_cycle_type) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id.as_i64())
    .bind(org_id.as_i64())
    .bind(status_str)
    .bind(activated_at)
    .bind(cycle_type_str)
    .execute(pool)
    .await
    .expect("seed subscription");
}

/// Inserta un ciclo directamente, sin pasar por `ensure_cycles`, para los
/// escenarios que fijan un estado intermedio especifico (S5, S6).
async fn seed_cycle(pool: &PgPool, cycle: &BillingCycle) {
    sqlx::query(
        r#"
        INSERT INTO billing_cycles
            (id, org_id, subscription_id, period_start, period_end, status, opened_at,
             closing_started_at, rating_completed_at, closed_at, invoiced_at, invoice_finalized_at)
        VALUES ($1, $2, $3, $4, $5, $6::text, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(cycle.id.as_i64())
    .bind(cycle.org_id.as_i64())
    .bind(cycle.subscription_id.as_i64())
    .bind(cycle.period_start)
    .bind(cycle.period_end)
    .bind(match cycle.status {
        cadence_domain_models::CycleStatus::Open => "OPEN",
        cadence_domain_models::CycleStatus::Closing => "CLOSING",
        cadence_domain_models::CycleStatus::Closed => "CLOSED",
    })
    .bind(cycle.opened_at)
    .bind(cycle.closing_started_at)
    .bind(cycle.rating_completed_at)
    .bind(cycle.closed_at)
    .bind(cycle.invoiced_at)
    .bind(cycle.invoice_finalized_at)
    .execute(pool)
    .await
    .expect("seed billing cycle");
}

async fn seed_invoice(pool: &PgPool, id: Snowflake, cycle_id: Snowflake, status: &str) {
    sqlx::query("INSERT INTO invoices (id, billing_cycle_id, status) VALUES ($1, $2, $3)")
        .bind(id.as_i64())
        .bind(cycle_id.as_i64())
        .bind(status)
        .execute(pool)
        .await
        .expect("seed invoice");
}

/// Doble de prueba del colaborador de tarificacion: produce un unico
/// resultado de tipo `usage` con un monto fijo, en vez del cargo plano de
/// `FlatRateRatingService`, para reproducir literalmente S2 ("10_000
/// minor units USD" de tipo usage).
struct FixedUsageRatingService {
    repository: RatingRepository,
    amount_minor: i64,
    currency: String,
}

impl FixedUsageRatingService {
    fn new(repository: RatingRepository, amount_minor: i64, currency: impl Into<String>) -> Self {
        Self { repository, amount_minor, currency: currency.into() }
    }
}

#[async_trait]
impl RatingService for FixedUsageRatingService {
    async fn rate_cycle(
        &self,
        cycle: &BillingCycle,
        next_result_id: &mut dyn FnMut() -> Snowflake,
        next_line_item_id: &mut dyn FnMut() -> Snowflake,
        now: DateTime<Utc>,
    ) -> Result<Vec<(RatingResult, Vec<RatingLineItem>)>, CollabError> {
        if let Some(existing) = self.repository.find_by_cycle_and_charge_type(cycle.id, ChargeType::Usage).await? {
            let lines = self.repository.line_items(existing.id).await?;
            return Ok(vec![(existing, lines)]);
        }

        let result = RatingResult {
            id: next_result_id(),
            billing_cycle_id: cycle.id,
            org_id: cycle.org_id,
            currency: self.currency.clone(),
            charge_type: ChargeType::Usage,
            created_at: now,
        };
        let lines = vec![RatingLineItem { id: next_line_item_id(), rating_result_id: result.id, amount_minor: self.amount_minor }];
        self.repository.insert_result(&result, &lines).await?;
        Ok(vec![(result, lines)])
    }
}

/// Doble de prueba que produce *ambos* tipos de cargo en la misma
/// llamada: el caso comun de una cuota plana de suscripcion mas consumo
/// medido en el mismo periodo (spec 3: "at least one rating result
/// exists", no exactamente uno).
struct CombinedRatingService {
    repository: RatingRepository,
    flat_amount_minor: i64,
    usage_amount_minor: i64,
    currency: String,
}

impl CombinedRatingService {
    fn new(repository: RatingRepository, flat_amount_minor: i64, usage_amount_minor: i64, currency: impl Into<String>) -> Self {
        Self { repository, flat_amount_minor, usage_amount_minor, currency: currency.into() }
    }

    async fn rate_charge_type(
        &self,
        cycle: &BillingCycle,
        charge_type: ChargeType,
        amount_minor: i64,
        next_result_id: &mut dyn FnMut() -> Snowflake,
        next_line_item_id: &mut dyn FnMut() -> Snowflake,
        now: DateTime<Utc>,
    ) -> Result<(RatingResult, Vec<RatingLineItem>), CollabError> {
        if let Some(existing) = self.repository.find_by_cycle_and_charge_type(cycle.id, charge_type).await? {
            let lines = self.repository.line_items(existing.id).await?;
            return Ok((existing, lines));
        }

        let result = RatingResult {
            id: next_result_id(),
            billing_cycle_id: cycle.id,
            org_id: cycle.org_id,
            currency: self.currency.clone(),
            charge_type,
            created_at: now,
        };
        let lines = vec![RatingLineItem { id: next_line_item_id(), rating_result_id: result.id, amount_minor }];
        self.repository.insert_result(&result, &lines).await?;
        Ok((result, lines))
    }
}

#[async_trait]
impl RatingService for CombinedRatingService {
    async fn rate_cycle(
        &self,
        cycle: &BillingCycle,
        next_result_id: &mut dyn FnMut() -> Snowflake,
        next_line_item_id: &mut dyn FnMut() -> Snowflake,
        now: DateTime<Utc>,
    ) -> Result<Vec<(RatingResult, Vec<RatingLineItem>)>, CollabError> {
        let flat = self
            .rate_charge_type(cycle, ChargeType::Flat, self.flat_amount_minor, next_result_id, next_line_item_id, now)
            .await?;
        let usage = self
            .rate_charge_type(cycle, ChargeType::Usage, self.usage_amount_minor, next_result_id, next_line_item_id, now)
            .await?;
        Ok(vec![flat, usage])
    }
}

fn build_state(pool: PgPool, clock: Arc<dyn Clock>, rating: Arc<dyn RatingService>, finalize_invoices: bool) -> AppState {
    let config = SchedulerConfig {
        database_url: String::new(),
        max_connections: 5,
        shard_id: 0,
        tick_interval_seconds: 30,
        batch_size: 200,
        job_timeout_seconds: 60,
        recovery_threshold_seconds: 900,
        distinguish_timeout_stuck: false,
        metrics_port: 0,
        finalize_invoices,
        enabled_jobs: None,
        max_close_batch_size: None,
        max_rating_batch_size: None,
        max_invoice_batch_size: None,
    };

    AppState {
        db: PostgresClient::from_pool(pool.clone()),
        clock,
        ids: Arc::new(IdGenerator::new(0)),
        metrics: Arc::new(SchedulerMetrics::new()),
        config: Arc::new(config),
        cycles: CycleRepository::new(pool.clone()),
        ledger: LedgerRepository::new(pool.clone()),
        rating_results: RatingRepository::new(pool.clone()),
        rating,
        invoicing: Arc::new(PostgresInvoiceService::new(InvoiceRepository::new(pool.clone()))),
        subscriptions: Arc::new(PostgresSubscriptionService::new(SubscriptionRepository::new(pool.clone()))),
        authorization: Arc::new(SystemOnlyAuthorizationService),
        audit: Arc::new(PostgresAuditService::new(AuditRepository::new(pool))),
    }
}

/// S1 — materializacion de ciclo mensual.
#[sqlx::test(migrations = "../../libs/infra/db/migrations")]
async fn s1_monthly_cycle_materialization(pool: PgPool) {
    let subscription_id = Snowflake(100);
    let org_id = Snowflake(1);
    seed_subscription(
        &pool,
        subscription_id,
        org_id,
        SubscriptionStatus::Active,
        Some(ts(2025, 1, 1, 0, 0)),
        Some(BillingCycleType::Monthly),
    )
    .await;

    let clock: Arc<dyn Clock> = Arc::new(FixedClock::at(ts(2025, 1, 1, 0, 30)));
    let rating: Arc<dyn RatingService> = Arc::new(FlatRateRatingService::new(RatingRepository::new(pool.clone()), 0, "USD"));
    let state = build_state(pool.clone(), clock.clone(), rating, true);

    let (processed, errors) = jobs::ensure_cycles::run(state, clock.now()).await.unwrap();
    assert_eq!((processed, errors), (1, 0));

    let row = sqlx::query("SELECT period_start, period_end, status FROM billing_cycles WHERE subscription_id = $1")
        .bind(subscription_id.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap();

    let period_start: DateTime<Utc> = row.try_get("period_start").unwrap();
    let period_end: DateTime<Utc> = row.try_get("period_end").unwrap();
    let status: String = row.try_get("status").unwrap();

    assert_eq!(period_start, ts(2025, 1, 1, 0, 0));
    assert_eq!(period_end, ts(2025, 2, 1, 0, 0));
    assert_eq!(status, "OPEN");
}

/// S2 — cierre, tarificacion, facturacion y finalizacion completos en un
/// solo tick.
#[sqlx::test(migrations = "../../libs/infra/db/migrations")]
async fn s2_full_close_rate_invoice_finalize(pool: PgPool) {
    let subscription_id = Snowflake(200);
    let org_id = Snowflake(2);
    seed_subscription(
        &pool,
        subscription_id,
        org_id,
        SubscriptionStatus::Active,
        Some(ts(2025, 1, 1, 0, 0)),
        Some(BillingCycleType::Monthly),
    )
    .await;

    let clock = Arc::new(FixedClock::at(ts(2025, 1, 1, 0, 30)));
    let rating: Arc<dyn RatingService> = Arc::new(FlatRateRatingService::new(RatingRepository::new(pool.clone()), 0, "USD"));
    let state = build_state(pool.clone(), clock.clone(), rating, true);
    jobs::ensure_cycles::run(state, clock.now()).await.unwrap();

    clock.set(ts(2025, 2, 1, 0, 5));
    let usage_rating: Arc<dyn RatingService> =
        Arc::new(FixedUsageRatingService::new(RatingRepository::new(pool.clone()), 10_000, "USD"));
    let state = build_state(pool.clone(), clock.clone(), usage_rating, true);
    let pipeline = Pipeline::new(state);
    pipeline.tick().await;

    let cycle_row = sqlx::query("SELECT id, status, invoice_finalized_at FROM billing_cycles WHERE subscription_id = $1")
        .bind(subscription_id.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap();
    let cycle_id: i64 = cycle_row.try_get("id").unwrap();
    let status: String = cycle_row.try_get("status").unwrap();
    let finalized_at: Option<DateTime<Utc>> = cycle_row.try_get("invoice_finalized_at").unwrap();
    assert_eq!(status, "CLOSED");
    assert!(finalized_at.is_some());

    let lines = sqlx::query(
        r#"
        SELECT la.code, lel.direction, lel.amount_minor
        FROM ledger_entry_lines lel
        JOIN ledger_accounts la ON la.id = lel.account_id
        JOIN ledger_entries le ON le.id = lel.entry_id
        WHERE le.source_id = $1
        "#,
    )
    .bind(cycle_id)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        let code: String = line.try_get("code").unwrap();
        let direction: String = line.try_get("direction").unwrap();
        let amount: i64 = line.try_get("amount_minor").unwrap();
        assert_eq!(amount, 10_000);
        match code.as_str() {
            "accounts_receivable" => assert_eq!(direction, "debit"),
            "revenue_usage" => assert_eq!(direction, "credit"),
            other => panic!("unexpected ledger account code {other}"),
        }
    }

    let invoice_status: String = sqlx::query("SELECT status FROM invoices WHERE billing_cycle_id = $1")
        .bind(cycle_id)
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("status")
        .unwrap();
    assert_eq!(invoice_status, "FINALIZED");
}

/// Un ciclo puede acumular mas de un `RatingResult` (spec 3, 4.F step 1):
/// una cuota plana de suscripcion junto con el consumo medido del mismo
/// periodo. El asiento contable debe llevar un credito por cada
/// `charge_type` y un unico debito agregado a `accounts_receivable`.
#[sqlx::test(migrations = "../../libs/infra/db/migrations")]
async fn flat_and_usage_rating_results_both_post_to_the_ledger(pool: PgPool) {
    let subscription_id = Snowflake(250);
    let org_id = Snowflake(25);
    seed_subscription(
        &pool,
        subscription_id,
        org_id,
        SubscriptionStatus::Active,
        Some(ts(2025, 1, 1, 0, 0)),
        Some(BillingCycleType::Monthly),
    )
    .await;

    let clock = Arc::new(FixedClock::at(ts(2025, 1, 1, 0, 30)));
    let seed_rating: Arc<dyn RatingService> = Arc::new(FlatRateRatingService::new(RatingRepository::new(pool.clone()), 0, "USD"));
    let state = build_state(pool.clone(), clock.clone(), seed_rating, true);
    jobs::ensure_cycles::run(state, clock.now()).await.unwrap();

    clock.set(ts(2025, 2, 1, 0, 5));
    let combined: Arc<dyn RatingService> =
        Arc::new(CombinedRatingService::new(RatingRepository::new(pool.clone()), 3_000, 7_000, "USD"));
    let state = build_state(pool.clone(), clock.clone(), combined, true);
    Pipeline::new(state).tick().await;

    let cycle_row = sqlx::query("SELECT id, status FROM billing_cycles WHERE subscription_id = $1")
        .bind(subscription_id.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap();
    let cycle_id: i64 = cycle_row.try_get("id").unwrap();
    let status: String = cycle_row.try_get("status").unwrap();
    assert_eq!(status, "CLOSED");

    let result_count: i64 = sqlx::query("SELECT count(*) AS n FROM rating_results WHERE billing_cycle_id = $1")
        .bind(cycle_id)
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("n")
        .unwrap();
    assert_eq!(result_count, 2, "one rating_result per charge_type");

    let lines = sqlx::query(
        r#"
        SELECT la.code, lel.direction, lel.amount_minor
        FROM ledger_entry_lines lel
        JOIN ledger_accounts la ON la.id = lel.account_id
        JOIN ledger_entries le ON le.id = lel.entry_id
        WHERE le.source_id = $1
        "#,
    )
    .bind(cycle_id)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(lines.len(), 3, "one debit plus one credit per charge_type");

    let mut credits = std::collections::HashMap::new();
    let mut debit_total = 0i64;
    for line in &lines {
        let code: String = line.try_get("code").unwrap();
        let direction: String = line.try_get("direction").unwrap();
        let amount: i64 = line.try_get("amount_minor").unwrap();
        match direction.as_str() {
            "debit" => {
                assert_eq!(code, "accounts_receivable");
                debit_total += amount;
            }
            "credit" => {
                credits.insert(code, amount);
            }
            other => panic!("unexpected direction {other}"),
        }
    }

    assert_eq!(debit_total, 10_000);
    assert_eq!(credits.get("revenue_flat"), Some(&3_000));
    assert_eq!(credits.get("revenue_usage"), Some(&7_000));
}

/// S3 — reintentar el mismo tick no duplica efectos.
#[sqlx::test(migrations = "../../libs/infra/db/migrations")]
async fn s3_idempotent_retry(pool: PgPool) {
    let subscription_id = Snowflake(300);
    let org_id = Snowflake(3);
    seed_subscription(
        &pool,
        subscription_id,
        org_id,
        SubscriptionStatus::Active,
        Some(ts(2025, 1, 1, 0, 0)),
        Some(BillingCycleType::Monthly),
    )
    .await;

    let clock = Arc::new(FixedClock::at(ts(2025, 1, 1, 0, 30)));
    let rating: Arc<dyn RatingService> = Arc::new(FlatRateRatingService::new(RatingRepository::new(pool.clone()), 0, "USD"));
    let state = build_state(pool.clone(), clock.clone(), rating, true);
    jobs::ensure_cycles::run(state, clock.now()).await.unwrap();

    clock.set(ts(2025, 2, 1, 0, 5));
    let usage_rating: Arc<dyn RatingService> =
        Arc::new(FixedUsageRatingService::new(RatingRepository::new(pool.clone()), 10_000, "USD"));
    let state = build_state(pool.clone(), clock.clone(), usage_rating.clone(), true);
    Pipeline::new(state).tick().await;

    let stamps_before: (Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<DateTime<Utc>>) = {
        let row = sqlx::query(
            "SELECT closed_at, invoiced_at, invoice_finalized_at FROM billing_cycles WHERE subscription_id = $1",
        )
        .bind(subscription_id.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap();
        (row.try_get("closed_at").unwrap(), row.try_get("invoiced_at").unwrap(), row.try_get("invoice_finalized_at").unwrap())
    };

    let state = build_state(pool.clone(), clock.clone(), usage_rating, true);
    let runs = Pipeline::new(state).tick().await;

    let invoice_run = runs.iter().find(|r| r.job_name == "invoice").expect("invoice job ran");
    assert_eq!(invoice_run.processed_count, 0);

    let stamps_after: (Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<DateTime<Utc>>) = {
        let row = sqlx::query(
            "SELECT closed_at, invoiced_at, invoice_finalized_at FROM billing_cycles WHERE subscription_id = $1",
        )
        .bind(subscription_id.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap();
        (row.try_get("closed_at").unwrap(), row.try_get("invoiced_at").unwrap(), row.try_get("invoice_finalized_at").unwrap())
    };
    assert_eq!(stamps_before, stamps_after);

    let ledger_entry_count: i64 = sqlx::query("SELECT count(*) AS n FROM ledger_entries")
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("n")
        .unwrap();
    assert_eq!(ledger_entry_count, 1);

    let invoice_count: i64 = sqlx::query("SELECT count(*) AS n FROM invoices").fetch_one(&pool).await.unwrap().try_get("n").unwrap();
    assert_eq!(invoice_count, 1);
}

/// S4 — dos workers corriendo el mismo tick en paralelo producen
/// exactamente un efecto de cada tipo.
#[sqlx::test(migrations = "../../libs/infra/db/migrations")]
async fn s4_concurrent_workers_produce_single_effect(pool: PgPool) {
    let subscription_id = Snowflake(400);
    let org_id = Snowflake(4);
    seed_subscription(
        &pool,
        subscription_id,
        org_id,
        SubscriptionStatus::Active,
        Some(ts(2025, 1, 1, 0, 0)),
        Some(BillingCycleType::Monthly),
    )
    .await;

    let clock = Arc::new(FixedClock::at(ts(2025, 1, 1, 0, 30)));
    let rating: Arc<dyn RatingService> = Arc::new(FlatRateRatingService::new(RatingRepository::new(pool.clone()), 0, "USD"));
    let state = build_state(pool.clone(), clock.clone(), rating, true);
    jobs::ensure_cycles::run(state, clock.now()).await.unwrap();
    clock.set(ts(2025, 2, 1, 0, 5));

    let usage_rating_a: Arc<dyn RatingService> =
        Arc::new(FixedUsageRatingService::new(RatingRepository::new(pool.clone()), 10_000, "USD"));
    let usage_rating_b: Arc<dyn RatingService> =
        Arc::new(FixedUsageRatingService::new(RatingRepository::new(pool.clone()), 10_000, "USD"));
    let pipeline_a = Pipeline::new(build_state(pool.clone(), clock.clone(), usage_rating_a, true));
    let pipeline_b = Pipeline::new(build_state(pool.clone(), clock.clone(), usage_rating_b, true));

    tokio::join!(pipeline_a.tick(), pipeline_b.tick());

    let ledger_entry_count: i64 = sqlx::query("SELECT count(*) AS n FROM ledger_entries")
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("n")
        .unwrap();
    assert_eq!(ledger_entry_count, 1);

    let invoice_count: i64 = sqlx::query("SELECT count(*) AS n FROM invoices").fetch_one(&pool).await.unwrap().try_get("n").unwrap();
    assert_eq!(invoice_count, 1);

    let closed_audit_count: i64 =
        sqlx::query("SELECT count(*) AS n FROM audit_events WHERE action = 'billing_cycle.closed'")
            .fetch_one(&pool)
            .await
            .unwrap()
            .try_get("n")
            .unwrap();
    assert_eq!(closed_audit_count, 1);
}

/// S5 — el sweep de recuperacion reimpulsa un ciclo varado en CLOSING sin
/// tarificar mas alla del umbral configurado.
#[sqlx::test(migrations = "../../libs/infra/db/migrations")]
async fn s5_recovery_sweep_advances_stranded_cycle(pool: PgPool) {
    let subscription_id = Snowflake(500);
    let org_id = Snowflake(5);
    let cycle_id = Snowflake(5_000);
    seed_subscription(
        &pool,
        subscription_id,
        org_id,
        SubscriptionStatus::Active,
        Some(ts(2025, 1, 1, 0, 0)),
        Some(BillingCycleType::Monthly),
    )
    .await;

    let now = ts(2025, 2, 1, 0, 0);
    let closing_started_at = now - chrono::Duration::minutes(20);
    seed_cycle(
        &pool,
        &BillingCycle {
            id: cycle_id,
            org_id,
            subscription_id,
            period_start: ts(2025, 1, 1, 0, 0),
            period_end: closing_started_at,
            status: cadence_domain_models::CycleStatus::Closing,
            opened_at: ts(2025, 1, 1, 0, 0),
            closing_started_at: Some(closing_started_at),
            rating_completed_at: None,
            closed_at: None,
            invoiced_at: None,
            invoice_finalized_at: None,
            last_error: None,
            last_error_at: None,
        },
    )
    .await;

    let clock: Arc<dyn Clock> = Arc::new(FixedClock::at(now));
    let usage_rating: Arc<dyn RatingService> =
        Arc::new(FixedUsageRatingService::new(RatingRepository::new(pool.clone()), 10_000, "USD"));
    // `build_state`'s umbral de recuperacion por defecto es de 900s (15 min),
    // igual al de S5: el ciclo esta varado hace 20 min, por encima del umbral.
    let state = build_state(pool.clone(), clock.clone(), usage_rating, true);

    let (processed, errors) = jobs::recovery::run(state, now).await.unwrap();
    assert!(errors == 0);
    assert!(processed >= 1);

    let row = sqlx::query("SELECT status, rating_completed_at FROM billing_cycles WHERE id = $1")
        .bind(cycle_id.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap();
    let status: String = row.try_get("status").unwrap();
    let rating_completed_at: Option<DateTime<Utc>> = row.try_get("rating_completed_at").unwrap();
    assert!(rating_completed_at.is_some());
    assert_eq!(status, "CLOSED");
}

/// S6 — una suscripcion CANCELED con un ciclo cerrado sin factura
/// liquidada permanece CANCELED hasta que la factura finaliza.
#[sqlx::test(migrations = "../../libs/infra/db/migrations")]
async fn s6_subscription_termination_gating(pool: PgPool) {
    let subscription_id = Snowflake(600);
    let org_id = Snowflake(6);
    let cycle_id = Snowflake(6_000);
    let invoice_id = Snowflake(6_001);

    seed_subscription(&pool, subscription_id, org_id, SubscriptionStatus::Canceled, None, None).await;
    seed_cycle(
        &pool,
        &BillingCycle {
            id: cycle_id,
            org_id,
            subscription_id,
            period_start: ts(2025, 1, 1, 0, 0),
            period_end: ts(2025, 2, 1, 0, 0),
            status: cadence_domain_models::CycleStatus::Closed,
            opened_at: ts(2025, 1, 1, 0, 0),
            closing_started_at: Some(ts(2025, 2, 1, 0, 0)),
            rating_completed_at: Some(ts(2025, 2, 1, 0, 1)),
            closed_at: Some(ts(2025, 2, 1, 0, 2)),
            invoiced_at: Some(ts(2025, 2, 1, 0, 3)),
            invoice_finalized_at: None,
            last_error: None,
            last_error_at: None,
        },
    )
    .await;
    seed_invoice(&pool, invoice_id, cycle_id, "DRAFT").await;

    let clock: Arc<dyn Clock> = Arc::new(FixedClock::at(ts(2025, 2, 1, 0, 10)));
    let rating: Arc<dyn RatingService> = Arc::new(FlatRateRatingService::new(RatingRepository::new(pool.clone()), 0, "USD"));
    let state = build_state(pool.clone(), clock.clone(), rating.clone(), true);

    let (processed, _) = jobs::terminate::run(state, clock.now()).await.unwrap();
    assert_eq!(processed, 0);

    let status: String = sqlx::query("SELECT status FROM subscriptions WHERE id = $1")
        .bind(subscription_id.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("status")
        .unwrap();
    assert_eq!(status, "CANCELED");

    sqlx::query("UPDATE invoices SET status = 'FINALIZED', finalized_at = $2 WHERE id = $1")
        .bind(invoice_id.as_i64())
        .bind(ts(2025, 2, 1, 1, 0))
        .execute(&pool)
        .await
        .unwrap();

    let state = build_state(pool.clone(), clock.clone(), rating, true);
    let (processed, _) = jobs::terminate::run(state, clock.now()).await.unwrap();
    assert_eq!(processed, 1);

    let status: String = sqlx::query("SELECT status FROM subscriptions WHERE id = $1")
        .bind(subscription_id.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("status")
        .unwrap();
    assert_eq!(status, "ENDED");

    let audit_count: i64 = sqlx::query("SELECT count(*) AS n FROM audit_events WHERE action = 'subscription.end'")
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("n")
        .unwrap();
    assert_eq!(audit_count, 1);
}
