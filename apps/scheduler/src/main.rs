// [apps/scheduler/src/main.rs]
//! Punto de entrada del binario `scheduler`: carga configuracion,
//! conecta el pool de Postgres, aplica migraciones pendientes y pone en
//! marcha el ticker del pipeline (componente I) sobre el runtime de
//! Tokio.

use cadence_core_clock::SystemClock;
use cadence_core_idgen::IdGenerator;
use cadence_infra_collab::{
    FlatRateRatingService, PostgresAuditService, PostgresInvoiceService, PostgresSubscriptionService,
    SystemOnlyAuthorizationService,
};
use cadence_infra_db::repositories::{
    AuditRepository, CycleRepository, InvoiceRepository, LedgerRepository, RatingRepository, SubscriptionRepository,
};
use cadence_infra_db::PostgresClient;
use cadence_scheduler::config::SchedulerConfig;
use cadence_scheduler::{pipeline, AppState, Pipeline};
use cadence_shared_metrics::SchedulerMetrics;
use std::sync::Arc;
use tracing::info;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    cadence_shared_telemetry::init_tracing("cadence_scheduler");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let config = SchedulerConfig::load().expect("FATAL: invalid or missing scheduler configuration");
    info!(
        tick_interval_seconds = config.tick_interval_seconds,
        batch_size = config.batch_size,
        "starting cadence scheduler"
    );

    let db = PostgresClient::connect(&config.database_url, config.max_connections)
        .await
        .expect("FATAL: could not connect to the billing store");
    db.migrate().await.expect("FATAL: schema migration failed");

    let pool = db.pool().clone();
    let metrics = Arc::new(SchedulerMetrics::new());
    let ids = Arc::new(IdGenerator::new(config.shard_id));

    let state = AppState {
        db,
        clock: Arc::new(SystemClock),
        ids,
        metrics: metrics.clone(),
        config: Arc::new(config.clone()),
        cycles: CycleRepository::new(pool.clone()),
        ledger: LedgerRepository::new(pool.clone()),
        rating_results: RatingRepository::new(pool.clone()),
        rating: Arc::new(FlatRateRatingService::new(RatingRepository::new(pool.clone()), 5_000, "USD")),
        invoicing: Arc::new(PostgresInvoiceService::new(InvoiceRepository::new(pool.clone()))),
        subscriptions: Arc::new(PostgresSubscriptionService::new(SubscriptionRepository::new(pool.clone()))),
        authorization: Arc::new(SystemOnlyAuthorizationService),
        audit: Arc::new(PostgresAuditService::new(AuditRepository::new(pool))),
    };

    let pipeline = Arc::new(Pipeline::new(state));
    pipeline::run_ticker(pipeline, config.tick_interval(), metrics).await;
    Ok(())
}
