// [apps/scheduler/src/bin/migrator.rs]
//! CLI utilitario: aplica las migraciones embebidas de
//! `cadence-infra-db` contra `DATABASE_URL` sin arrancar el pipeline.
//! Util en despliegues donde la migracion corre como un paso separado
//! del arranque del proceso principal.

use cadence_infra_db::PostgresClient;
use tracing::info;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    cadence_shared_telemetry::init_tracing("cadence_migrator");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async {
        let database_url = std::env::var("DATABASE_URL").expect("FATAL: DATABASE_URL is not set");
        let max_connections: u32 = std::env::var("MAX_CONNECTIONS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(5);

        let client = PostgresClient::connect(&database_url, max_connections)
            .await
            .expect("FATAL: could not connect to the billing store");

        client.migrate().await.expect("FATAL: schema migration failed");
        info!("billing schema is up to date");
        Ok(())
    })
}
