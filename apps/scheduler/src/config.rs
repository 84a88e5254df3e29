// [apps/scheduler/src/config.rs]
/*!
 * Configuracion tipada del scheduler, cargada de variables de entorno
 * (con soporte `.env` via `dotenvy`) a traves de `config`. Cualquier
 * nuevo ajuste operativo vive aqui, nunca leido ad-hoc con
 * `std::env::var` en otro modulo (spec 6: interfaces externas).
 */

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// `CADENCE_SHARD_ID` (spec 6).
    #[serde(alias = "cadence_shard_id", default = "default_shard_id")]
    pub shard_id: u64,

    /// `RUN_INTERVAL` (spec 6).
    #[serde(alias = "run_interval", default = "default_tick_interval_seconds")]
    pub tick_interval_seconds: u64,

    /// `BATCH_SIZE` (spec 6).
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    #[serde(default = "default_job_timeout_seconds")]
    pub job_timeout_seconds: u64,

    /// `RECOVERY_THRESHOLD` (spec 6), in seconds.
    #[serde(alias = "recovery_threshold", default = "default_recovery_threshold_seconds")]
    pub recovery_threshold_seconds: i64,

    /// Resolucion de la pregunta abierta sobre distinguir timeouts de
    /// fallos reales: por defecto desactivado (un timeout no se trata
    /// como error de negocio, solo se reintenta en el proximo tick).
    #[serde(default)]
    pub distinguish_timeout_stuck: bool,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// `FINALIZE_INVOICES` (spec 6): si esta desactivado, el stage de
    /// facturacion se detiene en `invoiced_at` y nunca llama a `finalize`.
    #[serde(default = "default_finalize_invoices")]
    pub finalize_invoices: bool,

    /// `ENABLED_JOBS` (spec 6): lista separada por comas, insensible a
    /// mayusculas; vacio o ausente significa "todos habilitados". Se
    /// guarda cruda y se parsea en `enabled_jobs_list` porque el crate
    /// `config` no castea listas desde una sola variable de entorno.
    #[serde(default)]
    pub enabled_jobs: Option<String>,

    #[serde(default)]
    pub max_close_batch_size: Option<i64>,
    #[serde(default)]
    pub max_rating_batch_size: Option<i64>,
    #[serde(default)]
    pub max_invoice_batch_size: Option<i64>,
}

fn default_max_connections() -> u32 {
    10
}
fn default_shard_id() -> u64 {
    0
}
fn default_tick_interval_seconds() -> u64 {
    60
}
fn default_batch_size() -> i64 {
    50
}
fn default_job_timeout_seconds() -> u64 {
    60
}
fn default_recovery_threshold_seconds() -> i64 {
    900
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_finalize_invoices() -> bool {
    true
}

impl SchedulerConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    pub fn recovery_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.recovery_threshold_seconds)
    }

    /// `None` significa "todos los jobs habilitados"; de lo contrario la
    /// lista exacta (normalizada a minusculas) a ejecutar este tick.
    pub fn enabled_jobs_list(&self) -> Option<Vec<String>> {
        match &self.enabled_jobs {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.split(',')
                    .map(|name| name.trim().to_ascii_lowercase())
                    .filter(|name| !name.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Tamano de lote efectivo para el job dado: usa el override de
    /// etapa si esta presente, si no cae al `batch_size` general.
    pub fn batch_size_for(&self, job_name: &str) -> i64 {
        match job_name {
            "close_cycles" => self.max_close_batch_size.unwrap_or(self.batch_size),
            "rating" => self.max_rating_batch_size.unwrap_or(self.batch_size),
            "invoice" => self.max_invoice_batch_size.unwrap_or(self.batch_size),
            _ => self.batch_size,
        }
    }
}
