// [libs/shared/telemetry/src/lib.rs]
/*!
 * =================================================================
 * APARATO: TELEMETRY
 * CLASIFICACION: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: INICIALIZACION DE TRAZADO Y CAPTURA DE PANICOS
 * =================================================================
 */

pub mod tenant;

pub use tenant::TenantContext;

use std::panic;
use tracing::{error, info, instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as formatting_layer, EnvFilter};

/// Inicializa tracing con filtro por entorno y un panic hook que deja
/// rastro estructurado antes de que el hilo termine.
///
/// En desarrollo emite logs compactos legibles; en produccion, JSON
/// plano apto para ingestion por un agregador de logs.
#[instrument(skip_all)]
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}={level},sqlx=warn",
            service_name,
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(formatting_layer::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(formatting_layer::layer().json().flatten_event(true))
            .init();
    }

    let service = service_name.to_string();
    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("non-string panic payload");

        error!(target: "panic", service = %service, location = %location, "thread panicked: {payload}");
    }));

    info!(service = %service_name, "tracing initialized");
}
