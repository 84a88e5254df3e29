// [apps/scheduler/src/jobs/recovery.rs]
//! Job `recovery_sweep` (spec 4.J): reimpulsa ciclos varados en una
//! etapa intermedia mas alla de `RECOVERY_THRESHOLD`. Reutiliza
//! exactamente las mismas transiciones que el pipeline hacia adelante
//! (`rating::advance`, `close_after_rating::advance`, `invoice::advance`);
//! no introduce una ruta alternativa.

use super::support::{record_cycle_failure, time_claim};
use super::{close_after_rating, invoice, rating};
use crate::state::AppState;
use cadence_domain_billing::SchedulerError;
use chrono::{DateTime, Utc};

pub async fn run(state: AppState, now: DateTime<Utc>) -> Result<(u64, u64), SchedulerError> {
    let cutoff = now - state.config.recovery_threshold();
    let limit = state.config.batch_size;

    let mut processed = 0u64;
    let mut errors = 0u64;

    let stranded_unrated =
        time_claim(&state, "billing_cycle", state.cycles.claim_stranded_closing_unrated(cutoff, limit)).await?;
    for cycle in stranded_unrated {
        let cycle_id = cycle.id;
        match rating::advance(&state, cycle, now).await {
            Ok(true) => processed += 1,
            Ok(false) => {}
            Err(error) => {
                errors += 1;
                record_cycle_failure(&state, "recovery_rating", cycle_id, &error, now).await;
                tracing::warn!(%error, "recovery_sweep: rating stage failed");
            }
        }
    }

    // recovery.close (spec 4.C): mismo predicado que usa `close_after_rating`
    // hacia adelante, sin umbral de edad — cubre el caso en que el worker
    // que debia cerrar el ciclo murio antes de confirmar la transaccion.
    let stranded_rated = time_claim(&state, "billing_cycle", state.cycles.claim_closing_rated(limit)).await?;
    for cycle in stranded_rated {
        let cycle_id = cycle.id;
        match close_after_rating::advance(&state, cycle, now).await {
            Ok(true) => processed += 1,
            Ok(false) => {}
            Err(error) => {
                errors += 1;
                record_cycle_failure(&state, "recovery_close", cycle_id, &error, now).await;
                tracing::warn!(%error, "recovery_sweep: close stage failed");
            }
        }
    }

    let stranded_uninvoiced =
        time_claim(&state, "billing_cycle", state.cycles.claim_stranded_closed_uninvoiced(cutoff, limit)).await?;
    for cycle in stranded_uninvoiced {
        let cycle_id = cycle.id;
        match invoice::advance(&state, cycle, now).await {
            Ok(true) => processed += 1,
            Ok(false) => {}
            Err(error) => {
                errors += 1;
                record_cycle_failure(&state, "recovery_invoice", cycle_id, &error, now).await;
                tracing::warn!(%error, "recovery_sweep: invoice stage failed");
            }
        }
    }

    state.metrics.batch_processed.with_label_values(&["recovery"]).inc_by(processed as f64);
    Ok((processed, errors))
}
