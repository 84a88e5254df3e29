// [libs/core/idgen/src/lib.rs]
/*!
 * =================================================================
 * APARATO: SNOWFLAKE ID FORGE (V1.0 - 63-BIT TIME-ORDERED)
 * CLASIFICACION: CORE PRIMITIVE (ESTRATO L1)
 * RESPONSABILIDAD: ACUNACION DE IDENTIFICADORES UNICOS Y ORDENADOS
 *
 * Layout (63 bits, el bit de signo queda siempre en 0 para compatibilidad
 * con columnas `BIGINT` firmadas de Postgres):
 *   41 bits  milisegundos desde CADENCE_EPOCH_MS
 *   10 bits  identificador de shard/replica (CADENCE_SHARD_ID, 0-1023)
 *   12 bits  secuencia dentro del mismo milisegundo (0-4095)
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Epoca soberana: 2024-01-01T00:00:00Z en milisegundos desde Unix epoch.
pub const CADENCE_EPOCH_MS: u64 = 1_704_067_200_000;

const SHARD_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_SHARD: u64 = (1 << SHARD_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

/// Identificador de 63 bits ordenado en el tiempo. Transparente sobre `i64`
/// para mapear directamente a columnas `BIGINT` via `sqlx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(pub i64);

impl Snowflake {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Snowflake {
    fn from(value: i64) -> Self {
        Snowflake(value)
    }
}

impl sqlx::Type<sqlx::Postgres> for Snowflake {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Snowflake {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync + 'static>> {
        let raw = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Snowflake(raw))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Snowflake {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> sqlx::encode::IsNull {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_millis: u64,
    sequence: u64,
}

/// Forja de identificadores. Una instancia se comparte (via `Arc`) entre
/// todos los jobs de un proceso; el mutex interno solo protege el estado
/// de reloj/secuencia, nunca I/O.
pub struct IdGenerator {
    shard_id: u64,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    pub fn new(shard_id: u64) -> Self {
        assert!(shard_id <= MAX_SHARD, "shard_id exceeds 10-bit budget");
        Self {
            shard_id,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Lee `CADENCE_SHARD_ID` del entorno (0 por defecto).
    pub fn from_env() -> Self {
        let shard_id = std::env::var("CADENCE_SHARD_ID")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0)
            .min(MAX_SHARD);
        Self::new(shard_id)
    }

    pub fn next_id(&self) -> Snowflake {
        let mut state = self.state.lock().expect("IdGenerator lock poisoned");
        let mut now_millis = current_millis();

        if now_millis < state.last_millis {
            // Retroceso de reloj: esperamos hasta alcanzar el ultimo instante
            // conocido en lugar de arriesgar una colision de secuencia.
            now_millis = state.last_millis;
        }

        if now_millis == state.last_millis {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                // Secuencia agotada dentro del mismo milisegundo: gira hasta el siguiente tick.
                while current_millis() <= now_millis {
                    std::hint::spin_loop();
                }
                now_millis = current_millis();
            }
        } else {
            state.sequence = 0;
        }

        state.last_millis = now_millis;

        let timestamp_part = now_millis.saturating_sub(CADENCE_EPOCH_MS);
        let raw = (timestamp_part << (SHARD_BITS + SEQUENCE_BITS))
            | (self.shard_id << SEQUENCE_BITS)
            | state.sequence;

        Snowflake(raw as i64)
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonically_increasing() {
        let generator = IdGenerator::new(3);
        let mut previous = generator.next_id();
        for _ in 0..500 {
            let next = generator.next_id();
            assert!(next > previous, "snowflake ids must be strictly increasing");
            previous = next;
        }
    }

    #[test]
    fn ids_fit_in_63_bits() {
        let generator = IdGenerator::new(MAX_SHARD);
        for _ in 0..50 {
            let id = generator.next_id();
            assert!(id.as_i64() >= 0, "sign bit must stay clear");
        }
    }
}
