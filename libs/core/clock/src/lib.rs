// [libs/core/clock/src/lib.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN CLOCK (V1.0 - DETERMINISTIC READY)
 * CLASIFICACION: CORE PRIMITIVE (ESTRATO L1)
 * RESPONSABILIDAD: FUENTE UNICA DE TIEMPO PARA LA MAQUINA DE ESTADOS
 *
 * Toda decision temporal del scheduler (guardias de cierre, umbrales de
 * recuperacion, estampado de stamps) se resuelve a traves de este trait
 * en lugar de llamar a `Utc::now()` directamente, de modo que los
 * escenarios de prueba puedan fijar el reloj de pared sin tocar el
 * reloj del sistema operativo.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// Fuente de tiempo inyectable. Implementaciones deben ser `Send + Sync`
/// porque se comparten entre jobs concurrentes via `Arc<dyn Clock>`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reloj de produccion: delega directamente en el reloj de pared del SO.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Reloj fijo/avanzable para pruebas deterministas de escenarios S1-S6.
pub struct FixedClock {
    current: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            current: RwLock::new(timestamp),
        }
    }

    /// Mueve el reloj hacia adelante una duracion arbitraria.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.current.write().expect("FixedClock lock poisoned");
        *guard += delta;
    }

    /// Fija el reloj a un instante absoluto.
    pub fn set(&self, timestamp: DateTime<Utc>) {
        let mut guard = self.current.write().expect("FixedClock lock poisoned");
        *guard = timestamp;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().expect("FixedClock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_advances_deterministically() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::at(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(30));
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = clock.now();
        assert!(second >= first);
    }
}
