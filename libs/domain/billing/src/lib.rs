// [libs/domain/billing/src/lib.rs]
/*!
 * =================================================================
 * APARATO: BILLING STATE ENGINE
 * CLASIFICACION: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GUARDAS, TRANSICIONES Y ARITMETICA CONTABLE PURA
 *
 * Todo lo que vive aqui es funcion pura sobre los tipos de
 * `cadence-domain-models`: nada abre una conexion, nada llama al reloj
 * del sistema directamente (siempre recibe `now` del llamador). Esto
 * es deliberado: el estrato de infraestructura (`cadence-infra-db`) es
 * el unico que decide cuando y como persistir una transicion, y lo
 * hace envolviendo estas funciones en un `UPDATE ... WHERE status = ?`.
 * =================================================================
 */

pub mod error;
pub mod guards;
pub mod ledger;
pub mod period;
pub mod state_machine;

pub use error::SchedulerError;
