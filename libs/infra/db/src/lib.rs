// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: POSTGRES PERSISTENCE ADAPTER
 * CLASIFICACION: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: POOL, MIGRACIONES Y REPOSITORIOS CON BLOQUEO DE FILAS
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::PostgresClient;
pub use errors::DbError;
