// [libs/infra/db/src/schema.rs]
/*!
 * Punto de entrada de las migraciones embebidas (spec 3: modelo de
 * datos). El binario `migrator` (apps/scheduler/src/bin/migrator.rs)
 * y el arranque de pruebas de integracion usan el mismo `MIGRATOR`
 * para garantizar que el esquema de produccion y el de pruebas nunca
 * diverjan.
 */

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
