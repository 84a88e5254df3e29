// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: BILLING DOMAIN MODELS (V1.0 - LIFECYCLE CORE)
 * CLASIFICACION: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: DEFINICION DE CONTRATOS SOBERANOS DEL CICLO DE
 * FACTURACION: SUSCRIPCIONES, CICLOS, ASIENTOS Y FACTURAS.
 *
 * Ninguno de estos tipos contiene logica de persistencia ni de reglas de
 * negocio; son datos puros. Las transiciones viven en
 * `cadence-domain-billing`, el acceso a disco en `cadence-infra-db`.
 * =================================================================
 */

pub mod actor;
pub mod audit;
pub mod billing_cycle;
pub mod invoice;
pub mod job_run;
pub mod ledger;
pub mod rating;
pub mod subscription;

pub use actor::{Actor, ActorType};
pub use audit::AuditEvent;
pub use billing_cycle::{BillingCycle, CycleStatus};
pub use invoice::{Invoice, InvoiceStatus};
pub use job_run::JobRun;
pub use ledger::{
    Direction, LedgerAccount, LedgerAccountCode, LedgerEntry, LedgerEntryLine, LEDGER_SOURCE_BILLING_CYCLE,
};
pub use rating::{ChargeType, RatingLineItem, RatingResult};
pub use subscription::{BillingCycleType, Subscription, SubscriptionStatus};

pub use cadence_core_idgen::Snowflake;
