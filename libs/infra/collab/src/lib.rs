// [libs/infra/collab/src/lib.rs]
/*!
 * =================================================================
 * APARATO: EXTERNAL COLLABORATORS
 * CLASIFICACION: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CAPACIDADES HACIA SISTEMAS EXTERNOS AL SCHEDULER
 *
 * Cada colaborador (rating, facturacion, suscripciones, autorizacion,
 * auditoria) se modela como un trait async. El scheduler solo conoce
 * el trait; las implementaciones de este crate son dobles
 * deterministas respaldados por Postgres, suficientes para desarrollo
 * y para las pruebas de escenario, y reemplazables una a una por
 * adaptadores reales sin tocar el pipeline (spec 6).
 * =================================================================
 */

pub mod audit_service;
pub mod authorization_service;
pub mod error;
pub mod invoice_service;
pub mod rating_service;
pub mod subscription_service;

pub use audit_service::{AuditService, PostgresAuditService};
pub use authorization_service::{AuthorizationService, SystemOnlyAuthorizationService};
pub use error::CollabError;
pub use invoice_service::{InvoiceService, PostgresInvoiceService};
pub use rating_service::{FlatRateRatingService, RatingService};
pub use subscription_service::{PostgresSubscriptionService, SubscriptionService};
