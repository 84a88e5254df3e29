// [libs/infra/db/src/repositories/mod.rs]
pub mod audit;
pub mod cycles;
pub mod invoices;
pub mod ledger;
pub mod rating;
pub mod subscriptions;

pub use audit::AuditRepository;
pub use cycles::CycleRepository;
pub use invoices::InvoiceRepository;
pub use ledger::LedgerRepository;
pub use rating::RatingRepository;
pub use subscriptions::SubscriptionRepository;
