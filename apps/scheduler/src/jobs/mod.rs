// [apps/scheduler/src/jobs/mod.rs]
//! Los siete jobs fijos del pipeline (spec 4.D, 4.F, 4.G, 4.J, 4.K), cada
//! uno una funcion async que el runner (componente H) envuelve con
//! timeout y metricas, y que `pipeline` (componente I) invoca en orden.

pub mod close_after_rating;
pub mod close_cycles;
pub mod ensure_cycles;
pub mod invoice;
pub mod rating;
pub mod recovery;
pub mod terminate;

pub(crate) mod support;
