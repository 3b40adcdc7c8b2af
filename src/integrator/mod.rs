//! Coarse-to-fine projective integration: beam model, box classification,
//! and the node-level update loop.

pub mod coarse_to_fine;
pub mod config;
pub mod intersector;
pub mod measurement_model;

pub use coarse_to_fine::{CoarseToFineIntegrator, IntegrationError, IntegrationStats};
pub use config::{IntegratorConfig, MeasurementModelConfig};
pub use intersector::{IntersectionType, RangeImageIntersector};
pub use measurement_model::ContinuousBeamModel;
