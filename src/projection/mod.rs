//! Projection layer: the spherical projection model, the per-scan range
//! image, and its min/max mipmap used by intersection queries.

pub mod hierarchical;
pub mod projector;
pub mod range_image;

pub use hierarchical::{HierarchicalRangeImage, RangeBounds};
pub use projector::{ProjectorConfig, SphericalProjector};
pub use range_image::{RangeImage2D, RangeImageStats, NO_BEAM};
