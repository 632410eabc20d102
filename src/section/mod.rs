pub mod intersect;
pub mod normalize;

pub use intersect::{cross_section, RawBoundary};
pub use normalize::{normalize, NormalizedRing};
