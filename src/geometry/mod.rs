pub mod plane;
pub mod stroke;

pub use plane::Plane;
pub use stroke::{ScreenProjector, Stroke};
