pub mod bridge;
pub mod config;
pub mod cut;
pub mod error;
pub mod geometry;
pub mod math;
pub mod path;
pub mod section;
pub mod session;
pub mod surface;

pub use error::{RecontourError, Result};
