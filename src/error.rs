use thiserror::Error;

/// Top-level error type for the recontour kernel.
#[derive(Debug, Error)]
pub enum RecontourError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Input(#[from] InputError),
}

/// Errors related to geometric computations.
///
/// These are always recoverable: the attempted cut or path edit is
/// discarded and the session keeps its prior state.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("cutting plane does not intersect the surface")]
    NoIntersection,

    #[error("insufficient geometry: {0}")]
    InsufficientGeometry(String),

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,
}

/// Errors related to the cut graph's topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("ring segment mismatch: {left} vs {right}")]
    RingMismatch { left: usize, right: usize },

    #[error("path is locked: {0}")]
    PathLocked(&'static str),

    #[error("cannot remove the last cut of an unanchored path")]
    LastCut,

    #[error("entity not found: {0}")]
    EntityNotFound(&'static str),

    #[error("operation needs {needed} but the path is at {actual}")]
    StageViolation {
        needed: &'static str,
        actual: &'static str,
    },
}

/// Errors related to user stroke input.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("stroke has too few points ({0})")]
    EmptyStroke(usize),

    #[error("stroke does not project onto the surface")]
    StrokeOffSurface,
}

/// Convenience type alias for results using [`RecontourError`].
pub type Result<T> = std::result::Result<T, RecontourError>;
