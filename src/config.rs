/// Tunables for an interactive retopology session.
///
/// Defaults match the tool's shipped preferences; hosts may override any
/// field before constructing a [`Session`](crate::session::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Vertices per cross-section ring (`ring_segments` of a new path).
    pub vertex_count: usize,
    /// Interior cuts per guide stroke (`segments` of a new path).
    pub ring_count: usize,
    /// Keep every n-th raw screen point when capturing a stroke.
    /// Bigger culls harder and loses detail.
    pub cull_factor: usize,
    /// Iterations of stroke smoothing before node placement.
    pub smooth_factor: usize,
    /// Fraction of the stroke bounding box below which a direction change
    /// counts as a feature. Bigger detects more features.
    pub feature_factor: usize,
    /// Multiple of the local segment spacing within which a clicked cut
    /// joins an existing path instead of starting a new one.
    pub search_factor: f64,
    /// World-space distance below which a stroke end snaps onto another
    /// path's end loop.
    pub merge_threshold: f64,
    /// Maximum retained undo snapshots; the oldest is evicted beyond this.
    pub undo_depth: usize,
    /// Run seam alignment automatically after deriving neighboring cuts.
    pub auto_align: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vertex_count: 10,
            ring_count: 10,
            cull_factor: 4,
            smooth_factor: 5,
            feature_factor: 4,
            search_factor: 5.0,
            merge_threshold: 1.0,
            undo_depth: 10,
            auto_align: true,
        }
    }
}
