//! A guide stroke and the chain of cuts derived from it.
//!
//! A path advances through a fixed sequence of stages; each operation
//! names the stage it needs and fails with a stage violation rather than
//! running on missing data. Edits that change cut geometry rewind the
//! path to [`Stage::CutsDerived`], invalidating any connection.

mod merge;

use tracing::debug;

use crate::bridge::{bridge_rings, Bridge, Face};
use crate::config::SessionConfig;
use crate::cut::{AlignMode, Cut, ExistingLoop, RingRef};
use crate::error::{GeometryError, InputError, Result, TopologyError};
use crate::geometry::{Plane, ScreenProjector, Stroke};
use crate::math::{polyline, Point3, Vector3, TOLERANCE};
use crate::surface::Surface;

/// Lifecycle position of a path. Stages are strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Empty,
    StrokeCaptured,
    Knotted,
    Smoothed,
    NodesPlaced,
    CutsDerived,
    Connected,
    VisibilityComputed,
}

impl Stage {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::StrokeCaptured => "stroke captured",
            Self::Knotted => "knotted",
            Self::Smoothed => "smoothed",
            Self::NodesPlaced => "nodes placed",
            Self::CutsDerived => "cuts derived",
            Self::Connected => "connected",
            Self::VisibilityComputed => "visibility computed",
        }
    }
}

/// One retopology strip: the projected guide stroke, its cut chain, and
/// optional pre-existing boundary loops at either end.
#[derive(Debug, Clone)]
pub struct Path {
    stage: Stage,
    world_path: Vec<Point3>,
    knots: Vec<usize>,
    cut_nodes: Vec<Point3>,
    cut_normals: Vec<Vector3>,
    cuts: Vec<Cut>,
    existing_head: Option<ExistingLoop>,
    existing_tail: Option<ExistingLoop>,
    segments: usize,
    ring_segments: usize,
    seg_lock: bool,
    bridges: Vec<Bridge>,
}

impl Path {
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            stage: Stage::Empty,
            world_path: Vec::new(),
            knots: Vec::new(),
            cut_nodes: Vec::new(),
            cut_normals: Vec::new(),
            cuts: Vec::new(),
            existing_head: None,
            existing_tail: None,
            segments: config.ring_count,
            ring_segments: config.vertex_count,
            seg_lock: false,
            bridges: Vec::new(),
        }
    }

    /// Runs the whole derivation pipeline for a freshly drawn stroke.
    ///
    /// # Errors
    ///
    /// Propagates the first failing stage; no partial path is returned.
    pub fn from_stroke(
        stroke: &Stroke,
        projector: &dyn ScreenProjector,
        surface: &dyn Surface,
        config: &SessionConfig,
    ) -> Result<Self> {
        let mut path = Self::new(config);
        path.capture_stroke(stroke, projector, surface, config.cull_factor)?;
        path.find_knots(config.feature_factor)?;
        path.smooth_path(config.smooth_factor)?;
        path.create_cut_nodes()?;
        path.cuts_on_path(surface)?;
        if config.auto_align {
            path.align_cuts(true)?;
        }
        Ok(path)
    }

    /// Wraps a single clicked cut as a one-ring path that later cuts can
    /// extend.
    #[must_use]
    pub fn from_single_cut(cut: Cut, config: &SessionConfig) -> Self {
        let mut path = Self::new(config);
        path.world_path = vec![*cut.plane_com()];
        path.ring_segments = cut.ring_segments();
        path.segments = 0;
        path.cuts.push(cut);
        path.seg_lock = true;
        path.stage = Stage::CutsDerived;
        path
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    #[must_use]
    pub fn segments(&self) -> usize {
        self.segments
    }

    #[must_use]
    pub fn ring_segments(&self) -> usize {
        self.ring_segments
    }

    #[must_use]
    pub fn knots(&self) -> &[usize] {
        &self.knots
    }

    /// A path attached to existing geometry cannot change its ring
    /// vertex count.
    #[must_use]
    pub fn locked(&self) -> bool {
        self.existing_head.is_some() || self.existing_tail.is_some()
    }

    /// A path holding hand-placed cuts cannot change its segment count;
    /// re-deriving nodes would discard them.
    #[must_use]
    pub fn seg_locked(&self) -> bool {
        self.seg_lock
    }

    fn require(&self, needed: Stage) -> Result<()> {
        if self.stage < needed {
            return Err(TopologyError::StageViolation {
                needed: needed.name(),
                actual: self.stage.name(),
            }
            .into());
        }
        Ok(())
    }

    fn invalidate_connection(&mut self) {
        if self.stage > Stage::CutsDerived {
            self.stage = Stage::CutsDerived;
            self.bridges.clear();
        }
    }

    /// Projects a screen stroke onto the surface, culling raw samples
    /// first. Samples whose ray misses the surface are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::EmptyStroke`] for a stroke under two points
    /// and [`InputError::StrokeOffSurface`] when fewer than two samples
    /// hit the surface.
    pub fn capture_stroke(
        &mut self,
        stroke: &Stroke,
        projector: &dyn ScreenProjector,
        surface: &dyn Surface,
        cull_factor: usize,
    ) -> Result<()> {
        if stroke.len() < 2 {
            return Err(InputError::EmptyStroke(stroke.len()).into());
        }
        let culled = polyline::cull(stroke.points(), cull_factor);
        let mut world = Vec::with_capacity(culled.len());
        for screen in &culled {
            let (origin, dir) = projector.ray(screen);
            if let Some(hit) = surface.ray_intersect(&origin, &dir) {
                world.push(hit);
            }
        }
        if world.len() < 2 {
            return Err(InputError::StrokeOffSurface.into());
        }
        debug!(raw = stroke.len(), kept = world.len(), "stroke projected");

        self.world_path = world;
        self.knots.clear();
        self.cuts.clear();
        self.bridges.clear();
        self.stage = Stage::StrokeCaptured;
        Ok(())
    }

    /// Detects direction-change features of the projected stroke.
    ///
    /// The detection threshold scales with the stroke's bounding box, so
    /// `feature_factor` is resolution independent; bigger values keep
    /// more corners.
    ///
    /// # Errors
    ///
    /// Fails when no stroke has been captured.
    pub fn find_knots(&mut self, feature_factor: usize) -> Result<()> {
        self.require(Stage::StrokeCaptured)?;
        let eps = bbox_diagonal(&self.world_path) / (feature_factor.max(1) * 10) as f64;
        self.knots = rdp_indices(&self.world_path, eps);
        self.stage = Stage::Knotted;
        Ok(())
    }

    /// Relaxes the stroke between knots, pinning each knot in place.
    ///
    /// # Errors
    ///
    /// Fails when knots have not been detected.
    pub fn smooth_path(&mut self, smooth_factor: usize) -> Result<()> {
        self.require(Stage::Knotted)?;
        for win in self.knots.windows(2) {
            polyline::smooth(&mut self.world_path[win[0]..=win[1]], smooth_factor, false);
        }
        self.stage = Stage::Smoothed;
        Ok(())
    }

    /// Places `segments + 1` cut nodes along the smoothed stroke at
    /// uniform arc spacing, snapping a node onto any knot within half a
    /// step, and derives each node's plane normal from the local stroke
    /// tangent.
    ///
    /// # Errors
    ///
    /// Fails before smoothing, or when the stroke cannot support the
    /// requested node count.
    pub fn create_cut_nodes(&mut self) -> Result<()> {
        self.require(Stage::Smoothed)?;
        let count = self.segments + 1;
        let mut nodes = polyline::resample_uniform(&self.world_path, count, false, 0.0)?;

        let lengths = polyline::cumulative_lengths(&self.world_path, false);
        let total = lengths.last().copied().unwrap_or(0.0);
        let step = total / self.segments.max(1) as f64;
        for &k in &self.knots {
            let s = lengths[k];
            let i = (s / step).round() as usize;
            if i == 0 || i + 1 >= count {
                continue;
            }
            if (s - i as f64 * step).abs() < 0.5 * step {
                nodes[i] = self.world_path[k];
            }
        }

        let mut normals = Vec::with_capacity(count);
        for i in 0..count {
            let a = nodes[i.saturating_sub(1)];
            let b = nodes[(i + 1).min(count - 1)];
            let tangent = b - a;
            if tangent.norm() < TOLERANCE {
                return Err(
                    GeometryError::Degenerate("coincident cut nodes".into()).into()
                );
            }
            normals.push(tangent.normalize());
        }

        self.cut_nodes = nodes;
        self.cut_normals = normals;
        self.stage = Stage::NodesPlaced;
        Ok(())
    }

    /// Cuts the surface at every node. Nodes whose plane fails to produce
    /// a usable boundary are skipped; the normals of the surviving cuts
    /// are then smoothed through three passes of neighbor-center
    /// averaging, re-cutting after each adjustment.
    ///
    /// # Errors
    ///
    /// Fails before node placement, or when fewer than two cuts survive.
    pub fn cuts_on_path(&mut self, surface: &dyn Surface) -> Result<()> {
        self.require(Stage::NodesPlaced)?;
        let mut cuts = Vec::with_capacity(self.cut_nodes.len());
        for (node, normal) in self.cut_nodes.iter().zip(&self.cut_normals) {
            let plane = Plane::from_normal(*node, *normal)?;
            match Cut::from_plane(plane, surface, node, self.ring_segments) {
                Ok(cut) => cuts.push(cut),
                Err(err) => debug!(%err, "node produced no cut"),
            }
        }
        if cuts.len() < 2 {
            return Err(GeometryError::InsufficientGeometry(format!(
                "{} usable cuts along the stroke",
                cuts.len()
            ))
            .into());
        }

        self.cuts = cuts;
        self.stage = Stage::CutsDerived;
        self.smooth_cut_normals(surface, 3)?;
        Ok(())
    }

    /// Re-orients each cutting plane toward the direction between its
    /// neighbors' ring centers, straightening the chain.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist; propagates re-cut failures.
    pub fn smooth_cuts(&mut self, surface: &dyn Surface, passes: usize) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        self.smooth_cut_normals(surface, passes)?;
        self.invalidate_connection();
        Ok(())
    }

    /// Blends each cutting plane's normal with the stroke tangent sampled
    /// at the nearest cut node, pulling planes that drifted during other
    /// smoothing passes back toward the drawn direction. Each adjusted
    /// cut is re-cut against the surface.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist; propagates re-cut failures.
    pub fn average_normals(&mut self, surface: &dyn Surface) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        if self.cut_nodes.is_empty() {
            return Ok(());
        }
        let nodes = self.cut_nodes.clone();
        let tangents = self.cut_normals.clone();
        for cut in &mut self.cuts {
            let com = *cut.plane_com();
            let mut nearest = 0;
            let mut nearest_dist = f64::MAX;
            for (i, node) in nodes.iter().enumerate() {
                let d = (com - node).norm_squared();
                if d < nearest_dist {
                    nearest_dist = d;
                    nearest = i;
                }
            }
            let mut tangent = tangents[nearest];
            if tangent.dot(cut.plane().normal()) < 0.0 {
                tangent = -tangent;
            }
            let dir = cut.plane().normal() + tangent;
            if dir.norm() < TOLERANCE {
                continue;
            }
            cut.set_normal(dir, surface)?;
        }
        self.invalidate_connection();
        Ok(())
    }

    /// Replaces every interior cutting plane's normal with the linear
    /// interpolation between the two endpoint normals, flattening the
    /// chain into an even sweep. Each adjusted cut is re-cut against the
    /// surface. A chain of fewer than three cuts is left unchanged.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist; propagates re-cut failures.
    pub fn interpolate_endpoints(&mut self, surface: &dyn Surface) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        let n = self.cuts.len();
        if n < 3 {
            return Ok(());
        }
        let first = *self.cuts[0].plane().normal();
        let mut last = *self.cuts[n - 1].plane().normal();
        if first.dot(&last) < 0.0 {
            last = -last;
        }
        for (i, cut) in self.cuts.iter_mut().enumerate().take(n - 1).skip(1) {
            let t = i as f64 / (n - 1) as f64;
            let dir = first * (1.0 - t) + last * t;
            if dir.norm() < TOLERANCE {
                continue;
            }
            cut.set_normal(dir, surface)?;
        }
        self.invalidate_connection();
        Ok(())
    }

    fn smooth_cut_normals(&mut self, surface: &dyn Surface, passes: usize) -> Result<()> {
        let n = self.cuts.len();
        for _ in 0..passes {
            let coms: Vec<Point3> = self.cuts.iter().map(|c| *c.plane_com()).collect();
            for (i, cut) in self.cuts.iter_mut().enumerate() {
                let a = coms[i.saturating_sub(1)];
                let b = coms[(i + 1).min(n - 1)];
                let mut dir = b - a;
                if dir.norm() < TOLERANCE {
                    continue;
                }
                if dir.dot(cut.plane().normal()) < 0.0 {
                    dir = -dir;
                }
                cut.set_normal(dir, surface)?;
            }
        }
        Ok(())
    }

    /// Aligns every cut's seam to its predecessor, front to back.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist; propagates resampling failures.
    pub fn align_cuts(&mut self, fine_grain: bool) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        for i in 1..self.cuts.len() {
            let (head, tail) = self.cuts.split_at_mut(i);
            tail[0].align(head.last().map(|c| &*c), None, AlignMode::Backward, fine_grain)?;
        }
        self.invalidate_connection();
        Ok(())
    }

    /// Re-aligns one cut against its in-chain neighbors. Returns the
    /// applied shift delta.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist or for an out-of-range index.
    pub fn align_cut(
        &mut self,
        index: usize,
        mode: AlignMode,
        fine_grain: bool,
    ) -> Result<f64> {
        self.require(Stage::CutsDerived)?;
        if index >= self.cuts.len() {
            return Err(TopologyError::EntityNotFound("cut").into());
        }
        let (head, rest) = self.cuts.split_at_mut(index);
        let (cut, tail) = match rest.split_first_mut() {
            Some(split) => split,
            None => return Err(TopologyError::EntityNotFound("cut").into()),
        };
        let delta = cut.align(
            head.last().map(|c| &*c),
            tail.first().map(|c| &*c),
            mode,
            fine_grain,
        )?;
        self.invalidate_connection();
        Ok(delta)
    }

    /// Sets one cut's seam rotation.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist or for an out-of-range index.
    pub fn shift_cut(&mut self, index: usize, shift: f64) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        let cut = self
            .cuts
            .get_mut(index)
            .ok_or(TopologyError::EntityNotFound("cut"))?;
        cut.set_shift(shift)?;
        self.invalidate_connection();
        Ok(())
    }

    /// Rotates every seam by the same delta, preserving relative
    /// alignment along the chain.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist; propagates resampling failures.
    pub fn shift_all(&mut self, delta: f64) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        for cut in &mut self.cuts {
            let shift = cut.shift() + delta;
            cut.set_shift(shift)?;
        }
        self.invalidate_connection();
        Ok(())
    }

    /// Moves one cutting plane along its own normal and re-cuts.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist, for an out-of-range index, or when the
    /// moved plane no longer intersects the surface.
    pub fn translate_cut(
        &mut self,
        index: usize,
        distance: f64,
        surface: &dyn Surface,
    ) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        let cut = self
            .cuts
            .get_mut(index)
            .ok_or(TopologyError::EntityNotFound("cut"))?;
        let offset = cut.plane().normal() * distance;
        cut.translate(&offset, surface)?;
        self.invalidate_connection();
        Ok(())
    }

    /// Re-cuts every cut against the surface, after the surface itself
    /// changed under the session.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist; propagates cross-section failures.
    pub fn recut_cuts(&mut self, surface: &dyn Surface) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        let count = self.ring_segments;
        for cut in &mut self.cuts {
            cut.recut(surface, count)?;
        }
        self.invalidate_connection();
        Ok(())
    }

    /// Changes the ring vertex count of every cut, rescaling seam shifts
    /// proportionally.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::PathLocked`] when an attached boundary
    /// fixes the count.
    pub fn set_ring_segments(&mut self, count: usize) -> Result<()> {
        if self.locked() {
            return Err(
                TopologyError::PathLocked("ring count is fixed by an attached boundary").into(),
            );
        }
        if count == self.ring_segments {
            return Ok(());
        }
        for cut in &mut self.cuts {
            cut.set_ring_segments(count)?;
        }
        self.ring_segments = count;
        self.invalidate_connection();
        Ok(())
    }

    /// Changes the number of cuts along the stroke and re-derives them.
    ///
    /// # Errors
    ///
    /// Fails before the stroke is smoothed or when hand-placed cuts lock
    /// the count; propagates derivation failures.
    pub fn set_segments(&mut self, segments: usize, surface: &dyn Surface) -> Result<()> {
        if self.seg_lock {
            return Err(TopologyError::PathLocked(
                "segment count is fixed after hand-placed cuts",
            )
            .into());
        }
        self.require(Stage::Smoothed)?;
        self.segments = segments;
        if self.stage >= Stage::NodesPlaced {
            self.stage = Stage::Smoothed;
            self.create_cut_nodes()?;
            self.cuts_on_path(surface)?;
        }
        Ok(())
    }

    /// Attaches a pre-existing boundary loop before the first cut,
    /// adopting its vertex count and locking the path's ring count.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::RingMismatch`] when the other end is
    /// already attached at a different count.
    pub fn attach_head(&mut self, boundary: ExistingLoop) -> Result<()> {
        self.adopt_ring_count(boundary.verts().len())?;
        self.existing_head = Some(boundary);
        self.invalidate_connection();
        Ok(())
    }

    /// Attaches a pre-existing boundary loop after the last cut. See
    /// [`Path::attach_head`].
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::RingMismatch`] when the other end is
    /// already attached at a different count.
    pub fn attach_tail(&mut self, boundary: ExistingLoop) -> Result<()> {
        self.adopt_ring_count(boundary.verts().len())?;
        self.existing_tail = Some(boundary);
        self.invalidate_connection();
        Ok(())
    }

    fn adopt_ring_count(&mut self, count: usize) -> Result<()> {
        if self.locked() && count != self.ring_segments {
            return Err(TopologyError::RingMismatch {
                left: self.ring_segments,
                right: count,
            }
            .into());
        }
        if count != self.ring_segments {
            for cut in &mut self.cuts {
                cut.set_ring_segments(count)?;
            }
            self.ring_segments = count;
        }
        Ok(())
    }

    fn rings(&self) -> Vec<RingRef<'_>> {
        let mut rings = Vec::with_capacity(self.cuts.len() + 2);
        if let Some(head) = &self.existing_head {
            rings.push(RingRef::Existing(head));
        }
        rings.extend(self.cuts.iter().map(RingRef::Derived));
        if let Some(tail) = &self.existing_tail {
            rings.push(RingRef::Existing(tail));
        }
        rings
    }

    /// Bridges every consecutive ring pair, including attached boundary
    /// loops, into quad bands.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist; propagates ring mismatches.
    pub fn connect(&mut self) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        let rings = self.rings();
        let mut bridges = Vec::with_capacity(rings.len().saturating_sub(1));
        for win in rings.windows(2) {
            bridges.push(bridge_rings(win[0], win[1])?);
        }
        self.bridges = bridges;
        self.stage = Stage::Connected;
        Ok(())
    }

    /// Recomputes per-vertex occlusion for every cut from the given view.
    ///
    /// # Errors
    ///
    /// Fails before cuts exist.
    pub fn update_visibility(
        &mut self,
        surface: &dyn Surface,
        projector: &dyn ScreenProjector,
    ) -> Result<()> {
        self.require(Stage::CutsDerived)?;
        for cut in &mut self.cuts {
            cut.update_visibility(surface, projector);
        }
        if self.stage == Stage::Connected {
            self.stage = Stage::VisibilityComputed;
        }
        Ok(())
    }

    /// Emits this path's vertices and faces with path-local indices.
    /// Attached boundary loops contribute their vertices so hosts can
    /// weld by position.
    ///
    /// # Errors
    ///
    /// Fails before the path is connected.
    pub fn mesh_chunk(&self) -> Result<(Vec<Point3>, Vec<Face>)> {
        self.require(Stage::Connected)?;
        let rings = self.rings();
        let mut verts = Vec::new();
        let mut bases = Vec::with_capacity(rings.len());
        for ring in &rings {
            bases.push(verts.len() as u32);
            verts.extend_from_slice(ring.verts());
        }

        let mut faces = Vec::new();
        for (k, bridge) in self.bridges.iter().enumerate() {
            let n = rings[k].verts().len() as u32;
            let (a_base, b_base) = (bases[k], bases[k + 1]);
            for face in &bridge.faces {
                faces.push(face.map_indices(|i| {
                    if i < n {
                        a_base + i
                    } else {
                        b_base + (i - n)
                    }
                }));
            }
        }
        Ok((verts, faces))
    }
}

fn bbox_diagonal(points: &[Point3]) -> f64 {
    let mut min = Point3::new(f64::MAX, f64::MAX, f64::MAX);
    let mut max = Point3::new(f64::MIN, f64::MIN, f64::MIN);
    for p in points {
        min = Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
        max = Point3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
    }
    (max - min).norm()
}

/// Ramer–Douglas–Peucker feature indices of a polyline, endpoints always
/// included, in ascending order.
fn rdp_indices(points: &[Point3], eps: f64) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }
    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((a, b)) = stack.pop() {
        if b <= a + 1 {
            continue;
        }
        let mut far = a;
        let mut far_dist = 0.0;
        for i in a + 1..b {
            let d = point_segment_distance(&points[i], &points[a], &points[b]);
            if d > far_dist {
                far_dist = d;
                far = i;
            }
        }
        if far_dist > eps {
            keep[far] = true;
            stack.push((a, far));
            stack.push((far, b));
        }
    }

    keep.iter()
        .enumerate()
        .filter_map(|(i, kept)| kept.then_some(i))
        .collect()
}

fn point_segment_distance(p: &Point3, a: &Point3, b: &Point3) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < TOLERANCE {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    let q = a + ab * t;
    (p - q).norm()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::geometry::stroke::OrthoProjector;
    use crate::math::Point2;
    use crate::surface::test_meshes;

    use super::*;

    fn tube() -> crate::surface::TriMesh {
        test_meshes::cylinder(5.0, -4.0, 4.0, 64, 4)
    }

    // Looking down -Y: screen X maps to world Z, screen Y to world -X.
    fn side_projector() -> OrthoProjector {
        OrthoProjector::looking(Point3::new(0.0, 30.0, 0.0), -Vector3::y(), 100.0)
    }

    fn axis_stroke() -> Stroke {
        Stroke::new(
            (0..29)
                .map(|i| Point2::new(-3.5 + i as f64 * 0.25, 0.0))
                .collect(),
        )
    }

    fn small_config() -> SessionConfig {
        SessionConfig {
            ring_count: 4,
            vertex_count: 8,
            cull_factor: 2,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn stroke_to_mesh_chunk() {
        let mesh = tube();
        let mut path =
            Path::from_stroke(&axis_stroke(), &side_projector(), &mesh, &small_config())
                .unwrap();

        assert_eq!(path.stage(), Stage::CutsDerived);
        assert_eq!(path.cuts().len(), 5);
        for cut in path.cuts() {
            assert!(cut.cyclic());
            assert_eq!(cut.ring_segments(), 8);
            assert!((cut.plane_com().x).abs() < 0.2);
            assert!((cut.plane_com().y).abs() < 0.2);
        }

        path.connect().unwrap();
        let (verts, faces) = path.mesh_chunk().unwrap();
        assert_eq!(verts.len(), 40);
        assert_eq!(faces.len(), 32);
        for face in &faces {
            assert!(matches!(*face, Face::Quad(_)));
        }
    }

    #[test]
    fn cut_centers_follow_the_stroke() {
        let mesh = tube();
        let path =
            Path::from_stroke(&axis_stroke(), &side_projector(), &mesh, &small_config())
                .unwrap();
        let mut zs: Vec<f64> = path.cuts().iter().map(|c| c.plane_com().z).collect();
        let sorted = {
            let mut s = zs.clone();
            s.sort_by(|a, b| a.partial_cmp(b).unwrap());
            s
        };
        assert_eq!(zs, sorted, "cut order follows the stroke");
        assert!((zs.remove(0) - (-3.5)).abs() < 0.3);
        assert!((zs.pop().unwrap() - 3.5).abs() < 0.3);
    }

    #[test]
    fn operations_out_of_order_fail() {
        let mut path = Path::new(&small_config());
        assert!(path.find_knots(4).is_err());
        assert!(path.create_cut_nodes().is_err());
        assert!(path.connect().is_err());
        assert!(path.mesh_chunk().is_err());
    }

    #[test]
    fn short_stroke_rejected() {
        let mesh = tube();
        let mut path = Path::new(&small_config());
        let stroke = Stroke::new(vec![Point2::new(0.0, 0.0)]);
        let err = path
            .capture_stroke(&stroke, &side_projector(), &mesh, 2)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::RecontourError::Input(InputError::EmptyStroke(1))
        ));
    }

    #[test]
    fn off_surface_stroke_rejected() {
        let mesh = tube();
        let mut path = Path::new(&small_config());
        // Screen Y of 20 projects to world x = -20, past the tube
        let stroke = Stroke::new(
            (0..10)
                .map(|i| Point2::new(-2.0 + i as f64 * 0.4, 20.0))
                .collect(),
        );
        let err = path
            .capture_stroke(&stroke, &side_projector(), &mesh, 2)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::RecontourError::Input(InputError::StrokeOffSurface)
        ));
    }

    #[test]
    fn corner_survives_knot_detection() {
        let mut pts: Vec<Point3> = (0..=10)
            .map(|i| Point3::new(i as f64 * 0.2, 0.0, 0.0))
            .collect();
        pts.extend((1..=10).map(|i| Point3::new(2.0, i as f64 * 0.2, 0.0)));

        let knots = rdp_indices(&pts, 0.05);
        assert_eq!(knots.first(), Some(&0));
        assert_eq!(knots.last(), Some(&(pts.len() - 1)));
        assert!(knots.contains(&10), "corner dropped: {knots:?}");
    }

    #[test]
    fn segment_count_change_rederives_cuts() {
        let mesh = tube();
        let mut path =
            Path::from_stroke(&axis_stroke(), &side_projector(), &mesh, &small_config())
                .unwrap();
        path.set_segments(6, &mesh).unwrap();
        assert_eq!(path.cuts().len(), 7);
        assert_eq!(path.segments(), 6);
    }

    #[test]
    fn ring_count_change_applies_to_all_cuts() {
        let mesh = tube();
        let mut path =
            Path::from_stroke(&axis_stroke(), &side_projector(), &mesh, &small_config())
                .unwrap();
        path.set_ring_segments(12).unwrap();
        for cut in path.cuts() {
            assert_eq!(cut.ring_segments(), 12);
        }
    }

    #[test]
    fn attached_boundary_locks_ring_count() {
        let mesh = tube();
        let mut path =
            Path::from_stroke(&axis_stroke(), &side_projector(), &mesh, &small_config())
                .unwrap();

        let boundary = ExistingLoop::new(
            (0..12)
                .map(|i| {
                    let a = i as f64 * std::f64::consts::TAU / 12.0;
                    Point3::new(5.0 * a.cos(), 5.0 * a.sin(), -3.9)
                })
                .collect(),
            true,
        );
        path.attach_head(boundary).unwrap();
        assert!(path.locked());
        assert_eq!(path.ring_segments(), 12);
        for cut in path.cuts() {
            assert_eq!(cut.ring_segments(), 12);
        }

        let err = path.set_ring_segments(8).unwrap_err();
        assert!(matches!(
            err,
            crate::RecontourError::Topology(TopologyError::PathLocked(_))
        ));

        // The boundary participates in the connection
        path.connect().unwrap();
        let (verts, faces) = path.mesh_chunk().unwrap();
        assert_eq!(verts.len(), 12 * 6);
        assert_eq!(faces.len(), 12 * 5);
    }

    #[test]
    fn connect_invalidated_by_seam_edit() {
        let mesh = tube();
        let mut path =
            Path::from_stroke(&axis_stroke(), &side_projector(), &mesh, &small_config())
                .unwrap();
        path.connect().unwrap();
        assert_eq!(path.stage(), Stage::Connected);

        path.shift_cut(2, 1.5).unwrap();
        assert_eq!(path.stage(), Stage::CutsDerived);
        assert!(path.mesh_chunk().is_err());
    }

    #[test]
    fn averaging_pulls_normals_back_to_the_stroke() {
        let mesh = tube();
        let mut path =
            Path::from_stroke(&axis_stroke(), &side_projector(), &mesh, &small_config())
                .unwrap();
        path.cuts[2]
            .set_normal(Vector3::new(0.6, 0.0, 1.0), &mesh)
            .unwrap();
        let before = path.cuts()[2].plane().normal().z.abs();

        path.average_normals(&mesh).unwrap();
        let after = path.cuts()[2].plane().normal().z.abs();
        assert!(
            after > before,
            "normal not pulled toward the stroke: {before} -> {after}"
        );
    }

    #[test]
    fn endpoint_interpolation_levels_interior_normals() {
        let mesh = tube();
        let mut path =
            Path::from_stroke(&axis_stroke(), &side_projector(), &mesh, &small_config())
                .unwrap();
        path.cuts[2]
            .set_normal(Vector3::new(0.6, 0.0, 1.0), &mesh)
            .unwrap();
        path.connect().unwrap();

        path.interpolate_endpoints(&mesh).unwrap();
        assert_eq!(path.stage(), Stage::CutsDerived);
        let nz = path.cuts()[2].plane().normal().z.abs();
        assert!(nz > 0.99, "interior normal not leveled: {nz}");
    }

    #[test]
    fn visibility_pass_covers_every_cut() {
        let mesh = tube();
        let mut path =
            Path::from_stroke(&axis_stroke(), &side_projector(), &mesh, &small_config())
                .unwrap();
        path.connect().unwrap();
        path.update_visibility(&mesh, &side_projector()).unwrap();
        assert_eq!(path.stage(), Stage::VisibilityComputed);
        for cut in path.cuts() {
            assert!(cut.visible().iter().any(|v| *v));
            assert!(cut.visible().iter().any(|v| !*v));
        }
    }
}
