use tracing::debug;

use crate::error::{GeometryError, InputError, Result};
use crate::geometry::{Plane, ScreenProjector};
use crate::math::{Point2, Point3, Vector3, TOLERANCE};
use crate::section::{cross_section, normalize, RawBoundary};
use crate::surface::Surface;

/// Which neighbors a seam alignment pulls toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMode {
    /// Average pull from both neighbors when both exist.
    Between,
    /// Align to the next cut only.
    Forward,
    /// Align to the previous cut only.
    Backward,
}

/// One normalized cross-section loop with its cutting plane and seam
/// state.
///
/// The raw boundary is retained so `shift` and ring-count edits resample
/// without re-cutting the surface; moving the plane requires [`Cut::recut`].
#[derive(Debug, Clone)]
pub struct Cut {
    plane: Plane,
    seam_ref: Vector3,
    raw: RawBoundary,
    verts_simple: Vec<Point3>,
    cyclic: bool,
    shift: f64,
    plane_com: Point3,
    visible: Vec<bool>,
}

impl Cut {
    /// Cuts the surface with `plane` and normalizes the boundary nearest
    /// `seed` to `ring_segments` vertices.
    ///
    /// # Errors
    ///
    /// Propagates [`GeometryError::NoIntersection`] when the plane misses
    /// the surface and `InsufficientGeometry` when the boundary is too
    /// degenerate to resample.
    pub fn from_plane(
        plane: Plane,
        surface: &dyn Surface,
        seed: &Point3,
        ring_segments: usize,
    ) -> Result<Self> {
        let raw = cross_section(&plane, surface, seed)?;
        let seam_ref = *plane.u_dir();
        let normal = *plane.normal();
        let ring = normalize(&raw, ring_segments, 0.0, Some(&seam_ref), Some(&normal))?;
        Ok(Self {
            plane,
            seam_ref,
            raw,
            cyclic: ring.cyclic,
            plane_com: ring.com,
            visible: vec![true; ring.verts.len()],
            verts_simple: ring.verts,
            shift: 0.0,
        })
    }

    /// Builds a cut from a two-point screen gesture: the cutting plane
    /// contains the screen segment's world direction and the view
    /// direction, anchored at the first surface hit along the segment.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::StrokeOffSurface`] when no sample of the
    /// segment hits the surface, or a geometry error when the cut itself
    /// fails.
    pub fn from_screen_line(
        head: Point2,
        tail: Point2,
        projector: &dyn ScreenProjector,
        surface: &dyn Surface,
        ring_segments: usize,
    ) -> Result<Self> {
        const SAMPLES: usize = 9;

        let (head_origin, head_dir) = projector.ray(&head);
        let (tail_origin, _) = projector.ray(&tail);

        let mut hit = None;
        for i in 0..=SAMPLES {
            let t = i as f64 / SAMPLES as f64;
            let screen = head + (tail - head) * t;
            let (origin, dir) = projector.ray(&screen);
            if let Some(point) = surface.ray_intersect(&origin, &dir) {
                hit = Some(point);
                break;
            }
        }
        let seed = hit.ok_or(InputError::StrokeOffSurface)?;

        let across = tail_origin - head_origin;
        let normal = across.cross(&head_dir);
        if normal.norm() < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let plane = Plane::from_normal(seed, normal)?;
        Self::from_plane(plane, surface, &seed, ring_segments)
    }

    #[must_use]
    pub fn verts_simple(&self) -> &[Point3] {
        &self.verts_simple
    }

    #[must_use]
    pub fn cyclic(&self) -> bool {
        self.cyclic
    }

    #[must_use]
    pub fn ring_segments(&self) -> usize {
        self.verts_simple.len()
    }

    #[must_use]
    pub fn plane(&self) -> &Plane {
        &self.plane
    }

    #[must_use]
    pub fn plane_com(&self) -> &Point3 {
        &self.plane_com
    }

    #[must_use]
    pub fn shift(&self) -> f64 {
        self.shift
    }

    #[must_use]
    pub fn visible(&self) -> &[bool] {
        &self.visible
    }

    /// Sets the seam rotation and resamples at the current vertex count.
    ///
    /// # Errors
    ///
    /// Propagates resampling failures; the cut is unchanged on error.
    pub fn set_shift(&mut self, shift: f64) -> Result<()> {
        let count = self.verts_simple.len();
        let previous = self.shift;
        self.shift = shift;
        if let Err(err) = self.resample(count) {
            self.shift = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Re-resamples the stored raw boundary to `ring_segments` vertices,
    /// honoring the current `shift`.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientGeometry` when the boundary cannot support
    /// the requested count.
    pub fn resample(&mut self, ring_segments: usize) -> Result<()> {
        let ring = normalize(
            &self.raw,
            ring_segments,
            self.shift,
            Some(&self.seam_ref),
            Some(self.plane.normal()),
        )?;
        self.cyclic = ring.cyclic;
        self.plane_com = ring.com;
        self.verts_simple = ring.verts;
        self.visible = vec![true; ring_segments];
        Ok(())
    }

    /// Changes the ring's vertex count, rescaling `shift` so the seam
    /// stays at the same arc position.
    ///
    /// # Errors
    ///
    /// Propagates resampling failures.
    pub fn set_ring_segments(&mut self, count: usize) -> Result<()> {
        let old = self.verts_simple.len();
        if old > 0 {
            self.shift = self.shift * count as f64 / old as f64;
        }
        self.resample(count)
    }

    /// Re-cuts the surface from the current plane (after the plane moved)
    /// and resamples to `ring_segments`.
    ///
    /// # Errors
    ///
    /// Propagates cross-section and resampling failures; the cut is
    /// unchanged on error.
    pub fn recut(&mut self, surface: &dyn Surface, ring_segments: usize) -> Result<()> {
        let seed = surface.nearest_point(&self.plane_com);
        let raw = cross_section(&self.plane, surface, &seed)?;
        let backup = std::mem::replace(&mut self.raw, raw);
        if let Err(err) = self.resample(ring_segments) {
            self.raw = backup;
            return Err(err);
        }
        Ok(())
    }

    /// Moves the cutting plane origin and re-cuts.
    ///
    /// # Errors
    ///
    /// Propagates [`Cut::recut`] failures.
    pub fn translate(&mut self, offset: &Vector3, surface: &dyn Surface) -> Result<()> {
        let count = self.verts_simple.len();
        let backup = self.plane.clone();
        self.plane.translate(offset);
        if let Err(err) = self.recut(surface, count) {
            self.plane = backup;
            return Err(err);
        }
        Ok(())
    }

    /// Replaces the plane normal and re-cuts.
    ///
    /// # Errors
    ///
    /// Propagates plane construction and [`Cut::recut`] failures.
    pub fn set_normal(&mut self, normal: Vector3, surface: &dyn Surface) -> Result<()> {
        let count = self.verts_simple.len();
        let backup = self.plane.clone();
        self.plane.set_normal(normal)?;
        if let Err(err) = self.recut(surface, count) {
            self.plane = backup;
            return Err(err);
        }
        Ok(())
    }

    /// Rotates the seam (`shift`) to minimize summed squared distances to
    /// the corresponding vertices of the given neighbors. `fine_grain`
    /// refines the best whole-vertex rotation with a fractional slide
    /// between the two nearest integer rotations.
    ///
    /// Open cuts have no seam to rotate; the call is a no-op for them.
    /// Returns the applied shift delta.
    ///
    /// # Errors
    ///
    /// Propagates resampling failures after the shift is applied.
    pub fn align(
        &mut self,
        prev: Option<&Cut>,
        next: Option<&Cut>,
        mode: AlignMode,
        fine_grain: bool,
    ) -> Result<f64> {
        if !self.cyclic {
            return Ok(0.0);
        }

        let neighbors: Vec<&Cut> = match mode {
            AlignMode::Between => prev.into_iter().chain(next).collect(),
            AlignMode::Forward => next.into_iter().collect(),
            AlignMode::Backward => prev.into_iter().collect(),
        };
        let neighbors: Vec<&[Point3]> = neighbors
            .iter()
            .filter(|cut| cut.ring_segments() == self.ring_segments())
            .map(|cut| cut.verts_simple())
            .collect();
        if neighbors.is_empty() {
            return Ok(0.0);
        }

        let n = self.ring_segments();
        let cost = |r: usize| -> f64 {
            neighbors
                .iter()
                .map(|verts| {
                    (0..n)
                        .map(|i| (self.verts_simple[(i + r) % n] - verts[i]).norm_squared())
                        .sum::<f64>()
                })
                .sum()
        };

        let mut best_r = 0;
        let mut best_cost = f64::MAX;
        for r in 0..n {
            let c = cost(r);
            if c < best_cost {
                best_cost = c;
                best_r = r;
            }
        }

        let mut delta = best_r as f64;
        if fine_grain {
            // Slide within the two segments adjacent to the best rotation
            let mut refined = best_cost;
            for base in [(best_r + n - 1) % n, best_r] {
                if let Some((t, c)) = self.fractional_refine(&neighbors, base) {
                    if c < refined {
                        refined = c;
                        delta = base as f64 + t;
                    }
                }
            }
        }

        // Prefer the short way around the loop
        if delta > n as f64 / 2.0 {
            delta -= n as f64;
        }
        if delta.abs() < TOLERANCE {
            return Ok(0.0);
        }

        debug!(delta, "seam aligned");
        self.set_shift(self.shift + delta)?;
        Ok(delta)
    }

    /// Minimizes the lerped correspondence cost on the rotation segment
    /// `[base, base + 1]`. Returns `(t, cost)` with `t` clamped to the
    /// segment.
    fn fractional_refine(&self, neighbors: &[&[Point3]], base: usize) -> Option<(f64, f64)> {
        let n = self.ring_segments();
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for verts in neighbors {
            for i in 0..n {
                let a = self.verts_simple[(i + base) % n];
                let b = self.verts_simple[(i + base + 1) % n];
                let ab = b - a;
                numerator += (verts[i] - a).dot(&ab);
                denominator += ab.norm_squared();
            }
        }
        if denominator < TOLERANCE {
            return None;
        }
        let t = (numerator / denominator).clamp(0.0, 1.0);

        let cost: f64 = neighbors
            .iter()
            .map(|verts| {
                (0..n)
                    .map(|i| {
                        let a = self.verts_simple[(i + base) % n];
                        let b = self.verts_simple[(i + base + 1) % n];
                        let q = a + (b - a) * t;
                        (q - verts[i]).norm_squared()
                    })
                    .sum::<f64>()
            })
            .sum();
        Some((t, cost))
    }

    /// Occlusion test per vertex: a vertex is visible when the ray from
    /// the camera toward it reaches it without hitting the surface first.
    pub fn update_visibility(&mut self, surface: &dyn Surface, projector: &dyn ScreenProjector) {
        for (i, vert) in self.verts_simple.iter().enumerate() {
            let eye = projector.view_origin(vert);
            let span = vert - eye;
            let dist = span.norm();
            if dist < TOLERANCE {
                self.visible[i] = true;
                continue;
            }
            let dir = span / dist;
            self.visible[i] = match surface.ray_intersect(&eye, &dir) {
                // The vertex lies on the surface; anything meaningfully
                // nearer than it occludes it.
                Some(hit) => (hit - eye).norm() >= dist - 1e-4 * dist.max(1.0),
                None => true,
            };
        }
    }
}

/// A pre-existing mesh boundary loop a path attaches to.
///
/// Never resampled; its vertex count dictates `ring_segments` for any
/// path locked onto it.
#[derive(Debug, Clone)]
pub struct ExistingLoop {
    verts: Vec<Point3>,
    cyclic: bool,
}

impl ExistingLoop {
    #[must_use]
    pub fn new(verts: Vec<Point3>, cyclic: bool) -> Self {
        Self { verts, cyclic }
    }

    #[must_use]
    pub fn verts(&self) -> &[Point3] {
        &self.verts
    }

    #[must_use]
    pub fn cyclic(&self) -> bool {
        self.cyclic
    }

    #[must_use]
    pub fn com(&self) -> Point3 {
        let sum = self
            .verts
            .iter()
            .fold(Vector3::zeros(), |acc, pt| acc + pt.coords);
        Point3::from(sum / self.verts.len().max(1) as f64)
    }
}

/// Uniform view over the two ring kinds the mesh connector consumes.
#[derive(Debug, Clone, Copy)]
pub enum RingRef<'a> {
    Derived(&'a Cut),
    Existing(&'a ExistingLoop),
}

impl RingRef<'_> {
    #[must_use]
    pub fn verts(&self) -> &[Point3] {
        match self {
            Self::Derived(cut) => cut.verts_simple(),
            Self::Existing(existing) => existing.verts(),
        }
    }

    #[must_use]
    pub fn cyclic(&self) -> bool {
        match self {
            Self::Derived(cut) => cut.cyclic(),
            Self::Existing(existing) => existing.cyclic(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::geometry::stroke::OrthoProjector;
    use crate::surface::test_meshes;

    use super::*;

    fn cylinder_cut(z: f64, ring_segments: usize) -> Cut {
        let mesh = test_meshes::cylinder(5.0, -4.0, 4.0, 64, 4);
        let plane = Plane::from_normal(Point3::new(0.0, 0.0, z), Vector3::z()).unwrap();
        Cut::from_plane(plane, &mesh, &Point3::new(5.0, 0.0, z), ring_segments).unwrap()
    }

    #[test]
    fn cut_from_plane_is_cyclic_ring() {
        let cut = cylinder_cut(0.5, 8);
        assert!(cut.cyclic());
        assert_eq!(cut.ring_segments(), 8);
        assert!((cut.plane_com() - Point3::new(0.0, 0.0, 0.5)).norm() < 0.1);
    }

    #[test]
    fn shift_preserves_vertex_count() {
        let mut cut = cylinder_cut(0.5, 10);
        let before = cut.verts_simple()[0];
        cut.set_shift(2.5).unwrap();
        assert_eq!(cut.ring_segments(), 10);
        assert!((cut.verts_simple()[0] - before).norm() > 0.1);
    }

    #[test]
    fn align_recovers_integer_rotation() {
        let reference = cylinder_cut(0.5, 8);
        let mut rotated = cylinder_cut(1.0, 8);
        rotated.set_shift(3.0).unwrap();

        let delta = rotated
            .align(Some(&reference), None, AlignMode::Backward, false)
            .unwrap();
        // Shifting by 3 is undone by the short way around: -3
        assert!((delta - (-3.0)).abs() < 0.51, "delta = {delta}");

        // Corresponding vertices now nearly coincide in X/Y
        for (a, b) in rotated
            .verts_simple()
            .iter()
            .zip(reference.verts_simple())
        {
            let d = (Point2::new(a.x, a.y) - Point2::new(b.x, b.y)).norm();
            assert!(d < 0.5, "residual = {d}");
        }
    }

    #[test]
    fn align_between_is_idempotent() {
        let prev = cylinder_cut(-1.0, 8);
        let next = cylinder_cut(1.0, 8);
        let mut mid = cylinder_cut(0.5, 8);
        mid.set_shift(1.7).unwrap();

        mid.align(Some(&prev), Some(&next), AlignMode::Between, true)
            .unwrap();
        let second = mid
            .align(Some(&prev), Some(&next), AlignMode::Between, true)
            .unwrap();
        assert!(second.abs() < 0.05, "second pass moved {second}");
    }

    #[test]
    fn align_skips_mismatched_neighbor() {
        let reference = cylinder_cut(0.5, 12);
        let mut cut = cylinder_cut(1.0, 8);
        let delta = cut
            .align(Some(&reference), None, AlignMode::Backward, true)
            .unwrap();
        assert!(delta.abs() < TOLERANCE);
    }

    #[test]
    fn screen_line_cut_across_cylinder() {
        let mesh = test_meshes::cylinder(5.0, -4.0, 4.0, 64, 4);
        // Looking down -Y at the cylinder; a horizontal screen stroke
        // cuts a loop around it.
        let projector = OrthoProjector::looking(
            Point3::new(0.0, 30.0, 0.0),
            -Vector3::y(),
            100.0,
        );
        let cut = Cut::from_screen_line(
            Point2::new(-8.0, 0.0),
            Point2::new(8.0, 0.0),
            &projector,
            &mesh,
            10,
        )
        .unwrap();
        assert!(cut.cyclic());
        assert_eq!(cut.ring_segments(), 10);
    }

    #[test]
    fn screen_line_missing_surface_fails() {
        let mesh = test_meshes::cylinder(5.0, -4.0, 4.0, 64, 4);
        let projector = OrthoProjector::looking(
            Point3::new(0.0, 30.0, 50.0),
            -Vector3::y(),
            100.0,
        );
        let result = Cut::from_screen_line(
            Point2::new(-8.0, 0.0),
            Point2::new(8.0, 0.0),
            &projector,
            &mesh,
            10,
        );
        assert!(result.is_err());
    }

    #[test]
    fn back_verts_occluded_from_front_view() {
        let mesh = test_meshes::cylinder(5.0, -4.0, 4.0, 64, 4);
        let mut cut = cylinder_cut(0.5, 16);
        let projector = OrthoProjector::looking(
            Point3::new(0.0, 30.0, 0.0),
            -Vector3::y(),
            100.0,
        );
        cut.update_visibility(&mesh, &projector);

        let visible = cut.visible().iter().filter(|v| **v).count();
        let hidden = cut.visible().len() - visible;
        assert!(visible >= 6, "visible = {visible}");
        assert!(hidden >= 6, "hidden = {hidden}");
    }
}
