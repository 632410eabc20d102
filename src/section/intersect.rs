use tracing::trace;

use crate::error::{GeometryError, Result};
use crate::geometry::Plane;
use crate::math::Point3;
use crate::surface::Surface;

/// Vertices exactly on the cutting plane are pushed this far along the
/// plane normal so no triangle produces a zero-length crossing segment.
const ON_PLANE_EPSILON: f64 = 1e-9;

/// Chaining tolerance: crossing points of triangles sharing an edge are
/// computed from the same vertex distances, so they agree to round-off.
const CHAIN_EPSILON: f64 = 1e-6;

/// The ordered polyline where a cutting plane crosses the surface.
///
/// Consecutive points lie on surface edges. A cyclic boundary repeats its
/// first point at the end.
#[derive(Debug, Clone)]
pub struct RawBoundary {
    pub points: Vec<Point3>,
    pub cyclic: bool,
}

impl RawBoundary {
    /// Points of the boundary without the repeated closing vertex.
    #[must_use]
    pub fn effective_points(&self) -> &[Point3] {
        if self.cyclic && self.points.len() > 1 {
            &self.points[..self.points.len() - 1]
        } else {
            &self.points
        }
    }
}

/// Intersects a cutting plane with the surface.
///
/// Each triangle with vertices on both sides of the plane contributes one
/// crossing segment; segments are chained head-to-tail into boundaries.
/// When a non-convex surface yields several disjoint boundaries, the one
/// passing closest to `seed` (the stroke's hit point on the surface) is
/// kept — triangles are scanned in index order, so the choice is
/// deterministic.
///
/// # Errors
///
/// Returns [`GeometryError::NoIntersection`] when no triangle crosses the
/// plane.
pub fn cross_section(
    plane: &Plane,
    surface: &dyn Surface,
    seed: &Point3,
) -> Result<RawBoundary> {
    let mut segments: Vec<(Point3, Point3)> = Vec::new();

    for i in 0..surface.triangle_count() {
        let tri = surface.triangle(i);
        if let Some(seg) = triangle_crossing(plane, &tri) {
            segments.push(seg);
        }
    }

    if segments.is_empty() {
        return Err(GeometryError::NoIntersection.into());
    }

    let chains = chain_segments(segments);
    trace!(chains = chains.len(), "cross-section chained");

    let best = chains
        .into_iter()
        .min_by(|a, b| {
            let da = min_distance_to(&a.points, seed);
            let db = min_distance_to(&b.points, seed);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .ok_or(GeometryError::NoIntersection)?;

    Ok(best)
}

fn min_distance_to(points: &[Point3], seed: &Point3) -> f64 {
    points
        .iter()
        .map(|pt| (pt - seed).norm())
        .fold(f64::MAX, f64::min)
}

/// The segment where the plane crosses one triangle, or `None` when all
/// vertices sit on one side.
fn triangle_crossing(plane: &Plane, tri: &[Point3; 3]) -> Option<(Point3, Point3)> {
    let mut dists = [0.0; 3];
    for (d, v) in dists.iter_mut().zip(tri.iter()) {
        let raw = plane.signed_distance(v);
        // Perturb on-plane vertices to the positive side
        *d = if raw.abs() < ON_PLANE_EPSILON {
            ON_PLANE_EPSILON
        } else {
            raw
        };
    }

    let mut points: Vec<Point3> = Vec::with_capacity(2);
    for i in 0..3 {
        let j = (i + 1) % 3;
        if dists[i] * dists[j] < 0.0 {
            let t = dists[i] / (dists[i] - dists[j]);
            points.push(tri[i] + (tri[j] - tri[i]) * t);
        }
    }

    (points.len() == 2).then(|| (points[0], points[1]))
}

/// Chains crossing segments into ordered boundaries by endpoint
/// proximity, growing each chain at both ends until nothing connects.
fn chain_segments(segments: Vec<(Point3, Point3)>) -> Vec<RawBoundary> {
    let mut remaining = segments;
    let mut boundaries = Vec::new();

    while let Some((start, end)) = remaining.pop() {
        let mut chain = vec![start, end];

        let mut changed = true;
        while changed {
            changed = false;
            let chain_start = chain[0];
            let chain_end = chain[chain.len() - 1];

            let mut i = 0;
            while i < remaining.len() {
                let (a, b) = remaining[i];
                if (b - chain_end).norm() < CHAIN_EPSILON {
                    chain.push(a);
                    remaining.swap_remove(i);
                    changed = true;
                } else if (a - chain_end).norm() < CHAIN_EPSILON {
                    chain.push(b);
                    remaining.swap_remove(i);
                    changed = true;
                } else if (b - chain_start).norm() < CHAIN_EPSILON {
                    chain.insert(0, a);
                    remaining.swap_remove(i);
                    changed = true;
                } else if (a - chain_start).norm() < CHAIN_EPSILON {
                    chain.insert(0, b);
                    remaining.swap_remove(i);
                    changed = true;
                } else {
                    i += 1;
                }
                if changed {
                    break;
                }
            }
        }

        let cyclic = chain.len() > 2
            && (chain[0] - chain[chain.len() - 1]).norm() < CHAIN_EPSILON;
        if cyclic {
            // Close exactly on the first point
            let first = chain[0];
            if let Some(last) = chain.last_mut() {
                *last = first;
            }
        }
        if chain.len() >= 2 {
            boundaries.push(RawBoundary {
                points: chain,
                cyclic,
            });
        }
    }

    boundaries
}
