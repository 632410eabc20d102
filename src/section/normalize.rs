use crate::error::{GeometryError, Result};
use crate::math::{plane_fit, polyline, Point3, Vector3, TOLERANCE};

use super::RawBoundary;

/// A raw boundary resampled to a fixed vertex count, with its derived
/// orientation data.
#[derive(Debug, Clone)]
pub struct NormalizedRing {
    /// Uniformly spaced ring vertices (the closing vertex of a cyclic
    /// ring is not repeated).
    pub verts: Vec<Point3>,
    pub cyclic: bool,
    /// Center of mass of the resampled vertices.
    pub com: Point3,
    /// Best-fit plane normal of the resampled vertices.
    pub normal: Vector3,
}

/// Resamples a raw boundary to `target_count` vertices at uniform
/// arc-length spacing.
///
/// For cyclic boundaries, sample zero is anchored at the source point
/// whose direction from the centroid best matches `seam_ref`, keeping the
/// seam stable across incremental edits; `shift` then rotates the samples
/// by whole and fractional vertex steps. The vertex winding is flipped if
/// needed so the ring's fit normal agrees with `normal_hint`.
///
/// # Errors
///
/// Returns [`GeometryError::InsufficientGeometry`] when fewer than three
/// effective samples exist or the boundary has zero arc length.
pub fn normalize(
    raw: &RawBoundary,
    target_count: usize,
    shift: f64,
    seam_ref: Option<&Vector3>,
    normal_hint: Option<&Vector3>,
) -> Result<NormalizedRing> {
    let effective = raw.effective_points();
    if effective.len() < 3 {
        return Err(GeometryError::InsufficientGeometry(format!(
            "{} effective boundary points",
            effective.len()
        ))
        .into());
    }

    let verts = if raw.cyclic {
        let com = plane_fit::centroid(effective)?;
        let anchored = anchor_seam(effective, &com, seam_ref);
        polyline::resample_uniform(&anchored, target_count, true, shift)?
    } else {
        polyline::resample_uniform(effective, target_count, false, 0.0)?
    };

    let com = plane_fit::centroid(&verts)?;
    let normal = plane_fit::fit_normal(&verts, normal_hint)?;

    let mut ring = NormalizedRing {
        verts,
        cyclic: raw.cyclic,
        com,
        normal,
    };

    if let Some(hint) = normal_hint {
        if ring.cyclic && winding_normal(&ring.verts, &com).dot(hint) < 0.0 {
            // Reverse travel direction, keeping the seam vertex first
            ring.verts[1..].reverse();
        }
    }

    Ok(ring)
}

/// Rotates a cyclic point list so the point whose direction from the
/// centroid best matches `seam_ref` comes first.
fn anchor_seam(points: &[Point3], com: &Point3, seam_ref: Option<&Vector3>) -> Vec<Point3> {
    let Some(reference) = seam_ref else {
        return points.to_vec();
    };
    if reference.norm() < TOLERANCE {
        return points.to_vec();
    }

    let mut best = 0;
    let mut best_dot = f64::MIN;
    for (i, pt) in points.iter().enumerate() {
        let dir = pt - com;
        let len = dir.norm();
        if len < TOLERANCE {
            continue;
        }
        let dot = dir.dot(reference) / len;
        if dot > best_dot {
            best_dot = dot;
            best = i;
        }
    }

    let mut rotated = Vec::with_capacity(points.len());
    rotated.extend_from_slice(&points[best..]);
    rotated.extend_from_slice(&points[..best]);
    rotated
}

/// Area-weighted winding normal of a closed ring (Newell's method about
/// the centroid).
fn winding_normal(verts: &[Point3], com: &Point3) -> Vector3 {
    let n = verts.len();
    let mut acc = Vector3::zeros();
    for i in 0..n {
        let a = verts[i] - com;
        let b = verts[(i + 1) % n] - com;
        acc += a.cross(&b);
    }
    acc
}
