use crate::error::{GeometryError, Result};

use super::{Point3, TOLERANCE};

/// Cumulative arc length at each vertex of a polyline.
///
/// The first entry is always `0.0`. For a cyclic polyline one extra entry
/// is appended for the closing edge back to the first vertex, so the
/// returned vector has `points.len() + 1` entries and its last entry is
/// the full perimeter.
#[must_use]
pub fn cumulative_lengths(points: &[Point3], cyclic: bool) -> Vec<f64> {
    let mut lengths = Vec::with_capacity(points.len() + usize::from(cyclic));
    let mut total = 0.0;
    lengths.push(0.0);
    for win in points.windows(2) {
        total += (win[1] - win[0]).norm();
        lengths.push(total);
    }
    if cyclic {
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            total += (first - last).norm();
            lengths.push(total);
        }
    }
    lengths
}

/// Point at arc length `s` along the polyline, linearly interpolated.
///
/// `lengths` must come from [`cumulative_lengths`] for the same points.
/// `s` is clamped to `[0, total]`; for cyclic polylines the segment past
/// the last vertex wraps back to the first.
#[must_use]
pub fn point_at_length(points: &[Point3], lengths: &[f64], s: f64) -> Point3 {
    let total = lengths.last().copied().unwrap_or(0.0);
    let s = s.clamp(0.0, total);

    // Index of the segment containing s
    let seg = match lengths.binary_search_by(|l| {
        l.partial_cmp(&s).unwrap_or(std::cmp::Ordering::Equal)
    }) {
        Ok(i) => i.min(lengths.len() - 2),
        Err(i) => i.saturating_sub(1).min(lengths.len() - 2),
    };

    let a = points[seg % points.len()];
    let b = points[(seg + 1) % points.len()];
    let seg_len = lengths[seg + 1] - lengths[seg];
    if seg_len < TOLERANCE {
        return a;
    }
    let t = (s - lengths[seg]) / seg_len;
    a + (b - a) * t
}

/// Resamples a polyline to `count` vertices at uniform arc-length spacing.
///
/// Open polylines keep both endpoints and place `count - 2` samples
/// between them. Cyclic polylines place `count` samples around the full
/// perimeter, rotated by `phase` sample intervals (integer part rotates
/// whole vertices, fractional part slides between them); the closing
/// vertex is not repeated.
///
/// # Errors
///
/// Returns [`GeometryError::InsufficientGeometry`] if fewer than two
/// source points remain, the arc length is zero, or `count < 3`.
pub fn resample_uniform(
    points: &[Point3],
    count: usize,
    cyclic: bool,
    phase: f64,
) -> Result<Vec<Point3>> {
    if points.len() < 2 || count < 3 {
        return Err(GeometryError::InsufficientGeometry(format!(
            "{} source points, {count} requested",
            points.len()
        ))
        .into());
    }

    let lengths = cumulative_lengths(points, cyclic);
    let total = lengths.last().copied().unwrap_or(0.0);
    if total < TOLERANCE {
        return Err(GeometryError::InsufficientGeometry("zero arc length".into()).into());
    }

    let mut out = Vec::with_capacity(count);
    if cyclic {
        let step = total / count as f64;
        for i in 0..count {
            let s = (i as f64 + phase).rem_euclid(count as f64) * step;
            out.push(point_at_length(points, &lengths, s));
        }
    } else {
        let step = total / (count - 1) as f64;
        for i in 0..count {
            out.push(point_at_length(points, &lengths, i as f64 * step));
        }
    }
    Ok(out)
}

/// Iteratively relaxes each vertex toward the midpoint of its neighbors.
///
/// Endpoints of open polylines are preserved; cyclic polylines relax
/// every vertex.
pub fn smooth(points: &mut [Point3], iterations: usize, cyclic: bool) {
    let n = points.len();
    if n < 3 {
        return;
    }
    for _ in 0..iterations {
        let snapshot: Vec<Point3> = points.to_vec();
        let range = if cyclic { 0..n } else { 1..n - 1 };
        for i in range {
            let prev = snapshot[(i + n - 1) % n];
            let next = snapshot[(i + 1) % n];
            let mid = prev + (next - prev) * 0.5;
            points[i] += (mid - points[i]) * 0.5;
        }
    }
}

/// Keeps every `factor`-th point of a captured stroke, always retaining
/// the first and last.
#[must_use]
pub fn cull<T: Clone>(points: &[T], factor: usize) -> Vec<T> {
    if points.len() <= 2 || factor <= 1 {
        return points.to_vec();
    }
    let mut out: Vec<T> = points.iter().step_by(factor).cloned().collect();
    if points.len() % factor != 1 {
        if let Some(last) = points.last() {
            out.push(last.clone());
        }
    }
    out
}
