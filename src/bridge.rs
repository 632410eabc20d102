use crate::cut::RingRef;
use crate::error::{GeometryError, Result, TopologyError};
use crate::math::{Point3, TOLERANCE};

/// One output polygon. Quads are the normal case; a quad whose adjacent
/// corners coincide (merged ring endpoints) collapses to a triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Quad([u32; 4]),
    Tri([u32; 3]),
}

impl Face {
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        match self {
            Self::Quad(q) => q,
            Self::Tri(t) => t,
        }
    }

    /// Rewrites each corner index, preserving the polygon kind.
    #[must_use]
    pub fn map_indices(&self, f: impl Fn(u32) -> u32) -> Self {
        match self {
            Self::Quad([a, b, c, d]) => Self::Quad([f(*a), f(*b), f(*c), f(*d)]),
            Self::Tri([a, b, c]) => Self::Tri([f(*a), f(*b), f(*c)]),
        }
    }
}

/// Faces connecting two consecutive rings.
///
/// Corner indices address the two rings back to back: `0..n` is the
/// first ring, `n..2n` the second, in vertex order.
#[derive(Debug, Clone)]
pub struct Bridge {
    /// Index rotation applied to the second ring before pairing.
    pub offset: usize,
    pub faces: Vec<Face>,
}

/// Connects two rings with a band of quads.
///
/// Cyclic pairs are joined at the index rotation of the second ring that
/// minimizes the summed squared distance between paired vertices, so the
/// band never spirals. Open pairs are joined in order and yield one less
/// face than vertices.
///
/// # Errors
///
/// Returns [`TopologyError::RingMismatch`] when the vertex counts differ
/// and `InsufficientGeometry` when a ring has fewer than two vertices.
pub fn bridge_rings(first: RingRef<'_>, second: RingRef<'_>) -> Result<Bridge> {
    let a = first.verts();
    let b = second.verts();
    if a.len() != b.len() {
        return Err(TopologyError::RingMismatch {
            left: a.len(),
            right: b.len(),
        }
        .into());
    }
    let n = a.len();
    if n < 2 {
        return Err(
            GeometryError::InsufficientGeometry(format!("{n} ring vertices")).into(),
        );
    }

    let cyclic = first.cyclic() && second.cyclic();
    let offset = if cyclic { best_rotation(a, b) } else { 0 };

    let spans = if cyclic { n } else { n - 1 };
    let mut faces = Vec::with_capacity(spans);
    for i in 0..spans {
        let j = (i + 1) % n;
        let quad = [
            a[i],
            a[j],
            b[(j + offset) % n],
            b[(i + offset) % n],
        ];
        let corners = [
            i as u32,
            j as u32,
            (n + (j + offset) % n) as u32,
            (n + (i + offset) % n) as u32,
        ];
        faces.push(collapse_degenerate(&quad, corners));
    }

    Ok(Bridge { offset, faces })
}

/// Rotation of `b` pairing each vertex with its nearest counterpart in
/// `a`, by total squared distance.
fn best_rotation(a: &[Point3], b: &[Point3]) -> usize {
    let n = a.len();
    let mut best = 0;
    let mut best_cost = f64::MAX;
    for r in 0..n {
        let cost: f64 = (0..n)
            .map(|i| (a[i] - b[(i + r) % n]).norm_squared())
            .sum();
        if cost < best_cost {
            best_cost = cost;
            best = r;
        }
    }
    best
}

/// Collapses a quad with coincident adjacent corners into a triangle.
fn collapse_degenerate(quad: &[Point3; 4], corners: [u32; 4]) -> Face {
    for i in 0..4 {
        let j = (i + 1) % 4;
        if (quad[i] - quad[j]).norm() < TOLERANCE {
            let mut tri = [0u32; 3];
            let mut k = 0;
            for (c, corner) in corners.iter().enumerate() {
                if c != j {
                    tri[k] = *corner;
                    k += 1;
                }
            }
            return Face::Tri(tri);
        }
    }
    Face::Quad(corners)
}
