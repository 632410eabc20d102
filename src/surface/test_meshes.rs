//! Shared mesh constructors for the test suites.

use crate::math::Point3;

use super::TriMesh;

/// Open-ended cylinder around the Z axis: `radial` segments around,
/// `rows` quads tall, each quad split into two triangles.
#[must_use]
pub fn cylinder(radius: f64, z0: f64, z1: f64, radial: usize, rows: usize) -> TriMesh {
    let mut vertices = Vec::with_capacity(radial * (rows + 1));
    for row in 0..=rows {
        let z = z0 + (z1 - z0) * row as f64 / rows as f64;
        for i in 0..radial {
            let a = i as f64 * std::f64::consts::TAU / radial as f64;
            vertices.push(Point3::new(radius * a.cos(), radius * a.sin(), z));
        }
    }
    let mut triangles = Vec::with_capacity(radial * rows * 2);
    let idx = |row: usize, i: usize| (row * radial + i % radial) as u32;
    for row in 0..rows {
        for i in 0..radial {
            triangles.push([idx(row, i), idx(row, i + 1), idx(row + 1, i + 1)]);
            triangles.push([idx(row, i), idx(row + 1, i + 1), idx(row + 1, i)]);
        }
    }
    TriMesh::new(vertices, triangles)
}

/// Flat rectangular grid in the XZ plane (y = 0), `cols` x `rows` quads.
/// Cutting it with a horizontal plane yields an open boundary.
#[must_use]
pub fn xz_grid(width: f64, height: f64, cols: usize, rows: usize) -> TriMesh {
    let mut vertices = Vec::with_capacity((cols + 1) * (rows + 1));
    for row in 0..=rows {
        let z = -height / 2.0 + height * row as f64 / rows as f64;
        for col in 0..=cols {
            let x = -width / 2.0 + width * col as f64 / cols as f64;
            vertices.push(Point3::new(x, 0.0, z));
        }
    }
    let mut triangles = Vec::with_capacity(cols * rows * 2);
    let idx = |row: usize, col: usize| (row * (cols + 1) + col) as u32;
    for row in 0..rows {
        for col in 0..cols {
            triangles.push([idx(row, col), idx(row, col + 1), idx(row + 1, col + 1)]);
            triangles.push([idx(row, col), idx(row + 1, col + 1), idx(row + 1, col)]);
        }
    }
    TriMesh::new(vertices, triangles)
}
