use crate::math::{Point3, Vector3, TOLERANCE};

use super::Surface;

/// An indexed triangle mesh used as the reference surface.
#[derive(Debug, Clone)]
pub struct TriMesh {
    vertices: Vec<Point3>,
    triangles: Vec<[u32; 3]>,
}

impl TriMesh {
    #[must_use]
    pub fn new(vertices: Vec<Point3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    #[must_use]
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    #[must_use]
    pub fn indices(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Structural fingerprint used to validate a cached surface
    /// conversion between tool invocations.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let mut min = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut max = Point3::new(f64::MIN, f64::MIN, f64::MIN);
        let mut checksum = 0.0;
        for v in &self.vertices {
            min = Point3::new(min.x.min(v.x), min.y.min(v.y), min.z.min(v.z));
            max = Point3::new(max.x.max(v.x), max.y.max(v.y), max.z.max(v.z));
            checksum += v.x + v.y + v.z;
        }
        Fingerprint {
            vertex_count: self.vertices.len(),
            triangle_count: self.triangles.len(),
            bbox_min: min,
            bbox_max: max,
            checksum,
        }
    }
}

/// Identity record of a surface: counts, bounding box and a coordinate
/// checksum. Equal fingerprints mean the cached conversion is reusable.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub bbox_min: Point3,
    pub bbox_max: Point3,
    pub checksum: f64,
}

impl Surface for TriMesh {
    fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    fn triangle(&self, index: usize) -> [Point3; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    fn ray_intersect(&self, origin: &Point3, direction: &Vector3) -> Option<Point3> {
        let mut best_t = f64::MAX;
        for i in 0..self.triangles.len() {
            let tri = self.triangle(i);
            if let Some(t) = ray_triangle(origin, direction, &tri) {
                if t < best_t {
                    best_t = t;
                }
            }
        }
        (best_t < f64::MAX).then(|| origin + direction * best_t)
    }

    fn nearest_point(&self, point: &Point3) -> Point3 {
        let mut best = *point;
        let mut best_d2 = f64::MAX;
        for i in 0..self.triangles.len() {
            let tri = self.triangle(i);
            let q = closest_on_triangle(point, &tri);
            let d2 = (q - point).norm_squared();
            if d2 < best_d2 {
                best_d2 = d2;
                best = q;
            }
        }
        best
    }
}

/// Möller–Trumbore ray/triangle intersection. Returns the ray parameter
/// of the hit, `t >= 0`, or `None`.
fn ray_triangle(origin: &Point3, direction: &Vector3, tri: &[Point3; 3]) -> Option<f64> {
    let e1 = tri[1] - tri[0];
    let e2 = tri[2] - tri[0];
    let pvec = direction.cross(&e2);
    let det = e1.dot(&pvec);
    if det.abs() < TOLERANCE {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - tri[0];
    let u = tvec.dot(&pvec) * inv_det;
    if !(-TOLERANCE..=1.0 + TOLERANCE).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(&e1);
    let v = direction.dot(&qvec) * inv_det;
    if v < -TOLERANCE || u + v > 1.0 + TOLERANCE {
        return None;
    }
    let t = e2.dot(&qvec) * inv_det;
    (t >= -TOLERANCE).then_some(t.max(0.0))
}

/// Closest point on a triangle to `p` (Voronoi-region walk).
fn closest_on_triangle(p: &Point3, tri: &[Point3; 3]) -> Point3 {
    let [a, b, c] = *tri;
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::test_meshes;
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn single_triangle() -> TriMesh {
        TriMesh::new(
            vec![p(0.0, 0.0, 0.0), p(4.0, 0.0, 0.0), p(0.0, 4.0, 0.0)],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn ray_hits_triangle() {
        let mesh = single_triangle();
        let hit = mesh
            .ray_intersect(&p(1.0, 1.0, 5.0), &-Vector3::z())
            .unwrap();
        assert!((hit - p(1.0, 1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn ray_misses_triangle() {
        let mesh = single_triangle();
        assert!(mesh.ray_intersect(&p(5.0, 5.0, 5.0), &-Vector3::z()).is_none());
    }

    #[test]
    fn ray_behind_origin_ignored() {
        let mesh = single_triangle();
        assert!(mesh.ray_intersect(&p(1.0, 1.0, 5.0), &Vector3::z()).is_none());
    }

    #[test]
    fn nearest_point_interior_projects() {
        let mesh = single_triangle();
        let q = mesh.nearest_point(&p(1.0, 1.0, 3.0));
        assert!((q - p(1.0, 1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn nearest_point_clamps_to_vertex() {
        let mesh = single_triangle();
        let q = mesh.nearest_point(&p(-2.0, -2.0, 0.0));
        assert!((q - p(0.0, 0.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn cylinder_ray_hits_wall() {
        let mesh = test_meshes::cylinder(5.0, -4.0, 4.0, 48, 4);
        let hit = mesh
            .ray_intersect(&p(20.0, 0.0, 0.0), &-Vector3::x())
            .unwrap();
        assert!((hit.x - 5.0).abs() < 0.05, "hit.x = {}", hit.x);
    }

    #[test]
    fn fingerprint_detects_edits() {
        let mesh = single_triangle();
        let fp = mesh.fingerprint();
        assert_eq!(fp, mesh.fingerprint());

        let moved = TriMesh::new(
            vec![p(0.0, 0.0, 0.1), p(4.0, 0.0, 0.0), p(0.0, 4.0, 0.0)],
            vec![[0, 1, 2]],
        );
        assert_ne!(fp, moved.fingerprint());
    }
}
