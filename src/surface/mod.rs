pub mod trimesh;

pub use trimesh::{Fingerprint, TriMesh};

use crate::math::{Point3, Vector3};

/// Read-only triangulated surface the kernel cuts against.
///
/// Implementations are immutable for the duration of a session; the
/// session detects a swapped surface via [`Fingerprint`] comparison and
/// simply treats it as new.
pub trait Surface {
    /// Number of triangles.
    fn triangle_count(&self) -> usize;

    /// Vertices of triangle `index`.
    fn triangle(&self, index: usize) -> [Point3; 3];

    /// First intersection of a ray with the surface, or `None`.
    fn ray_intersect(&self, origin: &Point3, direction: &Vector3) -> Option<Point3>;

    /// Closest point on the surface to `point`.
    fn nearest_point(&self, point: &Point3) -> Point3;
}

#[cfg(test)]
pub(crate) mod test_meshes;
