use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

/// A cutting plane in 3D space.
///
/// Defined by an origin point and a unit normal, with a derived
/// orthonormal `(u_dir, v_dir)` frame used for in-plane projections and
/// seam-reference work.
#[derive(Debug, Clone)]
pub struct Plane {
    origin: Point3,
    normal: Vector3,
    u_dir: Vector3,
    v_dir: Vector3,
}

impl Plane {
    /// Creates a plane from an origin and a normal vector.
    ///
    /// The U and V directions are computed automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if the normal vector is zero-length.
    pub fn from_normal(origin: Point3, normal: Vector3) -> Result<Self> {
        let len = normal.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let normal = normal / len;

        // Choose a reference vector not parallel to the normal
        let reference = if normal.x.abs() < 0.9 {
            Vector3::new(1.0, 0.0, 0.0)
        } else {
            Vector3::new(0.0, 1.0, 0.0)
        };

        let u_dir = normal.cross(&reference).normalize();
        let v_dir = normal.cross(&u_dir);

        Ok(Self {
            origin,
            normal,
            u_dir,
            v_dir,
        })
    }

    /// Returns the origin point of the plane.
    #[must_use]
    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    /// Returns the unit normal of the plane.
    #[must_use]
    pub fn normal(&self) -> &Vector3 {
        &self.normal
    }

    /// Returns the U direction vector.
    #[must_use]
    pub fn u_dir(&self) -> &Vector3 {
        &self.u_dir
    }

    /// Returns the V direction vector.
    #[must_use]
    pub fn v_dir(&self) -> &Vector3 {
        &self.v_dir
    }

    /// Signed distance of a point to the plane, positive on the normal
    /// side.
    #[must_use]
    pub fn signed_distance(&self, point: &Point3) -> f64 {
        (point - self.origin).dot(&self.normal)
    }

    /// Moves the origin, keeping the orientation frame.
    pub fn translate(&mut self, offset: &Vector3) {
        self.origin += offset;
    }

    /// Replaces the normal, rebuilding the U/V frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the new normal is zero-length.
    pub fn set_normal(&mut self, normal: Vector3) -> Result<()> {
        *self = Self::from_normal(self.origin, normal)?;
        Ok(())
    }
}
