use nalgebra::SymmetricEigen;

use crate::error::{GeometryError, Result};

use super::{Matrix3, Point3, Vector3, TOLERANCE};

/// Center of mass of a point set.
///
/// # Errors
///
/// Returns [`GeometryError::InsufficientGeometry`] for an empty set.
pub fn centroid(points: &[Point3]) -> Result<Point3> {
    if points.is_empty() {
        return Err(GeometryError::InsufficientGeometry("no points".into()).into());
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, pt| acc + pt.coords);
    Ok(Point3::from(sum / points.len() as f64))
}

/// Best-fit plane normal of a point set via eigen-decomposition of the
/// covariance matrix. The normal is the eigenvector of the smallest
/// eigenvalue (the direction of least spread), unit length.
///
/// The sign is chosen so the normal points into the same half-space as
/// `hint` when one is given.
///
/// # Errors
///
/// Returns an error if fewer than three points are given or the points
/// are collinear (no unique plane).
pub fn fit_normal(points: &[Point3], hint: Option<&Vector3>) -> Result<Vector3> {
    if points.len() < 3 {
        return Err(GeometryError::InsufficientGeometry(format!(
            "{} points, plane fit needs 3",
            points.len()
        ))
        .into());
    }

    let com = centroid(points)?;
    let mut cov = Matrix3::zeros();
    for pt in points {
        let d = pt - com;
        cov += d * d.transpose();
    }

    let eigen = SymmetricEigen::new(cov);
    let mut min_idx = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
            min_idx = i;
        }
    }

    // Collinear points leave two near-zero eigenvalues
    let mut sorted = [
        eigen.eigenvalues[0].abs(),
        eigen.eigenvalues[1].abs(),
        eigen.eigenvalues[2].abs(),
    ];
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted[1] < TOLERANCE {
        return Err(GeometryError::Degenerate("collinear points".into()).into());
    }

    let mut normal: Vector3 = eigen.eigenvectors.column(min_idx).into();
    let len = normal.norm();
    if len < TOLERANCE {
        return Err(GeometryError::ZeroVector.into());
    }
    normal /= len;

    if let Some(hint) = hint {
        if normal.dot(hint) < 0.0 {
            normal = -normal;
        }
    }
    Ok(normal)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn centroid_of_square() {
        let pts = vec![
            p(0.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(2.0, 2.0, 0.0),
            p(0.0, 2.0, 0.0),
        ];
        let c = centroid(&pts).unwrap();
        assert!((c - p(1.0, 1.0, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn normal_of_xy_points() {
        let pts = vec![
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
        ];
        let n = fit_normal(&pts, Some(&Vector3::z())).unwrap();
        assert!((n - Vector3::z()).norm() < 1e-9);
    }

    #[test]
    fn hint_flips_sign() {
        let pts = vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)];
        let n = fit_normal(&pts, Some(&-Vector3::z())).unwrap();
        assert!(n.z < 0.0);
    }

    #[test]
    fn noisy_plane_recovered() {
        let mut pts = Vec::new();
        for i in 0..12 {
            let a = f64::from(i) * std::f64::consts::TAU / 12.0;
            pts.push(p(a.cos(), a.sin(), 0.001 * a.sin()));
        }
        let n = fit_normal(&pts, Some(&Vector3::z())).unwrap();
        assert!(n.z > 0.999);
    }

    #[test]
    fn collinear_points_fail() {
        let pts = vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(2.0, 0.0, 0.0)];
        assert!(fit_normal(&pts, None).is_err());
    }
}
