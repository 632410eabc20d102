use crate::math::{Point2, Point3, Vector3, TOLERANCE};

/// An ordered sequence of 2D screen points captured from a drag gesture.
#[derive(Debug, Clone, Default)]
pub struct Stroke {
    points: Vec<Point2>,
}

impl Stroke {
    #[must_use]
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    /// Appends a sampled screen position while drawing.
    pub fn push(&mut self, point: Point2) {
        self.points.push(point);
    }

    #[must_use]
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Screen-space length of the stroke, used to reject errant clicks.
    #[must_use]
    pub fn screen_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|win| (win[1] - win[0]).norm())
            .sum()
    }
}

/// Camera contract for projecting screen points into the scene.
///
/// The kernel never owns a viewport; hosts supply rays for stroke
/// projection and a view origin for occlusion tests.
pub trait ScreenProjector {
    /// World-space ray under a screen point: `(origin, unit direction)`.
    fn ray(&self, screen: &Point2) -> (Point3, Vector3);

    /// World-space position rays emanate from, used for visibility
    /// raycasts. Orthographic views return a point far behind the scene
    /// along the view direction.
    fn view_origin(&self, toward: &Point3) -> Point3;
}

/// Orthographic projector: screen X/Y map onto a world-space plane and
/// every ray travels along a fixed view direction.
#[derive(Debug, Clone)]
pub struct OrthoProjector {
    /// World position of screen (0, 0).
    pub plane_origin: Point3,
    /// World direction of screen +X.
    pub right: Vector3,
    /// World direction of screen +Y.
    pub up: Vector3,
    /// View direction (into the screen), unit length.
    pub forward: Vector3,
    /// Distance behind the image plane reported as the eye position.
    pub eye_distance: f64,
}

impl ScreenProjector for OrthoProjector {
    fn ray(&self, screen: &Point2) -> (Point3, Vector3) {
        let origin = self.plane_origin + self.right * screen.x + self.up * screen.y;
        (origin, self.forward)
    }

    fn view_origin(&self, toward: &Point3) -> Point3 {
        toward - self.forward * self.eye_distance
    }
}

impl OrthoProjector {
    /// Projector looking down the given direction with an automatically
    /// chosen screen frame.
    #[must_use]
    pub fn looking(plane_origin: Point3, forward: Vector3, eye_distance: f64) -> Self {
        let forward = if forward.norm() < TOLERANCE {
            Vector3::z()
        } else {
            forward.normalize()
        };
        let reference = if forward.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let right = forward.cross(&reference).normalize();
        let up = forward.cross(&right);
        Self {
            plane_origin,
            right,
            up,
            forward,
            eye_distance,
        }
    }
}
