//! Camera coordinate frames.
//!
//! Positions and directions reported by the transport engine are in world
//! coordinates. They are first moved into the attached volume's frame by a
//! [`Placement`] and then projected onto the camera axes held by an
//! [`OrientationFrame`]:
//!
//! - X runs along the detector width
//! - Y runs along the detector height
//! - Z = X × Y points into the camera

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A 3-vector in millimetres (positions) or dimensionless (directions).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "[f64; 3]", into = "[f64; 3]"))]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[inline]
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[inline]
    #[must_use]
    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Euclidean length.
    #[inline]
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Returns the unit vector, or `None` for a zero-length (or non-finite) vector.
    #[must_use]
    pub fn normalized(&self) -> Option<Self> {
        let n = self.norm();
        if n > 0.0 && n.is_finite() {
            Some(Self::new(self.x / n, self.y / n, self.z / n))
        } else {
            None
        }
    }

    /// Azimuth `atan2(y, x)` in radians.
    #[inline]
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Polar angle from +Z in radians; equals `acos(z)` for unit vectors.
    #[inline]
    #[must_use]
    pub fn theta(&self) -> f64 {
        self.x.hypot(self.y).atan2(self.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Orthonormal camera axes.
///
/// `x` and `y` are unit vectors but need not be orthogonal to each other;
/// `z` is always the normalized `x × y`, so it stays a unit vector
/// orthogonal to both after every mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrientationFrame {
    x: Vec3,
    y: Vec3,
    z: Vec3,
}

impl Default for OrientationFrame {
    fn default() -> Self {
        Self {
            x: Vec3::new(1.0, 0.0, 0.0),
            y: Vec3::new(0.0, 1.0, 0.0),
            z: Vec3::new(0.0, 0.0, 1.0),
        }
    }
}

impl OrientationFrame {
    /// Creates the default frame (world axes).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the width axis. Zero-length vectors are ignored.
    pub fn set_x(&mut self, v: Vec3) {
        match v.normalized() {
            Some(unit) => {
                self.x = unit;
                self.update_z();
            }
            None => log::warn!("ignoring zero-length orientation X {v}"),
        }
    }

    /// Sets the height axis. Zero-length vectors are ignored.
    pub fn set_y(&mut self, v: Vec3) {
        match v.normalized() {
            Some(unit) => {
                self.y = unit;
                self.update_z();
            }
            None => log::warn!("ignoring zero-length orientation Y {v}"),
        }
    }

    /// Builder form of [`Self::set_x`].
    #[must_use]
    pub fn with_x(mut self, v: Vec3) -> Self {
        self.set_x(v);
        self
    }

    /// Builder form of [`Self::set_y`].
    #[must_use]
    pub fn with_y(mut self, v: Vec3) -> Self {
        self.set_y(v);
        self
    }

    fn update_z(&mut self) {
        // X and Y are already unit length
        match self.x.cross(&self.y).normalized() {
            Some(z) => self.z = z,
            None => log::warn!(
                "orientation X {} and Y {} are parallel; keeping Z {}",
                self.x,
                self.y,
                self.z
            ),
        }
    }

    /// Width axis.
    #[inline]
    #[must_use]
    pub fn x(&self) -> Vec3 {
        self.x
    }

    /// Height axis.
    #[inline]
    #[must_use]
    pub fn y(&self) -> Vec3 {
        self.y
    }

    /// Depth axis (into the camera).
    #[inline]
    #[must_use]
    pub fn z(&self) -> Vec3 {
        self.z
    }

    /// Projects a position onto the detector plane: `(p·X, p·Y)`.
    #[inline]
    #[must_use]
    pub fn to_local(&self, point: Vec3) -> (f64, f64) {
        (point.dot(&self.x), point.dot(&self.y))
    }

    /// Full 3-D projection: `(p·X, p·Y, p·Z)`.
    #[inline]
    #[must_use]
    pub fn to_local_3d(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(&self.x), v.dot(&self.y), v.dot(&self.z))
    }

    /// Physics-convention spherical angles `(phi, theta)` of a direction
    /// expressed in the camera frame.
    #[must_use]
    pub fn to_spherical_local(&self, direction: Vec3) -> (f64, f64) {
        let local = self.to_local_3d(direction);
        (local.phi(), local.theta())
    }
}

/// Rigid transform from world coordinates into the attached volume's frame.
///
/// Points map as `R · (p − t)` and directions as `R · d`, where `t` is the
/// volume's world position and the rows of `R` are its local axes expressed
/// in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Placement {
    pub translation: Vec3,
    pub rotation: [[f64; 3]; 3],
}

impl Default for Placement {
    fn default() -> Self {
        Self::identity()
    }
}

impl Placement {
    /// Identity placement (attached volume centered at the world origin).
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            translation: Vec3::new(0.0, 0.0, 0.0),
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    fn rotate(&self, v: Vec3) -> Vec3 {
        let r = &self.rotation;
        Vec3::new(
            r[0][0] * v.x + r[0][1] * v.y + r[0][2] * v.z,
            r[1][0] * v.x + r[1][1] * v.y + r[1][2] * v.z,
            r[2][0] * v.x + r[2][1] * v.y + r[2][2] * v.z,
        )
    }

    /// Transforms a world position into the attached volume's frame.
    #[must_use]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotate(p - self.translation)
    }

    /// Transforms a world direction into the attached volume's frame.
    #[must_use]
    pub fn transform_axis(&self, d: Vec3) -> Vec3 {
        self.rotate(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn assert_orthonormal(frame: &OrientationFrame) {
        let z = frame.z();
        assert_abs_diff_eq!(z.norm(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z.dot(&frame.x()), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z.dot(&frame.y()), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_default_frame_is_world_axes() {
        let frame = OrientationFrame::default();
        assert_eq!(frame.z(), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(frame.to_local(Vec3::new(3.0, -4.0, 7.0)), (3.0, -4.0));
    }

    #[test]
    fn test_setters_normalize_and_recompute_z() {
        let mut frame = OrientationFrame::new();
        frame.set_x(Vec3::new(0.0, 5.0, 0.0));
        assert_abs_diff_eq!(frame.x().norm(), 1.0, epsilon = 1e-12);
        frame.set_y(Vec3::new(0.0, 0.0, -2.0));
        // (0,1,0) x (0,0,-1) = (-1,0,0)
        assert_abs_diff_eq!(frame.z().x, -1.0, epsilon = 1e-12);
        assert_orthonormal(&frame);
    }

    #[test]
    fn test_frame_stays_orthonormal_after_setter_sequence() {
        let mut frame = OrientationFrame::new();
        let inputs = [
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(0.3, 0.0, 0.9),
            Vec3::new(0.2, 2.0, 0.1),
        ];
        for (i, v) in inputs.into_iter().enumerate() {
            if i % 2 == 0 {
                frame.set_x(v);
            } else {
                frame.set_y(v);
            }
            assert_orthonormal(&frame);
        }
    }

    #[test]
    fn test_zero_vector_is_ignored() {
        let mut frame = OrientationFrame::new();
        frame.set_x(Vec3::default());
        assert_eq!(frame, OrientationFrame::default());
    }

    #[test]
    fn test_spherical_angles() {
        let frame = OrientationFrame::new();
        let (phi, theta) = frame.to_spherical_local(Vec3::new(0.0, 1.0, 0.0));
        assert_abs_diff_eq!(phi, FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(theta, FRAC_PI_2, epsilon = 1e-12);

        let d = Vec3::new(1.0, 0.0, 1.0).normalized().unwrap();
        let (phi, theta) = frame.to_spherical_local(d);
        assert_abs_diff_eq!(phi, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(theta, FRAC_PI_4, epsilon = 1e-12);
    }

    #[test]
    fn test_rotated_frame_projection() {
        // camera looking along world -X: width = world Y, height = world Z
        let frame = OrientationFrame::new()
            .with_x(Vec3::new(0.0, 1.0, 0.0))
            .with_y(Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(frame.to_local(Vec3::new(9.0, 2.0, 3.0)), (2.0, 3.0));
        let local = frame.to_local_3d(Vec3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(local.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_placement_transform() {
        let placement = Placement {
            translation: Vec3::new(100.0, 0.0, 0.0),
            rotation: [[0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
        };
        let p = placement.transform_point(Vec3::new(110.0, 5.0, 1.0));
        assert_abs_diff_eq!(p.x, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, -10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.z, 1.0, epsilon = 1e-12);

        let d = placement.transform_axis(Vec3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(d.y, -1.0, epsilon = 1e-12);
    }
}
