//! Rigid body transforms.

use std::ops::Mul;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use super::Point;

/// Rigid transform, usually `T_G_C` (sensor frame into the global frame).
///
/// The minimal representation returned by [`Transform::log`] is
/// `[tx, ty, tz, rx, ry, rz]`: the translation followed by the rotation
/// vector. Components 3 and 4 are roll and pitch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    inner: Isometry3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            inner: Isometry3::identity(),
        }
    }

    /// Create from position and orientation.
    pub fn new(position: Point, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            inner: Isometry3::from_parts(Translation3::from(position), rotation),
        }
    }

    /// Pure translation.
    pub fn from_translation(position: Point) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// Planar pose: position plus a yaw angle about +Z.
    pub fn from_position_yaw(position: Point, yaw: f32) -> Self {
        Self::new(
            position,
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
        )
    }

    /// Wrap an isometry.
    pub fn from_isometry(inner: Isometry3<f32>) -> Self {
        Self { inner }
    }

    /// The underlying isometry.
    pub fn isometry(&self) -> &Isometry3<f32> {
        &self.inner
    }

    /// Translation component.
    pub fn position(&self) -> Point {
        self.inner.translation.vector
    }

    /// Rotation component.
    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.inner.rotation
    }

    /// Inverse transform.
    pub fn inverse(&self) -> Self {
        Self {
            inner: self.inner.inverse(),
        }
    }

    /// Apply to a point.
    #[inline]
    pub fn transform_point(&self, point: &Point) -> Point {
        self.inner.rotation * point + self.inner.translation.vector
    }

    /// Rotate a vector without translating it.
    #[inline]
    pub fn rotate_vector(&self, v: &Vector3<f32>) -> Vector3<f32> {
        self.inner.rotation * v
    }

    /// Minimal representation `[translation, rotation vector]`.
    pub fn log(&self) -> Vector6<f32> {
        let t = self.inner.translation.vector;
        let r = self.inner.rotation.scaled_axis();
        Vector6::new(t.x, t.y, t.z, r.x, r.y, r.z)
    }

    /// Inverse of [`Transform::log`].
    pub fn exp(v: &Vector6<f32>) -> Self {
        let translation = Vector3::new(v[0], v[1], v[2]);
        let axis_angle = Vector3::new(v[3], v[4], v[5]);
        Self {
            inner: Isometry3::new(translation, axis_angle),
        }
    }

    /// Yaw angle about +Z in radians.
    pub fn yaw(&self) -> f32 {
        self.inner.rotation.euler_angles().2
    }

    /// Interpolate between two transforms (`t` in `[0, 1]`).
    ///
    /// Translation is linear, rotation uses spherical interpolation.
    pub fn interpolate(&self, other: &Transform, t: f32) -> Transform {
        let position = self.position().lerp(&other.position(), t);
        let rotation = self.rotation().slerp(&other.rotation(), t);
        Transform::new(position, rotation)
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            inner: self.inner * rhs.inner,
        }
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        Transform {
            inner: self.inner * rhs.inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_transform_point() {
        let t = Transform::from_position_yaw(Point::new(1.0, 2.0, 0.0), FRAC_PI_2);
        let p = t.transform_point(&Point::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point::new(1.0, 3.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let t = Transform::new(
            Point::new(0.3, -1.2, 0.7),
            UnitQuaternion::from_euler_angles(0.1, -0.2, 0.9),
        );
        let id = t * t.inverse();
        assert_relative_eq!(id.log(), Vector6::zeros(), epsilon = 1e-6);
    }

    #[test]
    fn test_log_exp_recovers_transform() {
        let t = Transform::new(
            Point::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.05, 0.1, -0.4),
        );
        let back = Transform::exp(&t.log());
        assert_relative_eq!(back.position(), t.position(), epsilon = 1e-6);
        assert!(back.rotation().angle_to(&t.rotation()) < 1e-5);
    }

    #[test]
    fn test_yaw_only_has_no_roll_pitch_in_log() {
        let t = Transform::from_position_yaw(Point::new(0.0, 0.0, 0.0), 0.6);
        let v = t.log();
        assert_relative_eq!(v[3], 0.0);
        assert_relative_eq!(v[4], 0.0);
        assert_relative_eq!(v[5], 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = Transform::from_position_yaw(Point::new(0.0, 0.0, 0.0), 0.0);
        let b = Transform::from_position_yaw(Point::new(2.0, 0.0, 0.0), 1.0);
        let mid = a.interpolate(&b, 0.5);
        assert_relative_eq!(mid.position(), Point::new(1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(mid.yaw(), 0.5, epsilon = 1e-5);
    }
}
