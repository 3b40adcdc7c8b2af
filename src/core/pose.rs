//! Rigid-body transforms between the sensor and world frames.

use super::point::Point3D;
use serde::{Deserialize, Serialize};

/// 3D rotation stored as a row-major rotation matrix.
///
/// Constructed from a unit quaternion or Euler angles; kept as a matrix so
/// that transforming points is nine multiplies with no trigonometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rotation3D {
    /// Row-major 3x3 rotation matrix
    pub m: [[f32; 3]; 3],
}

impl Rotation3D {
    /// Identity rotation
    #[inline]
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Build from a unit quaternion (x, y, z, w).
    ///
    /// The quaternion is normalized internally, so a nearly-unit input is
    /// acceptable.
    pub fn from_quaternion(x: f32, y: f32, z: f32, w: f32) -> Self {
        let n = (x * x + y * y + z * z + w * w).sqrt();
        let (x, y, z, w) = (x / n, y / n, z / n, w / n);
        Self {
            m: [
                [
                    1.0 - 2.0 * (y * y + z * z),
                    2.0 * (x * y - z * w),
                    2.0 * (x * z + y * w),
                ],
                [
                    2.0 * (x * y + z * w),
                    1.0 - 2.0 * (x * x + z * z),
                    2.0 * (y * z - x * w),
                ],
                [
                    2.0 * (x * z - y * w),
                    2.0 * (y * z + x * w),
                    1.0 - 2.0 * (x * x + y * y),
                ],
            ],
        }
    }

    /// Build from roll, pitch, yaw (radians), applied as Rz(yaw) * Ry(pitch) * Rx(roll)
    pub fn from_euler(roll: f32, pitch: f32, yaw: f32) -> Self {
        let (sr, cr) = roll.sin_cos();
        let (sp, cp) = pitch.sin_cos();
        let (sy, cy) = yaw.sin_cos();
        Self {
            m: [
                [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr],
                [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr],
                [-sp, cp * sr, cp * cr],
            ],
        }
    }

    /// Rotate a point
    #[inline]
    pub fn rotate(&self, p: Point3D) -> Point3D {
        Point3D::new(
            self.m[0][0] * p.x + self.m[0][1] * p.y + self.m[0][2] * p.z,
            self.m[1][0] * p.x + self.m[1][1] * p.y + self.m[1][2] * p.z,
            self.m[2][0] * p.x + self.m[2][1] * p.y + self.m[2][2] * p.z,
        )
    }

    /// Transpose; for a rotation matrix this is the inverse
    #[inline]
    pub fn transpose(&self) -> Rotation3D {
        let m = &self.m;
        Rotation3D {
            m: [
                [m[0][0], m[1][0], m[2][0]],
                [m[0][1], m[1][1], m[2][1]],
                [m[0][2], m[1][2], m[2][2]],
            ],
        }
    }

    /// True if all entries are finite
    pub fn is_finite(&self) -> bool {
        self.m.iter().flatten().all(|v| v.is_finite())
    }
}

impl Default for Rotation3D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Rigid transform from sensor frame to world frame.
///
/// `transform_point` maps sensor-frame coordinates into the world frame;
/// `inverse_transform_point` goes the other way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose3D {
    /// Rotation part (sensor to world)
    pub rotation: Rotation3D,
    /// Translation part: sensor origin expressed in the world frame
    pub translation: Point3D,
}

impl Pose3D {
    /// Create a pose from rotation and translation
    #[inline]
    pub fn new(rotation: Rotation3D, translation: Point3D) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Identity pose
    #[inline]
    pub fn identity() -> Self {
        Self {
            rotation: Rotation3D::identity(),
            translation: Point3D::ZERO,
        }
    }

    /// Pose with identity rotation at the given position
    #[inline]
    pub fn from_translation(translation: Point3D) -> Self {
        Self {
            rotation: Rotation3D::identity(),
            translation,
        }
    }

    /// Sensor origin in the world frame
    #[inline]
    pub fn position(&self) -> Point3D {
        self.translation
    }

    /// Transform a point from the sensor frame to the world frame
    #[inline]
    pub fn transform_point(&self, sensor_point: Point3D) -> Point3D {
        self.rotation.rotate(sensor_point) + self.translation
    }

    /// Transform a point from the world frame to the sensor frame
    #[inline]
    pub fn inverse_transform_point(&self, world_point: Point3D) -> Point3D {
        self.rotation
            .transpose()
            .rotate(world_point - self.translation)
    }

    /// Inverse of this pose
    pub fn inverse(&self) -> Pose3D {
        let rotation = self.rotation.transpose();
        let translation = -rotation.rotate(self.translation);
        Pose3D {
            rotation,
            translation,
        }
    }

    /// Compose two poses: self * other
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        let mut m = [[0.0f32; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, entry) in row.iter_mut().enumerate() {
                *entry = (0..3)
                    .map(|k| self.rotation.m[i][k] * other.rotation.m[k][j])
                    .sum();
            }
        }
        Pose3D {
            rotation: Rotation3D { m },
            translation: self.transform_point(other.translation),
        }
    }

    /// True if rotation and translation are finite
    pub fn is_finite(&self) -> bool {
        self.rotation.is_finite() && self.translation.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_identity_transform() {
        let pose = Pose3D::identity();
        let p = Point3D::new(1.0, 2.0, 3.0);
        assert_eq!(pose.transform_point(p), p);
    }

    #[test]
    fn test_yaw_rotation() {
        // Sensor facing +Y (90 degree yaw), 1m forward in sensor frame
        let pose = Pose3D::new(
            Rotation3D::from_euler(0.0, 0.0, FRAC_PI_2),
            Point3D::new(1.0, 0.0, 0.0),
        );
        let world = pose.transform_point(Point3D::new(1.0, 0.0, 0.0));
        assert!((world.x - 1.0).abs() < 1e-5);
        assert!((world.y - 1.0).abs() < 1e-5);
        assert!(world.z.abs() < 1e-5);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let pose = Pose3D::new(
            Rotation3D::from_euler(0.3, -0.2, 1.1),
            Point3D::new(1.0, -2.0, 0.5),
        );
        let p = Point3D::new(0.7, 0.3, -1.2);
        let back = pose.inverse_transform_point(pose.transform_point(p));
        assert!(back.distance(&p) < 1e-5);

        let inv = pose.inverse();
        let back2 = inv.transform_point(pose.transform_point(p));
        assert!(back2.distance(&p) < 1e-5);
    }

    #[test]
    fn test_quaternion_matches_euler() {
        // Quaternion for a 90 degree yaw: (0, 0, sin(45deg), cos(45deg))
        use std::f32::consts::FRAC_PI_4;
        let q = Rotation3D::from_quaternion(0.0, 0.0, FRAC_PI_4.sin(), FRAC_PI_4.cos());
        let e = Rotation3D::from_euler(0.0, 0.0, FRAC_PI_2);
        let p = Point3D::new(1.0, 0.5, -0.25);
        assert!(q.rotate(p).distance(&e.rotate(p)) < 1e-5);
    }

    #[test]
    fn test_compose() {
        let a = Pose3D::new(
            Rotation3D::from_euler(0.0, 0.0, FRAC_PI_2),
            Point3D::new(1.0, 0.0, 0.0),
        );
        let b = Pose3D::new(Rotation3D::identity(), Point3D::new(1.0, 0.0, 0.0));
        let c = a.compose(&b);
        assert!((c.translation.x - 1.0).abs() < 1e-5);
        assert!((c.translation.y - 1.0).abs() < 1e-5);
    }
}
