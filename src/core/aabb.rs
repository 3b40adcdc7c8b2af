//! Axis-aligned bounding boxes in world space.

use super::point::Point3D;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box, stored as min and max corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Point3D,
    /// Maximum corner
    pub max: Point3D,
}

impl Aabb {
    /// Create from min and max corners
    #[inline]
    pub fn new(min: Point3D, max: Point3D) -> Self {
        Self { min, max }
    }

    /// Empty box, ready to be grown with `extend`
    pub fn empty() -> Self {
        Self {
            min: Point3D::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3D::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Grow the box to include a point
    #[inline]
    pub fn extend(&mut self, p: Point3D) {
        self.min = self.min.min(&p);
        self.max = self.max.max(&p);
    }

    /// Center of the box
    #[inline]
    pub fn center(&self) -> Point3D {
        (self.min + self.max) * 0.5
    }

    /// Width along the X axis (the box is cubic for octree nodes)
    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// True if the point lies inside or on the boundary
    #[inline]
    pub fn contains(&self, p: Point3D) -> bool {
        self.min.x <= p.x
            && p.x <= self.max.x
            && self.min.y <= p.y
            && p.y <= self.max.y
            && self.min.z <= p.z
            && p.z <= self.max.z
    }

    /// Corner `i` of the box, with bit 0/1/2 of `i` selecting min/max on x/y/z
    #[inline]
    pub fn corner(&self, i: usize) -> Point3D {
        Point3D::new(
            if i & 1 == 0 { self.min.x } else { self.max.x },
            if i & 2 == 0 { self.min.y } else { self.max.y },
            if i & 4 == 0 { self.min.z } else { self.max.z },
        )
    }

    /// Distance from a point to the closest point of the box (0 inside)
    pub fn min_distance_to(&self, p: Point3D) -> f32 {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dy = (self.min.y - p.y).max(0.0).max(p.y - self.max.y);
        let dz = (self.min.z - p.z).max(0.0).max(p.z - self.max.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance from a point to the farthest point of the box
    pub fn max_distance_to(&self, p: Point3D) -> f32 {
        let dx = (p.x - self.min.x).abs().max((p.x - self.max.x).abs());
        let dy = (p.y - self.min.y).abs().max((p.y - self.max.y).abs());
        let dz = (p.z - self.min.z).abs().max((p.z - self.max.z).abs());
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// True if the box intersects a ball of radius `radius` around `center`
    pub fn intersects_ball(&self, center: Point3D, radius: f32) -> bool {
        self.min_distance_to(center) <= radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Point3D::ZERO, Point3D::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_contains() {
        let b = unit_box();
        assert!(b.contains(Point3D::new(0.5, 0.5, 0.5)));
        assert!(b.contains(Point3D::new(0.0, 0.0, 0.0)));
        assert!(!b.contains(Point3D::new(1.5, 0.5, 0.5)));
    }

    #[test]
    fn test_corners() {
        let b = unit_box();
        assert_eq!(b.corner(0), Point3D::ZERO);
        assert_eq!(b.corner(7), Point3D::new(1.0, 1.0, 1.0));
        assert_eq!(b.corner(1), Point3D::new(1.0, 0.0, 0.0));
        assert_eq!(b.corner(4), Point3D::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_min_max_distance() {
        let b = unit_box();
        // Point inside
        assert_eq!(b.min_distance_to(Point3D::new(0.5, 0.5, 0.5)), 0.0);
        // Point on an axis outside
        let p = Point3D::new(2.0, 0.5, 0.5);
        assert!((b.min_distance_to(p) - 1.0).abs() < 1e-6);
        // Farthest corner from the origin is (1, 1, 1)
        let d = b.max_distance_to(Point3D::ZERO);
        assert!((d - 3.0_f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_extend() {
        let mut b = Aabb::empty();
        b.extend(Point3D::new(1.0, -1.0, 0.0));
        b.extend(Point3D::new(-1.0, 2.0, 3.0));
        assert_eq!(b.min, Point3D::new(-1.0, -1.0, 0.0));
        assert_eq!(b.max, Point3D::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_ball_intersection() {
        let b = unit_box();
        assert!(b.intersects_ball(Point3D::new(2.0, 0.5, 0.5), 1.1));
        assert!(!b.intersects_ball(Point3D::new(3.0, 0.5, 0.5), 1.0));
    }
}
