//! Coarse-to-fine projective integration of posed point clouds.
//!
//! Instead of tracing every beam voxel by voxel, the integrator walks the
//! octree top-down with an explicit work stack. Each node's world-space box
//! is classified against the scan's hierarchical range image: fully-unknown
//! regions are skipped whole, and a single node-level update is applied as
//! soon as the beam model's variation across the node's bounding sphere
//! drops below the configured error tolerance. Only regions near measured
//! surfaces are refined all the way down to leaves.

use super::config::IntegratorConfig;
use super::intersector::{IntersectionType, RangeImageIntersector};
use super::measurement_model::ContinuousBeamModel;
use crate::config::error::ConfigError;
use crate::core::index::block_index_of;
use crate::core::{BlockIndex, GridIndex, OctreeIndex, Point3D, PosedPointCloud, NUM_CHILDREN};
use crate::map::HashedChunkedWaveletOctree;
use crate::projection::{ProjectorConfig, RangeImage2D, SphericalProjector};
use fnv::FnvHashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Half diagonal of the unit cube; the bounding sphere radius of a node is
/// this times the node width
const UNIT_CUBE_HALF_DIAGONAL: f32 = 1.732_050_8 / 2.0;

/// Reasons an input cloud was rejected without touching the map.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    /// The cloud contains no points
    #[error("point cloud is empty")]
    EmptyPointcloud,

    /// The sensor pose contains non-finite values
    #[error("sensor pose is not finite")]
    NonFinitePose,
}

/// Counters from one integration call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegrationStats {
    /// Points binned into the range image
    pub points_used: usize,
    /// Points rejected while building the range image
    pub points_rejected: usize,
    /// Octree nodes that received a log-odds update
    pub nodes_updated: usize,
    /// Octree nodes skipped as fully unknown
    pub nodes_skipped: usize,
    /// Distinct blocks that received at least one update
    pub blocks_touched: usize,
}

/// Projective integrator binding a projection model and a beam model.
pub struct CoarseToFineIntegrator {
    config: IntegratorConfig,
    projector: SphericalProjector,
    model: ContinuousBeamModel,
}

impl CoarseToFineIntegrator {
    /// Create an integrator; fails on an invalid configuration.
    pub fn new(
        config: IntegratorConfig,
        projector_config: ProjectorConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let projector = SphericalProjector::new(projector_config)?;
        let model = ContinuousBeamModel::new(config.measurement_model.clone());
        Ok(Self {
            config,
            projector,
            model,
        })
    }

    /// Integrator configuration
    #[inline]
    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    /// Projection model used for range image construction
    #[inline]
    pub fn projector(&self) -> &SphericalProjector {
        &self.projector
    }

    /// Integrate one posed point cloud into `map`.
    ///
    /// On rejection the error is logged and returned and the map is left
    /// unmodified.
    pub fn integrate_pointcloud(
        &self,
        map: &mut HashedChunkedWaveletOctree,
        pointcloud: &PosedPointCloud,
    ) -> Result<IntegrationStats, IntegrationError> {
        self.integrate_with_cancellation(map, pointcloud, None)
    }

    /// Like [`Self::integrate_pointcloud`], checking `cancel` once per
    /// popped node; a cancelled integration leaves the updates applied so
    /// far (each is atomic at the block level).
    pub fn integrate_with_cancellation(
        &self,
        map: &mut HashedChunkedWaveletOctree,
        pointcloud: &PosedPointCloud,
        cancel: Option<&AtomicBool>,
    ) -> Result<IntegrationStats, IntegrationError> {
        if pointcloud.is_empty() {
            log::warn!("rejecting empty point cloud");
            return Err(IntegrationError::EmptyPointcloud);
        }
        if !pointcloud.pose.is_finite() {
            log::warn!("rejecting point cloud with non-finite pose");
            return Err(IntegrationError::NonFinitePose);
        }

        let (range_image, image_stats) =
            RangeImage2D::from_pointcloud(&self.projector, &pointcloud.cloud);
        let mut stats = IntegrationStats {
            points_used: image_stats.points_projected,
            points_rejected: image_stats.points_rejected,
            ..Default::default()
        };
        let intersector = RangeImageIntersector::new(
            &self.projector,
            &range_image,
            self.config.max_range,
            self.config.angle_threshold,
            self.config.range_delta_threshold,
        );

        let t_c_w = pointcloud.pose.inverse();
        let min_cell_width = map.min_cell_width();
        let tree_height = map.tree_height();
        let mut touched_blocks: FnvHashSet<BlockIndex> = FnvHashSet::default();
        let mut stack = self.seed_block_roots(map, pointcloud.sensor_origin());

        while let Some(node) = stack.pop() {
            if let Some(cancel) = cancel {
                if cancel.load(Ordering::Relaxed) {
                    log::info!("integration cancelled with {} nodes pending", stack.len());
                    break;
                }
            }

            let w_aabb = node.node_aabb(min_cell_width);
            let intersection = intersector.determine_intersection_type(&pointcloud.pose, &w_aabb);
            if intersection == IntersectionType::FullyUnknown {
                stats.nodes_skipped += 1;
                continue;
            }

            let c_node_center = t_c_w.transform_point(w_aabb.center());
            let d_c_node = c_node_center.norm();
            let bounding_sphere_radius = UNIT_CUBE_HALF_DIAGONAL * w_aabb.width();
            if node.height == 0
                || self.is_approximation_error_acceptable(
                    intersection,
                    d_c_node,
                    bounding_sphere_radius,
                )
            {
                let update = self.compute_update_for_cell(&range_image, c_node_center, d_c_node);
                if update != 0.0 {
                    map.add_to_cell_value(&node, update);
                    touched_blocks.insert(block_index_of(&node, tree_height));
                    stats.nodes_updated += 1;
                }
            } else {
                for rel_child in 0..NUM_CHILDREN {
                    stack.push(node.compute_child_index(rel_child));
                }
            }
        }

        stats.blocks_touched = touched_blocks.len();
        log::debug!(
            "integrated {} points: {} node updates in {} blocks, {} subtrees skipped",
            stats.points_used,
            stats.nodes_updated,
            stats.blocks_touched,
            stats.nodes_skipped
        );
        Ok(stats)
    }

    /// Root indices of every block overlapping the scan's reach
    fn seed_block_roots(
        &self,
        map: &HashedChunkedWaveletOctree,
        sensor: Point3D,
    ) -> Vec<OctreeIndex> {
        let block_width = map.config().block_width();
        let tree_height = map.tree_height();
        let lo = |v: f32| ((v - self.config.max_range) / block_width).floor() as i32;
        let hi = |v: f32| ((v + self.config.max_range) / block_width).floor() as i32;
        let mut roots = Vec::new();
        for x in lo(sensor.x)..=hi(sensor.x) {
            for y in lo(sensor.y)..=hi(sensor.y) {
                for z in lo(sensor.z)..=hi(sensor.z) {
                    roots.push(OctreeIndex::new(tree_height, GridIndex::new(x, y, z)));
                }
            }
        }
        roots
    }

    /// Early-stopping test: is one node-level update accurate enough?
    ///
    /// Bounds the beam model's variation across the node's bounding sphere
    /// using the model's closed-form gradient bounds. In free space the
    /// variation is angular and shrinks with distance; near surfaces the
    /// radial gradient dominates and the bound is absolute.
    fn is_approximation_error_acceptable(
        &self,
        intersection: IntersectionType,
        sphere_center_distance: f32,
        bounding_sphere_radius: f32,
    ) -> bool {
        match intersection {
            IntersectionType::Free => {
                bounding_sphere_radius
                    < sphere_center_distance * self.config.max_update_error
                        / self.model.free_gradient_bound()
            }
            IntersectionType::PossiblyOccupied | IntersectionType::FullyOccupied => {
                bounding_sphere_radius
                    < self.config.max_update_error / self.model.boundary_gradient_bound()
            }
            IntersectionType::FullyUnknown => false,
        }
    }

    /// Beam-model update for a cell at `c_cell` (sensor frame).
    ///
    /// Zero outside the configured range band, outside the image, behind
    /// the nearest beam's surface band, or beyond the model's angular
    /// support.
    fn compute_update_for_cell(
        &self,
        range_image: &RangeImage2D,
        c_cell: Point3D,
        d_c_cell: f32,
    ) -> f32 {
        if d_c_cell < self.config.min_range || self.config.max_range < d_c_cell {
            return 0.0;
        }
        let (elevation, azimuth) = self.projector.bearing_to_angles(c_cell);
        let Some((row, col)) = self.projector.angles_to_nearest_index(elevation, azimuth) else {
            return 0.0;
        };
        let measured_distance = range_image.range(row, col);
        if !measured_distance.is_finite() {
            return 0.0;
        }
        if measured_distance + self.model.range_support_behind_surface() < d_c_cell {
            return 0.0;
        }
        let beam_bearing = self.projector.index_to_bearing(row, col);
        let cos_angle = (beam_bearing.dot(&c_cell) / d_c_cell).clamp(-1.0, 1.0);
        let cell_to_beam_angle = cos_angle.acos();
        if self.model.angle_support() < cell_to_beam_angle {
            return 0.0;
        }
        self.model
            .compute_update(d_c_cell, cell_to_beam_angle, measured_distance)
    }
}
