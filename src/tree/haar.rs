//! Haar wavelet transform over the eight children of an octree node.
//!
//! Each internal node stores its children's averages in wavelet form: one
//! scale coefficient (the node's own average, held by the node's parent) and
//! seven detail coefficients (held by the node itself). The fixed basis is
//! the parity basis
//!
//! ```text
//! coefficient[j] = 1/8 * sum_i (-1)^popcount(i & j) * child[i]
//! child[i]       =       sum_j (-1)^popcount(i & j) * coefficient[j]
//! ```
//!
//! with `coefficient[0]` the scale and `coefficient[1..8]` the details. The
//! transform is linear and exactly invertible, so updates compose by
//! addition on coefficients and single-child variants touch only one
//! row/column of the basis.

use crate::core::NUM_CHILDREN;
use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, SubAssign};

/// The seven Haar detail coefficients of one octree node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailCoefficients(
    /// Detail values in basis order (coefficients 1 through 7)
    pub [f32; 7],
);

impl DetailCoefficients {
    /// True if any coefficient magnitude exceeds `threshold`
    #[inline]
    pub fn is_nonzero(&self, threshold: f32) -> bool {
        self.0.iter().any(|d| threshold < d.abs())
    }
}

impl AddAssign for DetailCoefficients {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
    }
}

impl SubAssign for DetailCoefficients {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a -= b;
        }
    }
}

/// Scale plus details of one node, as produced by the forward transform.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParentCoefficients {
    /// Scale coefficient: the average over the node's region
    pub scale: f32,
    /// Detail coefficients: the children's deviations from the average
    pub details: DetailCoefficients,
}

/// Sign of basis entry (i, j): +1 when popcount(i & j) is even
#[inline]
fn sign(i: usize, j: usize) -> f32 {
    if (i & j).count_ones() & 1 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Forward transform: eight child scales to parent scale plus details.
pub fn forward(child_scales: &[f32; NUM_CHILDREN]) -> ParentCoefficients {
    let mut coefficients = [0.0f32; NUM_CHILDREN];
    for (i, &x) in child_scales.iter().enumerate() {
        for (j, c) in coefficients.iter_mut().enumerate() {
            *c += sign(i, j) * x;
        }
    }
    for c in &mut coefficients {
        *c *= 0.125;
    }
    let mut details = [0.0f32; 7];
    details.copy_from_slice(&coefficients[1..]);
    ParentCoefficients {
        scale: coefficients[0],
        details: DetailCoefficients(details),
    }
}

/// Backward transform: parent scale plus details to eight child scales.
///
/// Exactly inverts [`forward`] under exact arithmetic.
pub fn backward(scale: f32, details: &DetailCoefficients) -> [f32; NUM_CHILDREN] {
    let mut children = [0.0f32; NUM_CHILDREN];
    for (i, child) in children.iter_mut().enumerate() {
        let mut acc = scale;
        for (j, d) in details.0.iter().enumerate() {
            acc += sign(i, j + 1) * d;
        }
        *child = acc;
    }
    children
}

/// Reconstruct a single child scale at roughly 1/8 the cost of [`backward`].
#[inline]
pub fn backward_single_child(scale: f32, details: &DetailCoefficients, child_idx: usize) -> f32 {
    debug_assert!(child_idx < NUM_CHILDREN);
    let mut acc = scale;
    for (j, d) in details.0.iter().enumerate() {
        acc += sign(child_idx, j + 1) * d;
    }
    acc
}

/// Distribute a scale change at one child onto its parent's coefficients.
///
/// Summing the contributions of per-child updates over all eight children is
/// equivalent to one full forward transform of the update vector.
#[inline]
pub fn forward_single_child(delta_scale: f32, child_idx: usize) -> ParentCoefficients {
    debug_assert!(child_idx < NUM_CHILDREN);
    let weight = delta_scale * 0.125;
    let mut details = [0.0f32; 7];
    for (j, d) in details.iter_mut().enumerate() {
        *d = sign(child_idx, j + 1) * weight;
    }
    ParentCoefficients {
        scale: weight,
        details: DetailCoefficients(details),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vectors() -> Vec<[f32; 8]> {
        vec![
            [0.0; 8],
            [1.0; 8],
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0],
            [0.1, 0.25, -0.7, 1.3, -2.4, 0.05, 3.3, -0.9],
        ]
    }

    #[test]
    fn test_backward_inverts_forward() {
        for x in test_vectors() {
            let parent = forward(&x);
            let back = backward(parent.scale, &parent.details);
            for (a, b) in x.iter().zip(back.iter()) {
                assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_scale_is_average() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let parent = forward(&x);
        assert!((parent.scale - 4.5).abs() < 1e-6);
    }

    #[test]
    fn test_linearity() {
        let a = [0.1, 0.25, -0.7, 1.3, -2.4, 0.05, 3.3, -0.9];
        let b = [1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0];
        let mut sum = [0.0f32; 8];
        for i in 0..8 {
            sum[i] = a[i] + b[i];
        }
        let pa = forward(&a);
        let pb = forward(&b);
        let ps = forward(&sum);
        assert!((ps.scale - (pa.scale + pb.scale)).abs() < 1e-6);
        for j in 0..7 {
            assert!((ps.details.0[j] - (pa.details.0[j] + pb.details.0[j])).abs() < 1e-6);
        }
    }

    #[test]
    fn test_backward_single_child_matches_backward() {
        for x in test_vectors() {
            let parent = forward(&x);
            let full = backward(parent.scale, &parent.details);
            for i in 0..8 {
                let single = backward_single_child(parent.scale, &parent.details, i);
                assert!((full[i] - single).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_forward_single_child_is_unit_update() {
        // A delta injected at child i, decompressed again, must read as
        // delta at child i and zero everywhere else.
        let delta = 2.5;
        for i in 0..8 {
            let parent = forward_single_child(delta, i);
            let children = backward(parent.scale, &parent.details);
            for (k, &c) in children.iter().enumerate() {
                let expected = if k == i { delta } else { 0.0 };
                assert!((c - expected).abs() < 1e-6, "child {} of update at {}", k, i);
            }
        }
    }

    #[test]
    fn test_single_child_sum_equals_forward() {
        let x = [0.1, 0.25, -0.7, 1.3, -2.4, 0.05, 3.3, -0.9];
        let mut scale = 0.0;
        let mut details = DetailCoefficients::default();
        for (i, &v) in x.iter().enumerate() {
            let contribution = forward_single_child(v, i);
            scale += contribution.scale;
            details += contribution.details;
        }
        let full = forward(&x);
        assert!((scale - full.scale).abs() < 1e-6);
        for j in 0..7 {
            assert!((details.0[j] - full.details.0[j]).abs() < 1e-6);
        }
    }
}
