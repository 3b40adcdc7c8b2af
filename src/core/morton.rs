//! Morton (Z-order) encoding for octree positions.
//!
//! Interleaves the bits of a 3D index (x in bit 0, y in bit 1, z in bit 2 of
//! every triple) so that tree-level arithmetic becomes shifts and masks: the
//! child slot at any level, and the linear offset of a node inside a chunk,
//! are contiguous bit fields of the code.

/// Maximum bits per axis that fit in a u64 morton code
pub const MAX_BITS_PER_AXIS: u32 = 21;

/// Spread the lower 21 bits of `v` so there are two zero bits between each.
#[inline]
fn split_by_3(v: u32) -> u64 {
    let mut x = (v as u64) & 0x1f_ffff;
    x = (x | (x << 32)) & 0x1f_0000_0000_ffff;
    x = (x | (x << 16)) & 0x1f_0000_ff00_00ff;
    x = (x | (x << 8)) & 0x100f_00f0_0f00_f00f;
    x = (x | (x << 4)) & 0x10c3_0c30_c30c_30c3;
    x = (x | (x << 2)) & 0x1249_2492_4924_9249;
    x
}

/// Inverse of `split_by_3`: collect every third bit.
#[inline]
fn compact_by_3(v: u64) -> u32 {
    let mut x = v & 0x1249_2492_4924_9249;
    x = (x | (x >> 2)) & 0x10c3_0c30_c30c_30c3;
    x = (x | (x >> 4)) & 0x100f_00f0_0f00_f00f;
    x = (x | (x >> 8)) & 0x1f_0000_ff00_00ff;
    x = (x | (x >> 16)) & 0x1f_0000_0000_ffff;
    x = (x | (x >> 32)) & 0x1f_ffff;
    x as u32
}

/// Morton encode non-negative 3D coordinates.
#[inline]
pub fn encode(x: u32, y: u32, z: u32) -> u64 {
    debug_assert!(x < (1 << MAX_BITS_PER_AXIS));
    debug_assert!(y < (1 << MAX_BITS_PER_AXIS));
    debug_assert!(z < (1 << MAX_BITS_PER_AXIS));
    split_by_3(x) | (split_by_3(y) << 1) | (split_by_3(z) << 2)
}

/// Decode a morton code back into (x, y, z).
#[inline]
pub fn decode(code: u64) -> (u32, u32, u32) {
    (
        compact_by_3(code),
        compact_by_3(code >> 1),
        compact_by_3(code >> 2),
    )
}

/// Relative child slot (0..8) taken at `parent_height` along the path encoded
/// by a leaf-scale morton code.
#[inline]
pub fn relative_child_index(morton: u64, parent_height: i32) -> usize {
    debug_assert!(parent_height >= 1);
    ((morton >> (3 * (parent_height - 1))) & 0b111) as usize
}

/// Offset of the node at `child_height` within its level, relative to the
/// subtree rooted at `top_height`, along the path encoded by a leaf-scale
/// morton code.
#[inline]
pub fn level_traversal_distance(morton: u64, top_height: i32, child_height: i32) -> usize {
    debug_assert!(child_height <= top_height);
    let bits = 3 * (top_height - child_height) as u64;
    ((morton >> (3 * child_height)) & ((1u64 << bits) - 1)) as usize
}
