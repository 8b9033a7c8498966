//! The elementwise add kernel, stated in Rust.
//!
//! This module is the single source of truth for the kernel's dispatch
//! geometry and per-work-item logic. The WGSL shader in
//! `ops/wgpu/shaders/add.wgsl` implements exactly [`work_item`] followed by
//! [`add_lanes`]; the CPU backend calls these functions directly.
//!
//! # Geometry
//!
//! The grid is three dimensional:
//!
//! - `x` enumerates 4-channel vector groups, `0..stride` with `stride = ceil(C / 4)`
//! - `y` enumerates time steps, `0..T`
//! - `z` enumerates batch elements, `0..B`
//!
//! Work-items are grouped `WORKGROUP_SIZE × 1 × 1`, so the grid along `x` is
//! rounded up to a multiple of 128. Cells past the tensor bounds do nothing.
//!
//! # Padding lanes
//!
//! When `C % 4 != 0` the last vector of every row contains lanes past the real
//! channel count. They are added like any other lane. Callers that care about
//! their content must keep them zero (as [`crate::tensors::Tensor::new`] does).

use crate::shape::{Axis, LANES, Shape, ShapeError};

/// Work-items per execution group along `x`. Groups along `y` and `z` have size 1.
pub const WORKGROUP_SIZE: u32 = 128;

/// Grid coordinate of one work-item: `[index, token, batch]`.
pub type Invocation = [u32; 3];

/// Number of execution groups launched along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// Groups along `x`, each covering [`WORKGROUP_SIZE`] vector groups.
    pub x: u32,
    /// Groups along `y`, one per time step.
    pub y: u32,
    /// Groups along `z`, one per batch element.
    pub z: u32,
}

impl Dispatch {
    /// An arbitrary grid. Useful to over-provision on purpose.
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// The grid a caller must launch for `shape`:
    /// `ceil(ceil(C / 4) / 128)` groups on `x`, `T` on `y` and `B` on `z`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::TooManyGroups`] if a count does not fit a `u32`.
    pub fn for_shape(shape: Shape) -> Result<Self, ShapeError> {
        let narrow = |axis: Axis, groups: usize| {
            u32::try_from(groups).map_err(|_| ShapeError::TooManyGroups {
                axis,
                groups,
                limit: u32::MAX as usize,
            })
        };
        Ok(Self {
            x: narrow(Axis::X, shape.stride().div_ceil(WORKGROUP_SIZE as usize))?,
            y: narrow(Axis::Y, shape.t)?,
            z: narrow(Axis::Z, shape.b)?,
        })
    }

    /// Number of work-items along `x`.
    #[must_use]
    pub const fn invocations_x(&self) -> u64 {
        self.x as u64 * WORKGROUP_SIZE as u64
    }

    /// Total number of work-items in the grid, or `None` if it overflows a `u64`.
    #[must_use]
    pub const fn invocations(&self) -> Option<u64> {
        match self.invocations_x().checked_mul(self.y as u64) {
            Some(plane) => plane.checked_mul(self.z as u64),
            None => None,
        }
    }

    /// Returns `true` if every in-bounds work-item of `shape` exists in this grid.
    #[must_use]
    pub fn covers(&self, shape: Shape) -> bool {
        self.invocations_x() >= shape.stride() as u64
            && self.y as usize >= shape.t
            && self.z as usize >= shape.b
    }

    /// Fails if any axis needs more than `limit` groups.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::TooManyGroups`] naming the first axis over the limit.
    pub fn check_limit(&self, limit: u32) -> Result<(), ShapeError> {
        for (axis, groups) in [(Axis::X, self.x), (Axis::Y, self.y), (Axis::Z, self.z)] {
            if groups > limit {
                return Err(ShapeError::TooManyGroups {
                    axis,
                    groups: groups as usize,
                    limit: limit as usize,
                });
            }
        }
        Ok(())
    }
}

impl core::fmt::Display for Dispatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Bounds check and flat index for one work-item.
///
/// Returns `None` when the work-item lies outside the tensor and must not
/// touch memory, otherwise the offset `bti = (batch * T + token) * stride + index`
/// of the 4-wide vector it owns.
#[inline]
#[must_use]
pub fn work_item(shape: Shape, [index, token, batch]: Invocation) -> Option<usize> {
    let (index, token, batch) = (index as usize, token as usize, batch as usize);
    let stride = shape.stride();
    if index >= stride || token >= shape.t || batch >= shape.b {
        return None;
    }
    Some((batch * shape.t + token) * stride + index)
}

/// Lanewise IEEE addition of two vectors.
#[inline]
#[must_use]
pub fn add_lanes(x: [f32; LANES], y: [f32; LANES]) -> [f32; LANES] {
    [x[0] + y[0], x[1] + y[1], x[2] + y[2], x[3] + y[3]]
}
