//! Parallel CPU backend
//!
//! # CPU Backend
//!
//! Runs the add kernel on the host by emulating the GPU dispatch grid
//! work-item by work-item. This is the default backend, the fallback when no
//! GPU adapter is available, and the reference the GPU results are compared
//! against.
//!
//! ## Execution model
//!
//! - Every work-item of the grid goes through [`kernel::work_item`], so the
//!   bounds check and flat index are exactly the ones the shader uses.
//! - The output buffer is split into disjoint rows of `stride` vectors with
//!   [`rayon`]; each row is owned by one task, mirroring the fact that no two
//!   work-items share an output vector.
//! - Work-items whose `(token, batch)` lies past the tensor never get a row
//!   and are counted as discarded.

use crate::kernel::{self, Dispatch};
use crate::shape::{LANES, Shape, ShapeError};
use crate::tensors::Tensor;
use rayon::prelude::*;

/// Work-item accounting for one emulated dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    /// Work-items that performed the read-modify-write.
    pub active: u64,
    /// Work-items that failed the bounds check and returned early.
    pub discarded: u64,
}

/// Emulates one dispatch of the add kernel over `dispatch`.
///
/// `x` and `output` are the vectorized buffers bound at slots 1 and 2. They
/// may be longer than `shape` requires; the excess is never touched.
///
/// # Errors
///
/// Returns [`ShapeError::BufferTooSmall`] if either buffer holds fewer than
/// `shape.vec_len()` vectors. The GPU has no such check; here it replaces
/// undefined behavior. Returns [`ShapeError::TooManyInvocations`] if the grid
/// is too large to count.
pub fn dispatch_add(
    shape: Shape,
    dispatch: Dispatch,
    x: &[[f32; LANES]],
    output: &mut [[f32; LANES]],
) -> Result<DispatchStats, ShapeError> {
    shape.check_buffer(x.len())?;
    shape.check_buffer(output.len())?;

    let total = dispatch
        .invocations()
        .ok_or(ShapeError::TooManyInvocations {
            groups: [dispatch.x, dispatch.y, dispatch.z],
        })?;
    let stride = shape.stride();
    if stride == 0 || shape.rows() == 0 {
        return Ok(DispatchStats {
            active: 0,
            discarded: total,
        });
    }

    // global_invocation_id.x is a u32 on the device; work-items at or past
    // `stride` fail the bounds check, so they are only counted
    let width = u32::try_from(dispatch.invocations_x().min(stride as u64)).unwrap_or(u32::MAX);

    let active = output[..shape.vec_len()]
        .par_chunks_mut(stride)
        .enumerate()
        .map(|(row, vectors)| {
            let (batch, token) = (row / shape.t, row % shape.t);
            let (Ok(token), Ok(batch)) = (u32::try_from(token), u32::try_from(batch)) else {
                return 0;
            };
            if token >= dispatch.y || batch >= dispatch.z {
                return 0;
            }

            let base = row * stride;
            let mut active = 0;
            for index in 0..width {
                let Some(bti) = kernel::work_item(shape, [index, token, batch]) else {
                    continue;
                };
                let slot = &mut vectors[bti - base];
                *slot = kernel::add_lanes(x[bti], *slot);
                active += 1;
            }
            active
        })
        .sum::<u64>();

    Ok(DispatchStats {
        active,
        discarded: total - active,
    })
}

/// Adds `x` onto `output` in place, launching the grid the shape requires.
///
/// # Errors
///
/// Returns [`ShapeError::Mismatch`] if the tensors differ in shape.
///
/// # Example
///
/// ```rust
/// use tensor_add::{ops::cpu, shape::Shape, tensors::Tensor};
///
/// let shape = Shape::new(4, 1, 1);
/// let x = Tensor::new(shape, &[1.0, 2.0, 3.0, 4.0]);
/// let mut out = Tensor::new(shape, &[10.0, 20.0, 30.0, 40.0]);
/// cpu::add(&x, &mut out).unwrap();
/// assert_eq!(out.to_vec(), vec![11.0, 22.0, 33.0, 44.0]);
/// ```
pub fn add(x: &Tensor, output: &mut Tensor) -> Result<DispatchStats, ShapeError> {
    let shape = output.shape();
    x.check_shape(shape)?;
    let dispatch = Dispatch::for_shape(shape)?;
    log::debug!("cpu add: shape {shape}, grid {dispatch}");
    dispatch_add(shape, dispatch, x.vectors(), output.vectors_mut())
}

/// Straight-line single-threaded `output[b, t, c] += x[b, t, c]` over the
/// logical elements. Padding lanes are left alone.
///
/// # Errors
///
/// Returns [`ShapeError::Mismatch`] if the tensors differ in shape.
pub fn reference_add(x: &Tensor, output: &mut Tensor) -> Result<(), ShapeError> {
    let shape = output.shape();
    x.check_shape(shape)?;
    let (lhs, out) = (x.padded(), output.padded_mut());
    for b in 0..shape.b {
        for t in 0..shape.t {
            for c in 0..shape.c {
                let i = shape.padded_index(b, t, c);
                out[i] = lhs[i] + out[i];
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(shape: Shape, scale: f32) -> Tensor {
        let data: Vec<f32> = (0..shape.len()).map(|i| i as f32 * scale).collect();
        Tensor::new(shape, &data)
    }

    #[test]
    fn add_single_vector() {
        let shape = Shape::new(4, 1, 1);
        let x = Tensor::new(shape, &[1.0, 2.0, 3.0, 4.0]);
        let mut out = Tensor::new(shape, &[0.5, 0.5, 0.5, 0.5]);

        let stats = add(&x, &mut out).unwrap();

        assert_eq!(out.to_vec(), vec![1.5, 2.5, 3.5, 4.5]);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.discarded, 127);
    }

    #[test]
    fn add_matches_reference() {
        let shape = Shape::new(10, 3, 2);
        let x = ramp(shape, 0.5);
        let mut out = ramp(shape, -2.0);
        let mut expected = out.clone();

        add(&x, &mut out).unwrap();
        reference_add(&x, &mut expected).unwrap();

        assert_eq!(out, expected);
    }

    #[test]
    fn add_rejects_mismatched_shapes() {
        let x = Tensor::zeros(Shape::new(4, 2, 1));
        let mut out = Tensor::zeros(Shape::new(4, 1, 2));
        assert!(matches!(
            add(&x, &mut out),
            Err(ShapeError::Mismatch { .. })
        ));
        assert!(reference_add(&x, &mut out).is_err());
    }

    #[test]
    fn dispatch_rejects_short_buffers() {
        let shape = Shape::new(8, 2, 1);
        let x = vec![[1.0; 4]; 3];
        let mut out = vec![[0.0; 4]; 4];
        assert_eq!(
            dispatch_add(shape, Dispatch::new(1, 2, 1), &x, &mut out),
            Err(ShapeError::BufferTooSmall {
                required: 4,
                found: 3
            })
        );
    }

    #[test]
    fn dispatch_leaves_excess_buffer_alone() {
        let shape = Shape::new(4, 1, 1);
        let x = vec![[1.0; 4]; 2];
        let mut out = vec![[5.0; 4]; 2];
        dispatch_add(shape, Dispatch::new(1, 1, 1), &x, &mut out).unwrap();
        assert_eq!(out, vec![[6.0; 4], [5.0; 4]]);
    }

    #[test]
    fn undersized_grid_skips_uncovered_rows() {
        let shape = Shape::new(4, 2, 2);
        let x = vec![[1.0; 4]; 4];
        let mut out = vec![[0.0; 4]; 4];

        // only token 0 of batch 0 is launched
        let stats = dispatch_add(shape, Dispatch::new(1, 1, 1), &x, &mut out).unwrap();

        assert_eq!(stats.active, 1);
        assert_eq!(out, vec![[1.0; 4], [0.0; 4], [0.0; 4], [0.0; 4]]);
    }

    #[test]
    fn uncountable_grid_is_rejected() {
        let shape = Shape::new(4, 1, 1);
        let x = vec![[1.0; 4]];
        let mut out = vec![[2.0; 4]];

        let huge = Dispatch::new(u32::MAX, u32::MAX, u32::MAX);

        assert_eq!(
            dispatch_add(shape, huge, &x, &mut out),
            Err(ShapeError::TooManyInvocations {
                groups: [u32::MAX; 3]
            })
        );
        assert_eq!(out, vec![[2.0; 4]]);
    }

    #[test]
    fn wide_grid_counts_discarded_work_items() {
        let shape = Shape::new(4, 1, 1);
        let x = vec![[1.0; 4]];
        let mut out = vec![[2.0; 4]];

        let stats = dispatch_add(shape, Dispatch::new(u32::MAX, 1, 1), &x, &mut out).unwrap();

        assert_eq!(out, vec![[3.0; 4]]);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.discarded, u32::MAX as u64 * 128 - 1);
    }

    #[test]
    fn empty_shape_discards_everything() {
        let shape = Shape::new(0, 2, 2);
        let stats = dispatch_add(shape, Dispatch::new(1, 2, 2), &[], &mut []).unwrap();
        assert_eq!(
            stats,
            DispatchStats {
                active: 0,
                discarded: 512
            }
        );
    }
}
