//! Host-side `(B, T, C)` tensors.
//!
//! A [`Tensor`] owns its data in the exact layout the kernel reads: row-major,
//! channels fastest, grouped into 4-wide vectors. When `C` is not a multiple
//! of 4 every row ends with padding lanes so that rows start on a vector
//! boundary.
//!
//! ## Padding policy
//!
//! - [`Tensor::new`] and [`Tensor::zeros`] fill padding lanes with `0.0`, so
//!   adding two such tensors keeps the padding zero.
//! - [`Tensor::from_padded`] adopts a buffer verbatim, padding included. The
//!   kernel does not mask padding lanes; whatever is there gets added.
//!
//! ## Example
//!
//! ```rust
//! use tensor_add::{shape::Shape, tensors::Tensor};
//!
//! let t = Tensor::new(Shape::new(2, 1, 1), &[1.0, 2.0]);
//! assert_eq!(t.padded(), &[1.0, 2.0, 0.0, 0.0]);
//! assert_eq!(t.to_vec(), vec![1.0, 2.0]);
//! ```

use crate::shape::{LANES, Shape, ShapeError};

/// A `(B, T, C)` tensor of `f32` in vectorized, padded storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Packs `data`, given in logical row-major `(B, T, C)` order, into padded storage.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` is not `B * T * C`.
    #[must_use]
    pub fn new(shape: Shape, data: &[f32]) -> Self {
        assert_eq!(
            shape.len(),
            data.len(),
            "shape {shape} is incompatible with {} data elements",
            data.len()
        );

        let mut tensor = Self::zeros(shape);
        if shape.c == 0 {
            return tensor;
        }
        let row = shape.stride() * LANES;
        tensor
            .data
            .chunks_exact_mut(row)
            .zip(data.chunks_exact(shape.c))
            .for_each(|(dst, src)| dst[..shape.c].copy_from_slice(src));
        tensor
    }

    /// A tensor of zeros, padding lanes included.
    #[must_use]
    pub fn zeros(shape: Shape) -> Self {
        Self {
            shape,
            data: vec![0.0; shape.padded_len()],
        }
    }

    /// Adopts an already vectorized buffer of exactly `shape.padded_len()` scalars.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Length`] if `data` has any other length.
    pub fn from_padded(shape: Shape, data: Vec<f32>) -> Result<Self, ShapeError> {
        if data.len() != shape.padded_len() {
            return Err(ShapeError::Length {
                expected: shape.padded_len(),
                found: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// The logical shape.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    /// Fails unless this tensor has exactly `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Mismatch`] when the shapes differ.
    pub fn check_shape(&self, shape: Shape) -> Result<(), ShapeError> {
        shape.check(self.shape)
    }

    /// Element `(b, t, c)`, or `None` if out of range.
    #[must_use]
    pub fn get(&self, b: usize, t: usize, c: usize) -> Option<f32> {
        if b >= self.shape.b || t >= self.shape.t || c >= self.shape.c {
            return None;
        }
        self.data.get(self.shape.padded_index(b, t, c)).copied()
    }

    /// Padded storage, `4 * B * T * ceil(C / 4)` scalars.
    #[must_use]
    pub fn padded(&self) -> &[f32] {
        &self.data
    }

    /// Mutable padded storage, padding lanes included.
    pub fn padded_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Storage viewed as 4-wide vectors, the unit one work-item reads.
    #[must_use]
    pub fn vectors(&self) -> &[[f32; LANES]] {
        bytemuck::cast_slice(&self.data)
    }

    /// Mutable storage viewed as 4-wide vectors.
    pub fn vectors_mut(&mut self) -> &mut [[f32; LANES]] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    /// Logical `(B, T, C)` data with padding lanes dropped.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f32> {
        if self.shape.c == 0 {
            return Vec::new();
        }
        let row = self.shape.stride() * LANES;
        self.data
            .chunks_exact(row)
            .flat_map(|chunk| &chunk[..self.shape.c])
            .copied()
            .collect()
    }

    /// Consumes the tensor, returning its padded storage.
    #[must_use]
    pub fn into_padded(self) -> Vec<f32> {
        self.data
    }
}
