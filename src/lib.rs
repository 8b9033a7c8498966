//! tensor_add: in-place elementwise addition of `(B, T, C)` tensors on the GPU.
//!
//! The crate is built around one compute kernel, `output[b, t, c] += x[b, t, c]`,
//! with four channels per work-item and a bounds check that lets the grid be
//! launched in fixed groups of 128.
//!
//! # Modules
//!
//! - [`shape`] — the `(C, T, B)` shape descriptor and its uniform record.
//! - [`tensors`] — host tensors in the kernel's vectorized, padded layout.
//! - [`kernel`] — dispatch geometry and per-work-item logic.
//! - [`ops`] — the CPU and `wgpu` backends and runtime dispatch.
//! - [`backend`] — global backend selection.
//! - [`approx`] — float comparison helpers.
//!
//! # Caller obligations
//!
//! - Both tensors have the same shape.
//! - When `C` is not a multiple of 4, padding lanes are added without masking;
//!   keep them zero (as [`tensors::Tensor::new`] does) or ignore them.
//!
//! # Example
//!
//! ```rust
//! use tensor_add::{ops::dispatch, shape::Shape, tensors::Tensor};
//!
//! let shape = Shape::new(4, 2, 1);
//! let x = Tensor::new(shape, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
//! let mut out = Tensor::new(shape, &[1.0; 8]);
//! dispatch::add(&x, &mut out).unwrap();
//! assert_eq!(out.to_vec(), vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
//! ```

pub mod approx;
pub mod backend;
pub mod error;
pub mod kernel;
pub mod ops;
pub mod shape;
pub mod tensors;

pub use error::AddError;
