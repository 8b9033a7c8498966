//! # Backends for the add kernel
//!
//! The same kernel is available on two backends:
//!
//! - [`cpu`] — grid-emulating multi-threaded CPU implementation (default)
//! - [`wgpu`] *(opt-in)* — WGSL compute shader through `wgpu`
//! - [`dispatch`] — runtime backend selection with CPU fallback
//!
//! ## Backend Selection
//!
//! Callers normally go through [`dispatch::add`], which honours the global
//! [`crate::backend::Backend`]:
//!
//! ```rust
//! use tensor_add::{ops::dispatch, shape::Shape, tensors::Tensor};
//!
//! let shape = Shape::new(8, 2, 1);
//! let x = Tensor::new(shape, &[1.0; 16]);
//! let mut out = Tensor::zeros(shape);
//! dispatch::add(&x, &mut out).unwrap(); // runs on CPU unless Wgpu is selected
//! assert_eq!(out.to_vec(), vec![1.0; 16]);
//! ```
//!
//! ## Feature Flags
//!
//! - `wgpu` — enables the `wgpu` (WebGPU) backend

pub mod cpu;
pub mod dispatch;
#[cfg(feature = "wgpu")]
pub mod wgpu;
