//! Operation Dispatch Layer
//!
//! Selects the backend for each add at runtime, based on the global
//! [`Backend`](crate::backend::Backend).
//!
//! 1. `Wgpu` (if selected and the `wgpu` feature is enabled)
//! 2. Falls back to `Cpu`
//!
//! Shape errors are reported before any backend runs, so a fallback never
//! hides a caller mistake.

use crate::backend::{Backend, get_backend};
use crate::error::AddError;
use crate::tensors::Tensor;

/// Adds `x` onto `output` in place on the selected backend.
///
/// Returns the backend that actually ran, which is [`Backend::Cpu`] whenever
/// the GPU was not selected, not compiled in, or failed.
///
/// # Errors
///
/// Returns [`AddError::Shape`] if the tensors differ in shape.
pub fn add(x: &Tensor, output: &mut Tensor) -> Result<Backend, AddError> {
    x.check_shape(output.shape())?;

    match get_backend() {
        Backend::Wgpu => {
            #[cfg(feature = "wgpu")]
            {
                match super::wgpu::wgpu_add(x, output) {
                    Ok(()) => return Ok(Backend::Wgpu),
                    Err(err) => log::warn!("wgpu add failed, falling back to cpu: {err}"),
                }
            }
            #[cfg(not(feature = "wgpu"))]
            log::debug!("wgpu backend selected but not compiled in, using cpu");
        }
        Backend::Cpu => {}
    }

    super::cpu::add(x, output)?;
    Ok(Backend::Cpu)
}
