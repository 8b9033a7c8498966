//! Crate-level error type.

use crate::shape::ShapeError;

/// Why an add could not be carried out.
#[derive(Debug)]
pub enum AddError {
    /// The tensors, buffers or grid are inconsistent.
    Shape(ShapeError),
    /// The GPU backend failed.
    #[cfg(feature = "wgpu")]
    Gpu(crate::ops::wgpu::GpuFailure),
}

impl From<ShapeError> for AddError {
    fn from(err: ShapeError) -> Self {
        Self::Shape(err)
    }
}

#[cfg(feature = "wgpu")]
impl From<crate::ops::wgpu::GpuFailure> for AddError {
    fn from(err: crate::ops::wgpu::GpuFailure) -> Self {
        Self::Gpu(err)
    }
}

impl core::fmt::Display for AddError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Shape(err) => write!(f, "{err}"),
            #[cfg(feature = "wgpu")]
            Self::Gpu(err) => write!(f, "{err}"),
        }
    }
}

impl core::error::Error for AddError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Shape(err) => Some(err),
            #[cfg(feature = "wgpu")]
            Self::Gpu(err) => Some(err),
        }
    }
}
