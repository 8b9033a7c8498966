//! Tensor shapes and the uniform record that carries them to the device.
//!
//! Every tensor handled by this crate is logically `(B, T, C)`: batch, time
//! step and channel, stored row-major with `C` varying fastest. Storage is
//! grouped into 4-wide vectors, so one row of `C` channels occupies
//! [`Shape::stride`] vectors. When `C` is not a multiple of 4, the last vector
//! of each row carries padding lanes.
//!
//! Shapes are written `Shape::new(c, t, b)`, innermost dimension first.

use bytemuck::{Pod, Zeroable};

/// Number of `f32` lanes packed into one storage vector.
pub const LANES: usize = 4;

/// Logical `(B, T, C)` extents of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    /// Channel count, the fastest-varying dimension.
    pub c: usize,
    /// Time-step count.
    pub t: usize,
    /// Batch count.
    pub b: usize,
}

impl Shape {
    /// Creates a shape from channel, time-step and batch counts.
    #[must_use]
    pub const fn new(c: usize, t: usize, b: usize) -> Self {
        Self { c, t, b }
    }

    /// Number of 4-wide vectors needed to cover one row of channels, `ceil(C / 4)`.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.c.div_ceil(LANES)
    }

    /// Number of rows, one per `(batch, token)` pair.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.b * self.t
    }

    /// Number of 4-wide vectors in a buffer of this shape.
    #[must_use]
    pub const fn vec_len(&self) -> usize {
        self.rows() * self.stride()
    }

    /// Number of scalar slots in a buffer of this shape, padding lanes included.
    #[must_use]
    pub const fn padded_len(&self) -> usize {
        self.vec_len() * LANES
    }

    /// Number of logical elements, `B * T * C`.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.b * self.t * self.c
    }

    /// Returns `true` if any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if every row ends on a vector boundary.
    #[must_use]
    pub const fn is_aligned(&self) -> bool {
        self.c % LANES == 0
    }

    /// Offset of logical element `(b, t, c)` in the padded scalar buffer.
    #[must_use]
    pub const fn padded_index(&self, b: usize, t: usize, c: usize) -> usize {
        (b * self.t + t) * self.stride() * LANES + c
    }

    /// Size in bytes of a device buffer of this shape, padding lanes included.
    #[must_use]
    pub const fn byte_len(&self) -> u64 {
        (self.padded_len() as u64).saturating_mul(core::mem::size_of::<f32>() as u64)
    }

    /// Fails with [`ShapeError::BufferTooLarge`] if a buffer of this shape
    /// would exceed `limit` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when `self.byte_len() > limit`.
    pub fn check_byte_limit(&self, limit: u64) -> Result<(), ShapeError> {
        let bytes = self.byte_len();
        if bytes > limit {
            Err(ShapeError::BufferTooLarge { bytes, limit })
        } else {
            Ok(())
        }
    }

    /// Fails with [`ShapeError::Mismatch`] unless `other` equals `self`.
    ///
    /// # Errors
    ///
    /// Returns an error describing both shapes when they differ.
    pub fn check(&self, other: Self) -> Result<(), ShapeError> {
        if *self == other {
            Ok(())
        } else {
            Err(ShapeError::Mismatch {
                expected: *self,
                found: other,
            })
        }
    }

    /// Fails with [`ShapeError::BufferTooSmall`] if a buffer of `vectors`
    /// 4-wide elements cannot hold this shape.
    ///
    /// # Errors
    ///
    /// Returns an error when `vectors < self.vec_len()`.
    pub fn check_buffer(&self, vectors: usize) -> Result<(), ShapeError> {
        if vectors < self.vec_len() {
            Err(ShapeError::BufferTooSmall {
                required: self.vec_len(),
                found: vectors,
            })
        } else {
            Ok(())
        }
    }
}

impl core::fmt::Display for Shape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[C: {}, T: {}, B: {}]", self.c, self.t, self.b)
    }
}

/// The shape as the kernel sees it in binding slot 0: three `u32`s padded to a
/// 16-byte `vec4<u32>`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ShapeUniform {
    /// Channel count.
    pub c: u32,
    /// Time-step count.
    pub t: u32,
    /// Batch count.
    pub b: u32,
    _pad: u32,
}

impl TryFrom<Shape> for ShapeUniform {
    type Error = ShapeError;

    fn try_from(shape: Shape) -> Result<Self, Self::Error> {
        let narrow = |value: usize| {
            u32::try_from(value).map_err(|_| ShapeError::DimensionTooLarge { shape })
        };
        Ok(Self {
            c: narrow(shape.c)?,
            t: narrow(shape.t)?,
            b: narrow(shape.b)?,
            _pad: 0,
        })
    }
}

/// One axis of the dispatch grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Channel groups.
    X,
    /// Time steps.
    Y,
    /// Batch elements.
    Z,
}

impl core::fmt::Display for Axis {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::X => write!(f, "x"),
            Self::Y => write!(f, "y"),
            Self::Z => write!(f, "z"),
        }
    }
}

/// A shape, buffer or grid that cannot be used for a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// Two tensors that must agree in shape do not.
    Mismatch {
        /// The shape the operation was built for.
        expected: Shape,
        /// The shape that was supplied.
        found: Shape,
    },
    /// A buffer holds fewer 4-wide vectors than its shape requires.
    BufferTooSmall {
        /// Vectors the shape needs.
        required: usize,
        /// Vectors actually present.
        found: usize,
    },
    /// A padded buffer does not hold exactly the scalars its shape requires.
    Length {
        /// Scalars the shape needs, padding lanes included.
        expected: usize,
        /// Scalars supplied.
        found: usize,
    },
    /// A grid axis needs more groups than the device (or `u32`) allows.
    TooManyGroups {
        /// The offending axis.
        axis: Axis,
        /// Requested group count.
        groups: usize,
        /// Largest count accepted.
        limit: usize,
    },
    /// The grid holds more work-items than a `u64` can count.
    TooManyInvocations {
        /// Groups along `x`, `y` and `z`.
        groups: [u32; 3],
    },
    /// A dimension does not fit the `u32` shape uniform.
    DimensionTooLarge {
        /// The offending shape.
        shape: Shape,
    },
    /// A device buffer for the shape would exceed the device's size limits.
    BufferTooLarge {
        /// Bytes the buffer needs.
        bytes: u64,
        /// Largest binding the device accepts.
        limit: u64,
    },
}

impl core::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Mismatch { expected, found } => {
                write!(f, "shape mismatch: expected {expected}, found {found}")
            }
            Self::BufferTooSmall { required, found } => write!(
                f,
                "buffer too small: {required} vectors required, {found} present"
            ),
            Self::Length { expected, found } => write!(
                f,
                "padded length mismatch: expected {expected} scalars, found {found}"
            ),
            Self::TooManyGroups {
                axis,
                groups,
                limit,
            } => write!(
                f,
                "{groups} workgroups requested on axis {axis}, limit is {limit}"
            ),
            Self::TooManyInvocations { groups: [x, y, z] } => write!(
                f,
                "grid ({x}, {y}, {z}) has more work-items than can be counted"
            ),
            Self::DimensionTooLarge { shape } => {
                write!(f, "shape {shape} does not fit a u32 per dimension")
            }
            Self::BufferTooLarge { bytes, limit } => write!(
                f,
                "buffer of {bytes} bytes exceeds the device limit of {limit} bytes"
            ),
        }
    }
}

impl core::error::Error for ShapeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_rounds_up_to_whole_vectors() {
        assert_eq!(Shape::new(4, 1, 1).stride(), 1);
        assert_eq!(Shape::new(6, 1, 1).stride(), 2);
        assert_eq!(Shape::new(8, 1, 1).stride(), 2);
        assert_eq!(Shape::new(1, 1, 1).stride(), 1);
        assert_eq!(Shape::new(0, 3, 2).stride(), 0);
    }

    #[test]
    fn lengths_include_padding() {
        let shape = Shape::new(6, 3, 2);
        assert_eq!(shape.len(), 36);
        assert_eq!(shape.vec_len(), 12);
        assert_eq!(shape.padded_len(), 48);
        assert!(!shape.is_aligned());
        assert!(Shape::new(8, 3, 2).is_aligned());
    }

    #[test]
    fn padded_index_skips_padding_lanes() {
        let shape = Shape::new(6, 2, 2);
        assert_eq!(shape.padded_index(0, 0, 5), 5);
        assert_eq!(shape.padded_index(0, 1, 0), 8);
        assert_eq!(shape.padded_index(1, 0, 0), 16);
        assert_eq!(shape.padded_index(1, 1, 2), 26);
    }

    #[test]
    fn check_reports_both_shapes() {
        let a = Shape::new(4, 2, 1);
        let b = Shape::new(4, 1, 2);
        assert!(a.check(a).is_ok());
        assert_eq!(
            a.check(b),
            Err(ShapeError::Mismatch {
                expected: a,
                found: b
            })
        );
    }

    #[test]
    fn check_buffer_accepts_larger_buffers() {
        let shape = Shape::new(6, 2, 1);
        assert!(shape.check_buffer(4).is_ok());
        assert!(shape.check_buffer(5).is_ok());
        assert_eq!(
            shape.check_buffer(3),
            Err(ShapeError::BufferTooSmall {
                required: 4,
                found: 3
            })
        );
    }

    #[test]
    fn byte_limit_counts_padding_lanes() {
        let shape = Shape::new(6, 2, 1);
        assert_eq!(shape.byte_len(), 64);
        assert!(shape.check_byte_limit(64).is_ok());
        assert_eq!(
            shape.check_byte_limit(63),
            Err(ShapeError::BufferTooLarge {
                bytes: 64,
                limit: 63
            })
        );
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn uniform_rejects_wide_dimensions() {
        let shape = Shape::new(u32::MAX as usize + 1, 1, 1);
        let err = ShapeUniform::try_from(shape).unwrap_err();
        assert_eq!(err, ShapeError::DimensionTooLarge { shape });
        assert!(err.to_string().contains("does not fit a u32"));
    }

    #[test]
    fn uniform_is_sixteen_bytes() {
        let uniform = ShapeUniform::try_from(Shape::new(6, 3, 2)).unwrap();
        assert_eq!(core::mem::size_of::<ShapeUniform>(), 16);
        assert_eq!(
            bytemuck::cast::<ShapeUniform, [u32; 4]>(uniform),
            [6, 3, 2, 0]
        );
    }
}
