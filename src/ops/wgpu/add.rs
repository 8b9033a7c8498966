use super::{AddKernel, GpuContext, GpuFailure, context, kernel};
use crate::kernel::Dispatch;
use crate::shape::{Shape, ShapeError, ShapeUniform};
use crate::tensors::Tensor;
use wgpu::util::DeviceExt;

/// Smallest storage buffer we allocate; zero-sized bindings are invalid.
const MIN_STORAGE_SIZE: u64 = 16;

/// A `(B, T, C)` tensor resident on the device.
///
/// Owns the vectorized storage buffer and a uniform buffer holding the shape,
/// ready to be bound at slot 0 of the add kernel.
pub struct GpuTensor {
    shape: Shape,
    buffer: wgpu::Buffer,
    meta: wgpu::Buffer,
}

impl GpuTensor {
    /// Uploads a host tensor, padding lanes included.
    ///
    /// # Errors
    ///
    /// Fails if the shape does not fit the `u32` uniform.
    pub fn from_tensor(ctx: &GpuContext, tensor: &Tensor) -> Result<Self, ShapeError> {
        let this = Self::zeros(ctx, tensor.shape())?;
        if !tensor.padded().is_empty() {
            ctx.queue
                .write_buffer(&this.buffer, 0, bytemuck::cast_slice(tensor.padded()));
        }
        Ok(this)
    }

    /// A zero-filled device tensor.
    ///
    /// # Errors
    ///
    /// Fails if the shape does not fit the `u32` uniform, or with
    /// [`ShapeError::BufferTooLarge`] if its storage would exceed the device's
    /// buffer or storage binding size.
    pub fn zeros(ctx: &GpuContext, shape: Shape) -> Result<Self, ShapeError> {
        let uniform = ShapeUniform::try_from(shape)?;
        shape.check_byte_limit(binding_limit(ctx))?;
        let meta = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("add_shape"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("add_tensor"),
            size: shape.byte_len().max(MIN_STORAGE_SIZE),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Ok(Self {
            shape,
            buffer,
            meta,
        })
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

    /// The storage buffer as a binding resource.
    #[must_use]
    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }

    /// The shape uniform as a binding resource.
    #[must_use]
    pub fn meta_binding(&self) -> wgpu::BindingResource<'_> {
        self.meta.as_entire_binding()
    }

    /// Copies the tensor back to the host.
    ///
    /// # Errors
    ///
    /// Fails if waiting on the device or mapping the staging buffer fails.
    pub fn read_back(&self, ctx: &GpuContext) -> Result<Tensor, GpuFailure> {
        let size = self.shape.byte_len();
        if size == 0 {
            return Ok(Tensor::zeros(self.shape));
        }

        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("add_staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("add_readback_encoder"),
            });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);
        ctx.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        ctx.device.poll(wgpu::PollType::Wait)?;
        receiver
            .recv()
            .map_err(|_| GpuFailure::from("readback callback never ran"))??;

        let data = {
            let view = slice.get_mapped_range();
            let bytes: &[u8] = &view;
            bytemuck::cast_slice::<u8, f32>(bytes).to_vec()
        };
        staging.unmap();

        Ok(Tensor::from_padded(self.shape, data)?)
    }
}

/// Largest storage buffer the device can both allocate and bind.
#[must_use]
pub fn binding_limit(ctx: &GpuContext) -> u64 {
    let limits = ctx.device.limits();
    u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size)
}

/// One `output += x` bound and sized, ready to be recorded into a compute pass.
pub struct AddOp<'a> {
    pipeline: &'a wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    dispatch: Dispatch,
    limit: u32,
}

impl<'a> AddOp<'a> {
    /// Binds `input` and `output` and sizes the grid for their shape.
    ///
    /// `input` and `output` must be distinct tensors.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Mismatch`] if the shapes differ, or
    /// [`ShapeError::TooManyGroups`] if the grid exceeds the device's
    /// `max_compute_workgroups_per_dimension`.
    pub fn new(
        ctx: &GpuContext,
        kernel: &'a AddKernel,
        input: &GpuTensor,
        output: &GpuTensor,
    ) -> Result<Self, ShapeError> {
        let shape = output.shape();
        input.check_shape(shape)?;

        let limit = ctx.device.limits().max_compute_workgroups_per_dimension;
        let dispatch = Dispatch::for_shape(shape)?;
        dispatch.check_limit(limit)?;

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("add_bind_group"),
            layout: &kernel.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: output.meta_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: input.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: output.binding(),
                },
            ],
        });

        Ok(Self {
            pipeline: &kernel.pipeline,
            bind_group,
            dispatch,
            limit,
        })
    }

    /// Replaces the grid, e.g. to over-provision on purpose.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::TooManyGroups`] if the grid exceeds device limits.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Result<Self, ShapeError> {
        dispatch.check_limit(self.limit)?;
        self.dispatch = dispatch;
        Ok(self)
    }

    /// The grid this op will launch.
    #[must_use]
    pub const fn dispatch(&self) -> Dispatch {
        self.dispatch
    }
}

/// Records [`AddOp`]s into a pass.
pub trait RecordDispatch {
    /// Sets the pipeline and bind group of `op` and dispatches its grid.
    fn record_add(&mut self, op: &AddOp<'_>);
}

impl RecordDispatch for wgpu::ComputePass<'_> {
    fn record_add(&mut self, op: &AddOp<'_>) {
        let Dispatch { x, y, z } = op.dispatch;
        self.set_pipeline(op.pipeline);
        self.set_bind_group(0, &op.bind_group, &[]);
        self.dispatch_workgroups(x, y, z);
    }
}

/// Encodes `ops` in order into one compute pass, submits it and waits.
///
/// Ops that write the same output accumulate in order.
///
/// # Errors
///
/// Returns the device's validation error message, or a poll failure.
pub fn submit_add(ctx: &GpuContext, ops: &[AddOp<'_>]) -> Result<(), GpuFailure> {
    ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("add_encoder"),
        });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("add_pass"),
            timestamp_writes: None,
        });
        for op in ops {
            log::debug!("wgpu add: grid {}", op.dispatch);
            pass.record_add(op);
        }
    }
    ctx.queue.submit(Some(encoder.finish()));

    if let Some(err) = pollster::block_on(ctx.device.pop_error_scope()) {
        return Err(GpuFailure::from(err.to_string()));
    }
    ctx.device.poll(wgpu::PollType::Wait)?;
    Ok(())
}

/// Adds `x` onto `output` on the GPU using the shared context.
///
/// Uploads both tensors, runs one dispatch and writes the result back into
/// `output`. Padding lanes are uploaded and added like any other lane.
///
/// # Errors
///
/// - [`ShapeError`] (wrapped) if the tensors differ in shape
/// - a [`GpuFailure`] if there is no adapter or the device fails
pub fn wgpu_add(x: &Tensor, output: &mut Tensor) -> Result<(), GpuFailure> {
    let shape = output.shape();
    x.check_shape(shape)?;
    if shape.is_empty() {
        return Ok(());
    }

    let ctx = context()?;
    let kernel = kernel()?;

    let input = GpuTensor::from_tensor(ctx, x)?;
    let sum = GpuTensor::from_tensor(ctx, output)?;
    let op = AddOp::new(ctx, kernel, &input, &sum)?;
    log::debug!("wgpu add: shape {shape}");

    submit_add(ctx, core::slice::from_ref(&op))?;
    *output = sum.read_back(ctx)?;
    Ok(())
}
