//! GPU-accelerated add using WGPU.
//!
//! This module runs the add kernel as a WGSL compute shader. It handles GPU
//! context initialization, shader and pipeline creation (cached once via
//! `lazy_static`), device-side tensors and the dispatch itself.
//!
//! - [`GpuContext`] — device and queue
//! - [`AddKernel`] — compiled shader, bind group layout and pipeline
//! - [`GpuTensor`] — a `(B, T, C)` storage buffer plus its shape uniform
//! - [`AddOp`] — one recorded `output += x` ready to go into a compute pass
//! - [`wgpu_add`] — upload, dispatch and read back in one call
//!
//! The shared context is created on first use. A machine without an adapter
//! yields a [`GpuFailure`] rather than a panic, so callers can fall back to the
//! CPU backend.

use crate::shape::ShapeError;

mod add;
pub use self::add::{AddOp, GpuTensor, RecordDispatch, binding_limit, submit_add, wgpu_add};

const ADD: &str = include_str!("shaders/add.wgsl");

/// Basic wrapper for common GPU errors.
#[derive(Debug)]
pub enum GpuError {
    /// An error in requesting the adapter.
    Adapter(wgpu::RequestAdapterError),
    /// An error in requesting the GPU (device).
    Device(wgpu::RequestDeviceError),
}

impl core::fmt::Display for GpuError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Adapter(e) => write!(f, "Adapter error: {e}"),
            Self::Device(e) => write!(f, "Device error: {e}"),
        }
    }
}

impl core::error::Error for GpuError {}

/// What went wrong in a [`GpuFailure`].
#[derive(Debug)]
pub enum GpuFailureKind {
    /// The adapter or device could not be acquired.
    Gpu(GpuError),
    /// The tensors or grid do not fit the kernel.
    Shape(ShapeError),
    /// Waiting on the device failed.
    Poll(wgpu::PollError),
    /// A readback buffer could not be mapped.
    Map(wgpu::BufferAsyncError),
}

impl core::fmt::Display for GpuFailureKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Gpu(err) => write!(f, "GPU error: {err}"),
            Self::Shape(err) => write!(f, "Shape error: {err}"),
            Self::Poll(err) => write!(f, "Poll error: {err}"),
            Self::Map(err) => write!(f, "Map error: {err}"),
        }
    }
}

/// A type of error closely related to the GPU.
#[derive(Debug)]
pub struct GpuFailure {
    /// The optional type of failure that occured.
    pub kind: Option<GpuFailureKind>,
    /// The optional message explaining the failure.
    pub message: Option<String>,
}

impl GpuFailure {
    /// Returns the shape error behind this failure, if that is what it was.
    #[must_use]
    pub fn shape_error(&self) -> Option<&ShapeError> {
        match &self.kind {
            Some(GpuFailureKind::Shape(err)) => Some(err),
            _ => None,
        }
    }
}

impl From<GpuError> for GpuFailure {
    fn from(kind: GpuError) -> Self {
        Self {
            kind: Some(GpuFailureKind::Gpu(kind)),
            message: None,
        }
    }
}

impl From<ShapeError> for GpuFailure {
    fn from(kind: ShapeError) -> Self {
        Self {
            kind: Some(GpuFailureKind::Shape(kind)),
            message: None,
        }
    }
}

impl From<wgpu::PollError> for GpuFailure {
    fn from(kind: wgpu::PollError) -> Self {
        Self {
            kind: Some(GpuFailureKind::Poll(kind)),
            message: None,
        }
    }
}

impl From<wgpu::BufferAsyncError> for GpuFailure {
    fn from(kind: wgpu::BufferAsyncError) -> Self {
        Self {
            kind: Some(GpuFailureKind::Map(kind)),
            message: None,
        }
    }
}

impl From<&str> for GpuFailure {
    fn from(msg: &str) -> Self {
        Self {
            kind: None,
            message: Some(msg.to_string()),
        }
    }
}

impl From<String> for GpuFailure {
    fn from(msg: String) -> Self {
        Self {
            kind: None,
            message: Some(msg),
        }
    }
}

impl core::fmt::Display for GpuFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if let Some(kind) = &self.kind {
            write!(f, "GPU failure: {kind}")
        } else if let Some(msg) = &self.message {
            write!(f, "GPU failure: {msg}")
        } else {
            write!(f, "Unknown GPU failure")
        }
    }
}

impl core::error::Error for GpuFailure {}

/// Holds the WGPU device and queue used for executing compute pipelines.
///
/// A shared instance is initialized once and reused via [`context`]; tests
/// and embedders may also build their own.
pub struct GpuContext {
    /// The actual GPU device.
    pub device: wgpu::Device,
    /// A queue for information related to the device.
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Initializes a new GPU context, selecting the default adapter and creating a device + queue.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError`] if adapter or device acquisition fails.
    ///
    /// # Internals
    ///
    /// - Uses `pollster::block_on` to synchronously wait for async WGPU calls
    /// - Selects the default adapter with default options
    /// - Requests default limits and no extra features
    pub fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .map_err(GpuError::Adapter)?;
        let info = adapter.get_info();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("tensor_add"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(GpuError::Device)?;
        log::info!("gpu context on {} ({:?})", info.name, info.backend);

        Ok(Self { device, queue })
    }
}

/// The compiled add kernel: shader, bind group layout and pipeline.
///
/// Binding slots:
///
/// | slot | kind | content |
/// |---|---|---|
/// | 0 | uniform | `vec4<u32>` `[C, T, B, _]` |
/// | 1 | read-only storage | `x` |
/// | 2 | read-write storage | `output` |
pub struct AddKernel {
    /// Layout of bind group 0.
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// The compute pipeline, entry point `main`.
    pub pipeline: wgpu::ComputePipeline,
}

impl AddKernel {
    /// Compiles the shader and builds the pipeline on `device`.
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = load_shader(device, "add", ADD);
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("add_bgl"),
            entries: &[
                layout_entry(0, wgpu::BufferBindingType::Uniform),
                layout_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                layout_entry(2, wgpu::BufferBindingType::Storage { read_only: false }),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("add_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("add_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            cache: None,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        Self {
            bind_group_layout,
            pipeline,
        }
    }
}

fn load_shader(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn layout_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

lazy_static::lazy_static! {
    static ref GPU_CONTEXT: Result<GpuContext, GpuError> = GpuContext::new();

    static ref ADD_KERNEL: Option<AddKernel> = GPU_CONTEXT
        .as_ref()
        .ok()
        .map(|ctx| AddKernel::new(&ctx.device));
}

/// The shared GPU context, created on first call.
///
/// # Errors
///
/// Returns the adapter or device error if initialization failed. The failure
/// is sticky: later calls report the same error.
pub fn context() -> Result<&'static GpuContext, GpuFailure> {
    GPU_CONTEXT
        .as_ref()
        .map_err(|err| GpuFailure::from(format!("no GPU context: {err}")))
}

/// The add kernel compiled on the shared context.
///
/// # Errors
///
/// Fails when the shared context could not be created.
pub fn kernel() -> Result<&'static AddKernel, GpuFailure> {
    context()?;
    ADD_KERNEL
        .as_ref()
        .ok_or_else(|| GpuFailure::from("add kernel unavailable"))
}
