//! Error types for resource creation, device acquisition and frame rendering.
//!
//! Nothing in the renderer aborts the process on a GPU-facing failure. Creation
//! helpers return [`ResourceError`], the device handshake resolves to
//! [`DeviceRequestError`], and errors that wgpu reports asynchronously are
//! recorded in an [`ErrorLatch`] that halts every later frame.

use std::fmt;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

/// Category of an error reported by the GPU device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GpuErrorKind {
    Validation,
    OutOfMemory,
    Internal,
    Unknown,
    DeviceLost,
}

impl fmt::Display for GpuErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GpuErrorKind::Validation => "Validation",
            GpuErrorKind::OutOfMemory => "Out of memory",
            GpuErrorKind::Internal => "Internal",
            GpuErrorKind::Unknown => "Unknown",
            GpuErrorKind::DeviceLost => "Device lost",
        };
        f.write_str(name)
    }
}

/// An error reported by the GPU, either synchronously through an error scope
/// or through the device's uncaptured-error handler.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("WebGPU {kind} error: {message}")]
pub struct GpuError {
    pub kind: GpuErrorKind,
    pub message: String,
}

impl GpuError {
    pub fn new(kind: GpuErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<wgpu::Error> for GpuError {
    fn from(error: wgpu::Error) -> Self {
        let kind = match &error {
            wgpu::Error::Validation { .. } => GpuErrorKind::Validation,
            wgpu::Error::OutOfMemory { .. } => GpuErrorKind::OutOfMemory,
            wgpu::Error::Internal { .. } => GpuErrorKind::Internal,
            #[allow(unreachable_patterns)]
            _ => GpuErrorKind::Unknown,
        };
        Self::new(kind, error.to_string())
    }
}

/// Failure to create a GPU resource.
///
/// Every variant carries the label of the resource being created so that the
/// log line emitted by the resource manager identifies which batch was skipped.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("buffer '{label}' has zero size")]
    ZeroSize { label: String },

    #[error("buffer '{label}' is {size} bytes, device limit is {max}")]
    TooLarge { label: String, size: u64, max: u64 },

    #[error("buffer '{label}' is {size} bytes but {len} bytes of initial data were supplied")]
    ContentsOverflow { label: String, size: u64, len: usize },

    #[error("update of buffer '{label}' has no data")]
    EmptyUpdate { label: String },

    #[error("texture '{label}' has invalid size {width}x{height}")]
    InvalidTextureSize {
        label: String,
        width: u32,
        height: u32,
    },

    #[error("shader module '{label}' has empty source")]
    EmptyShaderSource { label: String },

    #[error("failed to allocate {bytes} bytes of host staging memory")]
    HostAllocation { bytes: usize },

    #[error("creation of '{label}' failed: {source}")]
    Backend {
        label: String,
        #[source]
        source: GpuError,
    },
}

/// Failure of the two-stage adapter/device handshake.
#[derive(Error, Debug)]
pub enum DeviceRequestError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to request WGPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create WGPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface is not supported by the selected adapter")]
    UnsupportedSurface,
}

/// Errors raised while attaching a renderer or running a frame.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("a renderer is already attached to this world")]
    AlreadyAttached,

    #[error("entity {0:?} has no Canvas component")]
    MissingCanvas(hecs::Entity),

    #[error("surface texture unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Sticky record of the first asynchronous GPU error.
///
/// The latch is shared between the renderer and the device callbacks, which
/// wgpu requires to be `Send + Sync`. Once raised it is never cleared; a new
/// device (and therefore a new latch) is needed to resume rendering.
#[derive(Clone, Debug, Default)]
pub struct ErrorLatch {
    first: Arc<OnceLock<GpuError>>,
}

impl ErrorLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error` and logs it. Returns `true` if this was the first error.
    pub fn raise(&self, error: GpuError) -> bool {
        log::error!("{error}");
        self.first.set(error).is_ok()
    }

    pub fn is_raised(&self) -> bool {
        self.first.get().is_some()
    }

    /// The error that raised the latch, if any.
    pub fn error(&self) -> Option<&GpuError> {
        self.first.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_keeps_first_error() {
        let latch = ErrorLatch::new();
        assert!(!latch.is_raised());

        assert!(latch.raise(GpuError::new(GpuErrorKind::Validation, "bad bind group")));
        assert!(!latch.raise(GpuError::new(GpuErrorKind::OutOfMemory, "oom")));

        let first = latch.error().unwrap();
        assert_eq!(first.kind, GpuErrorKind::Validation);
        assert_eq!(first.message, "bad bind group");
    }

    #[test]
    fn latch_is_shared_between_clones() {
        let latch = ErrorLatch::new();
        let handler_side = latch.clone();
        handler_side.raise(GpuError::new(GpuErrorKind::DeviceLost, "lost"));
        assert!(latch.is_raised());
    }

    #[test]
    fn gpu_error_display_names_kind() {
        let error = GpuError::new(GpuErrorKind::OutOfMemory, "vertex buffer");
        assert_eq!(error.to_string(), "WebGPU Out of memory error: vertex buffer");
    }
}
