//! Error types
//!
//! None of these escape the component boundary: the browser host logs them
//! and degrades to an empty (background-only) surface.

use thiserror::Error;

use crate::platform::Subscription;

/// Failures acquiring the GPU surface, adapter or device
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create render surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter: {0}")]
    AdapterNotFound(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported texture formats")]
    NoSurfaceFormat,
}

/// Failures mounting the field into its container
#[derive(Debug, Error)]
pub enum MountError {
    #[error("container element is not available")]
    ContainerMissing,
    #[error("field was torn down before it finished starting")]
    Disposed,
    #[error("field is already running")]
    AlreadyRunning,
    #[error("failed to register {0:?} listener: {1}")]
    Listener(Subscription, String),
    #[error("DOM operation failed: {0}")]
    Dom(String),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Malformed `#RGB` / `#RRGGBB` color
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("expected 3 or 6 hex digits, got {0:?}")]
    Length(String),
    #[error("invalid hex digit in {0:?}")]
    Digit(String),
}

/// Failures decoding a settings document
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_failure_becomes_mount_error() {
        let err = MountError::from(RenderError::NoSurfaceFormat);
        assert!(matches!(err, MountError::Render(RenderError::NoSurfaceFormat)));
        assert_eq!(err.to_string(), "surface reports no supported texture formats");
    }
}
