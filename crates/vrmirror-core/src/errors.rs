use thiserror::Error;

use crate::types::{Eye, TextureSize};

/// Why an acquisition attempt failed.
///
/// Every variant is retriable: the session falls back to uninitialized and
/// the next tick, render, or show tries again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    #[error("VR runtime is not installed or not reachable")]
    RuntimeUnavailable,

    #[error("VR runtime initialization failed: {reason}")]
    RuntimeInitFailed { reason: String },

    #[error("Graphics device creation failed: {reason}")]
    DeviceCreateFailed { reason: String },

    #[error("VR compositor not available")]
    CompositorUnavailable,

    #[error("Mirror texture request for {eye} eye failed: {reason}")]
    MirrorTextureFailed { eye: Eye, reason: String },

    #[error("Mirror texture has invalid size {size}")]
    InvalidMirrorTexture { size: TextureSize },

    #[error("Staging texture allocation ({size}) failed: {reason}")]
    StagingAllocFailed { size: TextureSize, reason: String },

    #[error("Shared handle export failed: {reason}")]
    HandleExportFailed { reason: String },

    #[error("Host could not import the shared texture")]
    HostImportFailed,
}

impl AcquireError {
    /// Handshake step that produced the error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::RuntimeUnavailable => "runtime-probe",
            Self::RuntimeInitFailed { .. } => "runtime-connect",
            Self::DeviceCreateFailed { .. } => "device",
            Self::CompositorUnavailable => "compositor",
            Self::MirrorTextureFailed { .. } => "mirror-texture",
            Self::InvalidMirrorTexture { .. } => "mirror-size",
            Self::StagingAllocFailed { .. } => "staging-alloc",
            Self::HandleExportFailed { .. } => "handle-export",
            Self::HostImportFailed => "host-import",
        }
    }

    /// There is no fatal class; kept as a method so callers don't hardcode it.
    pub fn is_retriable(&self) -> bool {
        true
    }
}

/// Failure reported by the GPU collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    #[error("Texture creation failed: {0}")]
    TextureCreation(String),

    #[error("Shared handle unavailable: {0}")]
    SharedHandle(String),
}

impl GpuError {
    pub fn into_reason(self) -> String {
        match self {
            Self::DeviceCreation(r) | Self::TextureCreation(r) | Self::SharedHandle(r) => r,
        }
    }
}

/// Failure reported by the VR runtime collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Runtime init failed: {0}")]
    Init(String),

    #[error("Compositor error: {0}")]
    Compositor(String),
}

impl RuntimeError {
    pub fn into_reason(self) -> String {
        match self {
            Self::Init(r) | Self::Compositor(r) => r,
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
}
