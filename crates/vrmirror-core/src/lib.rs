pub mod config;
pub mod errors;
pub mod geometry;
pub mod schema;
pub mod types;

pub use config::{CaptureSettings, RetryPolicy};
pub use errors::{AcquireError, GpuError, RuntimeError, SettingsError};
pub use geometry::compute_geometry;
pub use types::*;

/// Host-facing source identifier.
pub const SOURCE_ID: &str = "openvr_capture";

/// Host-facing display name.
pub const SOURCE_NAME: &str = "OpenVR Capture";
