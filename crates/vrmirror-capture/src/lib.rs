//! vrmirror-capture: OpenVR compositor mirror capture for a host renderer.
//!
//! Acquires the compositor's mirror texture for one eye, crops it on the GPU
//! into a shared staging texture, and hands that texture to the host's
//! renderer. On non-Windows targets a stub platform is compiled for CI
//! compatibility.
//!
//! # Pipeline
//!
//! ```text
//! host show / tick ──► attempt_acquire ──(admission gate, one at a time)──┐
//!                                                                         ▼
//!   OpenVR (background app) + D3D11 device  ◄── shared, lease-counted ── handshake
//!        │  GetMirrorTextureD3D11(eye)
//!        ▼
//!   mirror texture (W×H) ──CopySubresourceRegion(crop box)──► staging (crop, RGBA8, shared)
//!        ▲  only when the compositor frame index moved           │  shared handle
//!        │                                                       ▼
//!   host render ──► render_frame ─────────────────────────► host drawable ──► draw_opaque
//!
//! host tick ──► poll runtime events ──(quit)──► release
//! ```

pub mod bridge;
pub mod controller;
pub mod gate;
pub mod monitor;
pub mod platform;
pub mod registry;
pub mod session;
pub mod shared;
pub mod source;

#[cfg(test)]
mod mock;

pub use bridge::FrameOutcome;
pub use controller::{AttemptOutcome, Pacing};
pub use monitor::TickOutcome;
pub use registry::{CaptureRegistry, Dispatch};
pub use session::{CaptureSession, SessionId};
pub use source::MirrorSource;

// ── Platform split ─────────────────────────────────────────────────────────────

#[cfg(target_os = "windows")]
pub mod d3d11;
#[cfg(target_os = "windows")]
mod openvr;
#[cfg(target_os = "windows")]
pub use openvr::{NativePlatform, OpenVrConnection, OpenVrRuntime};

#[cfg(not(target_os = "windows"))]
mod stub;
#[cfg(not(target_os = "windows"))]
pub use stub::NativePlatform;
