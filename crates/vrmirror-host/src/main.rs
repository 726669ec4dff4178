//! VrMirror headless host.
//!
//! Loads one OpenVR mirror capture source and drives it the way a compositing
//! host does, without a window: show on start, tick and render on their own
//! loops, hide and tear down on exit.
//!
//! # Architecture
//!
//! ```text
//! HostConfig (arg 1 / VRMIRROR_CONFIG / defaults)
//!   │
//!   ▼
//! CaptureRegistry<NativePlatform<HeadlessHost>>   (admission gate, shared D3D11 device + OpenVR connection)
//!   │
//!   ▼
//! MirrorSource ── show ──► background handshake (tokio blocking pool)
//!   │
//!   ├── tick loop   (tick_hz)     poll runtime quit, retry acquisition
//!   └── render loop (render_fps)  crop copy on new compositor frames, draw
//! ```
//!
//! Usage: `vrmirror-host [config.json]`, log level via `RUST_LOG`.

mod config;
mod driver;
mod host;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vrmirror_core::{SOURCE_ID, SOURCE_NAME};

use crate::config::HostConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("VrMirror host v{} ({} / {})", env!("CARGO_PKG_VERSION"), SOURCE_ID, SOURCE_NAME);

    let (config, path) = HostConfig::from_args_or_env()?;
    match path {
        Some(path) => info!("Config loaded from {}", path.display()),
        None => info!("No config given, using defaults"),
    }
    info!(
        "Source '{}': {} eye, tick {} Hz, render {} fps",
        config.source_name,
        config.settings.eye(),
        config.tick_hz,
        config.render_fps
    );

    driver::run(config).await
}
