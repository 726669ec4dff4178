//! Non-Windows stub platform (CI + cross-compilation).
//!
//! The runtime always reports itself as not installed, so every attempt
//! fails fast with `RuntimeUnavailable` and nothing below it is reachable.

use vrmirror_core::{CropRect, Eye, GpuError, RuntimeError, TextureSize};

use crate::platform::{
    ApplicationMode, GpuDevice, GpuTexture, HostGraphics, Platform, RuntimeConnection,
    RuntimeEvent, SharedHandle, TextureDesc, VrRuntime,
};

const UNSUPPORTED: &str = "OpenVR mirror capture requires Windows (Direct3D 11)";

pub enum StubTexture {}

impl GpuTexture for StubTexture {
    fn size(&self) -> TextureSize {
        match *self {}
    }

    fn export_shared_handle(&self) -> Result<SharedHandle, GpuError> {
        match *self {}
    }
}

pub enum StubDevice {}

impl GpuDevice for StubDevice {
    type Texture = StubTexture;

    fn create_texture(&self, _desc: &TextureDesc) -> Result<StubTexture, GpuError> {
        match *self {}
    }

    fn copy_region(&self, _dst: &StubTexture, _src: &StubTexture, _region: CropRect) {
        match *self {}
    }

    fn flush(&self) {
        match *self {}
    }
}

pub enum StubConnection {}

impl RuntimeConnection<StubDevice> for StubConnection {
    fn has_compositor(&self) -> bool {
        match *self {}
    }

    fn mirror_texture(&self, _eye: Eye, _device: &StubDevice) -> Result<Option<StubTexture>, RuntimeError> {
        match *self {}
    }

    fn frame_index(&self) -> Option<u32> {
        match *self {}
    }

    fn poll_next_event(&self) -> Option<RuntimeEvent> {
        match *self {}
    }
}

#[derive(Debug, Default)]
pub struct StubRuntime;

impl VrRuntime<StubDevice> for StubRuntime {
    type Connection = StubConnection;

    fn is_installed(&self) -> bool {
        false
    }

    fn connect(&self, _mode: ApplicationMode) -> Result<StubConnection, RuntimeError> {
        Err(RuntimeError::Init(UNSUPPORTED.into()))
    }
}

pub struct NativePlatform<H: HostGraphics> {
    runtime: StubRuntime,
    host:    H,
}

impl<H: HostGraphics> NativePlatform<H> {
    pub fn new(host: H) -> Self {
        tracing::info!("NativePlatform stub (non-Windows): VR runtime reported as not installed");
        Self { runtime: StubRuntime, host }
    }
}

impl<H: HostGraphics> Platform for NativePlatform<H> {
    type Device = StubDevice;
    type Runtime = StubRuntime;
    type Host = H;

    fn runtime(&self) -> &StubRuntime {
        &self.runtime
    }

    fn host(&self) -> &H {
        &self.host
    }

    fn create_device(&self) -> Result<StubDevice, GpuError> {
        Err(GpuError::DeviceCreation(UNSUPPORTED.into()))
    }
}
