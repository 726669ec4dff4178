//! OpenVR runtime connection (Windows).
//!
//! Talks to the runtime through the flat C function tables exported by
//! `openvr_api` (`FnTable:IVRSystem_*`, `FnTable:IVRCompositor_*`). The
//! connection is opened as a background application so capture never starts
//! SteamVR or steals scene focus.

use std::ffi::{c_char, c_void, CStr};
use std::mem;
use std::ptr;

use anyhow::{Context, Result};
use openvr_sys as sys;
use tracing::{debug, info};
use vrmirror_core::{Eye, GpuError, RuntimeError};
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D11::{ID3D11Resource, ID3D11ShaderResourceView, ID3D11Texture2D};

use crate::d3d11::{D3D11Device, D3D11Texture, ReleaseHook};
use crate::platform::{ApplicationMode, HostGraphics, Platform, RuntimeConnection, RuntimeEvent, VrRuntime};

// ── Runtime ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct OpenVrRuntime;

impl VrRuntime<D3D11Device> for OpenVrRuntime {
    type Connection = OpenVrConnection;

    fn is_installed(&self) -> bool {
        unsafe { sys::VR_IsRuntimeInstalled() }
    }

    fn connect(&self, mode: ApplicationMode) -> Result<OpenVrConnection, RuntimeError> {
        OpenVrConnection::open(mode).map_err(|e| RuntimeError::Init(format!("{e:#}")))
    }
}

fn application_type(mode: ApplicationMode) -> sys::EVRApplicationType {
    match mode {
        ApplicationMode::Background => sys::EVRApplicationType_VRApplication_Background,
    }
}

fn vr_eye(eye: Eye) -> sys::EVREye {
    match eye {
        Eye::Left => sys::EVREye_Eye_Left,
        Eye::Right => sys::EVREye_Eye_Right,
    }
}

fn init_error_text(error: sys::EVRInitError) -> String {
    let text = unsafe { sys::VR_GetVRInitErrorAsEnglishDescription(error) };
    if text.is_null() {
        return format!("init error {error:?}");
    }
    unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
}

/// Resolve a flat interface table. `version` is the NUL-terminated interface
/// version string from the bindings.
fn load_table<T>(version: &[u8]) -> Result<&'static T> {
    let mut name = b"FnTable:".to_vec();
    name.extend_from_slice(version);
    let label = String::from_utf8_lossy(version.strip_suffix(&[0]).unwrap_or(version)).into_owned();

    let mut error = sys::EVRInitError_VRInitError_None;
    let table = unsafe { sys::VR_GetGenericInterface(name.as_ptr() as *const c_char, &mut error) } as *const T;
    if error != sys::EVRInitError_VRInitError_None {
        anyhow::bail!("VR_GetGenericInterface({}): {}", label, init_error_text(error));
    }
    // SAFETY: the runtime keeps function tables alive until VR_ShutdownInternal,
    // and the connection that borrows them calls that only on drop.
    unsafe { table.as_ref() }.with_context(|| format!("VR_GetGenericInterface({label}) returned null"))
}

// ── Connection ────────────────────────────────────────────────────────────────

pub struct OpenVrConnection {
    system:     &'static sys::VR_IVRSystem_FnTable,
    compositor: Option<&'static sys::VR_IVRCompositor_FnTable>,
}

// SAFETY: the flat tables are plain function pointers into openvr_api, which
// serializes calls internally.
unsafe impl Send for OpenVrConnection {}
unsafe impl Sync for OpenVrConnection {}

impl OpenVrConnection {
    fn open(mode: ApplicationMode) -> Result<Self> {
        let mut error = sys::EVRInitError_VRInitError_None;
        unsafe { sys::VR_InitInternal(&mut error, application_type(mode)) };
        if error != sys::EVRInitError_VRInitError_None {
            anyhow::bail!("VR_InitInternal: {}", init_error_text(error));
        }

        let system = match load_table::<sys::VR_IVRSystem_FnTable>(sys::IVRSystem_Version) {
            Ok(system) => system,
            Err(e) => {
                unsafe { sys::VR_ShutdownInternal() };
                return Err(e);
            }
        };
        let compositor = load_table::<sys::VR_IVRCompositor_FnTable>(sys::IVRCompositor_Version)
            .map_err(|e| debug!("OpenVR compositor interface unavailable: {e:#}"))
            .ok();

        info!("OpenVR connected ({:?} application)", mode);
        Ok(Self { system, compositor })
    }

    fn compositor(&self) -> Result<&'static sys::VR_IVRCompositor_FnTable, RuntimeError> {
        self.compositor
            .ok_or_else(|| RuntimeError::Compositor("compositor interface unavailable".into()))
    }
}

impl RuntimeConnection<D3D11Device> for OpenVrConnection {
    fn has_compositor(&self) -> bool {
        self.compositor.is_some()
    }

    fn mirror_texture(&self, eye: Eye, device: &D3D11Device) -> Result<Option<D3D11Texture>, RuntimeError> {
        let compositor = self.compositor()?;
        let (Some(get), Some(release)) =
            (compositor.GetMirrorTextureD3D11, compositor.ReleaseMirrorTextureD3D11)
        else {
            return Err(RuntimeError::Compositor("mirror texture entry points missing".into()));
        };

        let mut view: *mut c_void = ptr::null_mut();
        let error = unsafe { get(vr_eye(eye), device.as_ptr(), &mut view) };
        if error != sys::EVRCompositorError_VRCompositorError_None {
            return Err(RuntimeError::Compositor(format!("GetMirrorTextureD3D11: error {error:?}")));
        }
        if view.is_null() {
            return Ok(None);
        }

        match mirror_resource(view) {
            Ok(texture) => Ok(Some(D3D11Texture::wrap(texture, Some(ReleaseHook { view, release })))),
            Err(e) => {
                unsafe { release(view) };
                Err(RuntimeError::Compositor(format!("{e:#}")))
            }
        }
    }

    fn frame_index(&self) -> Option<u32> {
        let get = self.compositor?.GetFrameTiming?;
        let mut timing: sys::Compositor_FrameTiming = unsafe { mem::zeroed() };
        timing.m_nSize = mem::size_of::<sys::Compositor_FrameTiming>() as u32;
        unsafe { get(&mut timing, 0) }.then_some(timing.m_nFrameIndex)
    }

    fn poll_next_event(&self) -> Option<RuntimeEvent> {
        let poll = self.system.PollNextEvent?;
        let mut event: sys::VREvent_t = unsafe { mem::zeroed() };
        if !unsafe { poll(&mut event, mem::size_of::<sys::VREvent_t>() as u32) } {
            return None;
        }
        if event.eventType == sys::EVREventType_VREvent_Quit as u32 {
            Some(RuntimeEvent::Quit)
        } else {
            Some(RuntimeEvent::Other(event.eventType))
        }
    }
}

impl Drop for OpenVrConnection {
    fn drop(&mut self) {
        unsafe { sys::VR_ShutdownInternal() };
        info!("OpenVR disconnected");
    }
}

/// The texture behind the compositor's mirror view. The view itself stays
/// owned by the compositor.
fn mirror_resource(view: *mut c_void) -> Result<ID3D11Texture2D> {
    let view = unsafe { ID3D11ShaderResourceView::from_raw_borrowed(&view) }.context("null mirror view")?;
    let mut resource: Option<ID3D11Resource> = None;
    unsafe { view.GetResource(&mut resource) };
    resource
        .context("mirror view has no resource")?
        .cast::<ID3D11Texture2D>()
        .context("mirror resource is not a 2D texture")
}

// ── NativePlatform ────────────────────────────────────────────────────────────

/// OpenVR + Direct3D 11, with the host's graphics subsystem plugged in.
pub struct NativePlatform<H: HostGraphics> {
    runtime: OpenVrRuntime,
    host:    H,
}

impl<H: HostGraphics> NativePlatform<H> {
    pub fn new(host: H) -> Self {
        Self { runtime: OpenVrRuntime, host }
    }
}

impl<H: HostGraphics> Platform for NativePlatform<H> {
    type Device = D3D11Device;
    type Runtime = OpenVrRuntime;
    type Host = H;

    fn runtime(&self) -> &OpenVrRuntime {
        &self.runtime
    }

    fn host(&self) -> &H {
        &self.host
    }

    fn create_device(&self) -> Result<D3D11Device, GpuError> {
        D3D11Device::create().map_err(|e| GpuError::DeviceCreation(format!("{e:#}")))
    }
}
