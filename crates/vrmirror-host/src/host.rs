//! `HeadlessHost`: the host-graphics side of the harness.
//!
//! Stands in for a compositing host: on Windows it opens each shared staging
//! texture on its own D3D11 device, the way a real host renderer would. It
//! keeps counters so the driver can report what the capture side did.

use std::sync::atomic::{AtomicIsize, AtomicU64, Ordering};

use anyhow::Result;
use tracing::{debug, warn};
use vrmirror_capture::platform::{HostGraphics, SharedHandle};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HostStats {
    pub imports:  u64,
    pub destroys: u64,
    pub draws:    u64,
}

pub struct HostDrawable {
    handle: SharedHandle,
    #[cfg(target_os = "windows")]
    _texture: windows::Win32::Graphics::Direct3D11::ID3D11Texture2D,
}

// SAFETY: the opened texture is only referenced, never used through a
// device context, from the thread that drops it.
#[cfg(target_os = "windows")]
unsafe impl Send for HostDrawable {}

impl HostDrawable {
    pub fn handle(&self) -> SharedHandle {
        self.handle
    }
}

pub struct HeadlessHost {
    #[cfg(target_os = "windows")]
    device:   vrmirror_capture::d3d11::D3D11Device,
    depth:    AtomicIsize,
    imports:  AtomicU64,
    destroys: AtomicU64,
    draws:    AtomicU64,
}

impl HeadlessHost {
    pub fn new() -> Result<Self> {
        Ok(Self {
            #[cfg(target_os = "windows")]
            device: vrmirror_capture::d3d11::D3D11Device::create()?,
            depth: AtomicIsize::new(0),
            imports: AtomicU64::new(0),
            destroys: AtomicU64::new(0),
            draws: AtomicU64::new(0),
        })
    }

    pub fn stats(&self) -> HostStats {
        HostStats {
            imports:  self.imports.load(Ordering::Relaxed),
            destroys: self.destroys.load(Ordering::Relaxed),
            draws:    self.draws.load(Ordering::Relaxed),
        }
    }

    fn check_scope(&self, what: &str) {
        if self.depth.load(Ordering::Acquire) <= 0 {
            warn!("Host {} called outside a graphics scope", what);
        }
    }

    #[cfg(target_os = "windows")]
    fn open(&self, handle: SharedHandle) -> Option<HostDrawable> {
        use windows::Win32::Foundation::HANDLE;
        use windows::Win32::Graphics::Direct3D11::ID3D11Texture2D;

        let mut texture: Option<ID3D11Texture2D> = None;
        let opened = unsafe {
            self.device
                .raw()
                .OpenSharedResource(HANDLE(handle.0 as *mut std::ffi::c_void), &mut texture)
        };
        match (opened, texture) {
            (Ok(()), Some(texture)) => Some(HostDrawable { handle, _texture: texture }),
            (Err(e), _) => {
                warn!("OpenSharedResource({:#x}) failed: {e}", handle.0);
                None
            }
            (Ok(()), None) => None,
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn open(&self, handle: SharedHandle) -> Option<HostDrawable> {
        Some(HostDrawable { handle })
    }
}

impl HostGraphics for HeadlessHost {
    type Drawable = HostDrawable;

    fn enter_graphics(&self) {
        self.depth.fetch_add(1, Ordering::AcqRel);
    }

    fn leave_graphics(&self) {
        if self.depth.fetch_sub(1, Ordering::AcqRel) <= 0 {
            warn!("Host graphics scope left more often than entered");
        }
    }

    fn import_shared_texture(&self, handle: SharedHandle) -> Option<HostDrawable> {
        self.check_scope("import");
        let drawable = self.open(handle)?;
        self.imports.fetch_add(1, Ordering::Relaxed);
        debug!("Host imported shared texture {:#x}", handle.0);
        Some(drawable)
    }

    fn destroy_texture(&self, drawable: HostDrawable) {
        self.check_scope("destroy");
        self.destroys.fetch_add(1, Ordering::Relaxed);
        debug!("Host destroyed shared texture {:#x}", drawable.handle().0);
    }

    fn draw_opaque(&self, _drawable: &HostDrawable) {
        self.draws.fetch_add(1, Ordering::Relaxed);
    }
}
