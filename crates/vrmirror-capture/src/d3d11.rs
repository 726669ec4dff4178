//! Direct3D 11 device and textures.
//!
//! The device owns its immediate context behind a mutex: the render thread
//! issues copies while the acquisition worker creates textures, and only
//! device creation calls are free-threaded in D3D11.

use std::ffi::c_void;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use tracing::info;
use vrmirror_core::{CropRect, GpuError, TextureSize};
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D, D3D11_BIND_SHADER_RESOURCE,
    D3D11_BOX, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_RESOURCE_MISC_SHARED, D3D11_SDK_VERSION,
    D3D11_TEXTURE2D_DESC, D3D11_USAGE_DEFAULT,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT, DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::IDXGIResource;

use crate::platform::{GpuDevice, GpuTexture, SharedHandle, TextureDesc, TextureFormat};

// ── D3D11Texture ──────────────────────────────────────────────────────────────

/// Release call for a view lent to us by another owner (the VR compositor's
/// mirror view). Runs before our own reference to the texture is dropped.
pub(crate) struct ReleaseHook {
    pub(crate) view:    *mut c_void,
    pub(crate) release: unsafe extern "C" fn(*mut c_void),
}

pub struct D3D11Texture {
    texture: ID3D11Texture2D,
    size:    TextureSize,
    hook:    Option<ReleaseHook>,
}

// SAFETY: D3D11 resources are free-threaded; context use is serialized by
// `D3D11Device::with_context`.
unsafe impl Send for D3D11Texture {}

impl D3D11Texture {
    pub(crate) fn wrap(texture: ID3D11Texture2D, hook: Option<ReleaseHook>) -> Self {
        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };
        Self { texture, size: TextureSize::new(desc.Width, desc.Height), hook }
    }
}

impl GpuTexture for D3D11Texture {
    fn size(&self) -> TextureSize {
        self.size
    }

    fn export_shared_handle(&self) -> Result<SharedHandle, GpuError> {
        shared_handle(&self.texture).map_err(|e| GpuError::SharedHandle(format!("{e:#}")))
    }
}

impl Drop for D3D11Texture {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take() {
            unsafe { (hook.release)(hook.view) };
        }
    }
}

fn shared_handle(texture: &ID3D11Texture2D) -> Result<SharedHandle> {
    let resource: IDXGIResource = texture.cast().context("cast IDXGIResource")?;
    let handle = unsafe { resource.GetSharedHandle() }.context("IDXGIResource::GetSharedHandle")?;
    if handle.is_invalid() {
        anyhow::bail!("GetSharedHandle returned a null handle");
    }
    Ok(SharedHandle(handle.0 as usize))
}

// ── D3D11Device ───────────────────────────────────────────────────────────────

pub struct D3D11Device {
    device:  ID3D11Device,
    context: Mutex<ID3D11DeviceContext>,
}

// SAFETY: `ID3D11Device` is thread-safe; the immediate context is only used
// under its mutex.
unsafe impl Send for D3D11Device {}
unsafe impl Sync for D3D11Device {}

impl D3D11Device {
    /// Hardware device on the default adapter, BGRA-capable so hosts that
    /// sample through Direct2D/DXGI interop can open our shared textures.
    pub fn create() -> Result<Self> {
        let mut device: Option<ID3D11Device> = None;
        let mut context: Option<ID3D11DeviceContext> = None;
        unsafe {
            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                None,
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                None,
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
            .context("D3D11CreateDevice")?;
        }
        let device = device.context("D3D11CreateDevice returned no device")?;
        let context = context.context("D3D11CreateDevice returned no context")?;
        info!("D3D11 device created (feature level {:#x})", unsafe { device.GetFeatureLevel().0 });
        Ok(Self { device, context: Mutex::new(context) })
    }

    pub fn raw(&self) -> &ID3D11Device {
        &self.device
    }

    /// Raw pointer handed to the VR runtime so it opens the mirror view on
    /// this device.
    pub(crate) fn as_ptr(&self) -> *mut c_void {
        self.device.as_raw()
    }

    fn with_context<R>(&self, f: impl FnOnce(&ID3D11DeviceContext) -> R) -> R {
        let context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        f(&context)
    }
}

fn dxgi_format(format: TextureFormat) -> DXGI_FORMAT {
    match format {
        TextureFormat::Rgba8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
    }
}

impl GpuDevice for D3D11Device {
    type Texture = D3D11Texture;

    fn create_texture(&self, desc: &TextureDesc) -> Result<D3D11Texture, GpuError> {
        let native = D3D11_TEXTURE2D_DESC {
            Width:     desc.size.width,
            Height:    desc.size.height,
            MipLevels: 1,
            ArraySize: 1,
            Format:    dxgi_format(desc.format),
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage:     D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            CPUAccessFlags: 0,
            MiscFlags: if desc.shared { D3D11_RESOURCE_MISC_SHARED.0 as u32 } else { 0 },
        };

        let mut texture: Option<ID3D11Texture2D> = None;
        unsafe { self.device.CreateTexture2D(&native, None, Some(&mut texture)) }
            .map_err(|e| GpuError::TextureCreation(format!("CreateTexture2D {}: {e}", desc.size)))?;
        let texture = texture
            .ok_or_else(|| GpuError::TextureCreation(format!("CreateTexture2D {}: no texture", desc.size)))?;
        Ok(D3D11Texture::wrap(texture, None))
    }

    fn copy_region(&self, dst: &D3D11Texture, src: &D3D11Texture, region: CropRect) {
        let src_box = D3D11_BOX {
            left:   region.x,
            top:    region.y,
            front:  0,
            right:  region.right(),
            bottom: region.bottom(),
            back:   1,
        };
        self.with_context(|context| unsafe {
            context.CopySubresourceRegion(
                &dst.texture,
                0,
                0,
                0,
                0,
                &src.texture,
                0,
                Some(&src_box as *const D3D11_BOX),
            );
        });
    }

    fn flush(&self) {
        self.with_context(|context| unsafe { context.Flush() });
    }
}
