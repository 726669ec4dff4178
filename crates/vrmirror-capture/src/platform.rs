//! Collaborator seams: VR runtime, GPU device, and host graphics.
//!
//! The acquisition controller and render bridge are written against these
//! traits only. The Windows build plugs in OpenVR + D3D11 (see `openvr.rs` /
//! `d3d11.rs`); other targets get the stub backend.

use vrmirror_core::errors::{GpuError, RuntimeError};
use vrmirror_core::{CropRect, Eye, TextureSize};

// ── Shared types ──────────────────────────────────────────────────────────────

/// OS-level handle that lets another device instance open a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// What the host expects to sample: 8-bit RGBA, linear unorm.
    Rgba8Unorm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub size:   TextureSize,
    pub format: TextureFormat,
    /// Allocate with the legacy shared-resource flag so it can be exported.
    pub shared: bool,
}

impl TextureDesc {
    pub fn shared_rgba(size: TextureSize) -> Self {
        Self { size, format: TextureFormat::Rgba8Unorm, shared: true }
    }
}

/// How the runtime connection presents itself to the VR runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationMode {
    /// Never claims focus or starts the runtime; fails if it isn't running.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEvent {
    Quit,
    Other(u32),
}

// ── GPU ───────────────────────────────────────────────────────────────────────

pub trait GpuTexture: Send + 'static {
    /// Real dimensions, as reported by the driver.
    fn size(&self) -> TextureSize;

    fn export_shared_handle(&self) -> Result<SharedHandle, GpuError>;
}

/// A device plus its command-issuing context.
pub trait GpuDevice: Send + Sync + 'static {
    type Texture: GpuTexture;

    fn create_texture(&self, desc: &TextureDesc) -> Result<Self::Texture, GpuError>;

    /// Copy `region` of `src` into `dst` at (0, 0).
    fn copy_region(&self, dst: &Self::Texture, src: &Self::Texture, region: CropRect);

    /// Submit queued commands so a consumer on another device sees them.
    fn flush(&self);
}

// ── VR runtime ────────────────────────────────────────────────────────────────

/// A live connection to the runtime. Dropping it disconnects.
pub trait RuntimeConnection<D: GpuDevice>: Send + Sync + 'static {
    fn has_compositor(&self) -> bool;

    /// Mirror texture for `eye`, opened on `device`. `Ok(None)` when the
    /// compositor answered but produced nothing.
    fn mirror_texture(&self, eye: Eye, device: &D) -> Result<Option<D::Texture>, RuntimeError>;

    /// Index of the most recently presented compositor frame.
    fn frame_index(&self) -> Option<u32>;

    /// Non-blocking; returns at most one event.
    fn poll_next_event(&self) -> Option<RuntimeEvent>;
}

pub trait VrRuntime<D: GpuDevice>: Send + Sync + 'static {
    type Connection: RuntimeConnection<D>;

    fn is_installed(&self) -> bool;

    fn connect(&self, mode: ApplicationMode) -> Result<Self::Connection, RuntimeError>;
}

// ── Host graphics ─────────────────────────────────────────────────────────────

pub trait HostGraphics: Send + Sync + 'static {
    /// Host-side texture wrapping an imported shared handle.
    type Drawable: Send + 'static;

    fn enter_graphics(&self);
    fn leave_graphics(&self);

    /// Must be called inside a [`GraphicsScope`].
    fn import_shared_texture(&self, handle: SharedHandle) -> Option<Self::Drawable>;

    /// Must be called inside a [`GraphicsScope`].
    fn destroy_texture(&self, drawable: Self::Drawable);

    /// Draw `drawable` as one opaque textured quad. Called from the host's
    /// render callback, which already owns the graphics context.
    fn draw_opaque(&self, drawable: &Self::Drawable);
}

/// Enter/leave bracket around host graphics calls. Leaves on drop, so an
/// early `?` return still releases the host's graphics context.
pub struct GraphicsScope<'a, H: HostGraphics + ?Sized> {
    host: &'a H,
}

impl<'a, H: HostGraphics + ?Sized> GraphicsScope<'a, H> {
    pub fn enter(host: &'a H) -> Self {
        host.enter_graphics();
        Self { host }
    }
}

impl<H: HostGraphics + ?Sized> Drop for GraphicsScope<'_, H> {
    fn drop(&mut self) {
        self.host.leave_graphics();
    }
}

// ── Platform bundle ───────────────────────────────────────────────────────────

/// Everything one process needs to capture: a runtime, a way to make GPU
/// devices, and the host's graphics subsystem.
pub trait Platform: Send + Sync + 'static {
    type Device: GpuDevice;
    type Runtime: VrRuntime<Self::Device>;
    type Host: HostGraphics;

    fn runtime(&self) -> &Self::Runtime;
    fn host(&self) -> &Self::Host;
    fn create_device(&self) -> Result<Self::Device, GpuError>;
}

pub type TextureOf<P> = <<P as Platform>::Device as GpuDevice>::Texture;
pub type ConnectionOf<P> =
    <<P as Platform>::Runtime as VrRuntime<<P as Platform>::Device>>::Connection;
pub type DrawableOf<P> = <<P as Platform>::Host as HostGraphics>::Drawable;
