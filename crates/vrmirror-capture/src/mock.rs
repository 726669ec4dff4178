//! Recording platform for unit tests.

use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use vrmirror_core::{CropRect, Eye, GpuError, RuntimeError, TextureSize};

use crate::platform::{
    ApplicationMode, GpuDevice, GpuTexture, HostGraphics, Platform, RuntimeConnection,
    RuntimeEvent, SharedHandle, TextureDesc, VrRuntime,
};
use crate::registry::{CaptureRegistry, Dispatch};

#[derive(Default)]
struct ConnectHold {
    held:    bool,
    entered: bool,
}

/// Knobs and counters shared by every mock collaborator.
pub(crate) struct Recorder {
    pub installed:       AtomicBool,
    pub compositor:      AtomicBool,
    pub connect_error:   Mutex<Option<String>>,
    pub fail_device:     AtomicBool,
    pub null_mirror:     AtomicBool,
    pub mirror_size:     Mutex<TextureSize>,
    pub fail_staging:    AtomicBool,
    pub fail_export:     AtomicBool,
    pub fail_import:     AtomicBool,
    pub timing_ok:       AtomicBool,
    pub frame_index:     AtomicU32,
    pub pending_quit:    AtomicBool,

    pub connects:        AtomicUsize,
    pub disconnects:     AtomicUsize,
    pub devices_created: AtomicUsize,
    pub devices_live:    AtomicUsize,
    pub textures_live:   AtomicUsize,
    pub staging_sizes:   Mutex<Vec<TextureSize>>,
    pub mirror_eyes:     Mutex<Vec<Eye>>,
    pub copies:          Mutex<Vec<CropRect>>,
    pub flushes:         AtomicUsize,
    pub imports:         AtomicUsize,
    pub unscoped_calls:  AtomicUsize,
    pub destroys:        AtomicUsize,
    pub draws:           AtomicUsize,
    pub graphics_depth:  AtomicIsize,
    next_handle:         AtomicUsize,

    hold:                Mutex<ConnectHold>,
    hold_changed:        Condvar,
}

impl Recorder {
    fn new() -> Self {
        Self {
            installed: AtomicBool::new(true),
            compositor: AtomicBool::new(true),
            connect_error: Mutex::new(None),
            fail_device: AtomicBool::new(false),
            null_mirror: AtomicBool::new(false),
            mirror_size: Mutex::new(TextureSize::new(1920, 1080)),
            fail_staging: AtomicBool::new(false),
            fail_export: AtomicBool::new(false),
            fail_import: AtomicBool::new(false),
            timing_ok: AtomicBool::new(true),
            frame_index: AtomicU32::new(1),
            pending_quit: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            devices_created: AtomicUsize::new(0),
            devices_live: AtomicUsize::new(0),
            textures_live: AtomicUsize::new(0),
            staging_sizes: Mutex::new(Vec::new()),
            mirror_eyes: Mutex::new(Vec::new()),
            copies: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
            imports: AtomicUsize::new(0),
            unscoped_calls: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
            draws: AtomicUsize::new(0),
            graphics_depth: AtomicIsize::new(0),
            next_handle: AtomicUsize::new(0x100),
            hold: Mutex::new(ConnectHold::default()),
            hold_changed: Condvar::new(),
        }
    }

    /// Make the next `connect` block until [`Recorder::release_connect`].
    pub fn hold_connect(&self) {
        let mut hold = self.hold.lock().unwrap();
        hold.held = true;
        hold.entered = false;
    }

    pub fn release_connect(&self) {
        self.hold.lock().unwrap().held = false;
        self.hold_changed.notify_all();
    }

    /// Block until a held `connect` call has started.
    pub fn wait_for_connect_entered(&self) {
        let mut hold = self.hold.lock().unwrap();
        while !hold.entered {
            hold = self.hold_changed.wait(hold).unwrap();
        }
    }

    fn pass_connect_hold(&self) {
        let mut hold = self.hold.lock().unwrap();
        hold.entered = true;
        self.hold_changed.notify_all();
        while hold.held {
            hold = self.hold_changed.wait(hold).unwrap();
        }
    }

    fn in_scope(&self) {
        if self.graphics_depth.load(Ordering::SeqCst) <= 0 {
            self.unscoped_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn texture(self: &Arc<Self>, size: TextureSize) -> MockTexture {
        self.textures_live.fetch_add(1, Ordering::SeqCst);
        MockTexture { rec: Arc::clone(self), size }
    }
}

// ── GPU ───────────────────────────────────────────────────────────────────────

pub(crate) struct MockTexture {
    rec:  Arc<Recorder>,
    size: TextureSize,
}

impl GpuTexture for MockTexture {
    fn size(&self) -> TextureSize {
        self.size
    }

    fn export_shared_handle(&self) -> Result<SharedHandle, GpuError> {
        if self.rec.fail_export.load(Ordering::SeqCst) {
            return Err(GpuError::SharedHandle("resource not shareable".into()));
        }
        Ok(SharedHandle(self.rec.next_handle.fetch_add(1, Ordering::SeqCst)))
    }
}

impl Drop for MockTexture {
    fn drop(&mut self) {
        self.rec.textures_live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) struct MockDevice {
    rec: Arc<Recorder>,
}

impl GpuDevice for MockDevice {
    type Texture = MockTexture;

    fn create_texture(&self, desc: &TextureDesc) -> Result<MockTexture, GpuError> {
        if self.rec.fail_staging.load(Ordering::SeqCst) {
            return Err(GpuError::TextureCreation("E_OUTOFMEMORY".into()));
        }
        self.rec.staging_sizes.lock().unwrap().push(desc.size);
        Ok(self.rec.texture(desc.size))
    }

    fn copy_region(&self, _dst: &MockTexture, _src: &MockTexture, region: CropRect) {
        self.rec.copies.lock().unwrap().push(region);
    }

    fn flush(&self) {
        self.rec.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.rec.devices_live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Runtime ───────────────────────────────────────────────────────────────────

pub(crate) struct MockRuntime {
    rec: Arc<Recorder>,
}

pub(crate) struct MockConnection {
    rec: Arc<Recorder>,
}

impl VrRuntime<MockDevice> for MockRuntime {
    type Connection = MockConnection;

    fn is_installed(&self) -> bool {
        self.rec.installed.load(Ordering::SeqCst)
    }

    fn connect(&self, _mode: ApplicationMode) -> Result<MockConnection, RuntimeError> {
        self.rec.pass_connect_hold();
        if let Some(reason) = self.rec.connect_error.lock().unwrap().clone() {
            return Err(RuntimeError::Init(reason));
        }
        self.rec.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection { rec: Arc::clone(&self.rec) })
    }
}

impl RuntimeConnection<MockDevice> for MockConnection {
    fn has_compositor(&self) -> bool {
        self.rec.compositor.load(Ordering::SeqCst)
    }

    fn mirror_texture(&self, eye: Eye, _device: &MockDevice) -> Result<Option<MockTexture>, RuntimeError> {
        self.rec.mirror_eyes.lock().unwrap().push(eye);
        if self.rec.null_mirror.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let size = *self.rec.mirror_size.lock().unwrap();
        Ok(Some(self.rec.texture(size)))
    }

    fn frame_index(&self) -> Option<u32> {
        self.rec
            .timing_ok
            .load(Ordering::SeqCst)
            .then(|| self.rec.frame_index.load(Ordering::SeqCst))
    }

    fn poll_next_event(&self) -> Option<RuntimeEvent> {
        self.rec.pending_quit.swap(false, Ordering::SeqCst).then_some(RuntimeEvent::Quit)
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.rec.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Host ──────────────────────────────────────────────────────────────────────

pub(crate) struct MockHost {
    rec: Arc<Recorder>,
}

#[derive(Debug)]
pub(crate) struct MockDrawable(#[allow(dead_code)] SharedHandle);

impl HostGraphics for MockHost {
    type Drawable = MockDrawable;

    fn enter_graphics(&self) {
        self.rec.graphics_depth.fetch_add(1, Ordering::SeqCst);
    }

    fn leave_graphics(&self) {
        self.rec.graphics_depth.fetch_sub(1, Ordering::SeqCst);
    }

    fn import_shared_texture(&self, handle: SharedHandle) -> Option<MockDrawable> {
        self.rec.in_scope();
        self.rec.imports.fetch_add(1, Ordering::SeqCst);
        if self.rec.fail_import.load(Ordering::SeqCst) {
            return None;
        }
        Some(MockDrawable(handle))
    }

    fn destroy_texture(&self, _drawable: MockDrawable) {
        self.rec.in_scope();
        self.rec.destroys.fetch_add(1, Ordering::SeqCst);
    }

    fn draw_opaque(&self, _drawable: &MockDrawable) {
        self.rec.draws.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Platform ──────────────────────────────────────────────────────────────────

pub(crate) struct MockPlatform {
    pub rec: Arc<Recorder>,
    runtime: MockRuntime,
    host:    MockHost,
}

impl MockPlatform {
    pub fn new() -> Self {
        let rec = Arc::new(Recorder::new());
        Self {
            runtime: MockRuntime { rec: Arc::clone(&rec) },
            host: MockHost { rec: Arc::clone(&rec) },
            rec,
        }
    }
}

impl Platform for MockPlatform {
    type Device = MockDevice;
    type Runtime = MockRuntime;
    type Host = MockHost;

    fn runtime(&self) -> &MockRuntime {
        &self.runtime
    }

    fn host(&self) -> &MockHost {
        &self.host
    }

    fn create_device(&self) -> Result<MockDevice, GpuError> {
        if self.rec.fail_device.load(Ordering::SeqCst) {
            return Err(GpuError::DeviceCreation("no hardware adapter".into()));
        }
        self.rec.devices_created.fetch_add(1, Ordering::SeqCst);
        self.rec.devices_live.fetch_add(1, Ordering::SeqCst);
        Ok(MockDevice { rec: Arc::clone(&self.rec) })
    }
}

pub(crate) fn mock_registry(dispatch: Dispatch) -> CaptureRegistry<MockPlatform> {
    CaptureRegistry::new(MockPlatform::new(), dispatch)
}
