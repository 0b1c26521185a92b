// src/mock.rs

//! Test doubles: a spy driver, recording callbacks and a minimal
//! windowing-system implementation.
//!
//! The mock driver keeps one current binding for the whole process rather
//! than one per thread. Tests that make surfaces current do so from a single
//! thread.

use crate::config::Config;
use crate::display::Display;
use crate::driver::{EglDriver, Entrypoint, MessageLevel, PlatformCallbacks};
use crate::egl::{
    EGLAttrib, EGLenum, EGLint, EglConfig, EglContext, EglDevice, EglDisplay, EglStream,
    EglSurface, NativeHandle, DISPLAY_REFERENCE_EXTENSION, EGL_BAD_ATTRIBUTE, EGL_BAD_DISPLAY,
    EGL_BAD_MATCH, EGL_BAD_NATIVE_PIXMAP, EGL_BAD_NATIVE_WINDOW, EGL_BAD_PARAMETER,
    EGL_BAD_SURFACE, EGL_DEVICE_EXT, EGL_DRAW, EGL_EXTENSIONS, EGL_NONE, EGL_PLATFORM_X11_KHR,
    EGL_SUCCESS, EGL_VENDOR, EGL_VERSION,
};
use crate::error::{EplError, Result};
use crate::hooks;
use crate::platform::{NewDisplay, NewSurface, Platform, PlatformImpl};
use crate::refcount::Ref;
use crate::surface::Surface;
use log::debug;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Version the mock driver reports from `eglInitialize`.
pub const MOCK_VERSION: (EGLint, EGLint) = (1, 5);

/// The device every mock display is created on.
pub const MOCK_DEVICE: EglDevice = EglDevice(0x100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub display: EglDisplay,
    pub draw: Option<EglSurface>,
    pub read: Option<EglSurface>,
    pub context: EglContext,
}

#[derive(Debug)]
struct DriverState {
    next_handle: usize,
    displays: HashMap<(EGLenum, usize), EglDisplay>,
    init_counts: HashMap<EglDisplay, u32>,
    surfaces: HashSet<EglSurface>,
    destroyed_surfaces: Vec<EglSurface>,
    swapped: Vec<EglSurface>,
    display_attribs: Vec<EGLAttrib>,
    current: Option<Binding>,
    last_error: EGLint,
    initialize_calls: usize,
    terminate_calls: usize,
    make_current_calls: usize,
}

impl Default for DriverState {
    fn default() -> Self {
        DriverState {
            next_handle: 1,
            displays: HashMap::new(),
            init_counts: HashMap::new(),
            surfaces: HashSet::new(),
            destroyed_surfaces: Vec::new(),
            swapped: Vec::new(),
            display_attribs: Vec::new(),
            current: None,
            last_error: EGL_SUCCESS,
            initialize_calls: 0,
            terminate_calls: 0,
            make_current_calls: 0,
        }
    }
}

impl DriverState {
    fn new_handle(&mut self) -> usize {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn fail<T>(&mut self, code: EGLint) -> Option<T> {
        self.last_error = code;
        None
    }

    fn known(&self, display: EglDisplay) -> bool {
        self.init_counts.contains_key(&display)
    }
}

/// A driver that records every call.
#[derive(Debug, Default)]
pub struct MockDriver {
    display_reference: bool,
    missing: Vec<Entrypoint>,
    fail_initialize: AtomicBool,
    fail_make_current: AtomicBool,
    calls: AtomicUsize,
    state: Mutex<DriverState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver that implements `EGL_KHR_display_reference` itself.
    pub fn with_display_reference() -> Self {
        MockDriver {
            display_reference: true,
            ..Self::default()
        }
    }

    /// A driver that does not export `entrypoint`.
    pub fn without(mut self, entrypoint: Entrypoint) -> Self {
        self.missing.push(entrypoint);
        self
    }

    pub fn set_fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_make_current(&self, fail: bool) {
        self.fail_make_current.store(fail, Ordering::SeqCst);
    }

    /// Total number of driver calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn initialize_calls(&self) -> usize {
        self.state.lock().initialize_calls
    }

    pub fn terminate_calls(&self) -> usize {
        self.state.lock().terminate_calls
    }

    pub fn make_current_calls(&self) -> usize {
        self.state.lock().make_current_calls
    }

    /// The driver's own initialization count for `display`.
    pub fn init_count(&self, display: EglDisplay) -> u32 {
        self.state.lock().init_counts.get(&display).copied().unwrap_or(0)
    }

    pub fn is_surface_live(&self, surface: EglSurface) -> bool {
        self.state.lock().surfaces.contains(&surface)
    }

    pub fn destroyed_surfaces(&self) -> Vec<EglSurface> {
        self.state.lock().destroyed_surfaces.clone()
    }

    pub fn swapped(&self) -> Vec<EglSurface> {
        self.state.lock().swapped.clone()
    }

    /// Attribute list of the most recent `eglGetPlatformDisplay`.
    pub fn last_display_attribs(&self) -> Vec<EGLAttrib> {
        self.state.lock().display_attribs.clone()
    }

    pub fn current_binding(&self) -> Option<Binding> {
        self.state.lock().current
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl EglDriver for MockDriver {
    fn supports(&self, entrypoint: Entrypoint) -> bool {
        !self.missing.contains(&entrypoint)
    }

    fn query_string(&self, display: Option<EglDisplay>, name: EGLint) -> Option<String> {
        self.record();
        let mut state = self.state.lock();
        match (display, name) {
            (None, EGL_EXTENSIONS) => {
                let mut exts = String::from("EGL_EXT_platform_base EGL_EXT_device_base");
                if self.display_reference {
                    exts.push(' ');
                    exts.push_str(DISPLAY_REFERENCE_EXTENSION);
                }
                Some(exts)
            }
            (Some(d), _) if !state.known(d) => state.fail(EGL_BAD_DISPLAY),
            (Some(_), EGL_VENDOR) => Some("Mock".to_string()),
            (Some(_), EGL_VERSION) => Some(format!("{}.{} Mock", MOCK_VERSION.0, MOCK_VERSION.1)),
            (Some(_), EGL_EXTENSIONS) => Some("EGL_KHR_no_config_context".to_string()),
            _ => state.fail(EGL_BAD_PARAMETER),
        }
    }

    fn get_platform_display(
        &self,
        platform: EGLenum,
        native: NativeHandle,
        attribs: &[EGLAttrib],
    ) -> Option<EglDisplay> {
        self.record();
        let mut state = self.state.lock();
        state.display_attribs = attribs.to_vec();
        if let Some(display) = state.displays.get(&(platform, native.as_raw())) {
            return Some(*display);
        }
        let display = EglDisplay(state.new_handle());
        state.displays.insert((platform, native.as_raw()), display);
        state.init_counts.insert(display, 0);
        Some(display)
    }

    fn initialize(&self, display: EglDisplay) -> Option<(EGLint, EGLint)> {
        self.record();
        let mut state = self.state.lock();
        state.initialize_calls += 1;
        if self.fail_initialize.load(Ordering::SeqCst) {
            return state.fail(crate::egl::EGL_BAD_ALLOC);
        }
        let display_reference = self.display_reference;
        match state.init_counts.get_mut(&display) {
            Some(count) => {
                *count = if display_reference { *count + 1 } else { 1 };
                Some(MOCK_VERSION)
            }
            None => state.fail(EGL_BAD_DISPLAY),
        }
    }

    fn terminate(&self, display: EglDisplay) -> bool {
        self.record();
        let mut state = self.state.lock();
        state.terminate_calls += 1;
        let display_reference = self.display_reference;
        match state.init_counts.get_mut(&display) {
            Some(count) => {
                *count = if display_reference { count.saturating_sub(1) } else { 0 };
                true
            }
            None => state.fail::<()>(EGL_BAD_DISPLAY).is_some(),
        }
    }

    fn get_error(&self) -> EGLint {
        self.record();
        std::mem::replace(&mut self.state.lock().last_error, EGL_SUCCESS)
    }

    fn create_pbuffer_surface(
        &self,
        display: EglDisplay,
        _config: EglConfig,
        _attribs: &[EGLint],
    ) -> Option<EglSurface> {
        self.record();
        let mut state = self.state.lock();
        if !state.known(display) {
            return state.fail(EGL_BAD_DISPLAY);
        }
        let surface = EglSurface(state.new_handle());
        state.surfaces.insert(surface);
        Some(surface)
    }

    fn destroy_surface(&self, _display: EglDisplay, surface: EglSurface) -> bool {
        self.record();
        let mut state = self.state.lock();
        if state.surfaces.remove(&surface) {
            state.destroyed_surfaces.push(surface);
            true
        } else {
            state.fail::<()>(EGL_BAD_SURFACE).is_some()
        }
    }

    fn swap_buffers(&self, _display: EglDisplay, surface: EglSurface) -> bool {
        self.record();
        let mut state = self.state.lock();
        if state.surfaces.contains(&surface) {
            state.swapped.push(surface);
            true
        } else {
            state.fail::<()>(EGL_BAD_SURFACE).is_some()
        }
    }

    fn swap_buffers_with_damage(
        &self,
        display: EglDisplay,
        surface: EglSurface,
        _rects: &[EGLint],
    ) -> bool {
        self.swap_buffers(display, surface)
    }

    fn choose_config(
        &self,
        display: EglDisplay,
        _attribs: &[EGLint],
        max_configs: usize,
    ) -> Option<Vec<EglConfig>> {
        self.get_configs(display, max_configs)
    }

    fn get_config_attrib(
        &self,
        display: EglDisplay,
        config: EglConfig,
        _attribute: EGLint,
    ) -> Option<EGLint> {
        self.record();
        let mut state = self.state.lock();
        if !state.known(display) {
            return state.fail(EGL_BAD_DISPLAY);
        }
        Some(config.as_raw() as EGLint)
    }

    fn get_configs(&self, display: EglDisplay, max_configs: usize) -> Option<Vec<EglConfig>> {
        self.record();
        let mut state = self.state.lock();
        if !state.known(display) {
            return state.fail(EGL_BAD_DISPLAY);
        }
        Some((1..=3).map(EglConfig).take(max_configs).collect())
    }

    fn get_current_display(&self) -> Option<EglDisplay> {
        self.record();
        self.state.lock().current.map(|b| b.display)
    }

    fn get_current_surface(&self, readdraw: EGLint) -> Option<EglSurface> {
        self.record();
        let current = self.state.lock().current?;
        if readdraw == EGL_DRAW {
            current.draw
        } else {
            current.read
        }
    }

    fn get_current_context(&self) -> Option<EglContext> {
        self.record();
        self.state.lock().current.map(|b| b.context)
    }

    fn make_current(
        &self,
        display: EglDisplay,
        draw: Option<EglSurface>,
        read: Option<EglSurface>,
        context: Option<EglContext>,
    ) -> bool {
        self.record();
        let mut state = self.state.lock();
        state.make_current_calls += 1;
        if self.fail_make_current.load(Ordering::SeqCst) {
            return state.fail::<()>(EGL_BAD_MATCH).is_some();
        }
        state.current = context.map(|context| Binding {
            display,
            draw,
            read,
            context,
        });
        true
    }

    fn query_device_attrib(&self, device: EglDevice, _attribute: EGLint) -> Option<EGLAttrib> {
        self.record();
        if device == MOCK_DEVICE {
            Some(0)
        } else {
            self.state.lock().fail(EGL_BAD_PARAMETER)
        }
    }

    fn query_device_string(&self, device: EglDevice, _name: EGLint) -> Option<String> {
        self.record();
        if device == MOCK_DEVICE {
            Some("EGL_EXT_device_drm".to_string())
        } else {
            self.state.lock().fail(EGL_BAD_PARAMETER)
        }
    }

    fn query_devices(&self) -> Option<Vec<EglDevice>> {
        self.record();
        Some(vec![MOCK_DEVICE])
    }

    fn query_display_attrib(&self, display: EglDisplay, attribute: EGLint) -> Option<EGLAttrib> {
        self.record();
        let mut state = self.state.lock();
        if !state.known(display) {
            return state.fail(EGL_BAD_DISPLAY);
        }
        if attribute == EGL_DEVICE_EXT {
            Some(MOCK_DEVICE.as_raw() as EGLAttrib)
        } else {
            state.fail(EGL_BAD_ATTRIBUTE)
        }
    }

    fn create_stream_producer_surface(
        &self,
        display: EglDisplay,
        config: EglConfig,
        _stream: EglStream,
        attribs: &[EGLint],
    ) -> Option<EglSurface> {
        self.create_pbuffer_surface(display, config, attribs)
    }
}

/// Callbacks that remember everything reported through them.
#[derive(Debug, Default)]
pub struct MockCallbacks {
    errors: Mutex<Vec<(EGLint, String)>>,
    messages: Mutex<Vec<(MessageLevel, String)>>,
}

impl MockCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<(EGLint, String)> {
        self.errors.lock().clone()
    }

    pub fn last_error(&self) -> Option<EGLint> {
        self.errors.lock().last().map(|(code, _)| *code)
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages.lock().clone()
    }
}

impl PlatformCallbacks for MockCallbacks {
    fn get_proc_address(&self, name: &str) -> Option<usize> {
        name.starts_with("egl").then_some(name.len())
    }

    fn debug_message(&self, level: MessageLevel, message: &str) {
        self.messages.lock().push((level, message.to_string()));
    }

    fn set_error(&self, error: EGLint, _level: MessageLevel, message: &str) {
        self.errors.lock().push((error, message.to_string()));
    }
}

/// How often each implementation hook ran.
#[derive(Debug, Default)]
pub struct ImplCounters {
    pub platform_cleanups: AtomicUsize,
    pub displays_created: AtomicUsize,
    pub display_cleanups: AtomicUsize,
    pub initializes: AtomicUsize,
    pub terminates: AtomicUsize,
    pub surfaces_destroyed: AtomicUsize,
    pub surfaces_freed: AtomicUsize,
    pub swaps: AtomicUsize,
}

impl ImplCounters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Per-display data of [`MockImpl`].
#[derive(Debug)]
pub struct MockDisplayData {
    pub native: NativeHandle,
}

/// Per-surface data of [`MockImpl`].
#[derive(Debug)]
pub struct MockSurfaceData {
    pub native: NativeHandle,
}

/// An implementation that backs every display with the device display of
/// [`MOCK_DEVICE`] and every window or pixmap with a driver pbuffer.
#[derive(Debug, Default)]
pub struct MockImpl {
    counters: Arc<ImplCounters>,
}

impl MockImpl {
    pub fn new(counters: Arc<ImplCounters>) -> Self {
        MockImpl { counters }
    }

    fn create_surface(
        &self,
        platform: &Platform,
        display: &Display,
        config: EglConfig,
        native: NativeHandle,
        bad_native: EGLint,
    ) -> Result<NewSurface> {
        if native.as_raw() == 0 {
            return Err(EplError::implementation(bad_native, "null native handle"));
        }
        let internal =
            platform.create_pbuffer_surface(display.internal_display(), config, &[EGL_NONE])?;
        Ok(NewSurface {
            internal,
            data: Box::new(MockSurfaceData { native }),
        })
    }
}

impl PlatformImpl for MockImpl {
    fn cleanup_platform(&self, _platform: &Platform) {
        self.counters.platform_cleanups.fetch_add(1, Ordering::SeqCst);
    }

    fn is_same_display(
        &self,
        _platform: &Platform,
        display: &Display,
        _platform_enum: EGLenum,
        native: NativeHandle,
        _attribs: &[EGLAttrib],
    ) -> bool {
        display.native_display() == native
    }

    fn get_platform_display(
        &self,
        platform: &Ref<Platform>,
        _platform_enum: EGLenum,
        native: NativeHandle,
        _attribs: &[EGLAttrib],
    ) -> Result<NewDisplay> {
        if native.as_raw() == 0 {
            return Err(EplError::BadParameter("null native display".to_string()));
        }
        let internal = platform.get_device_internal_display(MOCK_DEVICE)?;
        self.counters.displays_created.fetch_add(1, Ordering::SeqCst);
        Ok(NewDisplay {
            internal,
            data: Box::new(MockDisplayData { native }),
        })
    }

    fn cleanup_display(&self, _platform: &Platform, _display: &Display) {
        self.counters.display_cleanups.fetch_add(1, Ordering::SeqCst);
    }

    fn initialize_display(&self, platform: &Platform, display: &Display) -> Result<(EGLint, EGLint)> {
        let version = platform.initialize_internal_display(display.internal())?;
        self.counters.initializes.fetch_add(1, Ordering::SeqCst);
        Ok(version)
    }

    fn terminate_display(&self, platform: &Platform, display: &Display) {
        self.counters.terminates.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = platform.terminate_internal_display(display.internal()) {
            debug!("Mock terminate of {:?}: {}", display.handle(), e);
        }
    }

    fn create_window_surface(
        &self,
        platform: &Platform,
        display: &Display,
        config: EglConfig,
        native_window: NativeHandle,
        _attribs: &[EGLAttrib],
    ) -> Result<NewSurface> {
        self.create_surface(platform, display, config, native_window, EGL_BAD_NATIVE_WINDOW)
    }

    fn create_pixmap_surface(
        &self,
        platform: &Platform,
        display: &Display,
        config: EglConfig,
        native_pixmap: NativeHandle,
        _attribs: &[EGLAttrib],
    ) -> Result<NewSurface> {
        self.create_surface(platform, display, config, native_pixmap, EGL_BAD_NATIVE_PIXMAP)
    }

    fn destroy_surface(&self, platform: &Platform, display: &Display, surface: &Surface) {
        self.counters.surfaces_destroyed.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = platform.destroy_surface(display.internal_display(), surface.internal_surface()) {
            debug!("Mock destroy of {:?}: {}", surface.handle(), e);
        }
    }

    fn free_surface(&self, _platform: &Platform, _display: &Display, _surface: &Surface) {
        self.counters.surfaces_freed.fetch_add(1, Ordering::SeqCst);
    }

    fn swap_buffers(
        &self,
        platform: &Platform,
        display: &Display,
        surface: &Surface,
        damage: Option<&[EGLint]>,
    ) -> Result<()> {
        self.counters.swaps.fetch_add(1, Ordering::SeqCst);
        match damage {
            Some(rects) => platform.swap_buffers_with_damage(
                display.internal_display(),
                surface.internal_surface(),
                rects,
            ),
            None => platform.swap_buffers(display.internal_display(), surface.internal_surface()),
        }
    }
}

/// A ready platform wired to the mocks, with handles to inspect each of them.
pub struct MockPlatform {
    pub platform: Ref<Platform>,
    pub driver: Arc<MockDriver>,
    pub callbacks: Arc<MockCallbacks>,
    pub counters: Arc<ImplCounters>,
}

impl MockPlatform {
    pub fn new() -> Result<Self> {
        Self::with_driver(MockDriver::new(), &Config::default())
    }

    pub fn with_driver(driver: MockDriver, config: &Config) -> Result<Self> {
        let driver = Arc::new(driver);
        let callbacks = Arc::new(MockCallbacks::new());
        let counters = Arc::new(ImplCounters::default());
        let platform = Platform::allocate_with_config(
            1,
            1,
            driver.clone(),
            callbacks.clone(),
            EGL_PLATFORM_X11_KHR,
            Box::new(MockImpl::new(counters.clone())),
            config,
        )?;
        platform.init_finish();
        Ok(MockPlatform {
            platform,
            driver,
            callbacks,
            counters,
        })
    }

    /// `eglGetPlatformDisplay` for the native display `native`.
    pub fn open_display(&self, native: usize, attribs: &[EGLAttrib]) -> Result<EglDisplay> {
        hooks::get_platform_display(
            &self.platform,
            EGL_PLATFORM_X11_KHR,
            NativeHandle(native),
            attribs,
        )
    }

    /// Opens and initializes a display.
    pub fn initialized_display(&self, native: usize, attribs: &[EGLAttrib]) -> Result<EglDisplay> {
        let dpy = self.open_display(native, attribs)?;
        hooks::initialize(&self.platform, dpy)?;
        Ok(dpy)
    }
}

impl Drop for MockPlatform {
    fn drop(&mut self) {
        self.platform.teardown();
    }
}
