// src/platform/mod.rs

//! The platform instance: one per loaded platform library.
//!
//! A [`Platform`] owns the driver's function table, the loader's callbacks, the
//! windowing-system implementation and the registry of internal displays. It
//! is also the only way to reach the driver: every passthrough below checks the
//! `destroyed` flag first, so nothing calls into the driver once teardown has
//! started.
//!
//! ## Lifecycle
//! 1. [`Platform::allocate`] - check the interface version, resolve entrypoints
//! 2. implementation-specific setup by the loader entrypoint
//! 3. [`Platform::init_finish`] (or [`Platform::init_fail`])
//! 4. [`Platform::teardown`] at unload

pub mod implementation;
pub mod internal_display;

#[cfg(test)]
mod tests;

pub use implementation::{ImplData, NewDisplay, NewSurface, PlatformImpl};
pub use internal_display::InternalDisplay;

use crate::config::{Config, DebugConfig, CONFIG};
use crate::display;
use crate::driver::{EglDriver, Entrypoint, MessageLevel, PlatformCallbacks};
use crate::egl::{
    self, EGLAttrib, EGLenum, EGLint, EglConfig, EglContext, EglDevice, EglDisplay, EglStream,
    EglSurface, NativeHandle, DISPLAY_REFERENCE_EXTENSION, EGL_EXTENSIONS,
};
use crate::error::{EplError, Result};
use crate::refcount::Ref;
use internal_display::RegistryEntry;
use log::{debug, info, log, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Version of the external platform interface this core implements.
pub const PLATFORM_VERSION_MAJOR: i32 = 1;
pub const PLATFORM_VERSION_MINOR: i32 = 1;

/// Optional driver capabilities, detected once at allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extensions {
    /// The driver implements `EGL_KHR_display_reference` itself.
    pub display_reference: bool,
    pub swap_buffers_with_damage: bool,
    pub stream_producer_surface: bool,
}

pub struct Platform {
    driver: Arc<dyn EglDriver>,
    callbacks: Arc<dyn PlatformCallbacks>,
    imp: Box<dyn PlatformImpl>,
    platform_enum: EGLenum,
    extensions: Extensions,
    debug: DebugConfig,
    allow_track_references: bool,
    /// Set once teardown starts. Never cleared.
    destroyed: AtomicBool,
    ready: AtomicBool,
    internal_displays: Mutex<Vec<RegistryEntry>>,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("platform_enum", &format_args!("{:#x}", self.platform_enum))
            .field("extensions", &self.extensions)
            .field("destroyed", &self.is_destroyed())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

fn has_extension(extensions: &str, name: &str) -> bool {
    extensions.split_ascii_whitespace().any(|ext| ext == name)
}

impl Platform {
    /// Allocates a platform using the global [`CONFIG`].
    pub fn allocate(
        major: i32,
        minor: i32,
        driver: Arc<dyn EglDriver>,
        callbacks: Arc<dyn PlatformCallbacks>,
        platform_enum: EGLenum,
        imp: Box<dyn PlatformImpl>,
    ) -> Result<Ref<Platform>> {
        Self::allocate_with_config(major, minor, driver, callbacks, platform_enum, imp, &CONFIG)
    }

    pub fn allocate_with_config(
        major: i32,
        minor: i32,
        driver: Arc<dyn EglDriver>,
        callbacks: Arc<dyn PlatformCallbacks>,
        platform_enum: EGLenum,
        imp: Box<dyn PlatformImpl>,
        config: &Config,
    ) -> Result<Ref<Platform>> {
        if major != PLATFORM_VERSION_MAJOR || minor > PLATFORM_VERSION_MINOR {
            warn!(
                "Loader requested platform interface {}.{}, only {}.{} is supported",
                major, minor, PLATFORM_VERSION_MAJOR, PLATFORM_VERSION_MINOR
            );
            return Err(EplError::Unsupported { major, minor });
        }

        if let Some(missing) = Entrypoint::ALL
            .iter()
            .copied()
            .find(|e| !e.is_optional() && !driver.supports(*e))
        {
            warn!("Driver is missing {}", missing.name());
            return Err(EplError::MissingEntrypoint(missing.name()));
        }

        let client_extensions = driver.query_string(None, EGL_EXTENSIONS).unwrap_or_default();
        let extensions = Extensions {
            display_reference: !config.display.simulate_display_reference
                && has_extension(&client_extensions, DISPLAY_REFERENCE_EXTENSION),
            swap_buffers_with_damage: driver.supports(Entrypoint::SwapBuffersWithDamageEXT),
            stream_producer_surface: driver.supports(Entrypoint::CreateStreamProducerSurfaceKHR),
        };

        info!(
            "Allocated platform {:#x}: {:?}",
            platform_enum, extensions
        );

        Ok(Ref::alloc(Platform {
            driver,
            callbacks,
            imp,
            platform_enum,
            extensions,
            debug: config.debug.clone(),
            allow_track_references: config.display.allow_track_references,
            destroyed: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            internal_displays: Mutex::new(Vec::new()),
        }))
    }

    /// Makes the platform visible to `eglGetPlatformDisplay`. Call after the
    /// implementation-specific setup succeeded.
    pub fn init_finish(&self) {
        self.ready.store(true, Ordering::Release);
        debug!("Platform {:#x} ready", self.platform_enum);
    }

    /// Releases a platform whose implementation-specific setup failed.
    pub fn init_fail(platform: Ref<Platform>) {
        warn!("Platform {:#x} failed to initialize", platform.platform_enum);
        platform.destroyed.store(true, Ordering::Release);
        platform.imp.cleanup_platform(&platform);
        platform.internal_displays.lock().clear();
    }

    /// Tears the platform down. Safe to call more than once; only the first
    /// call does anything.
    ///
    /// Displays of this platform are removed from the global display list and
    /// terminated. A display that is still in use stays alive, with its
    /// termination deferred until its last user releases it.
    pub fn teardown(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Tearing down platform {:#x}", self.platform_enum);

        let displays = display::list::lock().remove_platform(self);
        for display in &displays {
            display.force_terminate();
        }
        // May run display destructors; the list lock is no longer held.
        drop(displays);

        self.imp.cleanup_platform(self);
        self.internal_displays.lock().clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire) && !self.is_destroyed()
    }

    pub fn platform_enum(&self) -> EGLenum {
        self.platform_enum
    }

    pub fn extensions(&self) -> Extensions {
        self.extensions
    }

    pub(crate) fn allow_track_references(&self) -> bool {
        self.allow_track_references
    }

    pub fn implementation(&self) -> &dyn PlatformImpl {
        self.imp.as_ref()
    }

    pub fn callbacks(&self) -> &dyn PlatformCallbacks {
        self.callbacks.as_ref()
    }

    /// The driver, unless teardown has started.
    fn driver(&self) -> Result<&dyn EglDriver> {
        if self.is_destroyed() {
            Err(EplError::PlatformDestroyed)
        } else {
            Ok(self.driver.as_ref())
        }
    }

    fn driver_error(&self, call: &'static str) -> EplError {
        EplError::Driver {
            call,
            code: self.driver.get_error(),
        }
    }

    // --- Error reporting ---

    /// Sets the application-visible EGL error and reports `error` as a debug
    /// message.
    pub fn set_error(&self, error: &EplError) {
        let message = error.to_string();
        if self.debug.log_errors {
            warn!("{} ({})", message, egl::error_name(error.egl_code()));
        }
        self.callbacks
            .set_error(error.egl_code(), MessageLevel::Error, &message);
    }

    pub fn debug_message(&self, level: MessageLevel, message: &str) {
        log!(level.log_level(), "{}", message);
        if level <= self.debug.max_message_level {
            self.callbacks.debug_message(level, message);
        }
    }

    pub fn get_proc_address(&self, name: &str) -> Option<usize> {
        self.callbacks.get_proc_address(name)
    }

    // --- Driver passthroughs ---

    pub fn query_string(&self, display: Option<EglDisplay>, name: EGLint) -> Result<String> {
        self.driver()?
            .query_string(display, name)
            .ok_or_else(|| self.driver_error("eglQueryString"))
    }

    pub fn get_platform_display(
        &self,
        platform: EGLenum,
        native: NativeHandle,
        attribs: &[EGLAttrib],
    ) -> Result<EglDisplay> {
        self.driver()?
            .get_platform_display(platform, native, attribs)
            .ok_or_else(|| self.driver_error("eglGetPlatformDisplay"))
    }

    /// Every device the driver knows about.
    pub fn all_devices(&self) -> Result<Vec<EglDevice>> {
        self.driver()?
            .query_devices()
            .ok_or_else(|| self.driver_error("eglQueryDevicesEXT"))
    }

    pub fn query_device_attrib(&self, device: EglDevice, attribute: EGLint) -> Result<EGLAttrib> {
        self.driver()?
            .query_device_attrib(device, attribute)
            .ok_or_else(|| self.driver_error("eglQueryDeviceAttribEXT"))
    }

    pub fn query_device_string(&self, device: EglDevice, name: EGLint) -> Result<String> {
        self.driver()?
            .query_device_string(device, name)
            .ok_or_else(|| self.driver_error("eglQueryDeviceStringEXT"))
    }

    pub fn query_display_attrib(&self, display: EglDisplay, attribute: EGLint) -> Result<EGLAttrib> {
        self.driver()?
            .query_display_attrib(display, attribute)
            .ok_or_else(|| self.driver_error("eglQueryDisplayAttribEXT"))
    }

    pub fn create_pbuffer_surface(
        &self,
        display: EglDisplay,
        config: EglConfig,
        attribs: &[EGLint],
    ) -> Result<EglSurface> {
        self.driver()?
            .create_pbuffer_surface(display, config, attribs)
            .ok_or_else(|| self.driver_error("eglCreatePbufferSurface"))
    }

    pub fn create_stream_producer_surface(
        &self,
        display: EglDisplay,
        config: EglConfig,
        stream: EglStream,
        attribs: &[EGLint],
    ) -> Result<EglSurface> {
        let driver = self.driver()?;
        if !self.extensions.stream_producer_surface {
            return Err(EplError::Driver {
                call: "eglCreateStreamProducerSurfaceKHR",
                code: egl::EGL_BAD_ACCESS,
            });
        }
        driver
            .create_stream_producer_surface(display, config, stream, attribs)
            .ok_or_else(|| self.driver_error("eglCreateStreamProducerSurfaceKHR"))
    }

    pub fn destroy_surface(&self, display: EglDisplay, surface: EglSurface) -> Result<()> {
        if self.driver()?.destroy_surface(display, surface) {
            Ok(())
        } else {
            Err(self.driver_error("eglDestroySurface"))
        }
    }

    pub fn swap_buffers(&self, display: EglDisplay, surface: EglSurface) -> Result<()> {
        if self.driver()?.swap_buffers(display, surface) {
            Ok(())
        } else {
            Err(self.driver_error("eglSwapBuffers"))
        }
    }

    pub fn swap_buffers_with_damage(
        &self,
        display: EglDisplay,
        surface: EglSurface,
        rects: &[EGLint],
    ) -> Result<()> {
        let driver = self.driver()?;
        if !self.extensions.swap_buffers_with_damage {
            // Damage is only a hint.
            return self.swap_buffers(display, surface);
        }
        if driver.swap_buffers_with_damage(display, surface, rects) {
            Ok(())
        } else {
            Err(self.driver_error("eglSwapBuffersWithDamageEXT"))
        }
    }

    pub fn choose_config(
        &self,
        display: EglDisplay,
        attribs: &[EGLint],
        max_configs: usize,
    ) -> Result<Vec<EglConfig>> {
        self.driver()?
            .choose_config(display, attribs, max_configs)
            .ok_or_else(|| self.driver_error("eglChooseConfig"))
    }

    pub fn get_config_attrib(
        &self,
        display: EglDisplay,
        config: EglConfig,
        attribute: EGLint,
    ) -> Result<EGLint> {
        self.driver()?
            .get_config_attrib(display, config, attribute)
            .ok_or_else(|| self.driver_error("eglGetConfigAttrib"))
    }

    pub fn get_configs(&self, display: EglDisplay, max_configs: usize) -> Result<Vec<EglConfig>> {
        self.driver()?
            .get_configs(display, max_configs)
            .ok_or_else(|| self.driver_error("eglGetConfigs"))
    }

    pub fn current_display(&self) -> Result<Option<EglDisplay>> {
        Ok(self.driver()?.get_current_display())
    }

    pub fn current_surface(&self, readdraw: EGLint) -> Result<Option<EglSurface>> {
        Ok(self.driver()?.get_current_surface(readdraw))
    }

    pub fn current_context(&self) -> Result<Option<EglContext>> {
        Ok(self.driver()?.get_current_context())
    }

    pub fn make_current(
        &self,
        display: EglDisplay,
        draw: Option<EglSurface>,
        read: Option<EglSurface>,
        context: Option<EglContext>,
    ) -> Result<()> {
        if self.driver()?.make_current(display, draw, read, context) {
            Ok(())
        } else {
            Err(self.driver_error("eglMakeCurrent"))
        }
    }
}
