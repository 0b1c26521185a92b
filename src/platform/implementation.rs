// src/platform/implementation.rs

//! The per-windowing-system implementation plugged into a [`Platform`].
//!
//! The core owns the bookkeeping; a `PlatformImpl` owns everything that
//! depends on the native windowing system. Each hook is called with the
//! relevant display locked unless noted otherwise, so an implementation that
//! needs to call something that may re-enter the core has to go through
//! [`Display::unlocked`].

use crate::display::Display;
use crate::egl::{EGLAttrib, EGLenum, EGLint, EglConfig, EglSurface, NativeHandle};
use crate::error::Result;
use crate::platform::internal_display::InternalDisplay;
use crate::platform::Platform;
use crate::refcount::Ref;
use crate::surface::Surface;
use log::debug;
use std::any::Any;

/// Implementation-private data attached to a display or surface. The core
/// stores it and drops it with its owner; it never looks inside.
pub type ImplData = Box<dyn Any + Send + Sync>;

/// What an implementation returns when it creates a display.
pub struct NewDisplay {
    /// The driver display that backs the new display.
    pub internal: Ref<InternalDisplay>,
    pub data: ImplData,
}

/// What an implementation returns when it creates a window or pixmap surface.
pub struct NewSurface {
    /// The driver surface that currently backs the new surface.
    pub internal: EglSurface,
    pub data: ImplData,
}

pub trait PlatformImpl: Send + Sync {
    /// Called once, when the platform is torn down or fails to initialize.
    /// The driver may no longer be called.
    fn cleanup_platform(&self, _platform: &Platform) {}

    /// Overrides `eglQueryString`. `None` falls through to the driver for a
    /// display, or reports `EGL_BAD_PARAMETER` for client strings.
    fn query_string(
        &self,
        _platform: &Platform,
        _display: Option<&Display>,
        _name: EGLint,
    ) -> Option<String> {
        None
    }

    /// Whether `display` is the display an `eglGetPlatformDisplay` call with
    /// these arguments should return.
    ///
    /// Called with the global display list locked: must not lock `display`.
    fn is_same_display(
        &self,
        platform: &Platform,
        display: &Display,
        platform_enum: EGLenum,
        native: NativeHandle,
        attribs: &[EGLAttrib],
    ) -> bool;

    /// Creates the implementation side of a new display.
    ///
    /// Called with the global display list locked. `attribs` has had
    /// `EGL_TRACK_REFERENCES_KHR` removed.
    fn get_platform_display(
        &self,
        platform: &Ref<Platform>,
        platform_enum: EGLenum,
        native: NativeHandle,
        attribs: &[EGLAttrib],
    ) -> Result<NewDisplay>;

    /// Called when the display's last reference goes away. Not locked.
    fn cleanup_display(&self, _platform: &Platform, _display: &Display) {}

    /// Called on the first logical `eglInitialize`. Returns the version to
    /// report to the application.
    fn initialize_display(&self, platform: &Platform, display: &Display) -> Result<(EGLint, EGLint)> {
        platform.initialize_internal_display(display.internal())
    }

    /// Called once the display is really being terminated. The display's
    /// surfaces have already been destroyed.
    fn terminate_display(&self, platform: &Platform, display: &Display) {
        if let Err(e) = platform.terminate_internal_display(display.internal()) {
            debug!("Terminating internal display {:?}: {}", display.internal_display(), e);
        }
    }

    fn create_window_surface(
        &self,
        platform: &Platform,
        display: &Display,
        config: EglConfig,
        native_window: NativeHandle,
        attribs: &[EGLAttrib],
    ) -> Result<NewSurface>;

    fn create_pixmap_surface(
        &self,
        platform: &Platform,
        display: &Display,
        config: EglConfig,
        native_pixmap: NativeHandle,
        attribs: &[EGLAttrib],
    ) -> Result<NewSurface>;

    /// Called when the application destroys a surface or terminates its
    /// display. The surface may stay alive afterwards (it may still be
    /// current), but it will never be returned by a lookup again.
    fn destroy_surface(&self, platform: &Platform, display: &Display, surface: &Surface);

    /// Called right before the core drops its last reference to a surface.
    fn free_surface(&self, _platform: &Platform, _display: &Display, _surface: &Surface) {}

    /// `eglSwapBuffers` / `eglSwapBuffersWithDamageEXT` for a tracked surface.
    fn swap_buffers(
        &self,
        platform: &Platform,
        display: &Display,
        surface: &Surface,
        damage: Option<&[EGLint]>,
    ) -> Result<()>;
}
