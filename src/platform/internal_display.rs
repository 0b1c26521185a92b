// src/platform/internal_display.rs

//! Internal (driver-facing) displays.
//!
//! Several application displays can share one driver display, so each driver
//! display is tracked once per platform. The `init_count` here simulates
//! `EGL_KHR_display_reference`: without native driver support only the 0→1
//! and 1→0 transitions reach the driver.

use crate::egl::{
    EGLAttrib, EGLint, EglDevice, EglDisplay, NativeHandle, EGL_NONE, EGL_PLATFORM_DEVICE_EXT,
    EGL_TRACK_REFERENCES_KHR, EGL_TRUE,
};
use crate::error::{EplError, Result};
use crate::platform::Platform;
use crate::refcount::{Ref, WeakRef};
use log::{debug, trace};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct InternalDisplayState {
    init_count: u32,
    major: EGLint,
    minor: EGLint,
}

/// A driver `EGLDisplay`, shared by every application display that maps to it.
#[derive(Debug)]
pub struct InternalDisplay {
    handle: EglDisplay,
    // Held across the driver's eglInitialize/eglTerminate.
    state: Mutex<InternalDisplayState>,
}

impl InternalDisplay {
    pub fn handle(&self) -> EglDisplay {
        self.handle
    }

    /// Number of outstanding logical initializations.
    pub fn init_count(&self) -> u32 {
        self.state.lock().init_count
    }

    /// The version cached from the driver, if initialized.
    pub fn version(&self) -> Option<(EGLint, EGLint)> {
        let state = self.state.lock();
        (state.init_count > 0).then_some((state.major, state.minor))
    }
}

/// Registry entry. The handle is kept next to the weak reference so lookups
/// don't need to upgrade unrelated entries.
pub(crate) struct RegistryEntry {
    handle: EglDisplay,
    display: WeakRef<InternalDisplay>,
}

impl Platform {
    /// Returns the tracked internal display for `handle`, creating it on first
    /// use. The registry never keeps an internal display alive by itself.
    pub fn lookup_internal_display(&self, handle: EglDisplay) -> Ref<InternalDisplay> {
        let mut registry = self.internal_displays.lock();
        registry.retain(|entry| !entry.display.is_dead());

        if let Some(existing) = registry
            .iter()
            .filter(|entry| entry.handle == handle)
            .find_map(|entry| entry.display.upgrade())
        {
            return existing;
        }

        trace!("Tracking new internal display {:?}", handle);
        let display = Ref::alloc(InternalDisplay {
            handle,
            state: Mutex::new(InternalDisplayState::default()),
        });
        registry.push(RegistryEntry {
            handle,
            display: Ref::downgrade(&display),
        });
        display
    }

    /// Gets the driver display for a device, then looks it up.
    pub fn get_device_internal_display(&self, device: EglDevice) -> Result<Ref<InternalDisplay>> {
        let attribs: &[EGLAttrib] = if self.extensions().display_reference {
            &[
                EGL_TRACK_REFERENCES_KHR as EGLAttrib,
                EGL_TRUE as EGLAttrib,
                EGL_NONE as EGLAttrib,
            ]
        } else {
            &[EGL_NONE as EGLAttrib]
        };
        let handle = self.get_platform_display(
            EGL_PLATFORM_DEVICE_EXT,
            NativeHandle(device.as_raw()),
            attribs,
        )?;
        Ok(self.lookup_internal_display(handle))
    }

    /// One logical `eglInitialize` on an internal display.
    ///
    /// Returns the driver's version. The count only changes if the call
    /// succeeds.
    pub fn initialize_internal_display(&self, display: &InternalDisplay) -> Result<(EGLint, EGLint)> {
        let mut state = display.state.lock();
        let driver = self.driver()?;

        if state.init_count == 0 || self.extensions().display_reference {
            match driver.initialize(display.handle) {
                Some((major, minor)) => {
                    state.major = major;
                    state.minor = minor;
                }
                None => return Err(self.driver_error("eglInitialize")),
            }
            debug!(
                "Initialized internal display {:?}: EGL {}.{}",
                display.handle, state.major, state.minor
            );
        }

        state.init_count += 1;
        Ok((state.major, state.minor))
    }

    /// One logical `eglTerminate` on an internal display.
    pub fn terminate_internal_display(&self, display: &InternalDisplay) -> Result<()> {
        let mut state = display.state.lock();
        if state.init_count == 0 {
            return Err(EplError::StateViolation(format!(
                "internal display {:?} terminated more often than initialized",
                display.handle
            )));
        }
        let driver = self.driver()?;

        if state.init_count == 1 || self.extensions().display_reference {
            if !driver.terminate(display.handle) {
                return Err(self.driver_error("eglTerminate"));
            }
            if state.init_count == 1 {
                debug!("Terminated internal display {:?}", display.handle);
            }
        }

        state.init_count -= 1;
        Ok(())
    }

    /// Number of live internal displays. Mostly useful to tests.
    pub fn internal_display_count(&self) -> usize {
        self.internal_displays
            .lock()
            .iter()
            .filter(|entry| !entry.display.is_dead())
            .count()
    }
}
