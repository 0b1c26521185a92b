// src/display/guard.rs

//! Scoped display access.
//!
//! [`DisplayGuard`] is what every display-taking hook holds for the duration
//! of the call. Dropping it is the release half of the protocol and is where
//! a deferred `eglTerminate` finally runs.

use super::{list, Display};
use crate::egl::EglDisplay;
use crate::error::{EplError, Result};
use crate::refcount::Ref;
use log::{debug, error};
use std::marker::PhantomData;
use std::ops::Deref;

/// A referenced, locked, in-use display.
///
/// The display lock belongs to the acquiring thread, so the guard must be
/// dropped there:
///
/// ```compile_fail
/// use egl_platform_base::egl::EglDisplay;
/// use egl_platform_base::Display;
///
/// let guard = Display::acquire(EglDisplay(1)).unwrap();
/// std::thread::spawn(move || drop(guard));
/// ```
#[derive(Debug)]
pub struct DisplayGuard {
    display: Ref<Display>,
    _not_send: PhantomData<*const ()>,
}

impl DisplayGuard {
    pub(crate) fn acquire(handle: EglDisplay) -> Result<Self> {
        let display = list::find(handle).ok_or(EplError::BadDisplay)?;
        display.lock();
        if !display.is_initialized() {
            display.unlock();
            return Err(EplError::NotInitialized);
        }
        display.state().use_count += 1;
        Ok(DisplayGuard {
            display,
            _not_send: PhantomData,
        })
    }

    /// Another reference to the display, independent of this guard.
    pub fn display_ref(&self) -> Ref<Display> {
        Ref::acquire(&self.display)
    }
}

impl Deref for DisplayGuard {
    type Target = Display;

    fn deref(&self) -> &Display {
        &self.display
    }
}

impl Drop for DisplayGuard {
    fn drop(&mut self) {
        let terminate = {
            let mut state = self.display.state();
            if state.use_count == 0 {
                error!(
                    "Display {:?} released more often than acquired",
                    self.display.handle()
                );
            } else {
                state.use_count -= 1;
            }
            state.use_count == 0 && state.init_count == 0 && state.initialized
        };
        if terminate {
            debug!(
                "Last user of display {:?} gone, running deferred terminate",
                self.display.handle()
            );
            self.display.terminate_now();
        }
        self.display.unlock();
    }
}

/// A referenced and locked display that need not be initialized. Used by
/// `eglInitialize`, `eglTerminate` and queries that are valid on any display.
#[derive(Debug)]
pub(crate) struct LockedDisplay {
    display: Ref<Display>,
    _not_send: PhantomData<*const ()>,
}

impl LockedDisplay {
    pub(crate) fn acquire(handle: EglDisplay) -> Result<Self> {
        let display = list::find(handle).ok_or(EplError::BadDisplay)?;
        display.lock();
        Ok(LockedDisplay {
            display,
            _not_send: PhantomData,
        })
    }
}

impl Deref for LockedDisplay {
    type Target = Display;

    fn deref(&self) -> &Display {
        &self.display
    }
}

impl Drop for LockedDisplay {
    fn drop(&mut self) {
        self.display.unlock();
    }
}
