// src/display/mod.rs

//! Application-facing displays.
//!
//! - [`Display`]: one `EGLDisplay` handed to the application
//! - [`DisplayGuard`]: the acquire/release protocol every hook goes through
//! - [`lock::RecursiveLock`]: the per-display lock
//! - [`list`]: the process-wide display list
//!
//! A display has two kinds of counts. Its reference count (the [`Ref`] it lives
//! in) keeps the memory alive. `init_count` and `use_count` decide when it is
//! terminated: `eglTerminate` only takes effect once no other thread is still
//! inside a call using the display.

pub mod guard;
pub mod list;
pub mod lock;

pub use guard::DisplayGuard;
pub(crate) use guard::LockedDisplay;
pub use lock::RecursiveLock;

use crate::egl::{next_core_handle, EGLenum, EGLint, EglDisplay, NativeHandle};
use crate::platform::{ImplData, InternalDisplay, NewDisplay, Platform};
use crate::refcount::Ref;
use crate::surface::Surface;
use log::{debug, trace};
use parking_lot::{Mutex, MutexGuard};
use std::any::Any;
use std::fmt;

/// Where a display is in its initialize/terminate cycle.
///
/// # Phase transitions
///
/// ```text
/// Uninitialized ──initialize──► Initialized ──terminate, idle──► Uninitialized
///                                   │    ▲
///                     terminate,    │    │ initialize
///                       in use      ▼    │
///                              TerminatePending ──last release──► Uninitialized
/// ```
///
/// `Destroyed` is never returned by [`Display::phase`]: once the last reference
/// is gone there is nothing left to ask. It exists so callers can describe a
/// display they hold only a weak reference to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPhase {
    Uninitialized,
    Initialized,
    /// `eglTerminate` was called while another thread was using the display.
    /// The last [`DisplayGuard`] to drop finishes the termination.
    TerminatePending,
    Destroyed,
}

impl fmt::Display for DisplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayPhase::Uninitialized => write!(f, "Uninitialized"),
            DisplayPhase::Initialized => write!(f, "Initialized"),
            DisplayPhase::TerminatePending => write!(f, "TerminatePending"),
            DisplayPhase::Destroyed => write!(f, "Destroyed"),
        }
    }
}

#[derive(Default)]
pub(crate) struct DisplayState {
    /// Logical `eglInitialize` calls not yet matched by `eglTerminate`.
    pub(crate) init_count: u32,
    /// Threads currently inside a call that uses this display.
    pub(crate) use_count: u32,
    pub(crate) major: EGLint,
    pub(crate) minor: EGLint,
    /// The implementation's initialize hook has run and its terminate hook
    /// has not.
    pub(crate) initialized: bool,
    pub(crate) surfaces: Vec<Ref<Surface>>,
}

pub struct Display {
    handle: EglDisplay,
    internal: Ref<InternalDisplay>,
    platform_enum: EGLenum,
    native_display: NativeHandle,
    platform: Ref<Platform>,
    track_references: bool,
    data: ImplData,
    lock: RecursiveLock,
    state: Mutex<DisplayState>,
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display")
            .field("handle", &self.handle)
            .field("internal", &self.internal.handle())
            .field("platform_enum", &format_args!("{:#x}", self.platform_enum))
            .field("native_display", &self.native_display)
            .field("track_references", &self.track_references)
            .finish_non_exhaustive()
    }
}

impl Display {
    pub(crate) fn create(
        platform: &Ref<Platform>,
        platform_enum: EGLenum,
        native_display: NativeHandle,
        track_references: bool,
        new: NewDisplay,
    ) -> Ref<Display> {
        let display = Display {
            handle: EglDisplay(next_core_handle()),
            internal: new.internal,
            platform_enum,
            native_display,
            platform: Ref::acquire(platform),
            track_references,
            data: new.data,
            lock: RecursiveLock::new(),
            state: Mutex::new(DisplayState::default()),
        };
        debug!(
            "Created display {:?} on internal display {:?}",
            display.handle,
            display.internal.handle()
        );
        Ref::alloc_with_destructor(display, Display::destroy)
    }

    /// Runs when the last reference is released.
    fn destroy(display: &Display) {
        trace!("Freeing display {:?}", display.handle);
        let imp = display.platform.implementation();
        let surfaces = std::mem::take(&mut display.state.lock().surfaces);
        for surface in &surfaces {
            imp.free_surface(&display.platform, display, surface);
        }
        drop(surfaces);
        imp.cleanup_display(&display.platform, display);
    }

    /// Looks up `handle`, locks the display and checks that it's initialized.
    ///
    /// On success the returned guard keeps the display referenced, locked and
    /// counted in `use_count` until it drops. On failure nothing is held.
    pub fn acquire(handle: EglDisplay) -> crate::error::Result<DisplayGuard> {
        DisplayGuard::acquire(handle)
    }

    /// The application-facing handle.
    pub fn handle(&self) -> EglDisplay {
        self.handle
    }

    /// The driver handle behind this display.
    pub fn internal_display(&self) -> EglDisplay {
        self.internal.handle()
    }

    pub fn internal(&self) -> &InternalDisplay {
        &self.internal
    }

    pub fn platform(&self) -> &Ref<Platform> {
        &self.platform
    }

    pub fn platform_enum(&self) -> EGLenum {
        self.platform_enum
    }

    pub fn native_display(&self) -> NativeHandle {
        self.native_display
    }

    /// Created with `EGL_TRACK_REFERENCES_KHR` set.
    pub fn track_references(&self) -> bool {
        self.track_references
    }

    /// The implementation's private data, if it is a `T`.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn lock(&self) {
        self.lock.lock();
    }

    /// Panics if the calling thread does not hold the lock.
    pub fn unlock(&self) {
        self.lock.unlock();
    }

    pub fn is_locked_by_current_thread(&self) -> bool {
        self.lock.is_held_by_current_thread()
    }

    /// Runs `f` with one level of this display's lock released, then takes it
    /// again. The caller must hold the lock.
    ///
    /// The display stays alive through the caller's reference, but any state
    /// read before the call may be stale afterwards.
    pub fn unlocked<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Relock<'a>(&'a RecursiveLock);

        impl Drop for Relock<'_> {
            fn drop(&mut self) {
                self.0.lock();
            }
        }

        self.lock.unlock();
        let _relock = Relock(&self.lock);
        f()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, DisplayState> {
        self.state.lock()
    }

    pub fn init_count(&self) -> u32 {
        self.state.lock().init_count
    }

    pub fn use_count(&self) -> u32 {
        self.state.lock().use_count
    }

    /// Initialized from the application's point of view. A display with a
    /// pending terminate is not.
    pub fn is_initialized(&self) -> bool {
        let state = self.state.lock();
        state.initialized && state.init_count > 0
    }

    /// The version reported to the application by `eglInitialize`.
    pub fn version(&self) -> (EGLint, EGLint) {
        let state = self.state.lock();
        (state.major, state.minor)
    }

    pub fn phase(&self) -> DisplayPhase {
        let state = self.state.lock();
        match (state.initialized, state.init_count) {
            (false, _) => DisplayPhase::Uninitialized,
            (true, 0) => DisplayPhase::TerminatePending,
            (true, _) => DisplayPhase::Initialized,
        }
    }

    /// Terminates the display right away: destroys every live surface and
    /// runs the implementation's terminate hook. The display must be locked.
    pub(crate) fn terminate_now(&self) {
        let live: Vec<Ref<Surface>> = {
            let mut state = self.state.lock();
            if !state.initialized {
                return;
            }
            state.initialized = false;
            state.init_count = 0;
            state
                .surfaces
                .iter()
                .filter(|s| !s.is_deleted())
                .cloned()
                .collect()
        };
        debug!(
            "Terminating display {:?} ({} live surfaces)",
            self.handle,
            live.len()
        );

        let imp = self.platform.implementation();
        for surface in &live {
            surface.mark_deleted();
            imp.destroy_surface(&self.platform, self, surface);
        }
        drop(live);

        imp.terminate_display(&self.platform, self);
        self.reap_surfaces();
    }

    /// Drops every outstanding `eglInitialize`. The termination itself is
    /// deferred if another thread is using the display.
    pub(crate) fn force_terminate(&self) {
        self.lock();
        let now = {
            let mut state = self.state.lock();
            state.init_count = 0;
            state.initialized && state.use_count == 0
        };
        if now {
            self.terminate_now();
        } else if self.phase() == DisplayPhase::TerminatePending {
            debug!(
                "Display {:?} still in use, deferring termination",
                self.handle
            );
        }
        self.unlock();
    }
}
