// src/display/list.rs

//! The process-wide list of application-facing displays.
//!
//! Every platform in the process shares this list, so `eglGetPlatformDisplay`
//! can find an existing display and every hook can map a handle back to its
//! [`Display`]. Hold the list lock only for short lookups: never block on a
//! display's own lock while holding it.

use super::Display;
use crate::egl::EglDisplay;
use crate::platform::Platform;
use crate::refcount::Ref;
use log::trace;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};

static DISPLAY_LIST: Lazy<Mutex<Vec<Ref<Display>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Locks the global display list. The lock is released when the guard drops.
pub fn lock() -> DisplayListGuard {
    DisplayListGuard {
        list: DISPLAY_LIST.lock(),
    }
}

/// Looks up a display by its application-facing handle and takes a reference.
pub fn find(handle: EglDisplay) -> Option<Ref<Display>> {
    lock().find(handle)
}

pub struct DisplayListGuard {
    list: MutexGuard<'static, Vec<Ref<Display>>>,
}

impl DisplayListGuard {
    pub fn iter(&self) -> impl Iterator<Item = &Ref<Display>> {
        self.list.iter()
    }

    pub fn find(&self, handle: EglDisplay) -> Option<Ref<Display>> {
        self.list.iter().find(|d| d.handle() == handle).cloned()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub(crate) fn push(&mut self, display: Ref<Display>) {
        trace!("Display list: adding {:?}", display.handle());
        self.list.push(display);
    }

    /// Removes every display belonging to `platform` and hands the list's
    /// references to the caller, who must drop them after unlocking.
    pub(crate) fn remove_platform(&mut self, platform: &Platform) -> Vec<Ref<Display>> {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .list
            .drain(..)
            .partition(|d| std::ptr::eq(&**d.platform(), platform));
        *self.list = kept;
        trace!("Display list: removed {} displays", removed.len());
        removed
    }
}
