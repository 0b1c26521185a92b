// src/egl.rs

//! EGL scalar types, enum values and opaque handle types.
//!
//! Only the values the platform core actually looks at are defined here. The
//! numeric values match the Khronos headers so that codes reported through
//! `PlatformCallbacks::set_error` are meaningful to the application.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

pub type EGLint = i32;
pub type EGLenum = u32;
pub type EGLAttrib = isize;

// --- Error codes ---
pub const EGL_SUCCESS: EGLint = 0x3000;
pub const EGL_NOT_INITIALIZED: EGLint = 0x3001;
pub const EGL_BAD_ACCESS: EGLint = 0x3002;
pub const EGL_BAD_ALLOC: EGLint = 0x3003;
pub const EGL_BAD_ATTRIBUTE: EGLint = 0x3004;
pub const EGL_BAD_CONFIG: EGLint = 0x3005;
pub const EGL_BAD_CONTEXT: EGLint = 0x3006;
pub const EGL_BAD_CURRENT_SURFACE: EGLint = 0x3007;
pub const EGL_BAD_DISPLAY: EGLint = 0x3008;
pub const EGL_BAD_MATCH: EGLint = 0x3009;
pub const EGL_BAD_NATIVE_PIXMAP: EGLint = 0x300A;
pub const EGL_BAD_NATIVE_WINDOW: EGLint = 0x300B;
pub const EGL_BAD_PARAMETER: EGLint = 0x300C;
pub const EGL_BAD_SURFACE: EGLint = 0x300D;

// --- Misc enums ---
pub const EGL_NONE: EGLint = 0x3038;
pub const EGL_VENDOR: EGLint = 0x3053;
pub const EGL_VERSION: EGLint = 0x3054;
pub const EGL_EXTENSIONS: EGLint = 0x3055;
pub const EGL_CLIENT_APIS: EGLint = 0x308D;
pub const EGL_DRAW: EGLint = 0x3059;
pub const EGL_READ: EGLint = 0x305A;
pub const EGL_TRUE: EGLint = 1;
pub const EGL_FALSE: EGLint = 0;

// --- Platforms ---
pub const EGL_PLATFORM_DEVICE_EXT: EGLenum = 0x313F;
pub const EGL_PLATFORM_GBM_KHR: EGLenum = 0x31D7;
pub const EGL_PLATFORM_X11_KHR: EGLenum = 0x31D5;
pub const EGL_PLATFORM_WAYLAND_KHR: EGLenum = 0x31D8;

// --- EGL_EXT_device_query ---
pub const EGL_DEVICE_EXT: EGLint = 0x322C;

// --- EGL_KHR_display_reference ---
pub const EGL_TRACK_REFERENCES_KHR: EGLint = 0x3352;
pub const DISPLAY_REFERENCE_EXTENSION: &str = "EGL_KHR_display_reference";

// --- EGL_KHR_debug message types ---
pub const EGL_DEBUG_MSG_CRITICAL_KHR: EGLint = 0x33B9;
pub const EGL_DEBUG_MSG_ERROR_KHR: EGLint = 0x33BA;
pub const EGL_DEBUG_MSG_WARN_KHR: EGLint = 0x33BB;
pub const EGL_DEBUG_MSG_INFO_KHR: EGLint = 0x33BC;

/// Human readable name of an EGL error code, for log output.
pub fn error_name(code: EGLint) -> &'static str {
    match code {
        EGL_SUCCESS => "EGL_SUCCESS",
        EGL_NOT_INITIALIZED => "EGL_NOT_INITIALIZED",
        EGL_BAD_ACCESS => "EGL_BAD_ACCESS",
        EGL_BAD_ALLOC => "EGL_BAD_ALLOC",
        EGL_BAD_ATTRIBUTE => "EGL_BAD_ATTRIBUTE",
        EGL_BAD_CONFIG => "EGL_BAD_CONFIG",
        EGL_BAD_CONTEXT => "EGL_BAD_CONTEXT",
        EGL_BAD_CURRENT_SURFACE => "EGL_BAD_CURRENT_SURFACE",
        EGL_BAD_DISPLAY => "EGL_BAD_DISPLAY",
        EGL_BAD_MATCH => "EGL_BAD_MATCH",
        EGL_BAD_NATIVE_PIXMAP => "EGL_BAD_NATIVE_PIXMAP",
        EGL_BAD_NATIVE_WINDOW => "EGL_BAD_NATIVE_WINDOW",
        EGL_BAD_PARAMETER => "EGL_BAD_PARAMETER",
        EGL_BAD_SURFACE => "EGL_BAD_SURFACE",
        _ => "EGL_<unknown>",
    }
}

macro_rules! egl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(pub usize);

        impl $name {
            pub const fn from_raw(raw: usize) -> Self {
                Self(raw)
            }

            pub const fn as_raw(self) -> usize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }
    };
}

egl_handle!(
    /// An `EGLDisplay`, either application-facing or driver-facing.
    EglDisplay
);
egl_handle!(
    /// An `EGLSurface`, either application-facing or driver-facing.
    EglSurface
);
egl_handle!(EglConfig);
egl_handle!(EglContext);
egl_handle!(EglDevice);
egl_handle!(EglStream);
egl_handle!(
    /// A native display, window or pixmap pointer. Never dereferenced here.
    NativeHandle
);

/// Handles created by the core carry this bit so they can't collide with
/// handles returned by the driver.
const CORE_HANDLE_TAG: usize = 1 << (usize::BITS - 1);

static NEXT_CORE_HANDLE: AtomicUsize = AtomicUsize::new(1);

/// Allocates a fresh application-facing handle value.
pub(crate) fn next_core_handle() -> usize {
    CORE_HANDLE_TAG | NEXT_CORE_HANDLE.fetch_add(1, Ordering::Relaxed)
}

/// Returns true if `raw` was produced by [`next_core_handle`].
pub fn is_core_handle(raw: usize) -> bool {
    raw & CORE_HANDLE_TAG != 0
}

/// Iterates `(name, value)` pairs of an `EGL_NONE`-terminated attribute list.
///
/// A trailing unpaired name is ignored, as is anything after `EGL_NONE`.
pub fn attrib_pairs(attribs: &[EGLAttrib]) -> impl Iterator<Item = (EGLAttrib, EGLAttrib)> + '_ {
    attribs
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .take_while(|(name, _)| *name != EGL_NONE as EGLAttrib)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn it_should_tag_core_handles_uniquely() {
        let a = next_core_handle();
        let b = next_core_handle();
        assert_ne!(a, b);
        assert!(is_core_handle(a));
        assert!(!is_core_handle(42));
    }

    #[test]
    fn it_should_stop_attrib_pairs_at_none() {
        let attribs = [
            EGL_TRACK_REFERENCES_KHR as EGLAttrib,
            1,
            EGL_NONE as EGLAttrib,
            0x1234,
            5,
        ];
        let pairs: Vec<_> = attrib_pairs(&attribs).collect();
        assert_eq!(pairs, vec![(EGL_TRACK_REFERENCES_KHR as EGLAttrib, 1)]);
    }
}
