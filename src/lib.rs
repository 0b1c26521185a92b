// src/lib.rs

//! Bookkeeping core of an EGL external platform library.
//!
//! The crate tracks the displays and surfaces handed to an application, maps
//! them to the driver's own handles, and manages their lifecycle across
//! threads: reference counting, `EGL_KHR_display_reference` semantics and
//! deferred termination. Everything that depends on the windowing system is
//! delegated to a [`platform::PlatformImpl`].
//!
//! Module overview:
//! - [`refcount`]: intrusive reference counting
//! - [`platform`]: the platform instance and its internal display registry
//! - [`display`]: application-facing displays and the global display list
//! - [`surface`]: application-facing surfaces
//! - [`hooks`]: the entry points the loader calls

pub mod config;
pub mod display;
pub mod driver;
pub mod egl;
pub mod error;
pub mod hooks;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod platform;
pub mod refcount;
pub mod surface;

pub use display::{Display, DisplayGuard, DisplayPhase};
pub use driver::{EglDriver, Entrypoint, MessageLevel, PlatformCallbacks};
pub use error::{EplError, ErrorKind, Result};
pub use platform::{Platform, PlatformImpl};
pub use refcount::{Ref, WeakRef};
pub use surface::{Surface, SurfaceBinding, SurfaceType};
