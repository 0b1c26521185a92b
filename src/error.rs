// src/error.rs

//! Error types for the platform core.
//!
//! Every failure is recovered locally into an [`EplError`]. The hook layer turns
//! it into an EGL error code for the application via
//! [`Platform::set_error`](crate::platform::Platform::set_error).

use crate::egl::{self, EGLint};
use thiserror::Error;

/// Broad classes of failure, used by callers that only care about the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The display exists but has not completed initialization.
    NotInitialized,
    /// A handle did not match any tracked object.
    NotFound,
    /// The dependency failed, or may no longer be called.
    Dependency,
    /// An internal invariant would have been broken by the request.
    StateViolation,
    /// Out of memory or another resource.
    Allocation,
    /// The caller passed something malformed.
    BadInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EplError {
    #[error("display is not initialized")]
    NotInitialized,

    #[error("invalid display handle")]
    BadDisplay,

    #[error("invalid surface handle")]
    BadSurface,

    #[error("driver call {call} failed with {}", egl::error_name(*.code))]
    Driver { call: &'static str, code: EGLint },

    #[error("platform is being torn down; the driver can no longer be called")]
    PlatformDestroyed,

    #[error("internal state violation: {0}")]
    StateViolation(String),

    #[error("out of memory")]
    Alloc,

    #[error("invalid parameter: {0}")]
    BadParameter(String),

    #[error("invalid attribute {0:#x}")]
    BadAttribute(i64),

    #[error("unsupported platform interface version {major}.{minor}")]
    Unsupported { major: i32, minor: i32 },

    #[error("driver does not provide required entrypoint {0}")]
    MissingEntrypoint(&'static str),

    #[error("{message}")]
    Impl { code: EGLint, message: String },
}

impl EplError {
    /// The EGL error code the application should observe for this failure.
    pub fn egl_code(&self) -> EGLint {
        match self {
            EplError::NotInitialized => egl::EGL_NOT_INITIALIZED,
            EplError::BadDisplay => egl::EGL_BAD_DISPLAY,
            EplError::BadSurface => egl::EGL_BAD_SURFACE,
            EplError::Driver { code, .. } => *code,
            EplError::PlatformDestroyed => egl::EGL_BAD_ACCESS,
            EplError::StateViolation(_) => egl::EGL_BAD_ACCESS,
            EplError::Alloc => egl::EGL_BAD_ALLOC,
            EplError::BadParameter(_) => egl::EGL_BAD_PARAMETER,
            EplError::BadAttribute(_) => egl::EGL_BAD_ATTRIBUTE,
            EplError::Unsupported { .. } | EplError::MissingEntrypoint(_) => egl::EGL_BAD_ACCESS,
            EplError::Impl { code, .. } => *code,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EplError::NotInitialized => ErrorKind::NotInitialized,
            EplError::BadDisplay | EplError::BadSurface => ErrorKind::NotFound,
            EplError::Driver { .. }
            | EplError::PlatformDestroyed
            | EplError::Unsupported { .. }
            | EplError::MissingEntrypoint(_) => ErrorKind::Dependency,
            EplError::StateViolation(_) => ErrorKind::StateViolation,
            EplError::Alloc => ErrorKind::Allocation,
            EplError::BadParameter(_) | EplError::BadAttribute(_) => ErrorKind::BadInput,
            EplError::Impl { code, .. } if *code == egl::EGL_BAD_ALLOC => ErrorKind::Allocation,
            EplError::Impl { .. } => ErrorKind::BadInput,
        }
    }

    /// Shorthand for implementations reporting their own failures.
    pub fn implementation(code: EGLint, message: impl Into<String>) -> Self {
        EplError::Impl {
            code,
            message: message.into(),
        }
    }
}

pub type Result<T, E = EplError> = std::result::Result<T, E>;
