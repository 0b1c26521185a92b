// src/driver.rs

//! The boundary with the underlying EGL driver (the "dependency") and with the
//! loader's callback table.
//!
//! `EglDriver` mirrors the driver entrypoints the platform core consumes. The
//! methods keep EGL's shape: failures are reported as `false`/`None` and the
//! cause is read back with [`EglDriver::get_error`]. [`crate::platform::Platform`]
//! wraps every call so nothing here is reached once teardown has begun.

use crate::egl::{
    EGLAttrib, EGLenum, EGLint, EglConfig, EglContext, EglDevice, EglDisplay, EglStream,
    EglSurface, NativeHandle, EGL_DEBUG_MSG_CRITICAL_KHR, EGL_DEBUG_MSG_ERROR_KHR,
    EGL_DEBUG_MSG_INFO_KHR, EGL_DEBUG_MSG_WARN_KHR,
};
use serde::{Deserialize, Serialize};

/// Driver entrypoints the core resolves when a platform is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entrypoint {
    QueryString,
    GetPlatformDisplay,
    Initialize,
    Terminate,
    GetError,
    CreatePbufferSurface,
    DestroySurface,
    SwapBuffers,
    ChooseConfig,
    GetConfigAttrib,
    GetConfigs,
    GetCurrentDisplay,
    GetCurrentSurface,
    GetCurrentContext,
    MakeCurrent,
    QueryDeviceAttribEXT,
    QueryDeviceStringEXT,
    QueryDevicesEXT,
    QueryDisplayAttribEXT,
    SwapBuffersWithDamageEXT,
    CreateStreamProducerSurfaceKHR,
}

impl Entrypoint {
    pub const ALL: [Entrypoint; 21] = [
        Entrypoint::QueryString,
        Entrypoint::GetPlatformDisplay,
        Entrypoint::Initialize,
        Entrypoint::Terminate,
        Entrypoint::GetError,
        Entrypoint::CreatePbufferSurface,
        Entrypoint::DestroySurface,
        Entrypoint::SwapBuffers,
        Entrypoint::ChooseConfig,
        Entrypoint::GetConfigAttrib,
        Entrypoint::GetConfigs,
        Entrypoint::GetCurrentDisplay,
        Entrypoint::GetCurrentSurface,
        Entrypoint::GetCurrentContext,
        Entrypoint::MakeCurrent,
        Entrypoint::QueryDeviceAttribEXT,
        Entrypoint::QueryDeviceStringEXT,
        Entrypoint::QueryDevicesEXT,
        Entrypoint::QueryDisplayAttribEXT,
        Entrypoint::SwapBuffersWithDamageEXT,
        Entrypoint::CreateStreamProducerSurfaceKHR,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Entrypoint::QueryString => "eglQueryString",
            Entrypoint::GetPlatformDisplay => "eglGetPlatformDisplay",
            Entrypoint::Initialize => "eglInitialize",
            Entrypoint::Terminate => "eglTerminate",
            Entrypoint::GetError => "eglGetError",
            Entrypoint::CreatePbufferSurface => "eglCreatePbufferSurface",
            Entrypoint::DestroySurface => "eglDestroySurface",
            Entrypoint::SwapBuffers => "eglSwapBuffers",
            Entrypoint::ChooseConfig => "eglChooseConfig",
            Entrypoint::GetConfigAttrib => "eglGetConfigAttrib",
            Entrypoint::GetConfigs => "eglGetConfigs",
            Entrypoint::GetCurrentDisplay => "eglGetCurrentDisplay",
            Entrypoint::GetCurrentSurface => "eglGetCurrentSurface",
            Entrypoint::GetCurrentContext => "eglGetCurrentContext",
            Entrypoint::MakeCurrent => "eglMakeCurrent",
            Entrypoint::QueryDeviceAttribEXT => "eglQueryDeviceAttribEXT",
            Entrypoint::QueryDeviceStringEXT => "eglQueryDeviceStringEXT",
            Entrypoint::QueryDevicesEXT => "eglQueryDevicesEXT",
            Entrypoint::QueryDisplayAttribEXT => "eglQueryDisplayAttribEXT",
            Entrypoint::SwapBuffersWithDamageEXT => "eglSwapBuffersWithDamageEXT",
            Entrypoint::CreateStreamProducerSurfaceKHR => "eglCreateStreamProducerSurfaceKHR",
        }
    }

    /// Entrypoints the core can live without. Missing ones make the matching
    /// passthrough fail instead of failing platform allocation.
    pub fn is_optional(self) -> bool {
        matches!(
            self,
            Entrypoint::SwapBuffersWithDamageEXT | Entrypoint::CreateStreamProducerSurfaceKHR
        )
    }
}

/// The underlying EGL driver.
///
/// Implementations must be callable from any thread. None of these calls may
/// re-enter the platform core for a display whose lock the caller holds.
pub trait EglDriver: Send + Sync {
    /// Whether the driver exposes `entrypoint`. Checked once at allocation.
    fn supports(&self, _entrypoint: Entrypoint) -> bool {
        true
    }

    fn query_string(&self, display: Option<EglDisplay>, name: EGLint) -> Option<String>;

    fn get_platform_display(
        &self,
        platform: EGLenum,
        native: NativeHandle,
        attribs: &[EGLAttrib],
    ) -> Option<EglDisplay>;

    /// Returns the driver's `(major, minor)` version on success.
    fn initialize(&self, display: EglDisplay) -> Option<(EGLint, EGLint)>;

    fn terminate(&self, display: EglDisplay) -> bool;

    /// Returns and clears the calling thread's last error.
    fn get_error(&self) -> EGLint;

    fn create_pbuffer_surface(
        &self,
        display: EglDisplay,
        config: EglConfig,
        attribs: &[EGLint],
    ) -> Option<EglSurface>;

    fn destroy_surface(&self, display: EglDisplay, surface: EglSurface) -> bool;

    fn swap_buffers(&self, display: EglDisplay, surface: EglSurface) -> bool;

    fn swap_buffers_with_damage(
        &self,
        display: EglDisplay,
        surface: EglSurface,
        rects: &[EGLint],
    ) -> bool;

    fn choose_config(
        &self,
        display: EglDisplay,
        attribs: &[EGLint],
        max_configs: usize,
    ) -> Option<Vec<EglConfig>>;

    fn get_config_attrib(
        &self,
        display: EglDisplay,
        config: EglConfig,
        attribute: EGLint,
    ) -> Option<EGLint>;

    fn get_configs(&self, display: EglDisplay, max_configs: usize) -> Option<Vec<EglConfig>>;

    fn get_current_display(&self) -> Option<EglDisplay>;

    /// `readdraw` is `EGL_DRAW` or `EGL_READ`.
    fn get_current_surface(&self, readdraw: EGLint) -> Option<EglSurface>;

    fn get_current_context(&self) -> Option<EglContext>;

    fn make_current(
        &self,
        display: EglDisplay,
        draw: Option<EglSurface>,
        read: Option<EglSurface>,
        context: Option<EglContext>,
    ) -> bool;

    fn query_device_attrib(&self, device: EglDevice, attribute: EGLint) -> Option<EGLAttrib>;

    fn query_device_string(&self, device: EglDevice, name: EGLint) -> Option<String>;

    fn query_devices(&self) -> Option<Vec<EglDevice>>;

    fn query_display_attrib(&self, display: EglDisplay, attribute: EGLint) -> Option<EGLAttrib>;

    fn create_stream_producer_surface(
        &self,
        display: EglDisplay,
        config: EglConfig,
        stream: EglStream,
        attribs: &[EGLint],
    ) -> Option<EglSurface>;
}

/// Severity of a debug message sent through [`PlatformCallbacks::debug_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Critical,
    Error,
    Warn,
    Info,
}

impl MessageLevel {
    /// The matching `EGL_DEBUG_MSG_*_KHR` value.
    pub fn egl_type(self) -> EGLint {
        match self {
            MessageLevel::Critical => EGL_DEBUG_MSG_CRITICAL_KHR,
            MessageLevel::Error => EGL_DEBUG_MSG_ERROR_KHR,
            MessageLevel::Warn => EGL_DEBUG_MSG_WARN_KHR,
            MessageLevel::Info => EGL_DEBUG_MSG_INFO_KHR,
        }
    }

    pub fn log_level(self) -> log::Level {
        match self {
            MessageLevel::Critical | MessageLevel::Error => log::Level::Error,
            MessageLevel::Warn => log::Level::Warn,
            MessageLevel::Info => log::Level::Info,
        }
    }
}

/// Entrypoints the loader hands to the platform library.
pub trait PlatformCallbacks: Send + Sync {
    /// Resolves an EGL or extension function by name. `None` if unknown.
    fn get_proc_address(&self, name: &str) -> Option<usize>;

    /// Forwards a message to the application's `EGL_KHR_debug` callback.
    fn debug_message(&self, level: MessageLevel, message: &str);

    /// Sets the calling thread's EGL error and reports `message` with it.
    fn set_error(&self, error: EGLint, level: MessageLevel, message: &str);
}
