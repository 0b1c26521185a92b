// src/hooks.rs

//! Entry points the loader dispatches application EGL calls to.
//!
//! Each hook takes the platform that owns the call and the application's
//! handles. Failures are reported to the application through
//! [`Platform::set_error`] before being returned, so a loader shim only has to
//! turn the `Result` into the EGL return value.
//!
//! Display-taking hooks follow one protocol: acquire the display (reference,
//! lock, use count), do the work, drop the guard.

use crate::display::{list, Display, DisplayGuard, LockedDisplay};
use crate::egl::{
    attrib_pairs, is_core_handle, EGLAttrib, EGLenum, EGLint, EglConfig, EglDisplay, EglStream,
    EglSurface, NativeHandle, EGL_FALSE, EGL_NONE, EGL_TRACK_REFERENCES_KHR, EGL_TRUE,
};
use crate::error::{EplError, Result};
use crate::platform::Platform;
use crate::refcount::Ref;
use crate::surface::{Surface, SurfaceType};
use log::{debug, trace};

fn report<T>(platform: &Platform, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        platform.set_error(e);
    }
    result
}

fn belongs_to(display: &Display, platform: &Platform) -> bool {
    std::ptr::eq(&**display.platform(), platform)
}

/// Acquires an initialized display owned by `platform`.
fn acquire(platform: &Platform, handle: EglDisplay) -> Result<DisplayGuard> {
    let display = DisplayGuard::acquire(handle)?;
    if !belongs_to(&display, platform) {
        return Err(EplError::BadDisplay);
    }
    Ok(display)
}

/// Locks a display owned by `platform`, initialized or not.
fn acquire_locked(platform: &Platform, handle: EglDisplay) -> Result<LockedDisplay> {
    let display = LockedDisplay::acquire(handle)?;
    if !belongs_to(&display, platform) {
        return Err(EplError::BadDisplay);
    }
    Ok(display)
}

/// Splits `EGL_TRACK_REFERENCES_KHR` out of a display attribute list.
///
/// Returns the flag and the remaining attributes, `EGL_NONE` terminated.
fn split_track_references(attribs: &[EGLAttrib]) -> Result<(bool, Vec<EGLAttrib>)> {
    let mut track = false;
    let mut rest = Vec::with_capacity(attribs.len() + 1);
    for (name, value) in attrib_pairs(attribs) {
        if name == EGL_TRACK_REFERENCES_KHR as EGLAttrib {
            track = match value {
                v if v == EGL_TRUE as EGLAttrib => true,
                v if v == EGL_FALSE as EGLAttrib => false,
                _ => return Err(EplError::BadAttribute(name as i64)),
            };
        } else {
            rest.extend_from_slice(&[name, value]);
        }
    }
    rest.push(EGL_NONE as EGLAttrib);
    Ok((track, rest))
}

// --- Displays ---

/// `eglGetPlatformDisplay`: returns the existing equivalent display, or
/// creates a new one.
pub fn get_platform_display(
    platform: &Ref<Platform>,
    platform_enum: EGLenum,
    native: NativeHandle,
    attribs: &[EGLAttrib],
) -> Result<EglDisplay> {
    report(
        platform,
        get_platform_display_inner(platform, platform_enum, native, attribs),
    )
}

fn get_platform_display_inner(
    platform: &Ref<Platform>,
    platform_enum: EGLenum,
    native: NativeHandle,
    attribs: &[EGLAttrib],
) -> Result<EglDisplay> {
    if platform.is_destroyed() {
        return Err(EplError::PlatformDestroyed);
    }
    if !platform.is_ready() {
        return Err(EplError::StateViolation(
            "platform setup has not finished".to_string(),
        ));
    }

    let (track, attribs) = split_track_references(attribs)?;
    let track = track && platform.allow_track_references();
    let imp = platform.implementation();

    let mut displays = list::lock();
    let existing = displays
        .iter()
        .find(|d| {
            belongs_to(d, platform)
                && d.platform_enum() == platform_enum
                && d.track_references() == track
                && imp.is_same_display(platform, d, platform_enum, native, &attribs)
        })
        .map(|d| d.handle());
    if let Some(handle) = existing {
        trace!("Reusing display {:?}", handle);
        return Ok(handle);
    }

    let new = imp.get_platform_display(platform, platform_enum, native, &attribs)?;
    let display = Display::create(platform, platform_enum, native, track, new);
    let handle = display.handle();
    displays.push(display);
    Ok(handle)
}

/// `eglInitialize`. Returns the version reported to the application.
pub fn initialize(platform: &Platform, dpy: EglDisplay) -> Result<(EGLint, EGLint)> {
    report(platform, initialize_inner(platform, dpy))
}

fn initialize_inner(platform: &Platform, dpy: EglDisplay) -> Result<(EGLint, EGLint)> {
    let display = acquire_locked(platform, dpy)?;
    let (initialized, init_count) = {
        let state = display.state();
        (state.initialized, state.init_count)
    };

    if init_count == 0 {
        if initialized {
            debug!("eglInitialize on {:?} cancels a pending terminate", dpy);
        } else {
            let (major, minor) = platform
                .implementation()
                .initialize_display(platform, &display)?;
            let mut state = display.state();
            state.major = major;
            state.minor = minor;
            state.initialized = true;
        }
        display.state().init_count = 1;
    } else if display.track_references() {
        display.state().init_count += 1;
    }

    Ok(display.version())
}

/// `eglTerminate`. Terminating a display that isn't initialized succeeds and
/// does nothing.
pub fn terminate(platform: &Platform, dpy: EglDisplay) -> Result<()> {
    report(platform, terminate_inner(platform, dpy))
}

fn terminate_inner(platform: &Platform, dpy: EglDisplay) -> Result<()> {
    let display = acquire_locked(platform, dpy)?;
    let terminate_now = {
        let mut state = display.state();
        if !state.initialized || state.init_count == 0 {
            return Ok(());
        }
        if display.track_references() {
            state.init_count -= 1;
        } else {
            state.init_count = 0;
        }
        if state.init_count > 0 {
            return Ok(());
        }
        state.use_count == 0
    };

    if terminate_now {
        display.terminate_now();
    } else {
        debug!("Display {:?} in use, deferring terminate", dpy);
    }
    Ok(())
}

/// `eglQueryString`. `dpy == None` asks for client strings.
pub fn query_string(platform: &Platform, dpy: Option<EglDisplay>, name: EGLint) -> Result<String> {
    report(platform, query_string_inner(platform, dpy, name))
}

fn query_string_inner(platform: &Platform, dpy: Option<EglDisplay>, name: EGLint) -> Result<String> {
    let imp = platform.implementation();
    let Some(dpy) = dpy else {
        return imp
            .query_string(platform, None, name)
            .ok_or_else(|| EplError::BadParameter(format!("string name {:#x}", name)));
    };

    let display = acquire(platform, dpy)?;
    match imp.query_string(platform, Some(&display), name) {
        Some(s) => Ok(s),
        None => platform.query_string(Some(display.internal_display()), name),
    }
}

/// `eglQueryDisplayAttribEXT`.
pub fn query_display_attrib(
    platform: &Platform,
    dpy: EglDisplay,
    attribute: EGLint,
) -> Result<EGLAttrib> {
    report(platform, query_display_attrib_inner(platform, dpy, attribute))
}

fn query_display_attrib_inner(
    platform: &Platform,
    dpy: EglDisplay,
    attribute: EGLint,
) -> Result<EGLAttrib> {
    if attribute == EGL_TRACK_REFERENCES_KHR {
        let display = acquire_locked(platform, dpy)?;
        return Ok(display.track_references() as EGLAttrib);
    }
    let display = acquire(platform, dpy)?;
    platform.query_display_attrib(display.internal_display(), attribute)
}

// --- Surfaces ---

fn create_tracked_surface(
    platform: &Platform,
    dpy: EglDisplay,
    surface_type: SurfaceType,
    config: EglConfig,
    native: NativeHandle,
    attribs: &[EGLAttrib],
) -> Result<EglSurface> {
    let display = acquire(platform, dpy)?;
    let imp = platform.implementation();
    let new = match surface_type {
        SurfaceType::Window => imp.create_window_surface(platform, &display, config, native, attribs)?,
        SurfaceType::Pixmap => imp.create_pixmap_surface(platform, &display, config, native, attribs)?,
    };
    let surface = Surface::create(surface_type, new);
    let handle = surface.handle();
    debug!(
        "Created {:?} surface {:?} on {:?}",
        surface_type, handle, dpy
    );
    display.add_surface(surface);
    Ok(handle)
}

/// `eglCreatePlatformWindowSurface`.
pub fn create_window_surface(
    platform: &Platform,
    dpy: EglDisplay,
    config: EglConfig,
    native_window: NativeHandle,
    attribs: &[EGLAttrib],
) -> Result<EglSurface> {
    report(
        platform,
        create_tracked_surface(platform, dpy, SurfaceType::Window, config, native_window, attribs),
    )
}

/// `eglCreatePlatformPixmapSurface`.
pub fn create_pixmap_surface(
    platform: &Platform,
    dpy: EglDisplay,
    config: EglConfig,
    native_pixmap: NativeHandle,
    attribs: &[EGLAttrib],
) -> Result<EglSurface> {
    report(
        platform,
        create_tracked_surface(platform, dpy, SurfaceType::Pixmap, config, native_pixmap, attribs),
    )
}

/// `eglCreatePbufferSurface`. The driver's handle is returned as is.
pub fn create_pbuffer_surface(
    platform: &Platform,
    dpy: EglDisplay,
    config: EglConfig,
    attribs: &[EGLint],
) -> Result<EglSurface> {
    report(
        platform,
        acquire(platform, dpy).and_then(|display| {
            platform.create_pbuffer_surface(display.internal_display(), config, attribs)
        }),
    )
}

/// `eglCreateStreamProducerSurfaceKHR`. Untracked, like pbuffers.
pub fn create_stream_producer_surface(
    platform: &Platform,
    dpy: EglDisplay,
    config: EglConfig,
    stream: EglStream,
    attribs: &[EGLint],
) -> Result<EglSurface> {
    report(
        platform,
        acquire(platform, dpy).and_then(|display| {
            platform.create_stream_producer_surface(
                display.internal_display(),
                config,
                stream,
                attribs,
            )
        }),
    )
}

/// `eglDestroySurface`.
///
/// A tracked surface is marked deleted and handed to the implementation, but
/// stays allocated while it is still current.
pub fn destroy_surface(platform: &Platform, dpy: EglDisplay, surface: EglSurface) -> Result<()> {
    report(platform, destroy_surface_inner(platform, dpy, surface))
}

fn destroy_surface_inner(platform: &Platform, dpy: EglDisplay, handle: EglSurface) -> Result<()> {
    let display = acquire(platform, dpy)?;
    match display.acquire_surface(handle) {
        Some(surface) => {
            debug!("Destroying surface {:?}", handle);
            surface.mark_deleted();
            platform
                .implementation()
                .destroy_surface(platform, &display, &surface);
            display.release_surface(surface);
            Ok(())
        }
        None if is_core_handle(handle.as_raw()) => Err(EplError::BadSurface),
        None => platform.destroy_surface(display.internal_display(), handle),
    }
}

/// `eglSwapBuffers`, or `eglSwapBuffersWithDamageEXT` when `damage` is set.
pub fn swap_buffers(
    platform: &Platform,
    dpy: EglDisplay,
    surface: EglSurface,
    damage: Option<&[EGLint]>,
) -> Result<()> {
    report(platform, swap_buffers_inner(platform, dpy, surface, damage))
}

pub fn swap_buffers_with_damage(
    platform: &Platform,
    dpy: EglDisplay,
    surface: EglSurface,
    rects: &[EGLint],
) -> Result<()> {
    swap_buffers(platform, dpy, surface, Some(rects))
}

fn swap_buffers_inner(
    platform: &Platform,
    dpy: EglDisplay,
    handle: EglSurface,
    damage: Option<&[EGLint]>,
) -> Result<()> {
    let display = acquire(platform, dpy)?;
    match display.acquire_surface(handle) {
        Some(surface) => {
            let result = platform
                .implementation()
                .swap_buffers(platform, &display, &surface, damage);
            display.release_surface(surface);
            result
        }
        None if is_core_handle(handle.as_raw()) => Err(EplError::BadSurface),
        None => match damage {
            Some(rects) => {
                platform.swap_buffers_with_damage(display.internal_display(), handle, rects)
            }
            None => platform.swap_buffers(display.internal_display(), handle),
        },
    }
}

// --- Configs ---

/// `eglGetConfigs`.
pub fn get_configs(platform: &Platform, dpy: EglDisplay, max_configs: usize) -> Result<Vec<EglConfig>> {
    report(
        platform,
        acquire(platform, dpy)
            .and_then(|display| platform.get_configs(display.internal_display(), max_configs)),
    )
}

/// `eglChooseConfig`.
pub fn choose_config(
    platform: &Platform,
    dpy: EglDisplay,
    attribs: &[EGLint],
    max_configs: usize,
) -> Result<Vec<EglConfig>> {
    report(
        platform,
        acquire(platform, dpy).and_then(|display| {
            platform.choose_config(display.internal_display(), attribs, max_configs)
        }),
    )
}

/// `eglGetConfigAttrib`.
pub fn get_config_attrib(
    platform: &Platform,
    dpy: EglDisplay,
    config: EglConfig,
    attribute: EGLint,
) -> Result<EGLint> {
    report(
        platform,
        acquire(platform, dpy).and_then(|display| {
            platform.get_config_attrib(display.internal_display(), config, attribute)
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn it_should_strip_track_references_from_attribs() {
        let attribs = [
            0x1000,
            7,
            EGL_TRACK_REFERENCES_KHR as EGLAttrib,
            EGL_TRUE as EGLAttrib,
            EGL_NONE as EGLAttrib,
        ];
        let (track, rest) = split_track_references(&attribs).unwrap();
        assert!(track);
        assert_eq!(rest, vec![0x1000, 7, EGL_NONE as EGLAttrib]);
    }

    #[test]
    fn it_should_reject_other_track_references_values() {
        let attribs = [
            EGL_TRACK_REFERENCES_KHR as EGLAttrib,
            2,
            EGL_NONE as EGLAttrib,
        ];
        let err = split_track_references(&attribs).unwrap_err();
        assert_eq!(err, EplError::BadAttribute(EGL_TRACK_REFERENCES_KHR as i64));
    }

    #[test]
    fn it_should_leave_an_empty_attrib_list_terminated() {
        let (track, rest) = split_track_references(&[]).unwrap();
        assert!(!track);
        assert_eq!(rest, vec![EGL_NONE as EGLAttrib]);
    }
}
