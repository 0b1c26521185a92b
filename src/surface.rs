// src/surface.rs

//! Application-facing window and pixmap surfaces.
//!
//! A [`Surface`] is owned by its display's surface list. Destroying it only
//! marks it deleted: the driver may still have it bound as the current draw or
//! read surface, so the list keeps it until it is neither current nor
//! referenced by a call in flight. [`Display::reap_surfaces`] is where deleted
//! surfaces are finally freed.

use crate::display::Display;
use crate::egl::{next_core_handle, EglSurface, EGL_DRAW, EGL_READ};
use crate::error::Result;
use crate::platform::{ImplData, NewSurface, Platform};
use crate::refcount::Ref;
use bitflags::bitflags;
use log::{debug, trace};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceType {
    Window,
    Pixmap,
}

bitflags! {
    /// Which current-surface slots of the calling thread refer to a surface.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SurfaceBinding: u32 {
        const DRAW = 1 << 0;
        const READ = 1 << 1;
    }
}

struct SurfaceState {
    /// The driver surface currently backing this one. Implementations may
    /// swap it out, e.g. when a window is resized.
    internal: EglSurface,
    deleted: bool,
}

pub struct Surface {
    handle: EglSurface,
    surface_type: SurfaceType,
    data: ImplData,
    state: Mutex<SurfaceState>,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Surface")
            .field("handle", &self.handle)
            .field("type", &self.surface_type)
            .field("internal", &state.internal)
            .field("deleted", &state.deleted)
            .finish_non_exhaustive()
    }
}

impl Surface {
    pub(crate) fn create(surface_type: SurfaceType, new: NewSurface) -> Ref<Surface> {
        Ref::alloc(Surface {
            handle: EglSurface(next_core_handle()),
            surface_type,
            data: new.data,
            state: Mutex::new(SurfaceState {
                internal: new.internal,
                deleted: false,
            }),
        })
    }

    /// The application-facing handle.
    pub fn handle(&self) -> EglSurface {
        self.handle
    }

    pub fn surface_type(&self) -> SurfaceType {
        self.surface_type
    }

    pub fn internal_surface(&self) -> EglSurface {
        self.state.lock().internal
    }

    /// Replaces the backing driver surface. The caller is responsible for
    /// rebinding it with [`Platform::switch_current_surface`] if needed.
    pub fn set_internal_surface(&self, internal: EglSurface) {
        self.state.lock().internal = internal;
    }

    pub fn is_deleted(&self) -> bool {
        self.state.lock().deleted
    }

    pub(crate) fn mark_deleted(&self) {
        self.state.lock().deleted = true;
    }

    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl Display {
    /// Finds a live tracked surface by its application handle.
    ///
    /// `None` is not an error: pbuffers and stream surfaces belong to the
    /// driver and are never tracked. The display must be locked.
    pub fn acquire_surface(&self, handle: EglSurface) -> Option<Ref<Surface>> {
        self.state()
            .surfaces
            .iter()
            .find(|s| s.handle() == handle && !s.is_deleted())
            .cloned()
    }

    /// Gives back a surface from [`Display::acquire_surface`], freeing it if
    /// it was deleted in the meantime and nothing else needs it.
    pub fn release_surface(&self, surface: Ref<Surface>) {
        let deleted = surface.is_deleted();
        drop(surface);
        if deleted {
            self.reap_surfaces();
        }
    }

    pub(crate) fn add_surface(&self, surface: Ref<Surface>) {
        trace!(
            "Display {:?}: tracking surface {:?}",
            self.handle(),
            surface.handle()
        );
        self.state().surfaces.push(surface);
    }

    /// Number of tracked surfaces, deleted ones included.
    pub fn surface_count(&self) -> usize {
        self.state().surfaces.len()
    }

    /// Frees deleted surfaces that are referenced only by the list and are
    /// not bound to the calling thread.
    pub(crate) fn reap_surfaces(&self) {
        // Cloning bumps each candidate's count to 2.
        let candidates: Vec<Ref<Surface>> = self
            .state()
            .surfaces
            .iter()
            .filter(|s| s.is_deleted() && Ref::refcount(*s) == 1)
            .cloned()
            .collect();
        if candidates.is_empty() {
            return;
        }

        let (draw, read) = self.platform().current_surfaces(self);
        let mut freed = Vec::new();
        {
            let mut state = self.state();
            for surface in candidates {
                let internal = Some(surface.internal_surface());
                if internal == draw || internal == read {
                    trace!("Surface {:?} is still current", surface.handle());
                    continue;
                }
                if Ref::refcount(&surface) == 2 {
                    state.surfaces.retain(|s| !Ref::ptr_eq(s, &surface));
                    freed.push(surface);
                }
            }
        }

        let platform = self.platform();
        for surface in &freed {
            debug!("Freeing deleted surface {:?}", surface.handle());
            platform.implementation().free_surface(platform, self, surface);
        }
    }
}

impl Platform {
    /// The driver surfaces bound to the calling thread, if its current display
    /// is `display`'s internal display. Driver errors count as "nothing bound".
    pub(crate) fn current_surfaces(
        &self,
        display: &Display,
    ) -> (Option<EglSurface>, Option<EglSurface>) {
        let same_display = matches!(
            self.current_display(),
            Ok(Some(current)) if current == display.internal_display()
        );
        if !same_display {
            return (None, None);
        }
        (
            self.current_surface(EGL_DRAW).ok().flatten(),
            self.current_surface(EGL_READ).ok().flatten(),
        )
    }

    /// Replaces `old` with `new` in the calling thread's current binding.
    ///
    /// Nothing happens unless a context is current on `display`'s internal
    /// display and `old` is bound as the draw or read surface. Both slots are
    /// rebound with one `eglMakeCurrent`; if that fails the old binding stays
    /// in place and the driver's error is returned. Returns the slots that
    /// were switched.
    pub fn switch_current_surface(
        &self,
        display: &Display,
        old: EglSurface,
        new: EglSurface,
    ) -> Result<SurfaceBinding> {
        let Some(context) = self.current_context()? else {
            return Ok(SurfaceBinding::empty());
        };
        if self.current_display()? != Some(display.internal_display()) {
            return Ok(SurfaceBinding::empty());
        }

        let draw = self.current_surface(EGL_DRAW)?;
        let read = self.current_surface(EGL_READ)?;
        let mut binding = SurfaceBinding::empty();
        binding.set(SurfaceBinding::DRAW, draw == Some(old));
        binding.set(SurfaceBinding::READ, read == Some(old));
        if binding.is_empty() {
            return Ok(binding);
        }

        let new_draw = if binding.contains(SurfaceBinding::DRAW) { Some(new) } else { draw };
        let new_read = if binding.contains(SurfaceBinding::READ) { Some(new) } else { read };
        self.make_current(display.internal_display(), new_draw, new_read, Some(context))?;
        debug!("Switched current {:?} from {:?} to {:?}", binding, old, new);

        display.reap_surfaces();
        Ok(binding)
    }
}
