// tests/surface_lifecycle.rs

use egl_platform_base::config::Config;
use egl_platform_base::display::list;
use egl_platform_base::egl::{
    EglConfig, EglContext, EglDisplay, EglStream, EglSurface, NativeHandle, EGL_BAD_ACCESS,
    EGL_BAD_MATCH, EGL_BAD_NATIVE_WINDOW, EGL_BAD_SURFACE, EGL_NONE,
};
use egl_platform_base::hooks;
use egl_platform_base::mock::{ImplCounters, MockDriver, MockPlatform, MockSurfaceData};
use egl_platform_base::{Display, Entrypoint, EplError, SurfaceBinding, SurfaceType};
use test_log::test;

const CONFIG: EglConfig = EglConfig(1);
const CONTEXT: EglContext = EglContext(0x77);

fn window(mock: &MockPlatform, dpy: EglDisplay, native: usize) -> EglSurface {
    hooks::create_window_surface(&mock.platform, dpy, CONFIG, NativeHandle(native), &[])
        .unwrap()
}

/// Binds the driver surface behind `surface` as draw and read.
fn make_current(mock: &MockPlatform, dpy: EglDisplay, surface: EglSurface) {
    let display = Display::acquire(dpy).unwrap();
    let internal = display.acquire_surface(surface).unwrap();
    mock.platform
        .make_current(
            display.internal_display(),
            Some(internal.internal_surface()),
            Some(internal.internal_surface()),
            Some(CONTEXT),
        )
        .unwrap();
    display.release_surface(internal);
}

#[test]
fn it_should_track_window_and_pixmap_surfaces() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(200, &[]).unwrap();

    let win = window(&mock, dpy, 0x10);
    let pix =
        hooks::create_pixmap_surface(&mock.platform, dpy, CONFIG, NativeHandle(0x20), &[]).unwrap();

    let display = Display::acquire(dpy).unwrap();
    assert_eq!(display.surface_count(), 2);
    let surface = display.acquire_surface(pix).unwrap();
    assert_eq!(surface.surface_type(), SurfaceType::Pixmap);
    assert_eq!(surface.data::<MockSurfaceData>().unwrap().native.as_raw(), 0x20);
    assert!(mock.driver.is_surface_live(surface.internal_surface()));
    display.release_surface(surface);
    assert_ne!(win, pix);
}

#[test]
fn it_should_report_implementation_failures() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(201, &[]).unwrap();
    let err = hooks::create_window_surface(&mock.platform, dpy, CONFIG, NativeHandle(0), &[])
        .unwrap_err();
    assert_eq!(err.egl_code(), EGL_BAD_NATIVE_WINDOW);
    assert_eq!(mock.callbacks.last_error(), Some(EGL_BAD_NATIVE_WINDOW));
    assert_eq!(list::find(dpy).unwrap().surface_count(), 0);
}

#[test]
fn it_should_route_swaps_by_surface_kind() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(202, &[]).unwrap();
    let win = window(&mock, dpy, 0x10);
    let pbuffer = hooks::create_pbuffer_surface(&mock.platform, dpy, CONFIG, &[EGL_NONE]).unwrap();

    hooks::swap_buffers(&mock.platform, dpy, win, None).unwrap();
    hooks::swap_buffers_with_damage(&mock.platform, dpy, win, &[0, 0, 4, 4]).unwrap();
    hooks::swap_buffers(&mock.platform, dpy, pbuffer, None).unwrap();

    assert_eq!(ImplCounters::get(&mock.counters.swaps), 2);
    assert_eq!(mock.driver.swapped().len(), 3);
    assert_eq!(mock.driver.swapped()[2], pbuffer);
}

#[test]
fn it_should_destroy_untracked_surfaces_in_the_driver() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(203, &[]).unwrap();
    let pbuffer = hooks::create_pbuffer_surface(&mock.platform, dpy, CONFIG, &[EGL_NONE]).unwrap();

    hooks::destroy_surface(&mock.platform, dpy, pbuffer).unwrap();
    assert_eq!(mock.driver.destroyed_surfaces(), vec![pbuffer]);
    assert_eq!(ImplCounters::get(&mock.counters.surfaces_destroyed), 0);
}

#[test]
fn it_should_free_a_destroyed_surface_that_is_not_current() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(204, &[]).unwrap();
    let win = window(&mock, dpy, 0x10);

    hooks::destroy_surface(&mock.platform, dpy, win).unwrap();
    assert_eq!(ImplCounters::get(&mock.counters.surfaces_destroyed), 1);
    assert_eq!(ImplCounters::get(&mock.counters.surfaces_freed), 1);
    assert_eq!(list::find(dpy).unwrap().surface_count(), 0);

    let err = hooks::destroy_surface(&mock.platform, dpy, win).unwrap_err();
    assert_eq!(err, EplError::BadSurface);
    assert_eq!(mock.callbacks.last_error(), Some(EGL_BAD_SURFACE));
}

#[test]
fn it_should_keep_a_deleted_surface_while_it_is_current() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(205, &[]).unwrap();
    let win = window(&mock, dpy, 0x10);
    let spare = window(&mock, dpy, 0x11);
    make_current(&mock, dpy, win);

    let display = Display::acquire(dpy).unwrap();
    let old = display.acquire_surface(win).unwrap();
    let old_internal = old.internal_surface();
    let new_internal = display.acquire_surface(spare).unwrap().internal_surface();
    display.release_surface(old);
    drop(display);

    hooks::destroy_surface(&mock.platform, dpy, win).unwrap();
    assert_eq!(ImplCounters::get(&mock.counters.surfaces_destroyed), 1);
    assert_eq!(ImplCounters::get(&mock.counters.surfaces_freed), 0);

    let display = Display::acquire(dpy).unwrap();
    assert!(display.acquire_surface(win).is_none());
    assert_eq!(display.surface_count(), 2);

    let switched = mock
        .platform
        .switch_current_surface(&display, old_internal, new_internal)
        .unwrap();
    assert_eq!(switched, SurfaceBinding::DRAW | SurfaceBinding::READ);
    assert_eq!(ImplCounters::get(&mock.counters.surfaces_freed), 1);
    assert_eq!(display.surface_count(), 1);

    let binding = mock.driver.current_binding().unwrap();
    assert_eq!(binding.draw, Some(new_internal));
    assert_eq!(binding.context, CONTEXT);
}

#[test]
fn it_should_leave_the_binding_alone_when_make_current_fails() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(206, &[]).unwrap();
    let win = window(&mock, dpy, 0x10);
    make_current(&mock, dpy, win);
    let before = mock.driver.current_binding();

    let display = Display::acquire(dpy).unwrap();
    let old = display.acquire_surface(win).unwrap();
    mock.driver.set_fail_make_current(true);
    let err = mock
        .platform
        .switch_current_surface(&display, old.internal_surface(), EglSurface(0x999))
        .unwrap_err();
    assert_eq!(err.egl_code(), EGL_BAD_MATCH);
    assert_eq!(mock.driver.current_binding(), before);
    display.release_surface(old);
}

#[test]
fn it_should_not_switch_when_nothing_is_current() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(207, &[]).unwrap();
    let win = window(&mock, dpy, 0x10);

    let display = Display::acquire(dpy).unwrap();
    let surface = display.acquire_surface(win).unwrap();
    let switched = mock
        .platform
        .switch_current_surface(&display, surface.internal_surface(), EglSurface(0x999))
        .unwrap();
    assert!(switched.is_empty());
    assert_eq!(mock.driver.make_current_calls(), 0);
    display.release_surface(surface);
}

#[test]
fn it_should_wait_for_in_flight_users_before_freeing() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(208, &[]).unwrap();
    let win = window(&mock, dpy, 0x10);

    let display = Display::acquire(dpy).unwrap();
    let in_flight = display.acquire_surface(win).unwrap();
    hooks::destroy_surface(&mock.platform, dpy, win).unwrap();
    assert!(in_flight.is_deleted());
    assert_eq!(ImplCounters::get(&mock.counters.surfaces_freed), 0);

    display.release_surface(in_flight);
    assert_eq!(ImplCounters::get(&mock.counters.surfaces_freed), 1);
}

#[test]
fn it_should_destroy_every_surface_on_terminate() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(209, &[]).unwrap();
    window(&mock, dpy, 0x10);
    window(&mock, dpy, 0x11);

    hooks::terminate(&mock.platform, dpy).unwrap();
    assert_eq!(ImplCounters::get(&mock.counters.surfaces_destroyed), 2);
    assert_eq!(ImplCounters::get(&mock.counters.surfaces_freed), 2);
    assert_eq!(list::find(dpy).unwrap().surface_count(), 0);
    assert_eq!(mock.driver.destroyed_surfaces().len(), 2);
}

#[test]
fn it_should_leave_stream_producer_surfaces_untracked() {
    let mock = MockPlatform::new().unwrap();
    let dpy = mock.initialized_display(210, &[]).unwrap();

    let stream = hooks::create_stream_producer_surface(
        &mock.platform,
        dpy,
        CONFIG,
        EglStream(0x5),
        &[EGL_NONE],
    )
    .unwrap();
    assert!(mock.driver.is_surface_live(stream));
    assert!(Display::acquire(dpy).unwrap().acquire_surface(stream).is_none());
    assert_eq!(list::find(dpy).unwrap().surface_count(), 0);

    hooks::destroy_surface(&mock.platform, dpy, stream).unwrap();
    assert_eq!(mock.driver.destroyed_surfaces(), vec![stream]);
}

#[test]
fn it_should_refuse_streams_when_the_driver_lacks_them() {
    let driver = MockDriver::new().without(Entrypoint::CreateStreamProducerSurfaceKHR);
    let mock = MockPlatform::with_driver(driver, &Config::default()).unwrap();
    let dpy = mock.initialized_display(211, &[]).unwrap();
    let calls = mock.driver.calls();

    let err = hooks::create_stream_producer_surface(
        &mock.platform,
        dpy,
        CONFIG,
        EglStream(0x5),
        &[EGL_NONE],
    )
    .unwrap_err();
    assert_eq!(
        err,
        EplError::Driver {
            call: "eglCreateStreamProducerSurfaceKHR",
            code: EGL_BAD_ACCESS,
        }
    );
    assert_eq!(mock.callbacks.last_error(), Some(EGL_BAD_ACCESS));
    assert_eq!(mock.driver.calls(), calls);
}
