// src/platform/tests.rs

use super::*;
use crate::config::{Config, DisplayConfig};
use crate::driver::{Entrypoint, MessageLevel};
use crate::egl::{
    EGLAttrib, EglConfig, EglStream, EGL_BAD_ACCESS, EGL_BAD_ALLOC, EGL_BAD_DISPLAY, EGL_NONE,
    EGL_PLATFORM_X11_KHR, EGL_TRACK_REFERENCES_KHR, EGL_TRUE,
};
use crate::error::{EplError, ErrorKind};
use crate::mock::{ImplCounters, MockCallbacks, MockDriver, MockImpl, MockPlatform, MOCK_DEVICE, MOCK_VERSION};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use test_log::test;

fn allocate(driver: MockDriver, major: i32, minor: i32) -> Result<Ref<Platform>> {
    Platform::allocate_with_config(
        major,
        minor,
        Arc::new(driver),
        Arc::new(MockCallbacks::new()),
        EGL_PLATFORM_X11_KHR,
        Box::new(MockImpl::default()),
        &Config::default(),
    )
}

#[test]
fn it_should_reject_unsupported_interface_versions() {
    let err = allocate(MockDriver::new(), 2, 0).unwrap_err();
    assert_eq!(err, EplError::Unsupported { major: 2, minor: 0 });

    let err = allocate(MockDriver::new(), 1, 2).unwrap_err();
    assert_eq!(err, EplError::Unsupported { major: 1, minor: 2 });

    assert!(allocate(MockDriver::new(), 1, 0).is_ok());
}

#[test]
fn it_should_fail_allocation_when_a_required_entrypoint_is_missing() {
    let err = allocate(MockDriver::new().without(Entrypoint::MakeCurrent), 1, 1).unwrap_err();
    assert_eq!(err, EplError::MissingEntrypoint("eglMakeCurrent"));
    assert_eq!(err.kind(), ErrorKind::Dependency);
}

#[test]
fn it_should_record_missing_optional_entrypoints_as_extensions() {
    let platform = allocate(
        MockDriver::new().without(Entrypoint::SwapBuffersWithDamageEXT),
        1,
        1,
    )
    .unwrap();
    let exts = platform.extensions();
    assert!(!exts.swap_buffers_with_damage);
    assert!(exts.stream_producer_surface);
    assert!(!exts.display_reference);
}

#[test]
fn it_should_detect_native_display_reference_unless_simulation_is_forced() {
    let native = allocate(MockDriver::with_display_reference(), 1, 1).unwrap();
    assert!(native.extensions().display_reference);

    let config = Config {
        display: DisplayConfig {
            simulate_display_reference: true,
            ..DisplayConfig::default()
        },
        ..Config::default()
    };
    let simulated = MockPlatform::with_driver(MockDriver::with_display_reference(), &config).unwrap();
    assert!(!simulated.platform.extensions().display_reference);
}

#[test]
fn it_should_not_be_ready_until_init_finish() {
    let platform = allocate(MockDriver::new(), 1, 1).unwrap();
    assert!(!platform.is_ready());
    platform.init_finish();
    assert!(platform.is_ready());
    platform.teardown();
    assert!(!platform.is_ready());
}

#[test]
fn it_should_share_internal_displays_by_handle() {
    let mock = MockPlatform::new().unwrap();
    let a = mock.platform.get_device_internal_display(MOCK_DEVICE).unwrap();
    let b = mock.platform.get_device_internal_display(MOCK_DEVICE).unwrap();
    assert!(Ref::ptr_eq(&a, &b));
    assert_eq!(mock.platform.internal_display_count(), 1);

    drop(a);
    drop(b);
    assert_eq!(mock.platform.internal_display_count(), 0);
}

#[test]
fn it_should_simulate_display_reference_with_one_driver_initialize() {
    let mock = MockPlatform::new().unwrap();
    let platform = &mock.platform;
    let idpy = platform.get_device_internal_display(MOCK_DEVICE).unwrap();

    assert_eq!(platform.initialize_internal_display(&idpy).unwrap(), MOCK_VERSION);
    assert_eq!(platform.initialize_internal_display(&idpy).unwrap(), MOCK_VERSION);
    assert_eq!(idpy.init_count(), 2);
    assert_eq!(mock.driver.initialize_calls(), 1);

    platform.terminate_internal_display(&idpy).unwrap();
    assert_eq!(mock.driver.terminate_calls(), 0);
    platform.terminate_internal_display(&idpy).unwrap();
    assert_eq!(mock.driver.terminate_calls(), 1);
    assert_eq!(idpy.init_count(), 0);
    assert_eq!(idpy.version(), None);

    let err = platform.terminate_internal_display(&idpy).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateViolation);
    assert_eq!(mock.driver.terminate_calls(), 1);
}

#[test]
fn it_should_ask_for_reference_tracking_only_when_the_driver_has_it() {
    let native = MockPlatform::with_driver(MockDriver::with_display_reference(), &Config::default()).unwrap();
    native.platform.get_device_internal_display(MOCK_DEVICE).unwrap();
    assert_eq!(
        native.driver.last_display_attribs(),
        vec![
            EGL_TRACK_REFERENCES_KHR as EGLAttrib,
            EGL_TRUE as EGLAttrib,
            EGL_NONE as EGLAttrib,
        ]
    );

    let simulated = MockPlatform::new().unwrap();
    simulated.platform.get_device_internal_display(MOCK_DEVICE).unwrap();
    assert_eq!(
        simulated.driver.last_display_attribs(),
        vec![EGL_NONE as EGLAttrib]
    );
}

#[test]
fn it_should_refuse_stream_surfaces_without_the_driver_entrypoint() {
    let mock = MockPlatform::with_driver(
        MockDriver::new().without(Entrypoint::CreateStreamProducerSurfaceKHR),
        &Config::default(),
    )
    .unwrap();
    let idpy = mock.platform.get_device_internal_display(MOCK_DEVICE).unwrap();
    mock.platform.initialize_internal_display(&idpy).unwrap();
    let calls = mock.driver.calls();

    let err = mock
        .platform
        .create_stream_producer_surface(idpy.handle(), EglConfig(1), EglStream(0x5), &[EGL_NONE])
        .unwrap_err();
    assert_eq!(err.egl_code(), EGL_BAD_ACCESS);
    assert_eq!(err.kind(), ErrorKind::Dependency);
    assert_eq!(mock.driver.calls(), calls);
}

#[test]
fn it_should_pass_every_call_through_with_native_display_reference() {
    let mock = MockPlatform::with_driver(MockDriver::with_display_reference(), &Config::default()).unwrap();
    let platform = &mock.platform;
    let idpy = platform.get_device_internal_display(MOCK_DEVICE).unwrap();

    platform.initialize_internal_display(&idpy).unwrap();
    platform.initialize_internal_display(&idpy).unwrap();
    assert_eq!(mock.driver.initialize_calls(), 2);
    assert_eq!(mock.driver.init_count(idpy.handle()), 2);

    platform.terminate_internal_display(&idpy).unwrap();
    platform.terminate_internal_display(&idpy).unwrap();
    assert_eq!(mock.driver.terminate_calls(), 2);
    assert_eq!(mock.driver.init_count(idpy.handle()), 0);
}

#[test]
fn it_should_leave_init_count_alone_when_the_driver_fails() {
    let mock = MockPlatform::new().unwrap();
    let idpy = mock.platform.get_device_internal_display(MOCK_DEVICE).unwrap();

    mock.driver.set_fail_initialize(true);
    let err = mock.platform.initialize_internal_display(&idpy).unwrap_err();
    assert_eq!(
        err,
        EplError::Driver {
            call: "eglInitialize",
            code: EGL_BAD_ALLOC
        }
    );
    assert_eq!(idpy.init_count(), 0);

    mock.driver.set_fail_initialize(false);
    mock.platform.initialize_internal_display(&idpy).unwrap();
    assert_eq!(idpy.init_count(), 1);
}

#[test]
fn it_should_not_call_the_driver_after_teardown() {
    let mock = MockPlatform::new().unwrap();
    let idpy = mock.platform.get_device_internal_display(MOCK_DEVICE).unwrap();
    mock.platform.teardown();
    let calls = mock.driver.calls();

    assert_eq!(
        mock.platform.initialize_internal_display(&idpy).unwrap_err(),
        EplError::PlatformDestroyed
    );
    assert_eq!(mock.platform.all_devices().unwrap_err(), EplError::PlatformDestroyed);
    assert_eq!(
        mock.platform.current_context().unwrap_err(),
        EplError::PlatformDestroyed
    );
    assert_eq!(mock.driver.calls(), calls);
}

#[test]
fn it_should_run_teardown_once() {
    let mock = MockPlatform::new().unwrap();
    mock.platform.teardown();
    mock.platform.teardown();
    assert!(mock.platform.is_destroyed());
    assert_eq!(ImplCounters::get(&mock.counters.platform_cleanups), 1);
}

#[test]
fn it_should_clean_up_after_a_failed_init() {
    let counters = Arc::new(ImplCounters::default());
    let platform = Platform::allocate_with_config(
        1,
        1,
        Arc::new(MockDriver::new()),
        Arc::new(MockCallbacks::new()),
        EGL_PLATFORM_X11_KHR,
        Box::new(MockImpl::new(counters.clone())),
        &Config::default(),
    )
    .unwrap();
    let observer = Ref::acquire(&platform);

    Platform::init_fail(platform);
    assert!(observer.is_destroyed());
    assert!(!observer.is_ready());
    assert_eq!(counters.platform_cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn it_should_forward_errors_to_the_loader() {
    let mock = MockPlatform::new().unwrap();
    mock.platform.set_error(&EplError::BadDisplay);
    assert_eq!(mock.callbacks.last_error(), Some(EGL_BAD_DISPLAY));
    assert_eq!(mock.callbacks.errors()[0].1, "invalid display handle");
}

#[test]
fn it_should_filter_debug_messages_by_level() {
    let mock = MockPlatform::new().unwrap();
    mock.platform.debug_message(MessageLevel::Error, "bad");
    mock.platform.debug_message(MessageLevel::Info, "chatty");
    let messages = mock.callbacks.messages();
    assert_eq!(messages, vec![(MessageLevel::Error, "bad".to_string())]);
}

#[test]
fn it_should_enumerate_devices_and_resolve_procs() {
    let mock = MockPlatform::new().unwrap();
    assert_eq!(mock.platform.all_devices().unwrap(), vec![MOCK_DEVICE]);
    assert_eq!(
        mock.platform.query_device_string(MOCK_DEVICE, 0).unwrap(),
        "EGL_EXT_device_drm"
    );
    assert!(mock.platform.get_proc_address("eglGetError").is_some());
    assert!(mock.platform.get_proc_address("glClear").is_none());
}
