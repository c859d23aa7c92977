//! The full demonstration payload against the headless runtime.
//!
//! Run with: `cargo test -p oxibridge-demo --test headless_app`

#![cfg(not(all(feature = "native", target_vendor = "apple")))]

use oxibridge::{Bool, Class, Error, Id, Point, Rect, Sel, autoreleasepool, msg_send, sel};
use oxibridge_demo::{
    ACTIVATION_POLICY_REGULAR, CONTENT_RECT, DELEGATE_CLASS, WINDOW_STYLE, create_menu_bar,
    create_window, declare_delegate, install_delegate, run, shared_application,
};
use std::ffi::{CStr, c_char};

fn text(string: Id) -> String {
    let ptr: *const c_char = unsafe { msg_send![string, UTF8String] };
    assert!(!ptr.is_null());
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn check_delegate(app: Id) -> Class {
    let delegate_class = declare_delegate().unwrap();
    assert_eq!(Class::get(DELEGATE_CLASS), Some(delegate_class));
    assert_eq!(
        delegate_class
            .method_encoding(sel!(applicationShouldTerminateAfterLastWindowClosed:))
            .as_deref(),
        Some(format!("{}@:@", <Bool as oxibridge::Encode>::ENCODING).as_str())
    );

    // A second declaration under the same name is refused.
    assert!(matches!(
        declare_delegate(),
        Err(Error::ClassAlreadyExists { .. })
    ));

    let delegate = install_delegate(app, delegate_class);
    unsafe {
        let installed: Id = msg_send![app, delegate];
        assert_eq!(installed, delegate);
        let answer: Bool =
            msg_send![delegate, applicationShouldTerminateAfterLastWindowClosed: app];
        assert_eq!(answer, Bool::YES);
    }
    delegate_class
}

fn check_menu(app: Id) {
    create_menu_bar(app).unwrap();
    unsafe {
        let menubar: Id = msg_send![app, mainMenu];
        let count: isize = msg_send![menubar, numberOfItems];
        assert_eq!(count, 1);

        let app_item: Id = msg_send![menubar, itemAtIndex: 0isize];
        let app_menu: Id = msg_send![app_item, submenu];
        assert!(!app_menu.is_nil());

        let quit: Id = msg_send![app_menu, itemAtIndex: 0isize];
        let title: Id = msg_send![quit, title];
        let key: Id = msg_send![quit, keyEquivalent];
        let action: Option<Sel> = msg_send![quit, action];
        let target: Id = msg_send![quit, target];
        assert_eq!(text(title), "Quit");
        assert_eq!(text(key), "q");
        assert_eq!(action, Some(sel!(terminate:)));
        assert_eq!(target, app);

        let missing: Id = msg_send![app_menu, itemAtIndex: 5isize];
        assert!(missing.is_nil());
    }
}

fn check_window() -> Id {
    let window = create_window().unwrap();
    assert!(!window.is_nil());
    unsafe {
        let title: Id = msg_send![window, title];
        assert_eq!(text(title), "Runtime Cocoa Window");

        let style: usize = msg_send![window, styleMask];
        assert_eq!(style, WINDOW_STYLE);

        // Centered on the 1440x900 headless screen.
        let frame: Rect = msg_send![window, frame];
        assert_eq!(frame.size, CONTENT_RECT.size);
        assert_eq!(frame.origin, Point::new(320.0, 225.0));

        let view: Id = msg_send![window, contentView];
        let layered: Bool = msg_send![view, wantsLayer];
        assert!(layered.as_bool());

        let visible: Bool = msg_send![window, isVisible];
        assert!(visible.as_bool());
    }
    window
}

#[test]
fn test_payload_runs_to_completion() {
    autoreleasepool(|_| {
        let app = shared_application().unwrap();
        let policy: isize = unsafe { msg_send![app, activationPolicy] };
        assert_eq!(policy, ACTIVATION_POLICY_REGULAR);

        check_delegate(app);
        check_menu(app);
        let window = check_window();

        run(app);

        unsafe {
            let active: Bool = msg_send![app, isActive];
            assert!(active.as_bool());
            let running: Bool = msg_send![app, isRunning];
            assert!(!running.as_bool());
            let visible: Bool = msg_send![window, isVisible];
            assert!(!visible.as_bool());
        }
    });
}
