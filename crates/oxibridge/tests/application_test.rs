//! Headless application lifecycle.
//!
//! The shared application is a process-wide singleton, so the whole
//! lifecycle runs as one sequential test.
//!
//! Run with: `cargo test --test application_test`

#![cfg(not(all(feature = "native", target_vendor = "apple")))]

mod common;

use common::{class, object_class, release, string};
use oxibridge::{Bool, ClassDecl, Id, Rect, Sel, autoreleasepool, msg_send, sel};
use std::sync::atomic::{AtomicUsize, Ordering};

static LAUNCHED: AtomicUsize = AtomicUsize::new(0);
static ASKED: AtomicUsize = AtomicUsize::new(0);
static TERMINATING: AtomicUsize = AtomicUsize::new(0);

extern "C" fn did_finish_launching(_this: Id, _cmd: Sel, _note: Id) {
    LAUNCHED.fetch_add(1, Ordering::SeqCst);
}

extern "C" fn should_terminate(_this: Id, _cmd: Sel, _app: Id) -> Bool {
    ASKED.fetch_add(1, Ordering::SeqCst);
    Bool::YES
}

extern "C" fn will_terminate(_this: Id, _cmd: Sel, _note: Id) {
    TERMINATING.fetch_add(1, Ordering::SeqCst);
}

fn delegate() -> Id {
    let mut decl = ClassDecl::new("LifecycleDelegate", object_class()).unwrap();
    decl.add_method(
        sel!(applicationDidFinishLaunching:),
        did_finish_launching as extern "C" fn(Id, Sel, Id),
    )
    .unwrap();
    decl.add_method(
        sel!(applicationShouldTerminateAfterLastWindowClosed:),
        should_terminate as extern "C" fn(Id, Sel, Id) -> Bool,
    )
    .unwrap();
    decl.add_method(
        sel!(applicationWillTerminate:),
        will_terminate as extern "C" fn(Id, Sel, Id),
    )
    .unwrap();
    let class = decl.register().unwrap();
    unsafe { msg_send![class, new] }
}

fn open_window(app: Id) -> Id {
    unsafe {
        let window: Id = msg_send![class("NSWindow"), alloc];
        let window: Id = msg_send![window,
            initWithContentRect: Rect::new(0.0, 0.0, 800.0, 450.0),
            styleMask: 15usize,
            backing: 2usize,
            defer: Bool::NO,
        ];
        let _: () = msg_send![window, makeKeyAndOrderFront: app];
        window
    }
}

#[test]
fn test_application_lifecycle() {
    autoreleasepool(|_| unsafe {
        let app: Id = msg_send![class("NSApplication"), sharedApplication];
        let again: Id = msg_send![class("NSApplication"), sharedApplication];
        assert_eq!(app, again);

        // Activation policy: regular, accessory, prohibited; nothing else.
        let ok: Bool = msg_send![app, setActivationPolicy: 0isize];
        assert!(ok.as_bool());
        let bad: Bool = msg_send![app, setActivationPolicy: 9isize];
        assert!(!bad.as_bool());
        let policy: isize = msg_send![app, activationPolicy];
        assert_eq!(policy, 0);

        let _: () = msg_send![app, activateIgnoringOtherApps: Bool::YES];
        let active: Bool = msg_send![app, isActive];
        assert!(active.as_bool());

        // Without a delegate, the run loop returns once its windows close.
        let window = open_window(app);
        let visible: Bool = msg_send![window, isVisible];
        assert!(visible.as_bool());
        let _: () = msg_send![app, run];
        let visible: Bool = msg_send![window, isVisible];
        assert!(!visible.as_bool());
        let running: Bool = msg_send![app, isRunning];
        assert!(!running.as_bool());
        assert_eq!(ASKED.load(Ordering::SeqCst), 0);
        release(window);

        // With a delegate, it is asked and the app terminates.
        let delegate = delegate();
        let _: () = msg_send![app, setDelegate: delegate];
        let current: Id = msg_send![app, delegate];
        assert_eq!(current, delegate);

        let menu: Id = msg_send![class("NSMenu"), new];
        let item: Id = msg_send![class("NSMenuItem"), alloc];
        let item: Id = msg_send![item,
            initWithTitle: string("Quit"),
            action: Some(sel!(terminate:)),
            keyEquivalent: string("q"),
        ];
        let _: () = msg_send![menu, addItem: item];
        let _: () = msg_send![app, setMainMenu: menu];
        let main: Id = msg_send![app, mainMenu];
        assert_eq!(main, menu);
        release(item);
        release(menu);

        let window = open_window(app);
        release(window);
        let _: () = msg_send![app, run];

        assert_eq!(LAUNCHED.load(Ordering::SeqCst), 1);
        assert_eq!(ASKED.load(Ordering::SeqCst), 1);
        assert_eq!(TERMINATING.load(Ordering::SeqCst), 1);
        let running: Bool = msg_send![app, isRunning];
        assert!(!running.as_bool());

        let _: () = msg_send![app, setDelegate: Id::NIL];
        release(delegate);
    });
}
