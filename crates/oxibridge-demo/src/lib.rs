//! A window and a one-item menu, built entirely through message sends.
//!
//! Each call site states the native signature it assumes, since nothing
//! checks it against the real method on the system runtime. Geometry
//! crosses by value as `{CGRect={CGPoint=dd}{CGSize=dd}}`.

use oxibridge::{Bool, Class, ClassDecl, Id, Rect, Result, Sel, msg_send, sel};
use oxibridge_log::{debug, info};
use std::ffi::CStr;

#[cfg(all(feature = "native", target_vendor = "apple"))]
#[link(name = "AppKit", kind = "framework")]
unsafe extern "C" {}

/// Name of the delegate class declared at run time.
pub const DELEGATE_CLASS: &str = "MinimalAppDelegate";

pub const WINDOW_TITLE: &CStr = c"Runtime Cocoa Window";

/// `NSApplicationActivationPolicyRegular`.
pub const ACTIVATION_POLICY_REGULAR: isize = 0;

/// `NSBackingStoreBuffered`.
pub const BACKING_STORE_BUFFERED: usize = 2;

/// Titled, closable, miniaturizable and resizable.
pub const WINDOW_STYLE: usize = 1 << 0 | 1 << 1 | 1 << 2 | 1 << 3;

pub const CONTENT_RECT: Rect = Rect::new(0.0, 0.0, 800.0, 450.0);

/// Looks up a class the payload cannot do without.
pub fn class(name: &str) -> Result<Class> {
    Class::require(name)
}

/// An autoreleased string.
pub fn nsstring(text: &CStr) -> Result<Id> {
    let string = class("NSString")?;
    // +(id)stringWithUTF8String:(const char *)s                @@:*
    Ok(unsafe { msg_send![string, stringWithUTF8String: text.as_ptr()] })
}

// -(BOOL)applicationShouldTerminateAfterLastWindowClosed:(id)app   c@:@
extern "C" fn should_terminate_after_last_window_closed(_this: Id, _cmd: Sel, _app: Id) -> Bool {
    Bool::YES
}

/// Declares and publishes the application delegate class.
pub fn declare_delegate() -> Result<Class> {
    let mut decl = ClassDecl::new(DELEGATE_CLASS, class("NSObject")?)?;
    decl.add_method(
        sel!(applicationShouldTerminateAfterLastWindowClosed:),
        should_terminate_after_last_window_closed as extern "C" fn(Id, Sel, Id) -> Bool,
    )?;
    decl.register()
}

/// The shared application, with a regular activation policy.
pub fn shared_application() -> Result<Id> {
    let application = class("NSApplication")?;
    unsafe {
        // +(NSApplication *)sharedApplication                  @#:
        let app: Id = msg_send![application, sharedApplication];
        // -(BOOL)setActivationPolicy:(NSInteger)policy         c@:q
        let accepted: Bool = msg_send![app, setActivationPolicy: ACTIVATION_POLICY_REGULAR];
        debug!("activation policy accepted: {}", accepted.as_bool());
        Ok(app)
    }
}

/// Creates an instance of the delegate class and installs it on `app`.
///
/// The application does not retain its delegate; the returned object is
/// owned by the caller.
pub fn install_delegate(app: Id, delegate_class: Class) -> Id {
    unsafe {
        // +(id)new                                             @#:
        let delegate: Id = msg_send![delegate_class, new];
        // -(void)setDelegate:(id)delegate                      v@:@
        let _: () = msg_send![app, setDelegate: delegate];
        delegate
    }
}

/// Builds the menu bar: one application menu holding a Quit item (⌘Q).
pub fn create_menu_bar(app: Id) -> Result<()> {
    let menu = class("NSMenu")?;
    let menu_item = class("NSMenuItem")?;

    unsafe {
        let menubar: Id = msg_send![menu, new];
        let app_menu_item: Id = msg_send![menu_item, new];

        // -(void)addItem:(NSMenuItem *)item                    v@:@
        let _: () = msg_send![menubar, addItem: app_menu_item];
        // -(void)setMainMenu:(NSMenu *)menu                    v@:@
        let _: () = msg_send![app, setMainMenu: menubar];

        let app_menu: Id = msg_send![menu, new];
        // -(void)setSubmenu:(NSMenu *)menu                     v@:@
        let _: () = msg_send![app_menu_item, setSubmenu: app_menu];

        let title = nsstring(c"Quit")?;
        let key = nsstring(c"q")?;

        let quit: Id = msg_send![menu_item, alloc];
        // -(id)initWithTitle:(NSString *)t action:(SEL)a keyEquivalent:(NSString *)k
        //                                                      @@:@:@
        let quit: Id = msg_send![quit,
            initWithTitle: title,
            action: sel!(terminate:),
            keyEquivalent: key,
        ];
        // -(void)setTarget:(id)target                          v@:@
        let _: () = msg_send![quit, setTarget: app];
        let _: () = msg_send![app_menu, addItem: quit];
    }

    debug!("menu bar installed");
    Ok(())
}

/// Creates, titles and centers the main window and shows it.
///
/// Returns nil if the window cannot be created.
pub fn create_window() -> Result<Id> {
    let window_class = class("NSWindow")?;
    let title = nsstring(WINDOW_TITLE)?;

    unsafe {
        let window: Id = msg_send![window_class, alloc];
        // -(id)initWithContentRect:(NSRect)r styleMask:(NSUInteger)s
        //     backing:(NSUInteger)b defer:(BOOL)d
        //                          @@:{CGRect={CGPoint=dd}{CGSize=dd}}QQc
        let window: Id = msg_send![window,
            initWithContentRect: CONTENT_RECT,
            styleMask: WINDOW_STYLE,
            backing: BACKING_STORE_BUFFERED,
            defer: Bool::NO,
        ];
        if window.is_nil() {
            return Ok(Id::NIL);
        }

        // -(void)setTitle:(NSString *)title                    v@:@
        let _: () = msg_send![window, setTitle: title];
        // -(void)center                                        v@:
        let _: () = msg_send![window, center];

        // -(NSView *)contentView                               @@:
        let content_view: Id = msg_send![window, contentView];
        // Layer-backed, ready for a Metal or OpenGL surface.
        // -(void)setWantsLayer:(BOOL)flag                      v@:c
        let _: () = msg_send![content_view, setWantsLayer: Bool::YES];

        // -(void)makeKeyAndOrderFront:(id)sender               v@:@
        let _: () = msg_send![window, makeKeyAndOrderFront: Id::NIL];
        Ok(window)
    }
}

/// Brings the application forward and enters its run loop.
pub fn run(app: Id) {
    info!("entering run loop");
    unsafe {
        // -(void)activateIgnoringOtherApps:(BOOL)flag          v@:c
        let _: () = msg_send![app, activateIgnoringOtherApps: Bool::YES];
        // -(void)run                                           v@:
        let _: () = msg_send![app, run];
    }
    info!("run loop returned");
}
