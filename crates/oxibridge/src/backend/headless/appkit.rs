//! Built-in classes of the headless runtime.
//!
//! Models the slice of Foundation and AppKit that a minimal Cocoa program
//! touches, with the same class names, selectors and type encodings:
//!
//! | class | superclass | role |
//! |-------|------------|------|
//! | `NSObject` | - | root: allocation, retain counting, introspection |
//! | `NSString` | `NSObject` | immutable UTF-8 text |
//! | `NSResponder` | `NSObject` | abstract responder |
//! | `NSView` | `NSResponder` | frame and layer flag |
//! | `NSWindow` | `NSResponder` | titled frame with a content view |
//! | `NSMenu` | `NSObject` | ordered list of items |
//! | `NSMenuItem` | `NSObject` | title, action, key equivalent, submenu |
//! | `NSApplication` | `NSResponder` | singleton: policy, delegate, menu, run |
//!
//! Methods are ordinary `extern "C"` functions registered with encodings
//! derived from their Rust signatures, so the dispatcher checks callers
//! against them exactly as it checks user-declared classes.
//!
//! There is no screen and no event source. `-run` behaves as if the user
//! closed every visible window, consults the delegate's
//! `applicationShouldTerminateAfterLastWindowClosed:`, and returns.

use super::class;
use super::object::{self, Value};
use super::pool;
use crate::runtime::message::send;
use crate::runtime::{Bool, Class, Id, MethodImplementation, Point, Rect, Sel, Size};
use crate::{msg_send, sel};
use oxibridge_log::{debug, info, warn};
use std::ffi::{CStr, CString, c_char};
use std::sync::OnceLock;

/// Size of the simulated main screen.
pub(crate) const SCREEN: Size = Size::new(1440.0, 900.0);

const UTF8: &str = "utf8";
const FRAME: &str = "frame";
const WANTS_LAYER: &str = "wantsLayer";
const STYLE_MASK: &str = "styleMask";
const BACKING: &str = "backing";
const TITLE: &str = "title";
const CONTENT_VIEW: &str = "contentView";
const VISIBLE: &str = "visible";
const ITEMS: &str = "items";
const ACTION: &str = "action";
const KEY_EQUIVALENT: &str = "keyEquivalent";
const SUBMENU: &str = "submenu";
const TARGET: &str = "target";
const POLICY: &str = "activationPolicy";
const DELEGATE: &str = "delegate";
const MAIN_MENU: &str = "mainMenu";
const ACTIVE: &str = "active";
const RUNNING: &str = "running";
const WINDOWS: &str = "windows";

/// `NSApplicationActivationPolicyProhibited`, the default for a bare
/// executable.
const POLICY_PROHIBITED: isize = 2;

/// Built-in classes the built-in methods themselves instantiate.
pub(crate) struct Builtins {
    string: Class,
    view: Class,
    application: Class,
}

/// Installs the built-in classes on first use.
pub(crate) fn builtins() -> &'static Builtins {
    static BUILTINS: OnceLock<Builtins> = OnceLock::new();
    BUILTINS.get_or_init(install)
}

fn define(superclass: Option<Class>, name: &str) -> Class {
    match class::allocate(superclass, name) {
        Ok(class) => class,
        Err(err) => crate::fatal!("cannot define built-in class {name}: {err}"),
    }
}

fn add<F: MethodImplementation>(class: Class, sel: Sel, f: F) {
    if let Err(err) = class::add_method(class, sel, f.imp(), &F::type_encoding()) {
        crate::fatal!("cannot install {sel} on built-in class {}: {err}", class.name());
    }
}

fn install() -> Builtins {
    let object = define(None, "NSObject");
    let meta = class::metaclass(object);
    add(meta, sel!(alloc), object_alloc as extern "C" fn(Class, Sel) -> Id);
    add(meta, sel!(new), object_new as extern "C" fn(Class, Sel) -> Id);
    add(meta, sel!(class), class_class as extern "C" fn(Class, Sel) -> Option<Class>);
    add(meta, sel!(retain), class_retain as extern "C" fn(Class, Sel) -> Id);
    add(meta, sel!(release), class_release as extern "C" fn(Class, Sel));
    add(meta, sel!(autorelease), class_retain as extern "C" fn(Class, Sel) -> Id);
    add(meta, sel!(retainCount), class_retain_count as extern "C" fn(Class, Sel) -> usize);
    add(object, sel!(init), object_init as extern "C" fn(Id, Sel) -> Id);
    add(object, sel!(retain), object_retain as extern "C" fn(Id, Sel) -> Id);
    add(object, sel!(release), object_release as extern "C" fn(Id, Sel));
    add(object, sel!(autorelease), object_autorelease as extern "C" fn(Id, Sel) -> Id);
    add(object, sel!(retainCount), object_retain_count as extern "C" fn(Id, Sel) -> usize);
    add(object, sel!(dealloc), object_dealloc as extern "C" fn(Id, Sel));
    add(object, sel!(class), object_class as extern "C" fn(Id, Sel) -> Option<Class>);
    add(
        object,
        sel!(respondsToSelector:),
        object_responds as extern "C" fn(Id, Sel, Sel) -> Bool,
    );
    add(
        object,
        sel!(isKindOfClass:),
        object_is_kind as extern "C" fn(Id, Sel, Option<Class>) -> Bool,
    );
    class::register(object);

    let string = define(Some(object), "NSString");
    add(
        class::metaclass(string),
        sel!(stringWithUTF8String:),
        string_with_utf8 as extern "C" fn(Class, Sel, *const c_char) -> Id,
    );
    add(
        string,
        sel!(initWithUTF8String:),
        string_init_utf8 as unsafe extern "C" fn(Id, Sel, *const c_char) -> Id,
    );
    add(string, sel!(UTF8String), string_utf8 as extern "C" fn(Id, Sel) -> *const c_char);
    add(string, sel!(length), string_length as extern "C" fn(Id, Sel) -> usize);
    add(
        string,
        sel!(isEqualToString:),
        string_equal as extern "C" fn(Id, Sel, Id) -> Bool,
    );
    class::register(string);

    let responder = define(Some(object), "NSResponder");
    class::register(responder);

    let view = define(Some(responder), "NSView");
    add(view, sel!(initWithFrame:), view_init as extern "C" fn(Id, Sel, Rect) -> Id);
    add(view, sel!(frame), frame as extern "C" fn(Id, Sel) -> Rect);
    add(view, sel!(setWantsLayer:), view_set_wants_layer as extern "C" fn(Id, Sel, Bool));
    add(view, sel!(wantsLayer), view_wants_layer as extern "C" fn(Id, Sel) -> Bool);
    class::register(view);

    let window = define(Some(responder), "NSWindow");
    add(
        window,
        sel!(initWithContentRect:styleMask:backing:defer:),
        window_init as extern "C" fn(Id, Sel, Rect, usize, usize, Bool) -> Id,
    );
    add(window, sel!(setTitle:), window_set_title as extern "C" fn(Id, Sel, Id));
    add(window, sel!(title), title as extern "C" fn(Id, Sel) -> Id);
    add(window, sel!(center), window_center as extern "C" fn(Id, Sel));
    add(window, sel!(contentView), window_content_view as extern "C" fn(Id, Sel) -> Id);
    add(
        window,
        sel!(makeKeyAndOrderFront:),
        window_order_front as extern "C" fn(Id, Sel, Id),
    );
    add(window, sel!(isVisible), window_is_visible as extern "C" fn(Id, Sel) -> Bool);
    add(window, sel!(frame), frame as extern "C" fn(Id, Sel) -> Rect);
    add(
        window,
        sel!(setFrame:display:),
        window_set_frame as extern "C" fn(Id, Sel, Rect, Bool),
    );
    add(window, sel!(styleMask), window_style_mask as extern "C" fn(Id, Sel) -> usize);
    add(window, sel!(close), window_close as extern "C" fn(Id, Sel));
    class::register(window);

    let menu = define(Some(object), "NSMenu");
    add(menu, sel!(addItem:), menu_add_item as extern "C" fn(Id, Sel, Id));
    add(menu, sel!(numberOfItems), menu_count as extern "C" fn(Id, Sel) -> isize);
    add(menu, sel!(itemAtIndex:), menu_item_at as extern "C" fn(Id, Sel, isize) -> Id);
    class::register(menu);

    let menu_item = define(Some(object), "NSMenuItem");
    add(
        menu_item,
        sel!(initWithTitle:action:keyEquivalent:),
        item_init as extern "C" fn(Id, Sel, Id, Option<Sel>, Id) -> Id,
    );
    add(menu_item, sel!(title), title as extern "C" fn(Id, Sel) -> Id);
    add(menu_item, sel!(action), item_action as extern "C" fn(Id, Sel) -> Option<Sel>);
    add(menu_item, sel!(setAction:), item_set_action as extern "C" fn(Id, Sel, Option<Sel>));
    add(menu_item, sel!(keyEquivalent), item_key as extern "C" fn(Id, Sel) -> Id);
    add(menu_item, sel!(setSubmenu:), item_set_submenu as extern "C" fn(Id, Sel, Id));
    add(menu_item, sel!(submenu), item_submenu as extern "C" fn(Id, Sel) -> Id);
    add(menu_item, sel!(setTarget:), item_set_target as extern "C" fn(Id, Sel, Id));
    add(menu_item, sel!(target), item_target as extern "C" fn(Id, Sel) -> Id);
    class::register(menu_item);

    let application = define(Some(responder), "NSApplication");
    add(
        class::metaclass(application),
        sel!(sharedApplication),
        app_shared as extern "C" fn(Class, Sel) -> Id,
    );
    add(application, sel!(init), app_init as extern "C" fn(Id, Sel) -> Id);
    add(
        application,
        sel!(setActivationPolicy:),
        app_set_policy as extern "C" fn(Id, Sel, isize) -> Bool,
    );
    add(application, sel!(activationPolicy), app_policy as extern "C" fn(Id, Sel) -> isize);
    add(application, sel!(setDelegate:), app_set_delegate as extern "C" fn(Id, Sel, Id));
    add(application, sel!(delegate), app_delegate as extern "C" fn(Id, Sel) -> Id);
    add(application, sel!(setMainMenu:), app_set_main_menu as extern "C" fn(Id, Sel, Id));
    add(application, sel!(mainMenu), app_main_menu as extern "C" fn(Id, Sel) -> Id);
    add(
        application,
        sel!(activateIgnoringOtherApps:),
        app_activate as extern "C" fn(Id, Sel, Bool),
    );
    add(application, sel!(isActive), app_is_active as extern "C" fn(Id, Sel) -> Bool);
    add(application, sel!(run), app_run as extern "C" fn(Id, Sel));
    add(application, sel!(terminate:), app_terminate as extern "C" fn(Id, Sel, Id));
    add(application, sel!(isRunning), app_is_running as extern "C" fn(Id, Sel) -> Bool);
    class::register(application);

    debug!("installed built-in classes");
    Builtins {
        string,
        view,
        application,
    }
}

// NSObject

extern "C" fn object_alloc(class: Class, _cmd: Sel) -> Id {
    object::allocate(class)
}

extern "C" fn object_new(class: Class, _cmd: Sel) -> Id {
    unsafe {
        let obj: Id = msg_send![class, alloc];
        msg_send![obj, init]
    }
}

extern "C" fn class_class(class: Class, _cmd: Sel) -> Option<Class> {
    Some(class)
}

extern "C" fn class_retain(class: Class, _cmd: Sel) -> Id {
    class.as_id()
}

extern "C" fn class_release(_class: Class, _cmd: Sel) {}

extern "C" fn class_retain_count(_class: Class, _cmd: Sel) -> usize {
    usize::MAX
}

extern "C" fn object_init(this: Id, _cmd: Sel) -> Id {
    this
}

extern "C" fn object_retain(this: Id, _cmd: Sel) -> Id {
    object::increment(this);
    this
}

extern "C" fn object_release(this: Id, _cmd: Sel) {
    if object::decrement(this) {
        let _: () = unsafe { msg_send![this, dealloc] };
    }
}

extern "C" fn object_autorelease(this: Id, _cmd: Sel) -> Id {
    pool::autorelease(this);
    this
}

extern "C" fn object_retain_count(this: Id, _cmd: Sel) -> usize {
    object::retain_count(this)
}

extern "C" fn object_dealloc(this: Id, _cmd: Sel) {
    // SAFETY: dealloc is only sent once the last reference is gone.
    unsafe { object::destroy(this) };
}

extern "C" fn object_class(this: Id, _cmd: Sel) -> Option<Class> {
    this.class()
}

extern "C" fn object_responds(this: Id, _cmd: Sel, sel: Sel) -> Bool {
    Bool::new(
        this.class()
            .is_some_and(|class| class::lookup(class, sel).is_some()),
    )
}

extern "C" fn object_is_kind(this: Id, _cmd: Sel, class: Option<Class>) -> Bool {
    Bool::new(match (this.class(), class) {
        (Some(own), Some(class)) => own.is_subclass_of(class),
        _ => false,
    })
}

// NSString

/// Creates an owned (+1) string.
fn new_string(text: &CStr) -> Id {
    unsafe {
        let obj: Id = msg_send![builtins().string, alloc];
        msg_send![obj, initWithUTF8String: text.as_ptr()]
    }
}

fn string_text(id: Id) -> Option<CString> {
    if id.is_nil() {
        return None;
    }
    match object::get(id, UTF8) {
        Some(Value::Text(text)) => Some(text),
        _ => None,
    }
}

extern "C" fn string_with_utf8(class: Class, _cmd: Sel, text: *const c_char) -> Id {
    unsafe {
        let obj: Id = msg_send![class, alloc];
        let obj: Id = msg_send![obj, initWithUTF8String: text];
        msg_send![obj, autorelease]
    }
}

unsafe extern "C" fn string_init_utf8(this: Id, _cmd: Sel, text: *const c_char) -> Id {
    if text.is_null() {
        warn!("initWithUTF8String: given NULL");
        object::release(this);
        return Id::NIL;
    }
    // SAFETY: the caller passes a NUL-terminated string.
    let text = unsafe { CStr::from_ptr(text) }.to_owned();
    object::set(this, UTF8, Value::Text(text));
    this
}

extern "C" fn string_utf8(this: Id, _cmd: Sel) -> *const c_char {
    // The CString's buffer does not move while the ivar holds it.
    object::with_ivars(this, |ivars| match ivars.get(UTF8) {
        Some(Value::Text(text)) => text.as_ptr(),
        _ => c"".as_ptr(),
    })
}

extern "C" fn string_length(this: Id, _cmd: Sel) -> usize {
    string_text(this).map_or(0, |text| text.to_string_lossy().encode_utf16().count())
}

extern "C" fn string_equal(this: Id, _cmd: Sel, other: Id) -> Bool {
    Bool::new(match (string_text(this), string_text(other)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    })
}

// NSView and NSWindow

extern "C" fn view_init(this: Id, _cmd: Sel, rect: Rect) -> Id {
    object::set(this, FRAME, Value::Rect(rect));
    this
}

extern "C" fn frame(this: Id, _cmd: Sel) -> Rect {
    object::rect(this, FRAME)
}

extern "C" fn view_set_wants_layer(this: Id, _cmd: Sel, flag: Bool) {
    object::set(this, WANTS_LAYER, Value::Bool(flag));
}

extern "C" fn view_wants_layer(this: Id, _cmd: Sel) -> Bool {
    object::flag(this, WANTS_LAYER)
}

extern "C" fn window_init(
    this: Id,
    _cmd: Sel,
    rect: Rect,
    style: usize,
    backing: usize,
    _defer: Bool,
) -> Id {
    if !rect.is_well_formed() {
        warn!("rejecting window with content rect {rect:?}");
        object::release(this);
        return Id::NIL;
    }

    object::set(this, FRAME, Value::Rect(rect));
    object::set(this, STYLE_MASK, Value::UInt(style));
    object::set(this, BACKING, Value::UInt(backing));
    object::set(this, VISIBLE, Value::Bool(Bool::NO));

    let bounds = Rect::from_parts(Point::default(), rect.size);
    let view: Id = unsafe {
        let view: Id = msg_send![builtins().view, alloc];
        msg_send![view, initWithFrame: bounds]
    };
    object::set_object(this, CONTENT_VIEW, view);
    object::release(view);

    let title = new_string(c"");
    object::set_object(this, TITLE, title);
    object::release(title);

    debug!("window {this:?} {rect:?} style {style:#x}");
    this
}

extern "C" fn window_set_title(this: Id, _cmd: Sel, title: Id) {
    object::set_object(this, TITLE, title);
}

extern "C" fn title(this: Id, _cmd: Sel) -> Id {
    object::object(this, TITLE)
}

extern "C" fn window_center(this: Id, _cmd: Sel) {
    let size = object::rect(this, FRAME).size;
    let origin = Point::new(
        ((SCREEN.width - size.width) / 2.0).max(0.0),
        ((SCREEN.height - size.height) / 2.0).max(0.0),
    );
    object::set(this, FRAME, Value::Rect(Rect::from_parts(origin, size)));
}

extern "C" fn window_content_view(this: Id, _cmd: Sel) -> Id {
    object::object(this, CONTENT_VIEW)
}

extern "C" fn window_order_front(this: Id, _cmd: Sel, _sender: Id) {
    object::set(this, VISIBLE, Value::Bool(Bool::YES));
    let app = shared_application();
    let added = object::with_ivars(app, |ivars| {
        let entry = ivars
            .entry(WINDOWS)
            .or_insert_with(|| Value::Objects(Vec::new()));
        match entry {
            Value::Objects(windows) if !windows.contains(&this) => {
                windows.push(this);
                true
            }
            _ => false,
        }
    });
    if added {
        object::retain(this);
    }
}

extern "C" fn window_is_visible(this: Id, _cmd: Sel) -> Bool {
    object::flag(this, VISIBLE)
}

extern "C" fn window_set_frame(this: Id, _cmd: Sel, rect: Rect, _display: Bool) {
    if rect.is_well_formed() {
        object::set(this, FRAME, Value::Rect(rect));
    } else {
        warn!("ignoring frame {rect:?} for window {this:?}");
    }
}

extern "C" fn window_style_mask(this: Id, _cmd: Sel) -> usize {
    object::uint(this, STYLE_MASK)
}

extern "C" fn window_close(this: Id, _cmd: Sel) {
    object::set(this, VISIBLE, Value::Bool(Bool::NO));
    let app = shared_application();
    let removed = object::with_ivars(app, |ivars| match ivars.get_mut(WINDOWS) {
        Some(Value::Objects(windows)) => {
            let before = windows.len();
            windows.retain(|&w| w != this);
            windows.len() != before
        }
        _ => false,
    });
    if removed {
        object::release(this);
    }
}

// NSMenu and NSMenuItem

extern "C" fn menu_add_item(this: Id, _cmd: Sel, item: Id) {
    if item.is_nil() {
        warn!("ignoring nil menu item");
        return;
    }
    object::retain(item);
    object::with_ivars(this, |ivars| {
        match ivars
            .entry(ITEMS)
            .or_insert_with(|| Value::Objects(Vec::new()))
        {
            Value::Objects(items) => items.push(item),
            other => *other = Value::Objects(vec![item]),
        }
    });
}

fn menu_items(menu: Id) -> Vec<Id> {
    match object::get(menu, ITEMS) {
        Some(Value::Objects(items)) => items,
        _ => Vec::new(),
    }
}

extern "C" fn menu_count(this: Id, _cmd: Sel) -> isize {
    menu_items(this).len().try_into().unwrap_or(isize::MAX)
}

extern "C" fn menu_item_at(this: Id, _cmd: Sel, index: isize) -> Id {
    let items = menu_items(this);
    match usize::try_from(index).ok().and_then(|i| items.get(i)) {
        Some(&item) => item,
        None => {
            warn!("menu index {index} out of range ({} items)", items.len());
            Id::NIL
        }
    }
}

extern "C" fn item_init(this: Id, _cmd: Sel, title: Id, action: Option<Sel>, key: Id) -> Id {
    object::set_object(this, TITLE, title);
    object::set(this, ACTION, Value::Sel(action));
    object::set_object(this, KEY_EQUIVALENT, key);
    this
}

extern "C" fn item_action(this: Id, _cmd: Sel) -> Option<Sel> {
    match object::get(this, ACTION) {
        Some(Value::Sel(action)) => action,
        _ => None,
    }
}

extern "C" fn item_set_action(this: Id, _cmd: Sel, action: Option<Sel>) {
    object::set(this, ACTION, Value::Sel(action));
}

extern "C" fn item_key(this: Id, _cmd: Sel) -> Id {
    object::object(this, KEY_EQUIVALENT)
}

extern "C" fn item_set_submenu(this: Id, _cmd: Sel, submenu: Id) {
    object::set_object(this, SUBMENU, submenu);
}

extern "C" fn item_submenu(this: Id, _cmd: Sel) -> Id {
    object::object(this, SUBMENU)
}

extern "C" fn item_set_target(this: Id, _cmd: Sel, target: Id) {
    object::set(this, TARGET, Value::Unretained(target));
}

extern "C" fn item_target(this: Id, _cmd: Sel) -> Id {
    object::object(this, TARGET)
}

// NSApplication

struct SharedApplication(Id);

// SAFETY: the singleton is created once and never freed; its state is
// behind the ivar lock.
unsafe impl Send for SharedApplication {}
unsafe impl Sync for SharedApplication {}

static SHARED_APPLICATION: OnceLock<SharedApplication> = OnceLock::new();

fn shared_application() -> Id {
    unsafe { msg_send![builtins().application, sharedApplication] }
}

extern "C" fn app_shared(class: Class, _cmd: Sel) -> Id {
    SHARED_APPLICATION
        .get_or_init(|| {
            let app: Id = unsafe { msg_send![class, new] };
            info!("created shared application {app:?}");
            SharedApplication(app)
        })
        .0
}

extern "C" fn app_init(this: Id, _cmd: Sel) -> Id {
    object::set(this, POLICY, Value::Int(POLICY_PROHIBITED));
    object::set(this, WINDOWS, Value::Objects(Vec::new()));
    this
}

extern "C" fn app_set_policy(this: Id, _cmd: Sel, policy: isize) -> Bool {
    if !(0..=2).contains(&policy) {
        warn!("unknown activation policy {policy}");
        return Bool::NO;
    }
    object::set(this, POLICY, Value::Int(policy));
    Bool::YES
}

extern "C" fn app_policy(this: Id, _cmd: Sel) -> isize {
    object::int(this, POLICY)
}

extern "C" fn app_set_delegate(this: Id, _cmd: Sel, delegate: Id) {
    object::set(this, DELEGATE, Value::Unretained(delegate));
}

extern "C" fn app_delegate(this: Id, _cmd: Sel) -> Id {
    object::object(this, DELEGATE)
}

extern "C" fn app_set_main_menu(this: Id, _cmd: Sel, menu: Id) {
    object::set_object(this, MAIN_MENU, menu);
}

extern "C" fn app_main_menu(this: Id, _cmd: Sel) -> Id {
    object::object(this, MAIN_MENU)
}

extern "C" fn app_activate(this: Id, _cmd: Sel, _ignoring_others: Bool) {
    object::set(this, ACTIVE, Value::Bool(Bool::YES));
}

extern "C" fn app_is_active(this: Id, _cmd: Sel) -> Bool {
    object::flag(this, ACTIVE)
}

extern "C" fn app_is_running(this: Id, _cmd: Sel) -> Bool {
    object::flag(this, RUNNING)
}

fn delegate_responds(delegate: Id, sel: Sel) -> bool {
    if delegate.is_nil() {
        return false;
    }
    let responds: Bool = unsafe { msg_send![delegate, respondsToSelector: sel] };
    responds.as_bool()
}

/// Sends a one-argument notification if the delegate implements it.
fn notify(delegate: Id, sel: Sel, arg: Id) {
    if delegate_responds(delegate, sel) {
        let _: () = unsafe { send(delegate, sel, (arg,)) };
    }
}

extern "C" fn app_run(this: Id, _cmd: Sel) {
    let windows = match object::get(this, WINDOWS) {
        Some(Value::Objects(windows)) => windows,
        _ => Vec::new(),
    };
    object::set(this, RUNNING, Value::Bool(Bool::YES));
    info!("run loop started with {} visible windows", windows.len());

    let delegate = object::object(this, DELEGATE);
    notify(delegate, sel!(applicationDidFinishLaunching:), Id::NIL);

    for window in windows {
        let _: () = unsafe { msg_send![window, close] };
    }

    let should_terminate = sel!(applicationShouldTerminateAfterLastWindowClosed:);
    let terminate = delegate_responds(delegate, should_terminate) && {
        let answer: Bool = unsafe { send(delegate, should_terminate, (this,)) };
        answer.as_bool()
    };

    if terminate {
        let _: () = unsafe { msg_send![this, terminate: this] };
    } else {
        info!("last window closed; no event source, leaving run loop");
        object::set(this, RUNNING, Value::Bool(Bool::NO));
    }
}

extern "C" fn app_terminate(this: Id, _cmd: Sel, _sender: Id) {
    let delegate = object::object(this, DELEGATE);
    notify(delegate, sel!(applicationWillTerminate:), Id::NIL);
    object::set(this, RUNNING, Value::Bool(Bool::NO));
    info!("application terminated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Encode;

    fn class(name: &str) -> Class {
        Class::get(name).unwrap()
    }

    fn text(id: Id) -> String {
        let ptr: *const c_char = unsafe { msg_send![id, UTF8String] };
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    #[test]
    fn test_hierarchy() {
        let object = class("NSObject");
        assert_eq!(class("NSString").superclass(), Some(object));
        assert_eq!(
            class("NSWindow").superclass().and_then(Class::superclass),
            Some(object)
        );
        assert!(class("NSApplication").is_subclass_of(object));
        assert_eq!(class("NSMenuItem").name(), "NSMenuItem");
    }

    #[test]
    fn test_builtin_encodings() {
        let window = class("NSWindow");
        assert_eq!(
            window
                .method_encoding(sel!(initWithContentRect:styleMask:backing:defer:))
                .unwrap(),
            format!("@@:{{CGRect={{CGPoint=dd}}{{CGSize=dd}}}}QQ{}", Bool::ENCODING)
        );
        assert_eq!(window.method_encoding(sel!(setTitle:)).unwrap(), "v@:@");
        assert_eq!(
            class("NSApplication").method_encoding(sel!(setActivationPolicy:)).unwrap(),
            format!("{}@:q", Bool::ENCODING)
        );
    }

    #[test]
    fn test_string_methods() {
        let s = new_string(c"héllo");
        assert_eq!(text(s), "héllo");
        let len: usize = unsafe { msg_send![s, length] };
        assert_eq!(len, 5);

        let same = new_string(c"héllo");
        let other = new_string(c"world");
        unsafe {
            let eq: Bool = msg_send![s, isEqualToString: same];
            let ne: Bool = msg_send![s, isEqualToString: other];
            let nil: Bool = msg_send![s, isEqualToString: Id::NIL];
            assert!(eq.as_bool());
            assert!(!ne.as_bool());
            assert!(!nil.as_bool());
        }
        [s, same, other].into_iter().for_each(object::release);
    }

    #[test]
    fn test_null_utf8_string_is_nil() {
        let s: Id = unsafe {
            let obj: Id = msg_send![builtins().string, alloc];
            msg_send![obj, initWithUTF8String: std::ptr::null::<c_char>()]
        };
        assert!(s.is_nil());
    }

    #[test]
    fn test_window_geometry() {
        unsafe {
            let window: Id = msg_send![class("NSWindow"), alloc];
            let window: Id = msg_send![window,
                initWithContentRect: Rect::new(0.0, 0.0, 800.0, 450.0),
                styleMask: 15usize,
                backing: 2usize,
                defer: Bool::NO,
            ];
            assert!(!window.is_nil());

            let _: () = msg_send![window, center];
            let frame: Rect = msg_send![window, frame];
            assert_eq!(frame, Rect::new(320.0, 225.0, 800.0, 450.0));

            let view: Id = msg_send![window, contentView];
            let bounds: Rect = msg_send![view, frame];
            assert_eq!(bounds, Rect::new(0.0, 0.0, 800.0, 450.0));

            let _: () = msg_send![view, setWantsLayer: Bool::YES];
            let wants: Bool = msg_send![view, wantsLayer];
            assert_eq!(wants, Bool::YES);

            let mask: usize = msg_send![window, styleMask];
            assert_eq!(mask, 15);
            let _: () = msg_send![window, release];
        }
    }

    #[test]
    fn test_malformed_window_rect() {
        unsafe {
            let window: Id = msg_send![class("NSWindow"), alloc];
            let window: Id = msg_send![window,
                initWithContentRect: Rect::new(0.0, 0.0, -800.0, 450.0),
                styleMask: 15usize,
                backing: 2usize,
                defer: Bool::NO,
            ];
            assert!(window.is_nil());
        }
    }

    #[test]
    fn test_menu_items() {
        unsafe {
            let menu: Id = msg_send![class("NSMenu"), new];
            let item: Id = msg_send![class("NSMenuItem"), alloc];
            let title = new_string(c"Quit");
            let key = new_string(c"q");
            let item: Id = msg_send![item,
                initWithTitle: title,
                action: sel!(terminate:),
                keyEquivalent: key,
            ];
            let _: () = msg_send![menu, addItem: item];

            let count: isize = msg_send![menu, numberOfItems];
            assert_eq!(count, 1);
            let first: Id = msg_send![menu, itemAtIndex: 0isize];
            assert_eq!(first, item);
            let missing: Id = msg_send![menu, itemAtIndex: 5isize];
            assert!(missing.is_nil());

            let action: Option<Sel> = msg_send![item, action];
            assert_eq!(action, Some(sel!(terminate:)));
            assert_eq!(text(msg_send![item, keyEquivalent]), "q");
            assert_eq!(text(msg_send![item, title]), "Quit");

            let _: () = msg_send![item, release];
            let count: usize = msg_send![item, retainCount];
            assert_eq!(count, 1);

            [menu, title, key].into_iter().for_each(object::release);
        }
    }

    #[test]
    fn test_class_objects_ignore_retain_release() {
        let string = class("NSString");
        unsafe {
            let same: Id = msg_send![string, retain];
            assert_eq!(same, string.as_id());
            let _: () = msg_send![string, release];
            let cls: Option<Class> = msg_send![string, class];
            assert_eq!(cls, Some(string));
            let responds: Bool =
                msg_send![string, respondsToSelector: sel!(stringWithUTF8String:)];
            assert!(responds.as_bool());
            let instance_only: Bool = msg_send![string, respondsToSelector: sel!(length)];
            assert!(!instance_only.as_bool());
        }
    }
}
