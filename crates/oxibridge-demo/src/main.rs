//! Opens an 800x450 window titled "Runtime Cocoa Window" with a Quit menu,
//! then runs the application until the window is closed.
//!
//! Log output is controlled by `OXIBRIDGE_LOG` (error, warn, info, debug,
//! trace) and `NO_COLOR`.

use oxibridge::config::Config;
use oxibridge::error::fatal;
use oxibridge::{Result, autoreleasepool};
use oxibridge_demo as demo;

fn main() {
    Config::from_env().install();

    autoreleasepool(|_| {
        if let Err(err) = launch() {
            fatal(format_args!("{err}"));
        }
    });
}

fn launch() -> Result<()> {
    let app = demo::shared_application()?;
    let delegate_class = demo::declare_delegate()?;
    let _delegate = demo::install_delegate(app, delegate_class);

    demo::create_menu_bar(app)?;

    let window = demo::create_window()?;
    if window.is_nil() {
        fatal(format_args!("could not create the main window"));
    }

    demo::run(app);
    Ok(())
}
