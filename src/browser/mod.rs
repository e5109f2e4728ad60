//! Browser automation: driver traits and the chromium backend

pub mod chromium;
pub mod driver;

pub use chromium::ChromiumDriver;
pub use driver::{
    BASE_LAUNCH_ARGS, BrowserDriver, BrowserEngine, BrowsingContext, ContextOptions,
    LaunchOptions, NavigationTimeout, PageSession, WaitUntil,
};
