//! Chromium side of the browser boundary: launches one browser, hands out one
//! settled tab per audit and answers DOM queries through the DevTools protocol.

pub mod chromium;
pub mod shared;

pub use chromium::{ChromiumElement, ChromiumLauncher, ChromiumSession, LaunchOptions};
pub use shared::TimeoutConfig;
