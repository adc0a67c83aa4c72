mod launcher;
mod network;
mod session;
mod wait;

pub use launcher::{ChromiumLauncher, LaunchOptions};
pub use network::{InFlight, NetworkMonitor};
pub use session::{BoundingBox, ChromiumElement, ChromiumSession};
pub use wait::WaitStrategy;
