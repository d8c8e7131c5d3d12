//! Chromium DevTools driver for the formpilot page port.
//!
//! [`CdpBrowser`] launches Chromium and keeps one websocket open to it;
//! [`CdpPage`] implements [`page_model::PageQuery`] and
//! [`page_model::PageInput`] for one tab by evaluating a small page runtime
//! in the tab's main world.

pub mod browser;
pub mod config;
pub mod errors;
pub mod page;
pub mod script;
pub mod transport;
pub mod util;

pub use browser::CdpBrowser;
pub use config::CdpConfig;
pub use errors::DriverError;
pub use page::CdpPage;
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};
