pub mod browser;
#[cfg(test)]
pub mod fake;
pub mod traits;
pub mod types;

pub use browser::{open_saved_search, ChromeSession};
pub use traits::BrowserSession;
