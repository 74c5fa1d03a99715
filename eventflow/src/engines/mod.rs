use crate::{AutomationError, Element, Key, ScreenshotResult, Selector};

pub mod webdriver;

pub use webdriver::{BrowserKind, WebDriverLauncher, WebDriverOptions};

/// The common trait that all browser engines must implement
///
/// Engines are thin: they answer single queries against the current page.
/// Polling, timeouts and fallback chains live in [`crate::Locator`] and
/// [`crate::Browser`].
#[async_trait::async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Engine name for logs (e.g. "webdriver:chrome")
    fn name(&self) -> String;

    /// Navigate the page to `url`
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// The URL currently loaded in the page
    async fn current_url(&self) -> Result<String, AutomationError>;

    /// `document.readyState` of the current page
    async fn ready_state(&self) -> Result<String, AutomationError>;

    /// All elements currently attached to the page that match `selector`.
    /// Returns an empty list when nothing matches; never waits.
    async fn query(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError>;

    /// Send a key to whatever element has focus
    async fn press_key(&self, key: Key) -> Result<(), AutomationError>;

    /// Capture the visible page as PNG
    async fn screenshot(&self) -> Result<ScreenshotResult, AutomationError>;

    /// Release the session. Subsequent calls fail with `SessionClosed`.
    async fn close(&self) -> Result<(), AutomationError>;
}

/// Acquires a fresh browser session per flow run
#[async_trait::async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserEngine>, AutomationError>;
}
