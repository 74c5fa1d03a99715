use std::fmt::Debug;

use tracing::{debug, instrument};

use crate::errors::AutomationError;

/// Keys the flow needs to send to a focused element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Escape,
}

/// Represents an element on the current page of a browser session
#[derive(Debug)]
pub struct Element {
    inner: Box<dyn ElementImpl>,
}

/// Engine-specific element behaviour
#[async_trait::async_trait]
pub trait ElementImpl: Send + Sync + Debug {
    /// Short human-readable description used in logs and errors.
    fn describe(&self) -> String;
    async fn click(&self) -> Result<(), AutomationError>;
    /// Clear the current value, then type `value`.
    async fn fill(&self, value: &str) -> Result<(), AutomationError>;
    async fn press_key(&self, key: Key) -> Result<(), AutomationError>;
    async fn text(&self) -> Result<String, AutomationError>;
    async fn outer_html(&self) -> Result<String, AutomationError>;
    async fn is_visible(&self) -> Result<bool, AutomationError>;
}

impl Element {
    pub fn new(inner: Box<dyn ElementImpl>) -> Self {
        Self { inner }
    }

    pub fn describe(&self) -> String {
        self.inner.describe()
    }

    #[instrument(level = "debug", skip(self), fields(element = %self.describe()))]
    pub async fn click(&self) -> Result<(), AutomationError> {
        self.inner.click().await
    }

    /// Fill the element with `value`. The value itself is never logged.
    #[instrument(level = "debug", skip(self, value), fields(element = %self.describe()))]
    pub async fn fill(&self, value: &str) -> Result<(), AutomationError> {
        debug!(len = value.len(), "filling element");
        self.inner.fill(value).await
    }

    pub async fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        debug!(?key, element = %self.describe(), "pressing key");
        self.inner.press_key(key).await
    }

    pub async fn text(&self) -> Result<String, AutomationError> {
        self.inner.text().await
    }

    pub async fn outer_html(&self) -> Result<String, AutomationError> {
        self.inner.outer_html().await
    }

    pub async fn is_visible(&self) -> Result<bool, AutomationError> {
        self.inner.is_visible().await
    }
}
