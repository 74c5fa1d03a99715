//! Browser-driven login and event-creation smoke flow
//!
//! This crate drives a browser session against an event-management web
//! application: it logs in, creates an event, verifies that the event became
//! visible and writes a screenshot as evidence of the outcome. Element lookup
//! follows a Playwright-like model of selectors, fallback chains and locators
//! with bounded waits.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, instrument};

pub mod config;
pub mod credentials;
pub mod draft;
pub mod element;
pub mod engines;
pub mod env_file;
pub mod errors;
pub mod evidence;
pub mod flow;
pub mod inspect;
pub mod locator;
pub mod selector;
pub mod url_pattern;

pub use config::{FlowConfig, FlowMode, Timeouts};
pub use credentials::Credentials;
pub use draft::EventDraft;
pub use element::{Element, ElementImpl, Key};
pub use engines::{BrowserEngine, SessionLauncher};
pub use errors::{AutomationError, FlowError};
pub use evidence::{EvidenceStore, Outcome};
pub use flow::{FlowReport, FlowStep, LoginAndCreateEventFlow};
pub use locator::{Locator, Match};
pub use selector::{Selector, SelectorChain};
pub use url_pattern::UrlPattern;

/// Holds the screenshot data
#[derive(Debug, Clone)]
pub struct ScreenshotResult {
    /// PNG-encoded image bytes
    pub png: Vec<u8>,
}

/// The main entry point for driving one browser session
#[derive(Clone)]
pub struct Browser {
    engine: Arc<dyn BrowserEngine>,
    poll_interval: Duration,
}

impl Browser {
    pub fn new(engine: Arc<dyn BrowserEngine>) -> Self {
        Self {
            engine,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Set how often waits re-query the page.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn engine_name(&self) -> String {
        self.engine.name()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn locator(&self, chain: impl Into<SelectorChain>) -> Locator {
        Locator::new(self.engine.clone(), chain.into()).with_poll_interval(self.poll_interval)
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        self.engine.navigate(url).await
    }

    /// Wait until the document reports `complete`, up to `timeout`.
    #[instrument(level = "debug", skip(self))]
    pub async fn wait_for_load(&self, timeout: Duration) -> Result<(), AutomationError> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.engine.ready_state().await?;
            if state == "complete" {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "Page did not finish loading within {timeout:?} (readyState: {state:?})"
                )));
            }
            debug!(%state, "page still loading");
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    pub async fn current_url(&self) -> Result<String, AutomationError> {
        self.engine.current_url().await
    }

    /// Every attached element matching `selector`, visible or not, without waiting.
    pub async fn query(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError> {
        self.engine.query(selector).await
    }

    pub async fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        self.engine.press_key(key).await
    }

    pub async fn screenshot(&self) -> Result<ScreenshotResult, AutomationError> {
        self.engine.screenshot().await
    }

    pub async fn close(&self) -> Result<(), AutomationError> {
        self.engine.close().await
    }
}
