use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, instrument};

use crate::element::Element;
use crate::engines::BrowserEngine;
use crate::errors::AutomationError;
use crate::selector::{Selector, SelectorChain};

// Default per-strategy timeout if none is specified on the locator itself
const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A visible element together with the strategy that found it
#[derive(Debug)]
pub struct Match {
    pub element: Element,
    pub strategy: Selector,
    /// Position of the winning strategy in the chain
    pub index: usize,
}

/// Finds elements through an ordered chain of selectors
///
/// Only visible elements count as matches; attached but hidden elements are
/// skipped.
#[derive(Clone)]
pub struct Locator {
    engine: Arc<dyn BrowserEngine>,
    chain: SelectorChain,
    timeout: Duration,
    poll_interval: Duration,
}

impl Locator {
    pub(crate) fn new(engine: Arc<dyn BrowserEngine>, chain: SelectorChain) -> Self {
        Self {
            engine,
            chain,
            timeout: DEFAULT_LOCATOR_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the timeout used when no explicit timeout is passed to a wait.
    pub fn set_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn first_visible(&self, selector: &Selector) -> Result<Option<Element>, AutomationError> {
        for element in self.engine.query(selector).await? {
            // Elements can go stale between query and check; treat that as not visible
            if element.is_visible().await.unwrap_or(false) {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// Single pass over the chain without waiting.
    pub async fn find_now(&self) -> Result<Option<Match>, AutomationError> {
        for (index, strategy) in self.chain.strategies().iter().enumerate() {
            if let Some(element) = self.first_visible(strategy).await? {
                return Ok(Some(Match {
                    element,
                    strategy: strategy.clone(),
                    index,
                }));
            }
        }
        Ok(None)
    }

    /// Try each strategy in order, giving each up to `per_strategy` to produce
    /// a visible element. The first strategy that matches wins.
    #[instrument(level = "debug", skip(self), fields(chain = %self.chain))]
    pub async fn wait(&self, per_strategy: Option<Duration>) -> Result<Match, AutomationError> {
        let per_strategy = per_strategy.unwrap_or(self.timeout);
        self.chain.validate()?;

        for (index, strategy) in self.chain.strategies().iter().enumerate() {
            let deadline = Instant::now() + per_strategy;
            loop {
                if let Some(element) = self.first_visible(strategy).await? {
                    debug!(%strategy, index, "strategy matched");
                    return Ok(Match {
                        element,
                        strategy: strategy.clone(),
                        index,
                    });
                }
                let now = Instant::now();
                if now >= deadline {
                    debug!(%strategy, "strategy exhausted, falling back");
                    break;
                }
                sleep(self.poll_interval.min(deadline - now)).await;
            }
        }

        Err(AutomationError::Timeout(format!(
            "Timed out after {per_strategy:?} per strategy waiting for any of: {}",
            self.chain
        )))
    }

    /// Poll every strategy on each tick until one yields a visible element or
    /// `timeout` elapses. Whichever appears first wins.
    #[instrument(level = "debug", skip(self), fields(chain = %self.chain))]
    pub async fn wait_any(&self, timeout: Option<Duration>) -> Result<Match, AutomationError> {
        let timeout = timeout.unwrap_or(self.timeout);
        self.chain.validate()?;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.find_now().await? {
                debug!(strategy = %found.strategy, index = found.index, "first to appear");
                return Ok(found);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "Timed out after {timeout:?} waiting for any of: {}",
                    self.chain
                )));
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
