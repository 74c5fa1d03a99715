use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::flow::FlowStep;

/// Errors raised by a browser engine or the locator layer.
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Browser driver error: {0}")]
    PlatformError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Browser session is already closed")]
    SessionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<thirtyfour::error::WebDriverError> for AutomationError {
    fn from(err: thirtyfour::error::WebDriverError) -> Self {
        AutomationError::PlatformError(err.to_string())
    }
}

/// Errors produced by the login and create-event flow.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Missing credentials: {} not set (checked env file and process environment)", missing.join(", "))]
    MissingCredentials { missing: Vec<String> },

    #[error("Element not found: {what} (tried {})", tried.join(" || "))]
    ElementNotFound { what: String, tried: Vec<String> },

    #[error("Login did not reach the dashboard within {timeout:?} (url pattern {pattern:?}, last url {last_url:?})")]
    LoginTimeout {
        timeout: Duration,
        pattern: String,
        last_url: String,
    },

    #[error("No create-event control found for labels {}", labels.join(", "))]
    CreateControlNotFound { labels: Vec<String> },

    #[error("Create-event form did not appear (tried {})", tried.join(" || "))]
    FormNotFound { tried: Vec<String> },

    #[error("Creation of event {event_name:?} not verified within {timeout:?}")]
    CreationNotVerified {
        event_name: String,
        timeout: Duration,
    },

    #[error("Could not acquire a browser session: {0}")]
    Session(#[source] AutomationError),

    #[error(transparent)]
    Automation(#[from] AutomationError),

    #[error("Failed to write evidence {path:?}: {source}")]
    Evidence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to access env file {path:?}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Create Event flow failed at {step}: {source}")]
    Failed {
        step: FlowStep,
        evidence: Option<PathBuf>,
        #[source]
        source: Box<FlowError>,
    },
}

impl FlowError {
    /// The originating error, unwrapping the outer `Failed` boundary.
    pub fn root(&self) -> &FlowError {
        match self {
            FlowError::Failed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Evidence screenshot attached by the flow boundary, if any.
    pub fn evidence(&self) -> Option<&PathBuf> {
        match self {
            FlowError::Failed { evidence, .. } => evidence.as_ref(),
            _ => None,
        }
    }
}
