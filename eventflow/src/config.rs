use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credentials::CredentialKeys;
use crate::engines::WebDriverOptions;
use crate::errors::FlowError;
use crate::selector::{Selector, SelectorChain};
use crate::url_pattern::UrlPattern;

/// Whether a missing "Create Event" control is fatal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowMode {
    /// Every step failure fails the run
    #[default]
    Automated,
    /// An operator may open the create form by hand during the grace period
    Assisted,
}

/// Bounds for every wait in the flow, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub page_settle_ms: u64,
    /// Per strategy, for input fields
    pub element_ms: u64,
    /// Per strategy, for submit controls before falling back
    pub submit_ms: u64,
    pub dashboard_ms: u64,
    /// Per strategy, for the create-event control
    pub create_control_ms: u64,
    /// Per strategy, for the create-event form
    pub form_ms: u64,
    pub verify_ms: u64,
    pub poll_interval_ms: u64,
    pub assisted_grace_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_settle_ms: 30_000,
            element_ms: 5_000,
            submit_ms: 3_000,
            dashboard_ms: 60_000,
            create_control_ms: 3_000,
            form_ms: 30_000,
            verify_ms: 60_000,
            poll_interval_ms: 250,
            assisted_grace_ms: 5_000,
        }
    }
}

impl Timeouts {
    /// Tight bounds for stub sites in tests.
    pub fn fast() -> Self {
        Self {
            page_settle_ms: 500,
            element_ms: 100,
            submit_ms: 50,
            dashboard_ms: 500,
            create_control_ms: 100,
            form_ms: 200,
            verify_ms: 300,
            poll_interval_ms: 10,
            assisted_grace_ms: 50,
        }
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }
    pub fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }
    pub fn submit(&self) -> Duration {
        Duration::from_millis(self.submit_ms)
    }
    pub fn dashboard(&self) -> Duration {
        Duration::from_millis(self.dashboard_ms)
    }
    pub fn create_control(&self) -> Duration {
        Duration::from_millis(self.create_control_ms)
    }
    pub fn form(&self) -> Duration {
        Duration::from_millis(self.form_ms)
    }
    pub fn verify(&self) -> Duration {
        Duration::from_millis(self.verify_ms)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn assisted_grace(&self) -> Duration {
        Duration::from_millis(self.assisted_grace_ms)
    }
}

/// Selector contracts with the target application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub email: SelectorChain,
    pub password: SelectorChain,
    pub login_submit: SelectorChain,
    pub dashboard_heading: SelectorChain,
    /// Label variants of the create-event control, tried in order
    pub create_event_labels: Vec<String>,
    pub create_form: SelectorChain,
    pub event_name: SelectorChain,
    pub event_description: SelectorChain,
    pub event_start_date: SelectorChain,
    pub event_submit: SelectorChain,
    pub success_text: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            email: "name:email || id:email".into(),
            password: "name:password || id:password".into(),
            login_submit: "role:button|Login || css:button[type='submit']".into(),
            dashboard_heading: "role:heading|Dashboard".into(),
            create_event_labels: vec!["Create Event".to_string(), "New Event".to_string()],
            create_form: "css:form#create-event-form || form:has-text(Create Event)".into(),
            event_name: "name:eventName || id:eventName".into(),
            event_description: "name:eventDescription || id:eventDescription".into(),
            event_start_date: "name:eventStartDate || id:eventStartDate".into(),
            event_submit:
                "role:button|Create || css:form#create-event-form button[type='submit']".into(),
            success_text: "Event created successfully".to_string(),
        }
    }
}

impl Selectors {
    /// `role:button|<label>` then `text:<label>` for every label.
    pub fn create_control(&self) -> SelectorChain {
        self.create_event_labels
            .iter()
            .flat_map(|label| [Selector::role("button", label), Selector::Text(label.clone())])
            .collect::<Vec<_>>()
            .into()
    }

    /// Success toast, then the created event listed as a link.
    pub fn verification(&self, event_name: &str) -> SelectorChain {
        vec![
            Selector::Text(self.success_text.clone()),
            Selector::role("link", event_name),
        ]
        .into()
    }

    fn chains(&self) -> [(&'static str, &SelectorChain); 9] {
        [
            ("email", &self.email),
            ("password", &self.password),
            ("login_submit", &self.login_submit),
            ("dashboard_heading", &self.dashboard_heading),
            ("create_form", &self.create_form),
            ("event_name", &self.event_name),
            ("event_description", &self.event_description),
            ("event_start_date", &self.event_start_date),
            ("event_submit", &self.event_submit),
        ]
    }
}

/// Everything a flow run needs besides credentials and a browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub base_url: String,
    pub login_path: String,
    pub dashboard_url_pattern: String,
    pub mode: FlowMode,
    pub timeouts: Timeouts,
    pub selectors: Selectors,
    pub evidence_dir: PathBuf,
    pub env_file: PathBuf,
    pub credential_keys: CredentialKeys,
    pub webdriver: WebDriverOptions,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            base_url: "https://events.webmobi.com".to_string(),
            login_path: "/login".to_string(),
            dashboard_url_pattern: "**/dashboard**".to_string(),
            mode: FlowMode::Automated,
            timeouts: Timeouts::default(),
            selectors: Selectors::default(),
            evidence_dir: PathBuf::from("test-results"),
            env_file: PathBuf::from(".env"),
            credential_keys: CredentialKeys::default(),
            webdriver: WebDriverOptions::default(),
        }
    }
}

impl FlowConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, FlowError> {
        let config: FlowConfig = serde_yaml::from_str(content)
            .map_err(|e| FlowError::Config(format!("Invalid YAML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, FlowError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FlowError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    pub fn login_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.login_path.trim_start_matches('/')
        )
    }

    pub fn dashboard_pattern(&self) -> Result<UrlPattern, FlowError> {
        UrlPattern::new(&self.dashboard_url_pattern)
            .map_err(|e| FlowError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if self.base_url.trim().is_empty() {
            return Err(FlowError::Config("base_url must not be empty".to_string()));
        }
        self.dashboard_pattern()?;
        for (field, chain) in self.selectors.chains() {
            chain
                .validate()
                .map_err(|e| FlowError::Config(format!("selectors.{field}: {e}")))?;
        }
        if self.selectors.create_event_labels.is_empty() {
            return Err(FlowError::Config(
                "selectors.create_event_labels must list at least one label".to_string(),
            ));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(FlowError::Config(
                "timeouts.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
