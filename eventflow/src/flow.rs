//! The login and create-event flow.
//!
//! ```text
//! Init -> AwaitLoginForm -> SubmitLogin -> AwaitDashboard
//!      -> OpenCreateEventForm -> FillEventDraft -> SubmitEventDraft -> Verify
//! ```
//!
//! Any step error ends the run. The single boundary in [`LoginAndCreateEventFlow::run`]
//! captures a screenshot tagged with the outcome, closes the session and,
//! on failure, wraps the original error in [`FlowError::Failed`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{FlowConfig, FlowMode};
use crate::credentials::Credentials;
use crate::draft::EventDraft;
use crate::element::Key;
use crate::engines::{BrowserEngine, SessionLauncher};
use crate::errors::{AutomationError, FlowError};
use crate::evidence::{EvidenceStore, Outcome};
use crate::locator::Match;
use crate::selector::SelectorChain;
use crate::url_pattern::UrlPattern;
use crate::Browser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowStep {
    Init,
    AwaitLoginForm,
    SubmitLogin,
    AwaitDashboard,
    OpenCreateEventForm,
    FillEventDraft,
    SubmitEventDraft,
    Verify,
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowStep::Init => "init",
            FlowStep::AwaitLoginForm => "await-login-form",
            FlowStep::SubmitLogin => "submit-login",
            FlowStep::AwaitDashboard => "await-dashboard",
            FlowStep::OpenCreateEventForm => "open-create-event-form",
            FlowStep::FillEventDraft => "fill-event-draft",
            FlowStep::SubmitEventDraft => "submit-event-draft",
            FlowStep::Verify => "verify",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: FlowStep,
    pub duration_ms: u64,
}

/// Result of a passing run
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub outcome: Outcome,
    pub event_name: String,
    pub screenshot: PathBuf,
    /// Which verification signal appeared first
    pub verified_by: String,
    pub engine: String,
    pub steps: Vec<StepRecord>,
}

struct Progress {
    current: FlowStep,
    started: Instant,
    records: Vec<StepRecord>,
}

impl Progress {
    fn new() -> Self {
        Self {
            current: FlowStep::Init,
            started: Instant::now(),
            records: Vec::new(),
        }
    }

    fn enter(&mut self, step: FlowStep) {
        if step != self.current {
            self.finish();
            self.current = step;
            self.started = Instant::now();
        }
        info!(%step, "Step started");
    }

    fn finish(&mut self) {
        self.records.push(StepRecord {
            step: self.current,
            duration_ms: self.started.elapsed().as_millis() as u64,
        });
    }
}

pub struct LoginAndCreateEventFlow {
    config: FlowConfig,
    credentials: Credentials,
    launcher: Arc<dyn SessionLauncher>,
    evidence: EvidenceStore,
    dashboard: UrlPattern,
}

impl LoginAndCreateEventFlow {
    pub fn new(
        config: FlowConfig,
        credentials: Credentials,
        launcher: Arc<dyn SessionLauncher>,
    ) -> Result<Self, FlowError> {
        config.validate()?;
        let dashboard = config.dashboard_pattern()?;
        let evidence = EvidenceStore::new(config.evidence_dir.clone());
        Ok(Self {
            config,
            credentials,
            launcher,
            evidence,
            dashboard,
        })
    }

    /// Load credentials from the configured env file and the process
    /// environment, then build the flow. Fails with `MissingCredentials`
    /// before any browser session is requested.
    pub fn from_config(
        config: FlowConfig,
        launcher: Arc<dyn SessionLauncher>,
    ) -> Result<Self, FlowError> {
        let credentials = Credentials::load(Some(&config.env_file), &config.credential_keys)?;
        Self::new(config, credentials, launcher)
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Run the flow once in a fresh browser session.
    ///
    /// Once a session is acquired exactly one screenshot is written, tagged
    /// with the outcome, and the session is closed on every path.
    #[instrument(skip_all, fields(event = %draft.name))]
    pub async fn run(&self, draft: &EventDraft) -> Result<FlowReport, FlowError> {
        let engine: Arc<dyn BrowserEngine> =
            Arc::from(self.launcher.launch().await.map_err(FlowError::Session)?);
        let browser =
            Browser::new(engine).with_poll_interval(self.config.timeouts.poll_interval());
        info!(engine = %browser.engine_name(), "Browser session acquired");

        let mut progress = Progress::new();
        let result = self.drive(&browser, draft, &mut progress).await;
        let outcome = if result.is_ok() {
            progress.finish();
            Outcome::Success
        } else {
            Outcome::Failure
        };

        let evidence = self.capture(&browser, draft, outcome).await;
        if let Err(e) = browser.close().await {
            warn!(error = %e, "Failed to close browser session");
        }

        match result {
            Ok(verified_by) => {
                let screenshot = evidence.map_err(|e| FlowError::Failed {
                    step: progress.current,
                    evidence: None,
                    source: Box::new(e),
                })?;
                info!(screenshot = %screenshot.display(), %verified_by, "Create Event flow passed");
                Ok(FlowReport {
                    outcome,
                    event_name: draft.name.clone(),
                    screenshot,
                    verified_by,
                    engine: browser.engine_name(),
                    steps: progress.records,
                })
            }
            Err(source) => {
                let evidence = match evidence {
                    Ok(path) => Some(path),
                    Err(e) => {
                        error!(error = %e, "Could not capture failure evidence");
                        None
                    }
                };
                error!(step = %progress.current, error = %source, "Create Event flow failed");
                Err(FlowError::Failed {
                    step: progress.current,
                    evidence,
                    source: Box::new(source),
                })
            }
        }
    }

    async fn capture(
        &self,
        browser: &Browser,
        draft: &EventDraft,
        outcome: Outcome,
    ) -> Result<PathBuf, FlowError> {
        let screenshot = browser.screenshot().await?;
        self.evidence.save(&draft.slug(), outcome, &screenshot)
    }

    async fn drive(
        &self,
        browser: &Browser,
        draft: &EventDraft,
        progress: &mut Progress,
    ) -> Result<String, FlowError> {
        let timeouts = &self.config.timeouts;
        let selectors = &self.config.selectors;

        progress.enter(FlowStep::Init);
        let login_url = self.config.login_url();
        browser.goto(&login_url).await?;
        browser.wait_for_load(timeouts.page_settle()).await?;

        progress.enter(FlowStep::AwaitLoginForm);
        let email = require(
            browser,
            &selectors.email,
            timeouts.element(),
            element_not_found("email input"),
        )
        .await?;
        let password = require(
            browser,
            &selectors.password,
            timeouts.element(),
            element_not_found("password input"),
        )
        .await?;

        progress.enter(FlowStep::SubmitLogin);
        info!(email = %self.credentials.masked_email(), "Submitting login");
        email.element.fill(self.credentials.email()).await?;
        password.element.fill(self.credentials.password()).await?;
        match browser
            .locator(selectors.login_submit.clone())
            .wait(Some(timeouts.submit()))
            .await
        {
            Ok(submit) => {
                debug!(strategy = %submit.strategy, "Clicking login submit");
                submit.element.click().await?;
            }
            Err(AutomationError::Timeout(_)) => {
                info!("No submit control found, pressing Enter in the password field");
                password.element.press_key(Key::Enter).await?;
            }
            Err(e) => return Err(e.into()),
        }

        progress.enter(FlowStep::AwaitDashboard);
        self.await_dashboard(browser).await?;

        progress.enter(FlowStep::OpenCreateEventForm);
        self.open_create_form(browser).await?;

        progress.enter(FlowStep::FillEventDraft);
        for (chain, what, value) in [
            (&selectors.event_name, "event name input", &draft.name),
            (
                &selectors.event_description,
                "event description input",
                &draft.description,
            ),
            (
                &selectors.event_start_date,
                "event start date input",
                &draft.start_date,
            ),
        ] {
            let field =
                require(browser, chain, timeouts.element(), element_not_found(what)).await?;
            field.element.fill(value).await?;
        }

        progress.enter(FlowStep::SubmitEventDraft);
        let submit = require(
            browser,
            &selectors.event_submit,
            timeouts.element(),
            element_not_found("event submit control"),
        )
        .await?;
        submit.element.click().await?;

        progress.enter(FlowStep::Verify);
        let signal = browser
            .locator(selectors.verification(&draft.name))
            .wait_any(Some(timeouts.verify()))
            .await
            .map_err(|e| match e {
                AutomationError::Timeout(_) => FlowError::CreationNotVerified {
                    event_name: draft.name.clone(),
                    timeout: timeouts.verify(),
                },
                other => other.into(),
            })?;
        info!(signal = %signal.strategy, "Event creation verified");
        Ok(signal.strategy.to_string())
    }

    /// URL pattern OR dashboard heading, whichever shows first.
    async fn await_dashboard(&self, browser: &Browser) -> Result<(), FlowError> {
        let timeout = self.config.timeouts.dashboard();
        let heading = browser.locator(self.config.selectors.dashboard_heading.clone());
        let deadline = Instant::now() + timeout;

        loop {
            let url = browser.current_url().await?;
            if self.dashboard.matches(&url) {
                info!(%url, "Dashboard reached (url)");
                return Ok(());
            }
            if let Some(found) = heading.find_now().await? {
                info!(strategy = %found.strategy, "Dashboard reached (heading)");
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(FlowError::LoginTimeout {
                    timeout,
                    pattern: self.dashboard.to_string(),
                    last_url: url,
                });
            }
            sleep(browser.poll_interval().min(deadline - now)).await;
        }
    }

    async fn open_create_form(&self, browser: &Browser) -> Result<(), FlowError> {
        let timeouts = &self.config.timeouts;
        let selectors = &self.config.selectors;

        match browser
            .locator(selectors.create_control())
            .wait(Some(timeouts.create_control()))
            .await
        {
            Ok(control) => {
                debug!(strategy = %control.strategy, "Clicking create-event control");
                control.element.click().await?;
            }
            Err(AutomationError::Timeout(_)) => match self.config.mode {
                FlowMode::Automated => {
                    return Err(FlowError::CreateControlNotFound {
                        labels: selectors.create_event_labels.clone(),
                    });
                }
                FlowMode::Assisted => {
                    warn!(
                        grace = ?timeouts.assisted_grace(),
                        "Could not click the create-event control; open the form manually now"
                    );
                    sleep(timeouts.assisted_grace()).await;
                }
            },
            Err(e) => return Err(e.into()),
        }

        require(browser, &selectors.create_form, timeouts.form(), |tried| {
            FlowError::FormNotFound { tried }
        })
        .await?;
        Ok(())
    }
}

/// Wait for `chain`, turning a timeout into the error `on_timeout` builds
/// from the strategies tried.
async fn require<F>(
    browser: &Browser,
    chain: &SelectorChain,
    per_strategy: Duration,
    on_timeout: F,
) -> Result<Match, FlowError>
where
    F: FnOnce(Vec<String>) -> FlowError,
{
    browser
        .locator(chain.clone())
        .wait(Some(per_strategy))
        .await
        .map_err(|e| match e {
            AutomationError::Timeout(_) => on_timeout(chain.describe()),
            other => other.into(),
        })
}

fn element_not_found(what: &str) -> impl FnOnce(Vec<String>) -> FlowError + '_ {
    move |tried| FlowError::ElementNotFound {
        what: what.to_string(),
        tried,
    }
}
