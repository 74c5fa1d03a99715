//! W3C WebDriver engine backed by `thirtyfour`.
//!
//! Requires a running driver server, e.g. `chromedriver --port=9515`.

use serde::{Deserialize, Serialize};
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver, WebElement};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{BrowserEngine, SessionLauncher};
use crate::element::{Element, ElementImpl, Key};
use crate::{AutomationError, ScreenshotResult, Selector};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Edge,
}

impl BrowserKind {
    fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Edge => "edge",
        }
    }
}

/// How to reach the driver server and shape the browser window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverOptions {
    pub server_url: String,
    pub browser: BrowserKind,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Extra command-line switches handed to the browser
    pub extra_args: Vec<String>,
}

impl Default for WebDriverOptions {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:9515".to_string(),
            browser: BrowserKind::Chrome,
            headless: true,
            window_width: 1500,
            window_height: 800,
            extra_args: Vec::new(),
        }
    }
}

impl WebDriverOptions {
    fn browser_args(&self) -> Vec<String> {
        let mut args = vec![format!(
            "--window-size={},{}",
            self.window_width, self.window_height
        )];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

fn apply_args<C: ChromiumLikeCapabilities>(
    caps: &mut C,
    args: &[String],
) -> Result<(), AutomationError> {
    for arg in args {
        caps.add_arg(arg)?;
    }
    Ok(())
}

/// Opens one WebDriver session per launch
#[derive(Debug, Clone, Default)]
pub struct WebDriverLauncher {
    options: WebDriverOptions,
}

impl WebDriverLauncher {
    pub fn new(options: WebDriverOptions) -> Self {
        Self { options }
    }
}

#[async_trait::async_trait]
impl SessionLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserEngine>, AutomationError> {
        let args = self.options.browser_args();
        info!(
            server = %self.options.server_url,
            browser = self.options.browser.as_str(),
            headless = self.options.headless,
            "Starting WebDriver session"
        );

        let driver = match self.options.browser {
            BrowserKind::Chrome => {
                let mut caps = DesiredCapabilities::chrome();
                apply_args(&mut caps, &args)?;
                WebDriver::new(self.options.server_url.as_str(), caps).await?
            }
            BrowserKind::Edge => {
                let mut caps = DesiredCapabilities::edge();
                apply_args(&mut caps, &args)?;
                WebDriver::new(self.options.server_url.as_str(), caps).await?
            }
        };

        Ok(Box::new(WebDriverEngine {
            driver: Mutex::new(Some(driver)),
            browser: self.options.browser,
        }))
    }
}

/// A live WebDriver session
pub struct WebDriverEngine {
    driver: Mutex<Option<WebDriver>>,
    browser: BrowserKind,
}

impl WebDriverEngine {
    async fn driver(&self) -> Result<WebDriver, AutomationError> {
        self.driver
            .lock()
            .await
            .clone()
            .ok_or(AutomationError::SessionClosed)
    }
}

#[async_trait::async_trait]
impl BrowserEngine for WebDriverEngine {
    fn name(&self) -> String {
        format!("webdriver:{}", self.browser.as_str())
    }

    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        debug!(%url, "goto");
        self.driver().await?.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(self.driver().await?.current_url().await?.to_string())
    }

    async fn ready_state(&self) -> Result<String, AutomationError> {
        let ret = self
            .driver()
            .await?
            .execute("return document.readyState;", Vec::new())
            .await?;
        Ok(ret.json().as_str().unwrap_or_default().to_string())
    }

    async fn query(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError> {
        let by = to_by(selector)?;
        let found = self.driver().await?.find_all(by).await?;
        let label = selector.to_string();
        Ok(found
            .into_iter()
            .map(|element| {
                Element::new(Box::new(WebDriverElement {
                    element,
                    label: label.clone(),
                }))
            })
            .collect())
    }

    async fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        let active = self.driver().await?.active_element().await?;
        active.send_keys(to_key(key)).await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<ScreenshotResult, AutomationError> {
        let png = self.driver().await?.screenshot_as_png().await?;
        Ok(ScreenshotResult { png })
    }

    async fn close(&self) -> Result<(), AutomationError> {
        let driver = self
            .driver
            .lock()
            .await
            .take()
            .ok_or(AutomationError::SessionClosed)?;
        if let Err(e) = driver.quit().await {
            warn!(error = %e, "WebDriver quit failed");
            return Err(e.into());
        }
        debug!("WebDriver session closed");
        Ok(())
    }
}

#[derive(Debug)]
struct WebDriverElement {
    element: WebElement,
    label: String,
}

#[async_trait::async_trait]
impl ElementImpl for WebDriverElement {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn click(&self) -> Result<(), AutomationError> {
        self.element.click().await?;
        Ok(())
    }

    async fn fill(&self, value: &str) -> Result<(), AutomationError> {
        self.element.clear().await?;
        self.element.send_keys(value).await?;
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        self.element.send_keys(to_key(key)).await?;
        Ok(())
    }

    async fn text(&self) -> Result<String, AutomationError> {
        Ok(self.element.text().await?)
    }

    async fn outer_html(&self) -> Result<String, AutomationError> {
        Ok(self.element.outer_html().await?)
    }

    async fn is_visible(&self) -> Result<bool, AutomationError> {
        Ok(self.element.is_displayed().await?)
    }
}

fn to_key(key: Key) -> thirtyfour::Key {
    match key {
        Key::Enter => thirtyfour::Key::Enter,
        Key::Tab => thirtyfour::Key::Tab,
        Key::Escape => thirtyfour::Key::Escape,
    }
}

/// Translate a selector into a WebDriver locator strategy
pub(crate) fn to_by(selector: &Selector) -> Result<By, AutomationError> {
    let by = match selector {
        Selector::Css(css) => By::Css(css.clone()),
        Selector::Id(id) => By::Id(id.clone()),
        Selector::Name(name) => By::XPath(format!("//*[@name={}]", xpath_literal(name))),
        Selector::XPath(xpath) => By::XPath(xpath.clone()),
        Selector::Text(text) => By::XPath(text_xpath(text)),
        Selector::HasText { tag, text } => By::XPath(format!(
            "//{tag}[contains(normalize-space(.), {})]",
            xpath_literal(text)
        )),
        Selector::Role { role, name } => By::XPath(role_xpath(role, name.as_deref())),
        Selector::Invalid(reason) => {
            return Err(AutomationError::InvalidSelector(reason.clone()));
        }
    };
    Ok(by)
}

/// Innermost elements whose normalised text contains `text`
pub(crate) fn text_xpath(text: &str) -> String {
    let lit = xpath_literal(text);
    format!(
        "//body//*[not(self::script or self::style)][contains(normalize-space(.), {lit})][not(.//*[contains(normalize-space(.), {lit})])]"
    )
}

pub(crate) fn role_xpath(role: &str, name: Option<&str>) -> String {
    let base = match role {
        "button" => "(//button | //input[@type='submit' or @type='button'] | //*[@role='button'])"
            .to_string(),
        "link" => "(//a | //*[@role='link'])".to_string(),
        "heading" => {
            "(//h1 | //h2 | //h3 | //h4 | //h5 | //h6 | //*[@role='heading'])".to_string()
        }
        "textbox" => "(//input[not(@type) or @type='text' or @type='email' or @type='password'] | //textarea | //*[@role='textbox'])".to_string(),
        "form" => "(//form | //*[@role='form'])".to_string(),
        other => format!("//*[@role={}]", xpath_literal(other)),
    };
    match name {
        Some(name) => {
            let lit = xpath_literal(name);
            format!("{base}[normalize-space(.)={lit} or @aria-label={lit} or @value={lit}]")
        }
        None => base,
    }
}

/// Quote a string for use inside an XPath 1.0 expression
pub(crate) fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}
