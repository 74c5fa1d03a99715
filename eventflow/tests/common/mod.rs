//! In-memory stand-in for the event-management site.
//!
//! `StubSite` models the pages the flow walks through (login, dashboard,
//! create form, post-create dashboard) and implements `BrowserEngine`, so
//! flow behaviour can be tested without a browser.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eventflow::{
    AutomationError, BrowserEngine, Element, ElementImpl, FlowConfig, Key, ScreenshotResult,
    Selector, SessionLauncher, Timeouts,
};

pub mod stub_server;

pub const BASE_URL: &str = "http://stub.test";
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nstub";

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// `name` and `id` attributes
    NameAndId,
    /// Only `id`, no `name`
    IdOnly,
}

#[derive(Debug, Clone)]
pub struct SiteOptions {
    pub email: String,
    pub password: String,
    pub login_fields: Addressing,
    pub login_button: bool,
    /// Redirect to `/dashboard` after login; otherwise `/home`
    pub dashboard_url: bool,
    pub dashboard_heading: bool,
    pub create_label: Option<String>,
    pub create_form: bool,
    pub show_toast: bool,
    pub show_list_entry: bool,
    /// Events from earlier runs already listed on the dashboard
    pub existing_events: Vec<String>,
    /// Render a hidden `name=email` input ahead of the real one
    pub hidden_decoy: bool,
    /// `document.readyState` stays `loading`
    pub never_loads: bool,
    pub screenshot_delay: Duration,
}

impl Default for SiteOptions {
    fn default() -> Self {
        Self {
            email: "qa@example.com".to_string(),
            password: "Secret#1".to_string(),
            login_fields: Addressing::NameAndId,
            login_button: true,
            dashboard_url: true,
            dashboard_heading: true,
            create_label: Some("Create Event".to_string()),
            create_form: true,
            show_toast: true,
            show_list_entry: true,
            existing_events: Vec::new(),
            hidden_decoy: false,
            never_loads: false,
            screenshot_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Blank,
    Login,
    Dashboard,
    CreateForm,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    SubmitLogin,
    OpenCreateForm,
    SubmitEvent,
}

#[derive(Debug, Clone)]
struct Node {
    tag: &'static str,
    attrs: Vec<(&'static str, String)>,
    text: String,
    visible: bool,
    action: Option<Action>,
}

impl Node {
    fn new(tag: &'static str, text: &str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            text: text.to_string(),
            visible: true,
            action: None,
        }
    }

    fn attr(mut self, name: &'static str, value: &str) -> Self {
        self.attrs.push((name, value.to_string()));
        self
    }

    fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Key under which a filled value is stored
    fn field_key(&self) -> Option<String> {
        self.get("id").or_else(|| self.get("name")).map(String::from)
    }

    fn outer_html(&self) -> String {
        let attrs: String = self
            .attrs
            .iter()
            .map(|(k, v)| format!(" {k}=\"{v}\""))
            .collect();
        format!("<{}{}>{}</{}>", self.tag, attrs, self.text, self.tag)
    }

    fn role(&self) -> Option<&'static str> {
        match self.tag {
            "button" => Some("button"),
            "input" if self.get("type") == Some("submit") => Some("button"),
            "a" => Some("link"),
            "h1" | "h2" => Some("heading"),
            "form" => Some("form"),
            _ => None,
        }
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Name(name) => self.get("name") == Some(name.as_str()),
            Selector::Id(id) => self.get("id") == Some(id.as_str()),
            Selector::Text(text) => self.text.contains(text.as_str()),
            Selector::Role { role, name } => {
                self.role() == Some(role.as_str())
                    && name
                        .as_ref()
                        .map_or(true, |n| self.text.trim() == n.as_str())
            }
            Selector::HasText { tag, text } => self.tag == tag && self.text.contains(text.as_str()),
            Selector::Css(css) => css.split(',').any(|alt| self.matches_css(alt.trim())),
            Selector::XPath(_) | Selector::Invalid(_) => false,
        }
    }

    /// Tiny CSS subset: `tag`, `tag#id`, `tag[attr='v']`, descendant lists
    /// matched on their last compound only.
    fn matches_css(&self, css: &str) -> bool {
        let compound = css.split_whitespace().last().unwrap_or(css);
        let (head, attr) = match compound.split_once('[') {
            Some((head, rest)) => (head, Some(rest.trim_end_matches(']'))),
            None => (compound, None),
        };
        let (tag, id) = match head.split_once('#') {
            Some((tag, id)) => (tag, Some(id)),
            None => (head, None),
        };
        if !tag.is_empty() && tag != self.tag {
            return false;
        }
        if let Some(id) = id {
            if self.get("id") != Some(id) {
                return false;
            }
        }
        if let Some(attr) = attr {
            let (name, value) = attr.split_once('=').unwrap_or((attr, ""));
            let value = value.trim_matches(|c| c == '\'' || c == '"');
            if self.get(name) != Some(value) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug)]
pub struct SiteState {
    pub options: SiteOptions,
    pub page: Page,
    pub url: String,
    /// Bumped on every page change; older element handles go stale
    pub generation: u64,
    pub fields: HashMap<String, String>,
    pub created_events: Vec<String>,
    pub log: Vec<String>,
    pub navigations: usize,
    pub screenshots: usize,
    pub closed: bool,
    pub login_error: bool,
}

impl SiteState {
    fn go(&mut self, page: Page, path: &str) {
        self.page = page;
        self.url = format!("{BASE_URL}{path}");
        self.generation += 1;
    }

    fn nodes(&self) -> Vec<Node> {
        let opts = &self.options;
        let field = |tag: &'static str, key: &str, kind: &str, addressing: Addressing| {
            let node = Node::new(tag, "").attr("id", key).attr("type", kind);
            match addressing {
                Addressing::NameAndId => node.attr("name", key),
                Addressing::IdOnly => node,
            }
        };
        let mut nodes = Vec::new();
        match self.page {
            Page::Blank => {}
            Page::Login => {
                nodes.push(Node::new("h2", "Sign in"));
                if opts.hidden_decoy {
                    let mut decoy = Node::new("input", "")
                        .attr("id", "email-decoy")
                        .attr("name", "email")
                        .attr("class", "hidden");
                    decoy.visible = false;
                    nodes.push(decoy);
                }
                nodes.push(field("input", "email", "email", opts.login_fields));
                nodes.push(field("input", "password", "password", opts.login_fields));
                if opts.login_button {
                    nodes.push(
                        Node::new("button", "Login")
                            .attr("type", "submit")
                            .action(Action::SubmitLogin),
                    );
                }
                if self.login_error {
                    nodes.push(Node::new("div", "Invalid email or password"));
                }
            }
            Page::Dashboard | Page::Created => {
                if self.page == Page::Created && opts.show_toast {
                    nodes.push(Node::new("div", "Event created successfully").attr("role", "alert"));
                }
                if opts.dashboard_heading {
                    nodes.push(Node::new("h1", "Dashboard"));
                }
                if let Some(label) = &opts.create_label {
                    nodes.push(Node::new("button", label).action(Action::OpenCreateForm));
                }
                for name in &opts.existing_events {
                    nodes.push(Node::new("a", name).attr("href", "/events/old"));
                }
                if self.page == Page::Created && opts.show_list_entry {
                    for name in &self.created_events {
                        nodes.push(Node::new("a", name).attr("href", "/events/1"));
                    }
                }
            }
            Page::CreateForm => {
                if opts.create_form {
                    nodes.push(
                        Node::new("form", "Create Event").attr("id", "create-event-form"),
                    );
                    nodes.push(field("input", "eventName", "text", Addressing::NameAndId));
                    nodes.push(field(
                        "textarea",
                        "eventDescription",
                        "text",
                        Addressing::NameAndId,
                    ));
                    nodes.push(field("input", "eventStartDate", "date", Addressing::NameAndId));
                    nodes.push(
                        Node::new("button", "Create")
                            .attr("type", "submit")
                            .action(Action::SubmitEvent),
                    );
                } else {
                    nodes.push(Node::new("p", "Loading..."));
                }
            }
        }
        nodes
    }

    fn apply(&mut self, action: Action) {
        self.log.push(format!("action {action:?}"));
        match action {
            Action::SubmitLogin => {
                let email = self.fields.get("email").cloned().unwrap_or_default();
                let password = self.fields.get("password").cloned().unwrap_or_default();
                if email == self.options.email && password == self.options.password {
                    self.login_error = false;
                    let path = if self.options.dashboard_url {
                        "/dashboard"
                    } else {
                        "/home"
                    };
                    self.go(Page::Dashboard, path);
                } else {
                    self.login_error = true;
                    self.generation += 1;
                }
            }
            Action::OpenCreateForm => self.go(Page::CreateForm, "/events/new"),
            Action::SubmitEvent => {
                let name = self.fields.get("eventName").cloned().unwrap_or_default();
                let filled = ["eventName", "eventDescription", "eventStartDate"]
                    .iter()
                    .all(|k| self.fields.get(*k).is_some_and(|v| !v.is_empty()));
                if filled {
                    self.created_events.push(name);
                    let path = if self.options.dashboard_url {
                        "/dashboard"
                    } else {
                        "/home"
                    };
                    self.go(Page::Created, path);
                }
            }
        }
    }
}

/// Handle shared by the test, the launcher and every engine it creates
#[derive(Debug, Clone)]
pub struct StubSite {
    pub state: Arc<Mutex<SiteState>>,
}

impl StubSite {
    pub fn new(options: SiteOptions) -> Self {
        Self {
            state: Arc::new(Mutex::new(SiteState {
                options,
                page: Page::Blank,
                url: "about:blank".to_string(),
                generation: 0,
                fields: HashMap::new(),
                created_events: Vec::new(),
                log: Vec::new(),
                navigations: 0,
                screenshots: 0,
                closed: false,
                login_error: false,
            })),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SiteState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Simulate an operator opening the create form by hand.
    pub fn open_create_form_manually(&self) {
        self.with(|s| s.go(Page::CreateForm, "/events/new"));
    }

    pub fn engine(&self) -> StubEngine {
        StubEngine { site: self.clone() }
    }
}

pub struct StubEngine {
    site: StubSite,
}

impl StubEngine {
    fn live<R>(&self, f: impl FnOnce(&mut SiteState) -> R) -> Result<R, AutomationError> {
        self.site.with(|s| {
            if s.closed {
                Err(AutomationError::SessionClosed)
            } else {
                Ok(f(s))
            }
        })
    }
}

#[async_trait::async_trait]
impl BrowserEngine for StubEngine {
    fn name(&self) -> String {
        "stub".to_string()
    }

    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.live(|s| {
            s.navigations += 1;
            s.log.push(format!("navigate {url}"));
            match url.strip_prefix(BASE_URL) {
                Some("/login") => s.go(Page::Login, "/login"),
                Some(path) => s.go(Page::Blank, path),
                None => s.go(Page::Blank, "/"),
            }
        })
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        self.live(|s| s.url.clone())
    }

    async fn ready_state(&self) -> Result<String, AutomationError> {
        self.live(|s| {
            if s.options.never_loads {
                "loading".to_string()
            } else {
                "complete".to_string()
            }
        })
    }

    async fn query(&self, selector: &Selector) -> Result<Vec<Element>, AutomationError> {
        if let Selector::Invalid(reason) = selector {
            return Err(AutomationError::InvalidSelector(reason.clone()));
        }
        let site = self.site.clone();
        self.live(|s| {
            s.nodes()
                .into_iter()
                .enumerate()
                .filter(|(_, node)| node.matches(selector))
                .map(|(index, node)| {
                    Element::new(Box::new(StubElement {
                        site: site.clone(),
                        generation: s.generation,
                        index,
                        label: format!("{selector} -> {}", node.outer_html()),
                    }))
                })
                .collect()
        })
    }

    async fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        self.live(|s| s.log.push(format!("page key {key:?}")))
    }

    async fn screenshot(&self) -> Result<ScreenshotResult, AutomationError> {
        let delay = self.site.with(|s| s.options.screenshot_delay);
        tokio::time::sleep(delay).await;
        self.live(|s| {
            s.screenshots += 1;
            ScreenshotResult {
                png: FAKE_PNG.to_vec(),
            }
        })
    }

    async fn close(&self) -> Result<(), AutomationError> {
        self.site.with(|s| {
            if s.closed {
                return Err(AutomationError::SessionClosed);
            }
            s.closed = true;
            s.log.push("close".to_string());
            Ok(())
        })
    }
}

#[derive(Debug)]
struct StubElement {
    site: StubSite,
    generation: u64,
    index: usize,
    label: String,
}

impl StubElement {
    fn node<R>(&self, f: impl FnOnce(&mut SiteState, Node) -> R) -> Result<R, AutomationError> {
        self.site.with(|s| {
            if s.closed {
                return Err(AutomationError::SessionClosed);
            }
            if s.generation != self.generation {
                return Err(AutomationError::ElementNotFound(format!(
                    "stale element {}",
                    self.label
                )));
            }
            let node = s.nodes().into_iter().nth(self.index).ok_or_else(|| {
                AutomationError::ElementNotFound(format!("detached element {}", self.label))
            })?;
            Ok(f(s, node))
        })
    }
}

#[async_trait::async_trait]
impl ElementImpl for StubElement {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn click(&self) -> Result<(), AutomationError> {
        self.node(|s, node| {
            s.log.push(format!("click {}", node.text));
            if let Some(action) = node.action {
                s.apply(action);
            }
        })
    }

    async fn fill(&self, value: &str) -> Result<(), AutomationError> {
        self.node(|s, node| {
            if let Some(key) = node.field_key() {
                s.log.push(format!("fill {key}"));
                s.fields.insert(key, value.to_string());
            }
        })
    }

    async fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        self.node(|s, node| {
            s.log.push(format!("key {key:?} on {}", node.field_key().unwrap_or_default()));
            if key == Key::Enter && s.page == Page::Login && node.tag == "input" {
                s.apply(Action::SubmitLogin);
            }
        })
    }

    async fn text(&self) -> Result<String, AutomationError> {
        self.node(|_, node| node.text.clone())
    }

    async fn outer_html(&self) -> Result<String, AutomationError> {
        self.node(|_, node| node.outer_html())
    }

    async fn is_visible(&self) -> Result<bool, AutomationError> {
        self.node(|_, node| node.visible)
    }
}

/// Hands out engines bound to one `StubSite` and counts launches
pub struct StubLauncher {
    pub site: StubSite,
    pub launches: AtomicUsize,
}

impl StubLauncher {
    pub fn new(site: StubSite) -> Arc<Self> {
        Arc::new(Self {
            site,
            launches: AtomicUsize::new(0),
        })
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionLauncher for StubLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserEngine>, AutomationError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.site.engine()))
    }
}

/// A launcher whose driver server is unreachable
pub struct UnreachableLauncher;

#[async_trait::async_trait]
impl SessionLauncher for UnreachableLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserEngine>, AutomationError> {
        Err(AutomationError::PlatformError(
            "connection refused (localhost:9515)".to_string(),
        ))
    }
}

/// Config pointing at the stub site with short timeouts and a private
/// evidence directory.
pub fn stub_config(evidence_dir: &std::path::Path) -> FlowConfig {
    FlowConfig {
        base_url: BASE_URL.to_string(),
        timeouts: Timeouts::fast(),
        evidence_dir: evidence_dir.to_path_buf(),
        ..FlowConfig::default()
    }
}

/// Names of every file in `dir`, sorted
pub fn evidence_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
