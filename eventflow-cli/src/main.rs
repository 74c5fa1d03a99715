//! Eventflow CLI
//!
//! Runs the login and create-event smoke flow against a WebDriver browser
//! and helps get credentials and selectors right for it.
//!
//! Usage from workspace root:
//!   cargo run --bin eventflow -- run                 # Headless run with defaults
//!   cargo run --bin eventflow -- run --headed --assisted
//!   cargo run --bin eventflow -- doctor              # Inspect .env line by line
//!   cargo run --bin eventflow -- fix-env --email qa@example.com
//!   cargo run --bin eventflow -- inspect             # List inputs/buttons on the login page

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use eventflow::engines::{BrowserKind, WebDriverLauncher};
use eventflow::env_file::{diagnose, fix_env_file, EnvFix};
use eventflow::inspect::inspect_page;
use eventflow::{
    Browser, Credentials, EventDraft, FlowConfig, FlowError, FlowMode, LoginAndCreateEventFlow,
    SessionLauncher,
};
use tracing::{info, warn};

mod run_summary;

use run_summary::RunSummary;

const DEFAULT_CONFIG_FILE: &str = "eventflow.yaml";

#[derive(Parser)]
#[command(name = "eventflow")]
#[command(about = "Browser smoke test: log in, create an event, keep a screenshot")]
struct Cli {
    /// Verbose logging (same as RUST_LOG=debug)
    #[clap(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[clap(rename_all = "lower")]
enum BrowserArg {
    Chrome,
    Edge,
}

impl From<BrowserArg> for BrowserKind {
    fn from(arg: BrowserArg) -> Self {
        match arg {
            BrowserArg::Chrome => BrowserKind::Chrome,
            BrowserArg::Edge => BrowserKind::Edge,
        }
    }
}

#[derive(Parser, Debug)]
struct SessionArgs {
    /// YAML config file (defaults to ./eventflow.yaml when present)
    #[clap(long, short = 'c', env = "EVENTFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Site root, e.g. https://events.webmobi.com
    #[clap(long, env = "EVENTFLOW_BASE_URL")]
    base_url: Option<String>,

    /// WebDriver server, e.g. http://localhost:9515
    #[clap(long, env = "EVENTFLOW_WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    #[clap(long, value_enum)]
    browser: Option<BrowserArg>,

    /// Show the browser window
    #[clap(long)]
    headed: bool,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[clap(flatten)]
    session: SessionArgs,

    /// Env file holding the credentials
    #[clap(long)]
    env_file: Option<PathBuf>,

    /// Let an operator open the create form by hand if the control is missing
    #[clap(long)]
    assisted: bool,

    /// Directory for evidence screenshots
    #[clap(long)]
    evidence_dir: Option<PathBuf>,

    /// Description for the created event
    #[clap(long)]
    description: Option<String>,

    /// Print the result as JSON
    #[clap(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct DoctorArgs {
    #[clap(long, default_value = ".env")]
    env_file: PathBuf,

    #[clap(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct FixEnvArgs {
    #[clap(long, default_value = ".env")]
    env_file: PathBuf,

    /// Login email to store
    #[clap(long)]
    email: Option<String>,

    /// Password to store (read from the environment to keep it out of shell history)
    #[clap(long, env = "EVENTFLOW_NEW_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[clap(flatten)]
    session: SessionArgs,

    /// Page to inspect (defaults to the login page)
    #[clap(long)]
    url: Option<String>,

    #[clap(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, create an event and verify it
    Run(RunArgs),
    /// Report on every line of an env file, secrets masked
    Doctor(DoctorArgs),
    /// Rewrite an env file into clean KEY=value form and set credentials
    FixEnv(FixEnvArgs),
    /// List the inputs and buttons a page offers
    Inspect(InspectArgs),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Failed to create Tokio runtime: {e}");
            std::process::exit(2);
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Commands::Run(args) => run(args).await,
            Commands::Doctor(args) => doctor(args),
            Commands::FixEnv(args) => fix_env(args),
            Commands::Inspect(args) => inspect(args).await,
        }
    });

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("❌ {e:#}");
            std::process::exit(2);
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                // thirtyfour logs every WebDriver command at debug
                .unwrap_or_else(|_| format!("{default},thirtyfour=warn").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load_config(args: &SessionArgs) -> Result<FlowConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Some(PathBuf::from(DEFAULT_CONFIG_FILE)),
        None => None,
    };
    let mut config = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            FlowConfig::from_yaml_file(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => FlowConfig::default(),
    };

    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(url) = &args.webdriver_url {
        config.webdriver.server_url = url.clone();
    }
    if let Some(browser) = args.browser {
        config.webdriver.browser = browser.into();
    }
    if args.headed {
        config.webdriver.headless = false;
    }
    Ok(config)
}

async fn run(args: RunArgs) -> Result<bool> {
    let mut config = load_config(&args.session)?;
    if let Some(env_file) = args.env_file {
        config.env_file = env_file;
    }
    if let Some(dir) = args.evidence_dir {
        config.evidence_dir = dir;
    }
    if args.assisted {
        config.mode = FlowMode::Assisted;
        if config.webdriver.headless {
            warn!("Assisted mode with a headless browser; nobody can open the form by hand");
        }
    }

    let launcher = Arc::new(WebDriverLauncher::new(config.webdriver.clone()));
    let flow = LoginAndCreateEventFlow::from_config(config, launcher)?;
    let mut draft = EventDraft::generate();
    if let Some(description) = args.description {
        draft = draft.with_description(description);
    }
    info!(event = %draft.name, "Starting Create Event flow");

    let started = Instant::now();
    let result = flow.run(&draft).await;
    let elapsed = started.elapsed().as_millis() as u64;

    let summary = match &result {
        Ok(report) => RunSummary::from_report(report, elapsed),
        Err(e) => RunSummary::from_error(&draft.name, e, elapsed),
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary.to_json())?);
    } else {
        summary.display();
    }
    Ok(summary.success())
}

fn doctor(args: DoctorArgs) -> Result<bool> {
    let content = match std::fs::read_to_string(&args.env_file) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("❌ {} not found", args.env_file.display());
            return Ok(false);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", args.env_file.display()))
        }
    };

    let report = diagnose(&content);
    let keys = eventflow::credentials::CredentialKeys::default();
    let credentials = Credentials::load(Some(&args.env_file), &keys);

    if args.json {
        let resolved = match &credentials {
            Ok(c) => serde_json::json!({ "ok": true, "email": c.masked_email() }),
            Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }),
        };
        let value = serde_json::json!({ "report": report, "credentials": resolved });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{report}");
        match &credentials {
            Ok(c) => println!("✅ Credentials resolve (email {})", c.masked_email()),
            Err(e) => println!("❌ {e}"),
        }
    }
    Ok(report.invalid_count() == 0 && credentials.is_ok())
}

fn fix_env(args: FixEnvArgs) -> Result<bool> {
    let keys = eventflow::credentials::CredentialKeys::default();
    let mut updates = Vec::new();
    if let Some(email) = args.email {
        updates.push((keys.email[0].clone(), email));
    }
    if let Some(password) = args.password {
        updates.push((keys.password[0].clone(), password));
    }

    let result = fix_env_file(&args.env_file, &updates, &keys);
    let (message, ok) = describe_fix(&args.env_file, &result);
    println!("{message}");
    Ok(ok)
}

fn describe_fix(env_file: &Path, result: &Result<EnvFix, FlowError>) -> (String, bool) {
    match result {
        Ok(EnvFix {
            credentials: Ok(credentials),
            ..
        }) => (
            format!(
                "✅ Rewrote {} (email {})",
                env_file.display(),
                credentials.masked_email()
            ),
            true,
        ),
        Ok(EnvFix {
            credentials: Err(e),
            ..
        }) => (format!("⚠️  Rewrote {} but: {e}", env_file.display()), false),
        Err(e) => (
            format!("❌ Left {} unchanged: {e}", env_file.display()),
            false,
        ),
    }
}

async fn inspect(args: InspectArgs) -> Result<bool> {
    let config = load_config(&args.session)?;
    let url = args.url.unwrap_or_else(|| config.login_url());

    let launcher = WebDriverLauncher::new(config.webdriver.clone());
    let engine = launcher
        .launch()
        .await
        .context("Could not start a WebDriver session")?;
    let browser = Browser::new(Arc::from(engine));

    let inventory = inspect_page(&browser, &url, config.timeouts.page_settle()).await;
    if let Err(e) = browser.close().await {
        warn!(error = %e, "Failed to close browser session");
    }
    let inventory = inventory?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
    } else {
        println!("Page: {}", inventory.url);
        println!("Found {} inputs:", inventory.inputs.len());
        for html in &inventory.inputs {
            println!("  {html}");
        }
        println!("Found {} buttons:", inventory.buttons.len());
        for text in &inventory.buttons {
            println!("  {text:?}");
        }
    }
    Ok(!inventory.inputs.is_empty())
}
