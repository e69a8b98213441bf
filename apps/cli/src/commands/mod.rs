//! CLI command implementations.

mod auth;
mod navigate;
mod profile;

pub use auth::{login, logout, register, status};
pub use navigate::open;
pub use profile::{change_password, profile_update, ProfileUpdate};

use anyhow::{Context as _, Result};
use hive_config_and_utils::{init_logging, Config, Paths};
use hive_session::{
    HiveApiClient, Navigator, RetryConfig, Route, SessionError, SessionManager, ValidationErrors,
};
use hive_storage::CredentialStore;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Navigator for a terminal: remembers where the client would go next.
#[derive(Default)]
pub struct TerminalNavigator {
    last: Mutex<Option<Route>>,
}

impl TerminalNavigator {
    pub fn take_last(&self) -> Option<Route> {
        self.last.lock().take()
    }
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        tracing::debug!(route = %route, "Navigation requested");
        *self.last.lock() = Some(route);
    }
}

/// Everything a command needs, wired once per process.
pub struct Context {
    pub manager: Arc<SessionManager>,
    pub navigator: Arc<TerminalNavigator>,
    pub credentials: CredentialStore,
    pub config: Config,
}

impl Context {
    /// Load configuration, start logging and build the session.
    pub fn open(api_url: Option<&str>, log_level: Option<&str>) -> Result<Self> {
        let paths = Paths::new().context("Could not resolve the HiveBooks directory")?;
        paths.ensure_dirs()?;

        let mut config = Config::load(&paths).context("Could not load configuration")?;
        if let Some(url) = api_url {
            config.api_url = url.to_string();
        }
        if let Some(level) = log_level {
            config.log_level = level.to_string();
        }

        init_logging("cli", &config.log_level, &paths, false);

        let api = HiveApiClient::from_config(&config)?;
        let credentials = hive_storage::create_credential_store(&paths);
        let navigator = Arc::new(TerminalNavigator::default());
        let manager = Arc::new(SessionManager::with_retry_config(
            Arc::new(api),
            credentials.clone(),
            navigator.clone(),
            RetryConfig::from(&config.identity_retry),
        ));

        tracing::debug!(api_url = %config.api_url, "Session wired");
        Ok(Self {
            manager,
            navigator,
            credentials,
            config,
        })
    }
}

/// Prompt for a line of input, returning `existing` unchanged when given.
fn prompt_line(label: &str, existing: Option<String>) -> Result<String> {
    if let Some(value) = existing {
        return Ok(value);
    }
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Prompt for a secret without echo.
fn prompt_secret(label: &str) -> Result<String> {
    Ok(rpassword::prompt_password(format!("{}: ", label))?)
}

/// Ask user for confirmation.
fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Report each failing field, then fail the command.
fn reject_invalid(errors: ValidationErrors, format: &crate::output::OutputFormat) -> anyhow::Error {
    match format {
        crate::output::OutputFormat::Text => {
            for (field, message) in errors.iter() {
                eprintln!("  {}: {}", field, message);
            }
        }
        crate::output::OutputFormat::Json => {
            let json = serde_json::json!({"status": "error", "fields": &errors});
            eprintln!("{}", json);
        }
    }
    SessionError::Validation(errors).into()
}
