use crate::harvest::timing::DEFAULT_JITTER_SCALE;
use crate::harvest::{FailureLedger, LedgerLayout};
use crate::scrapers::types::SiteRules;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const USERNAME_ENV: &str = "MLS_SCOUT_USERNAME";
pub const PASSWORD_ENV: &str = "MLS_SCOUT_PASSWORD";

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub credentials: CredentialsConfig,
    pub portal: PortalConfig,
    pub output: OutputConfig,
    pub timing: TimingConfig,
    pub site: SiteRules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Plain text file holding just the username
    pub username_file: Option<String>,
    /// Credential store service the password is kept under
    pub keyring_service: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            username_file: None,
            keyring_service: "viewpoint".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub login_url: String,
    pub headless: bool,
    /// Saved search to open after logging in; the landing page otherwise
    pub saved_search: Option<String>,
    pub dashboard_label: String,
    pub saved_searches_label: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: "https://www.viewpoint.ca/user/login#!/new-today-list/".to_string(),
            headless: true,
            saved_search: None,
            dashboard_label: "DASHBOARD".to_string(),
            saved_searches_label: "SAVED SEARCHES".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output files are named `<base>YYYYMMDD_<n>.csv`
    pub base: String,
    pub ledger_dir: String,
    pub ledger_layout: LedgerLayout,
    pub failed_subdir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base: "data/listings_".to_string(),
            ledger_dir: "logs".to_string(),
            ledger_layout: LedgerLayout::Nested,
            failed_subdir: "failed".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn ledger(&self) -> FailureLedger {
        FailureLedger::new(&self.ledger_dir, self.ledger_layout).with_subdir(&self.failed_subdir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub jitter_scale: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            jitter_scale: DEFAULT_JITTER_SCALE,
        }
    }
}

impl ScoutConfig {
    /// Read the config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;

        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.site.entry_markers.is_empty() {
            anyhow::bail!("site.entry_markers must name at least one phrase");
        }
        if self.site.print_class.trim().is_empty() {
            anyhow::bail!("site.print_class must not be empty");
        }
        if self.output.base.trim().is_empty() {
            anyhow::bail!("output.base must not be empty");
        }
        Ok(())
    }
}

/// Portal login
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl CredentialsConfig {
    /// Username from the config, the username file, or the environment;
    /// password from the config, the environment, or the credential store
    pub fn resolve(&self) -> Result<Credentials> {
        let username = match (&self.username, &self.username_file) {
            (Some(username), _) => username.clone(),
            (None, Some(file)) => fs::read_to_string(file)
                .with_context(|| format!("Failed to read username file {file}"))?,
            (None, None) => std::env::var(USERNAME_ENV)
                .with_context(|| format!("No username configured and {USERNAME_ENV} is not set"))?,
        };
        let username = username.trim().to_string();

        let password = match &self.password {
            Some(password) => password.clone(),
            None => match std::env::var(PASSWORD_ENV) {
                Ok(password) => password,
                Err(_) => self.password_from_keyring(&username)?,
            },
        };

        Ok(Credentials { username, password })
    }

    #[cfg(feature = "keychain")]
    fn password_from_keyring(&self, username: &str) -> Result<String> {
        let entry = keyring::Entry::new(&self.keyring_service, username)
            .context("Failed to access credential store")?;
        entry
            .get_password()
            .with_context(|| format!("No password stored for {username} in {}", self.keyring_service))
    }

    #[cfg(not(feature = "keychain"))]
    fn password_from_keyring(&self, _username: &str) -> Result<String> {
        anyhow::bail!(
            "No password configured; set {PASSWORD_ENV} or build with the keychain feature to use service {:?}",
            self.keyring_service
        )
    }
}
