use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::browser::WaitConfig;

/// Environment variable overriding `credentials.username`.
pub const USERNAME_ENV: &str = "BINCK_USERNAME";
/// Environment variable overriding `credentials.password`.
pub const PASSWORD_ENV: &str = "BINCK_PASSWORD";

fn default_base_url() -> String {
    "https://web.binck.be".to_string()
}

fn default_position_history_url() -> String {
    "https://login.binck.be/Klanten/Portefeuille/PositieOpbouw.aspx".to_string()
}

fn default_domicile() -> String {
    "Ireland".to_string()
}

/// Cookies the API calls need, by the domain that sets them.
fn default_cookies() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([(
        "web.binck.be".to_string(),
        vec![
            "ASP.NET_SessionId".to_string(),
            "__RequestVerificationToken".to_string(),
            ".ASPXAUTH".to_string(),
        ],
    )])
}

/// Labels and field names of the portal login form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub username_field: String,
    pub password_field: String,
    pub submit_button: String,
    /// Link that skips the second factor and opens a read-only session.
    pub two_factor_bypass_link: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            username_field: "UserName".to_string(),
            password_field: "Password".to_string(),
            submit_button: "Inloggen".to_string(),
            two_factor_bypass_link: "Alleen rekening raadplegen (zonder code)".to_string(),
        }
    }
}

/// Where the portal lives and how to log in to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Landing page, also the origin of the JSON endpoints.
    pub base_url: String,

    /// Legacy page listing the mutations of one position.
    pub position_history_url: String,

    pub login: LoginConfig,

    /// Cookie names to bridge into API calls, keyed by cookie domain.
    pub cookies: BTreeMap<String, Vec<String>>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            position_history_url: default_position_history_url(),
            login: LoginConfig::default(),
            cookies: default_cookies(),
        }
    }
}

/// Portal account. Never serialized back out.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
}

fn deserialize_secret<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl CredentialsConfig {
    /// Apply `BINCK_USERNAME` / `BINCK_PASSWORD` when set.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(USERNAME_ENV).ok(),
            std::env::var(PASSWORD_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, username: Option<String>, password: Option<String>) {
        if let Some(username) = username.filter(|u| !u.is_empty()) {
            self.username = Some(username);
        }
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            self.password = Some(SecretString::from(password));
        }
    }

    /// Username and password, or an error naming what is missing.
    pub fn require(&self) -> Result<(&str, &SecretString)> {
        let username = self.username.as_deref().with_context(|| {
            format!("No portal username configured (set credentials.username or {USERNAME_ENV})")
        })?;
        let password = self.password.as_ref().with_context(|| {
            format!("No portal password configured (set credentials.password or {PASSWORD_ENV})")
        })?;
        Ok((username, password))
    }
}

/// Chrome launch settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to the Chrome/Chromium binary; searched on PATH when unset.
    pub chrome_executable: Option<PathBuf>,

    pub headless: bool,

    /// Persistent profile directory; a throwaway profile when unset.
    pub profile_dir: Option<PathBuf>,
}

/// Report parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Year to report on. Defaults to the previous calendar year.
    pub year: Option<i32>,

    /// Country written next to every security.
    pub domicile: String,

    /// Directory exports are written to, relative to the config file.
    pub output_dir: Option<PathBuf>,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            year: None,
            domicile: default_domicile(),
            output_dir: None,
        }
    }
}

/// Top-level configuration for binck-export.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub credentials: CredentialsConfig,
    pub browser: BrowserConfig,
    pub wait: WaitConfig,
    pub reports: ReportsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        reqwest::Url::parse(&config.portal.base_url)
            .with_context(|| format!("Invalid portal.base_url: {}", config.portal.base_url))?;
        Ok(config)
    }

    /// Load config, falling back to defaults if the file doesn't exist.
    ///
    /// Environment credentials are applied either way.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.credentials.apply_env();
        Ok(config)
    }

    /// Output directory, resolved relative to the config file's directory.
    pub fn resolve_output_dir(&self, config_path: &Path) -> PathBuf {
        let config_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        match &self.reports.output_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => config_dir.join(dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./binck-export.toml` if it exists in current directory
/// 2. `~/.config/binck-export/binck-export.toml`
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("binck-export.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("binck-export").join("binck-export.toml");
    }

    local_config
}
