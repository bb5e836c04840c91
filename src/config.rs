use anyhow::{Context, Result};
use folio_core::orchestrator::{OwnershipPolicy, SIMPLE_UPLOAD_LIMIT, WINDOW_SIZE};
use folio_core::rank::AxisMode;
use folio_core::render::Defaults;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Values shipped in sample configs that must be replaced before use.
const PLACEHOLDERS: &[&str] = &["YOUR_CLIENT_ID_HERE", "YOUR_API_KEY_HERE"];

/// Resumable window sizes must be multiples of this many bytes.
pub const WINDOW_GRANULARITY: u64 = 256 * 1024;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub rank: RankConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_document")]
    pub document: String,
    #[serde(default = "default_template")]
    pub template: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub rank_feed: Option<String>,
    #[serde(default)]
    pub rank_axis: AxisMode,
    #[serde(default)]
    pub defaults: Defaults,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            document: default_document(),
            template: default_template(),
            output: default_output(),
            rank_feed: None,
            rank_axis: AxisMode::default(),
            defaults: Defaults::default(),
        }
    }
}

fn default_document() -> String {
    "data.yaml".to_string()
}
fn default_template() -> PathBuf {
    PathBuf::from("site/index.template.html")
}
fn default_output() -> PathBuf {
    PathBuf::from("dist/index.html")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub default_folder_id: Option<String>,
    #[serde(default)]
    pub ownership: OwnershipPolicy,
    #[serde(default = "default_simple_upload_limit")]
    pub simple_upload_limit: u64,
    #[serde(default = "default_window_size")]
    pub window_size: u64,
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_key: None,
            default_folder_id: None,
            ownership: OwnershipPolicy::default(),
            simple_upload_limit: SIMPLE_UPLOAD_LIMIT,
            window_size: WINDOW_SIZE,
            redirect_port: default_redirect_port(),
        }
    }
}

fn default_simple_upload_limit() -> u64 {
    SIMPLE_UPLOAD_LIMIT
}
fn default_window_size() -> u64 {
    WINDOW_SIZE
}
fn default_redirect_port() -> u16 {
    8765
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_rank_file")]
    pub data_file: PathBuf,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            username: None,
            data_file: default_rank_file(),
        }
    }
}

fn default_rank_file() -> PathBuf {
    PathBuf::from("leetcode-rank-data.json")
}

/// Required Drive settings that are unset or still placeholders.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("missing Google Drive configuration: {}", missing.join(", "))]
pub struct ConfigMissing {
    pub missing: Vec<&'static str>,
}

/// Drive credentials, present and non-placeholder.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("api_key", &"<redacted>")
            .finish()
    }
}

fn configured(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !PLACEHOLDERS.contains(v))
        .map(str::to_string)
}

impl DriveConfig {
    pub fn credentials(&self) -> std::result::Result<Credentials, ConfigMissing> {
        let client_id = configured(&self.client_id);
        let api_key = configured(&self.api_key);
        let mut missing = Vec::new();
        if client_id.is_none() {
            missing.push("drive.client_id");
        }
        if api_key.is_none() {
            missing.push("drive.api_key");
        }
        match (client_id, api_key) {
            (Some(client_id), Some(api_key)) => Ok(Credentials {
                client_id,
                client_secret: configured(&self.client_secret),
                api_key,
            }),
            _ => Err(ConfigMissing { missing }),
        }
    }

    pub fn folder_id(&self) -> Option<String> {
        configured(&self.default_folder_id)
    }

    fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut Option<String>); 4] = [
            ("FOLIO_CLIENT_ID", &mut self.client_id),
            ("FOLIO_CLIENT_SECRET", &mut self.client_secret),
            ("FOLIO_API_KEY", &mut self.api_key),
            ("FOLIO_FOLDER_ID", &mut self.default_folder_id),
        ];
        for (key, slot) in overrides {
            if let Some(value) = env(key).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    load_config_with_env(path, &|key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with_env(path: &Path, env: &dyn Fn(&str) -> Option<String>) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.drive.apply_env(env);

    // Validate drive
    if config.drive.window_size == 0 || config.drive.window_size % WINDOW_GRANULARITY != 0 {
        anyhow::bail!(
            "drive.window_size must be a positive multiple of {} bytes (got {})",
            WINDOW_GRANULARITY,
            config.drive.window_size
        );
    }
    if config.drive.simple_upload_limit == 0 {
        anyhow::bail!("drive.simple_upload_limit must be > 0");
    }

    // Validate http
    if config.http.timeout_secs == 0 {
        anyhow::bail!("http.timeout_secs must be > 0");
    }

    // Validate site
    if config.site.document.trim().is_empty() {
        anyhow::bail!("site.document must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = write("");
        let config = load_config_with_env(file.path(), &no_env).unwrap();
        assert_eq!(config.site.document, "data.yaml");
        assert_eq!(config.drive.window_size, 262_144);
        assert_eq!(config.drive.simple_upload_limit, 5_242_880);
        assert_eq!(config.drive.ownership, OwnershipPolicy::BestEffort);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.site.rank_axis, AxisMode::Auto);
    }

    #[test]
    fn placeholders_count_as_missing() {
        let file = write(
            r#"
[drive]
client_id = "YOUR_CLIENT_ID_HERE"
api_key = "YOUR_API_KEY_HERE"
"#,
        );
        let config = load_config_with_env(file.path(), &no_env).unwrap();
        let err = config.drive.credentials().unwrap_err();
        assert_eq!(err.missing, vec!["drive.client_id", "drive.api_key"]);
    }

    #[test]
    fn env_overrides_file() {
        let file = write(
            r#"
[drive]
client_id = "YOUR_CLIENT_ID_HERE"
api_key = "file-key"
"#,
        );
        let env = |key: &str| match key {
            "FOLIO_CLIENT_ID" => Some("env-client".to_string()),
            "FOLIO_FOLDER_ID" => Some("F9".to_string()),
            _ => None,
        };
        let config = load_config_with_env(file.path(), &env).unwrap();
        let creds = config.drive.credentials().unwrap();
        assert_eq!(creds.client_id, "env-client");
        assert_eq!(creds.api_key, "file-key");
        assert_eq!(config.drive.folder_id().as_deref(), Some("F9"));
    }

    #[test]
    fn window_size_must_be_aligned() {
        let file = write("[drive]\nwindow_size = 100000\n");
        let err = load_config_with_env(file.path(), &no_env).unwrap_err();
        assert!(err.to_string().contains("multiple of 262144"));
    }

    #[test]
    fn site_defaults_override() {
        let file = write(
            r#"
[site]
rank_axis = "inverted"

[site.defaults]
link_text = "Open"
"#,
        );
        let config = load_config_with_env(file.path(), &no_env).unwrap();
        assert_eq!(config.site.rank_axis, AxisMode::Inverted);
        assert_eq!(config.site.defaults.link_text, "Open");
        assert_eq!(config.site.defaults.company, "Unknown Company");
    }

    #[test]
    fn ownership_policy_from_toml() {
        let file = write("[drive]\nownership = \"required\"\n");
        let config = load_config_with_env(file.path(), &no_env).unwrap();
        assert_eq!(config.drive.ownership, OwnershipPolicy::Required);
    }
}
