use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use directories::ProjectDirs;
use anyhow::Result;
use std::fs;

pub const QUALIFIER: &str = "org";
pub const ORGANIZATION: &str = "desktop-gen";
pub const APPLICATION: &str = "desktop-gen";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
    /// Time between SIGTERM and SIGKILL for a probe that overran its timeout.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

fn default_probe_timeout_ms() -> u64 { 2000 }
fn default_kill_grace_ms() -> u64 { 2000 }

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout_ms(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout_secs() -> u64 { 10 }
fn default_user_agent() -> String { format!("desktop-gen/{}", env!("CARGO_PKG_VERSION")) }

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct OutputConfig {
    /// Page titles longer than this are cut when used as a Name.
    #[serde(default = "default_name_max_chars")]
    pub name_max_chars: usize,
    #[serde(default)]
    pub keep_empty: bool,
    #[serde(default = "default_section")]
    pub section: String,
}

fn default_name_max_chars() -> usize { 32 }
fn default_section() -> String { "Entry".to_string() }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            name_max_chars: default_name_max_chars(),
            keep_empty: false,
            section: default_section(),
        }
    }
}

pub fn config_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

pub fn load_config() -> Result<Config> {
    let config_path = config_path();
    if !config_path.exists() {
        log::debug!("No config at {:?}, using defaults", config_path);
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&config_path)?;
    let config: Config = toml::from_str(&content)?;
    log::debug!("Loaded config from {:?}", config_path);
    Ok(config)
}
