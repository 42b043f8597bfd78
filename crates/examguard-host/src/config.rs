//! Configuration and collaborator factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examguard_core::proctor::DEFAULT_VIOLATION_LIMIT;
use examguard_core::traits::{MediaDevices, QuestionSource};

use crate::devices::LocalDevices;
use crate::file::FileSource;
use crate::http::HttpSource;
use crate::mock::SimulatedDevices;

/// Where the test definition comes from.
///
/// Note: Custom Debug impl masks the bearer token to keep it out of logs.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    File {
        path: PathBuf,
    },
    Http {
        url: String,
        #[serde(default)]
        bearer_token: Option<String>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            SourceConfig::Http {
                url,
                bearer_token,
                timeout_secs,
            } => f
                .debug_struct("Http")
                .field("url", url)
                .field("bearer_token", &bearer_token.as_ref().map(|_| "***"))
                .field("timeout_secs", timeout_secs)
                .finish(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// How camera and microphone access is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    /// Open the local device nodes.
    #[default]
    Local,
    /// Pretend access was granted.
    Granted,
    /// Pretend access was refused.
    Denied,
}

impl std::str::FromStr for DeviceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(DeviceMode::Local),
            "granted" => Ok(DeviceMode::Granted),
            "denied" => Ok(DeviceMode::Denied),
            other => Err(format!(
                "unknown device mode '{other}' (expected local, granted or denied)"
            )),
        }
    }
}

/// Top-level examguard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamguardConfig {
    #[serde(default = "default_source")]
    pub source: SourceConfig,
    /// JSON file the result log is kept in.
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
    #[serde(default)]
    pub devices: DeviceMode,
    /// Violations allowed before the test is submitted automatically.
    #[serde(default = "default_violation_limit")]
    pub violation_limit: u32,
    /// How long notifications stay visible, in seconds.
    #[serde(default = "default_notification_secs")]
    pub notification_secs: u64,
}

fn default_source() -> SourceConfig {
    SourceConfig::File {
        path: PathBuf::from("question-sets/example.json"),
    }
}
fn default_results_path() -> PathBuf {
    PathBuf::from("./examguard-results/results.json")
}
fn default_violation_limit() -> u32 {
    DEFAULT_VIOLATION_LIMIT
}
fn default_notification_secs() -> u64 {
    3
}

impl Default for ExamguardConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            results_path: default_results_path(),
            devices: DeviceMode::default(),
            violation_limit: default_violation_limit(),
            notification_secs: default_notification_secs(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_source_config(config: &SourceConfig) -> SourceConfig {
    match config {
        SourceConfig::File { path } => SourceConfig::File {
            path: PathBuf::from(resolve_env_vars(&path.to_string_lossy())),
        },
        SourceConfig::Http {
            url,
            bearer_token,
            timeout_secs,
        } => SourceConfig::Http {
            url: resolve_env_vars(url),
            bearer_token: bearer_token
                .as_deref()
                .map(resolve_env_vars)
                .filter(|t| !t.is_empty()),
            timeout_secs: *timeout_secs,
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examguard.toml` in the current directory
/// 2. `~/.config/examguard/config.toml`
///
/// Environment variable overrides: `EXAMGUARD_SOURCE_URL`, `EXAMGUARD_TOKEN`.
pub fn load_config() -> Result<ExamguardConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamguardConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("examguard.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loading config");
            toml::from_str::<ExamguardConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamguardConfig::default(),
    };

    Ok(apply_env_overrides(config))
}

fn apply_env_overrides(mut config: ExamguardConfig) -> ExamguardConfig {
    if let Ok(url) = std::env::var("EXAMGUARD_SOURCE_URL") {
        let timeout_secs = match &config.source {
            SourceConfig::Http { timeout_secs, .. } => *timeout_secs,
            SourceConfig::File { .. } => default_timeout(),
        };
        let bearer_token = match &config.source {
            SourceConfig::Http { bearer_token, .. } => bearer_token.clone(),
            SourceConfig::File { .. } => None,
        };
        config.source = SourceConfig::Http {
            url,
            bearer_token,
            timeout_secs,
        };
    }

    if let Ok(token) = std::env::var("EXAMGUARD_TOKEN") {
        if let SourceConfig::Http { bearer_token, .. } = &mut config.source {
            *bearer_token = Some(token);
        }
    }

    config.source = resolve_source_config(&config.source);
    config
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examguard"))
}

/// Create a question source from its configuration.
pub fn create_source(config: &SourceConfig) -> Box<dyn QuestionSource> {
    match config {
        SourceConfig::File { path } => Box::new(FileSource::new(path)),
        SourceConfig::Http {
            url,
            bearer_token,
            timeout_secs,
        } => {
            let source = HttpSource::new(url).with_timeout(*timeout_secs);
            match bearer_token {
                Some(token) => Box::new(source.with_bearer_token(token)),
                None => Box::new(source),
            }
        }
    }
}

/// Create the media device backend for `mode`.
pub fn create_devices(mode: DeviceMode) -> Arc<dyn MediaDevices> {
    match mode {
        DeviceMode::Local => Arc::new(LocalDevices::new()),
        DeviceMode::Granted => Arc::new(SimulatedDevices::granting()),
        DeviceMode::Denied => Arc::new(SimulatedDevices::denying()),
    }
}
