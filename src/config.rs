use crate::backend::meili::{DEFAULT_POLL_INTERVAL, DEFAULT_TASK_TIMEOUT};
use crate::scanner::DEFAULT_EXTENSION;
use crate::service::DEFAULT_INDEX;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Which engine serves the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Meili,
    Local,
}

/// Main configuration, matching the `docsearch.yml` schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Flat directory behind the docs listing
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_index")]
    pub index: String,

    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub meili: MeiliConfig,

    #[serde(default)]
    pub local: LocalConfig,

    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("content/docs")
}

fn default_extensions() -> Vec<String> {
    vec![DEFAULT_EXTENSION.to_string()]
}

fn default_index() -> String {
    DEFAULT_INDEX.to_string()
}

fn default_bind() -> String {
    String::from("127.0.0.1:3000")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeiliConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_host() -> String {
    String::from("http://localhost:7700")
}

fn default_api_key() -> Option<String> {
    Some(String::from("masterKey"))
}

fn default_task_timeout_ms() -> u64 {
    DEFAULT_TASK_TIMEOUT.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for MeiliConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_key: default_api_key(),
            task_timeout_ms: default_task_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl MeiliConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// On-disk store; a temporary one is used when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            docs_dir: default_docs_dir(),
            extensions: default_extensions(),
            index: default_index(),
            backend: BackendKind::default(),
            meili: MeiliConfig::default(),
            local: LocalConfig::default(),
            bind: default_bind(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }
}
