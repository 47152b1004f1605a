//! Configuration management for the share verifier
//!
//! Supports configuration via command line arguments, environment variables,
//! and configuration files (YAML/JSON) with validation and defaults.

use crate::cache::{CacheOptions, DEFAULT_MAX_CONSECUTIVE_FAILURES};
use crate::epoch::{DEFAULT_EPOCH_DURATION, DEFAULT_SEED_TAG};
use crate::target::Target;
use crate::{Error, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Where the share target comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSource {
    /// Explicit target
    Explicit(Target),
    /// Network target from the header's `bits`
    Network,
}

/// What the binary was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the parsed configuration
    PrintConfig,
    /// Print the epoch of a timestamp
    EpochOf(u32),
    /// Print the seed key of an epoch
    SeedFor(u32),
    /// Verify one share
    Verify { header: String, target: TargetSource },
    /// Verify `<header> <target>` lines from stdin
    Batch,
}

/// Complete configuration for the share verifier
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "scash-share-verifier",
    version = env!("CARGO_PKG_VERSION"),
    about = "Scash RandomX share verifier",
    long_about = "Verifies mining pool shares: epoch keying, RandomX context caching and commitment checks against share and network targets"
)]
#[serde(default)]
pub struct Config {
    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(skip)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE", env = "SCASH_VERIFIER_CONFIG")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Epoch duration in seconds
    #[arg(short = 'e', long, default_value_t = DEFAULT_EPOCH_DURATION)]
    pub epoch_duration: u32,

    /// Domain tag prefixed to the epoch number before seed hashing
    #[arg(long, default_value = DEFAULT_SEED_TAG)]
    pub seed_tag: String,

    /// Consecutive failures before a context is rebuilt or failures are escalated
    #[arg(long, default_value_t = DEFAULT_MAX_CONSECUTIVE_FAILURES)]
    pub max_consecutive_failures: u32,

    /// Verification timeout in milliseconds
    #[arg(long, default_value = "30000")]
    pub verify_timeout: u64,

    /// Run the RandomX VM interpreted instead of JIT-compiled
    #[arg(long)]
    pub no_jit: bool,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Print the epoch of a Unix timestamp and exit
    #[arg(long, value_name = "TIMESTAMP")]
    #[serde(skip)]
    pub epoch_of: Option<u32>,

    /// Print the seed key of an epoch and exit
    #[arg(long, value_name = "EPOCH")]
    #[serde(skip)]
    pub seed_for: Option<u32>,

    /// Block header to verify (224 hex characters)
    #[arg(long, value_name = "HEX")]
    #[serde(skip)]
    pub header: Option<String>,

    /// Share target (64 hex characters, big-endian)
    #[arg(long, value_name = "HEX", conflicts_with_all = ["difficulty", "network_target"])]
    #[serde(skip)]
    pub target: Option<String>,

    /// Share difficulty, converted to a target against the proof-of-work limit
    #[arg(long, conflicts_with = "network_target")]
    #[serde(skip)]
    pub difficulty: Option<f64>,

    /// Verify against the network target encoded in the header's bits
    #[arg(long)]
    #[serde(skip)]
    pub network_target: bool,

    /// Read `<header> <target>` lines from stdin and print one result code per line
    #[arg(long, conflicts_with = "header")]
    #[serde(skip)]
    pub stdin: bool,

    /// Print full results as JSON instead of the bare result code
    #[arg(long)]
    #[serde(skip)]
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_from([crate::APP_NAME])
    }
}

impl Config {
    /// Parse the command line, merge the config file if any, and validate
    pub async fn load() -> Result<Self> {
        let mut config = Self::parse();

        if let Some(config_file) = &config.config_file {
            let file_config = Self::load_from_file(config_file).await?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            // Default to YAML
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Merge CLI config with file config
    ///
    /// A value given on the command line wins; a file value replaces only a
    /// CLI value that is still at its default.
    fn merge_with_file(mut self, file_config: Self) -> Self {
        let defaults = Self::default();

        if self.epoch_duration == defaults.epoch_duration {
            self.epoch_duration = file_config.epoch_duration;
        }
        if self.seed_tag == defaults.seed_tag {
            self.seed_tag = file_config.seed_tag;
        }
        if self.max_consecutive_failures == defaults.max_consecutive_failures {
            self.max_consecutive_failures = file_config.max_consecutive_failures;
        }
        if self.verify_timeout == defaults.verify_timeout {
            self.verify_timeout = file_config.verify_timeout;
        }
        if self.no_jit == defaults.no_jit {
            self.no_jit = file_config.no_jit;
        }
        if self.log_level == defaults.log_level {
            self.log_level = file_config.log_level;
        }
        if self.log_format == defaults.log_format {
            self.log_format = file_config.log_format;
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.epoch_duration == 0 {
            return Err(Error::config("Epoch duration must be greater than 0"));
        }

        if self.seed_tag.is_empty() {
            return Err(Error::config("Seed tag must not be empty"));
        }

        if self.max_consecutive_failures == 0 {
            return Err(Error::config("Max consecutive failures must be greater than 0"));
        }

        if self.verify_timeout == 0 {
            return Err(Error::config("Verify timeout must be greater than 0"));
        }

        if let Some(difficulty) = self.difficulty {
            Target::from_difficulty(difficulty)
                .map_err(|e| Error::config(format!("Invalid difficulty: {}", e)))?;
        }

        if self.header.is_some()
            && self.target.is_none()
            && self.difficulty.is_none()
            && !self.network_target
        {
            return Err(Error::config(
                "A header needs --target, --difficulty or --network-target",
            ));
        }

        Ok(())
    }

    /// Resolve the requested command
    pub fn command(&self) -> Result<Command> {
        if self.print_config {
            return Ok(Command::PrintConfig);
        }
        if let Some(timestamp) = self.epoch_of {
            return Ok(Command::EpochOf(timestamp));
        }
        if let Some(epoch) = self.seed_for {
            return Ok(Command::SeedFor(epoch));
        }
        if self.stdin {
            return Ok(Command::Batch);
        }
        if let Some(header) = &self.header {
            let target = if let Some(hex_str) = &self.target {
                TargetSource::Explicit(
                    Target::from_hex(hex_str)
                        .map_err(|e| Error::config(format!("Invalid target: {}", e)))?,
                )
            } else if let Some(difficulty) = self.difficulty {
                TargetSource::Explicit(Target::from_difficulty(difficulty)?)
            } else {
                TargetSource::Network
            };
            return Ok(Command::Verify {
                header: header.clone(),
                target,
            });
        }
        Err(Error::config(
            "Nothing to do: use --header, --stdin, --epoch-of, --seed-for or --print-config",
        ))
    }

    /// Cache options
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            seed_tag: self.seed_tag.clone(),
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }

    /// Get verify timeout duration
    pub fn verify_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.verify_timeout)
    }

    /// Get epoch duration
    pub fn epoch_duration(&self) -> Duration {
        Duration::from_secs(self.epoch_duration as u64)
    }
}
