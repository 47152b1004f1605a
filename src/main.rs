//! Scash Share Verifier - Command Line Front End
//!
//! Epoch and seed lookups, single-share verification, and a line-oriented
//! batch mode for pool processes that pipe shares through stdin.

use scash_share_verifier::{
    config::{Command, Config, LogFormat, TargetSource},
    epoch::{epoch_window, seed_for_tagged},
    Result, APP_NAME, APP_VERSION,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[cfg(feature = "randomx")]
use scash_share_verifier::{
    verifier::{log_failure, CODE_INVALID},
    BlockHeader, RandomXEngine, ShareVerifier, VerifierService,
};
#[cfg(feature = "randomx")]
use tokio::io::{AsyncBufReadExt, BufReader};
#[cfg(feature = "randomx")]
use tracing::warn;

/// Epoch lookup printed with `--json`
#[derive(Debug, Serialize)]
struct EpochReport {
    timestamp: u32,
    epoch: u32,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    seed: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load and validate configuration
    let config = Config::load().await?;

    init_tracing(&config);
    info!(
        "Starting {} v{} (epoch duration {}, verify timeout {})",
        APP_NAME,
        APP_VERSION,
        humantime::format_duration(config.epoch_duration()),
        humantime::format_duration(config.verify_timeout_duration())
    );

    match config.command()? {
        Command::PrintConfig => print_configuration(&config),
        Command::EpochOf(timestamp) => print_epoch(&config, timestamp),
        Command::SeedFor(epoch) => {
            println!("{}", seed_for_tagged(&config.seed_tag, epoch));
            Ok(())
        }
        Command::Verify { header, target } => verify_one(&config, header, target).await,
        Command::Batch => verify_batch(&config).await,
    }
}

/// Initialize tracing; logs go to stderr so stdout carries only results
fn init_tracing(config: &Config) {
    let level: tracing::Level = config.log_level.into();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    match config.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

/// Print current configuration
fn print_configuration(config: &Config) -> Result<()> {
    let config_yaml = serde_yaml::to_string(config)?;
    println!("{}", config_yaml);
    Ok(())
}

/// Print the epoch of a timestamp, or a full report with `--json`
fn print_epoch(config: &Config, timestamp: u32) -> Result<()> {
    let report = epoch_report(config, timestamp)?;
    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.epoch);
    }
    Ok(())
}

fn epoch_report(config: &Config, timestamp: u32) -> Result<EpochReport> {
    let epoch = scash_share_verifier::epoch_of(timestamp, config.epoch_duration)?;
    let (start, end) = epoch_window(epoch, config.epoch_duration)?;
    Ok(EpochReport {
        timestamp,
        epoch,
        starts_at: DateTime::from_timestamp(start as i64, 0),
        ends_at: DateTime::from_timestamp(end as i64, 0),
        seed: seed_for_tagged(&config.seed_tag, epoch).to_hex(),
    })
}

#[cfg(feature = "randomx")]
fn build_service(config: &Config) -> VerifierService<RandomXEngine> {
    let engine = if config.no_jit {
        RandomXEngine::interpreted()
    } else {
        RandomXEngine::new()
    };
    let verifier = ShareVerifier::with_options(engine, config.cache_options());
    VerifierService::new(verifier, config.verify_timeout_duration())
}

/// Verify one share and print its result code, or the full outcome with `--json`
#[cfg(feature = "randomx")]
async fn verify_one(config: &Config, header_hex: String, target: TargetSource) -> Result<()> {
    let service = build_service(config);

    let header = match BlockHeader::parse(&header_hex) {
        Ok(header) => header,
        Err(e) => {
            log_failure(&scash_share_verifier::VerifyError::InvalidHeader(e));
            println!("{}", CODE_INVALID);
            return Ok(());
        }
    };
    let pool_target = match target {
        TargetSource::Explicit(target) => target,
        TargetSource::Network => header.network_target()?,
    };

    let result = service
        .check_share(header, pool_target, config.epoch_duration)
        .await;
    service.teardown().await;

    match result {
        Ok(outcome) if config.json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        Ok(outcome) => {
            if outcome.block_candidate {
                info!(epoch = outcome.epoch, "Share meets the network target");
            }
            println!("{}", outcome.verdict.code());
        }
        Err(e) => {
            log_failure(&e);
            println!("{}", e.code());
        }
    }
    Ok(())
}

/// Verify `<header> <target>` lines from stdin, one result code per line
#[cfg(feature = "randomx")]
async fn verify_batch(config: &Config) -> Result<()> {
    let service = build_service(config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut processed = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let code = match (fields.next(), fields.next(), fields.next()) {
            (Some(header), Some(target), None) => {
                service
                    .verify_code(header.to_string(), target.to_string(), config.epoch_duration)
                    .await
            }
            _ => {
                warn!(line = processed + 1, "Expected `<header> <target>`");
                CODE_INVALID
            }
        };
        println!("{}", code);
        processed += 1;
    }

    let stats = service.verifier().stats();
    info!(
        processed,
        builds = stats.builds,
        hits = stats.hits,
        compute_failures = stats.compute_failures,
        "Batch complete"
    );
    service.teardown().await;
    Ok(())
}

#[cfg(not(feature = "randomx"))]
async fn verify_one(_config: &Config, _header_hex: String, _target: TargetSource) -> Result<()> {
    Err(no_randomx())
}

#[cfg(not(feature = "randomx"))]
async fn verify_batch(_config: &Config) -> Result<()> {
    Err(no_randomx())
}

#[cfg(not(feature = "randomx"))]
fn no_randomx() -> scash_share_verifier::Error {
    scash_share_verifier::Error::config("Built without RandomX support; rebuild with `--features randomx`")
}
