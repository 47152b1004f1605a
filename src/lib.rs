//! Scash Share Verifier
//!
//! Verifies mining pool shares for Scash, a Bitcoin-derived chain that uses
//! RandomX proof of work with a weekly key rotation:
//! - Epoch keying and seed derivation from block timestamps
//! - An epoch-keyed cache around the expensive RandomX context
//! - Header hashing with the claimed hash field zeroed
//! - Commitment comparison against share and network targets
//! - A tri-state `1`/`0`/`-1` boundary for pool integrations and C callers

pub mod cache;
pub mod codec;
pub mod config;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod header;
pub mod service;
pub mod target;
pub mod verifier;

#[cfg(feature = "ffi")]
pub mod ffi;

pub use cache::{CacheOptions, CacheStats, HashContextCache};
pub use config::Config;
pub use engine::{Digest32, HashEngine};
pub use epoch::{epoch_of, seed_for, Epoch, SeedKey};
pub use error::{Error, Result};
pub use header::BlockHeader;
pub use service::VerifierService;
pub use target::Target;
pub use verifier::{ShareOutcome, ShareVerdict, ShareVerifier, VerifyError};

#[cfg(feature = "randomx")]
pub use engine::RandomXEngine;

/// Application information
pub const APP_NAME: &str = "scash-share-verifier";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
