//! Simulator configuration.
//!
//! Layered from an optional TOML/JSON/YAML file and `TALLY_`-prefixed
//! environment variables, e.g. `TALLY_LEDGER__COOLDOWN=3600`. Environment
//! values win over the file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tally_core::config::LedgerConfig;

/// Clock reading at ledger creation unless configured otherwise.
pub const DEFAULT_GENESIS: u64 = 1_700_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ledger tunables.
    pub ledger: LedgerConfig,
    /// Label the owner address is derived from.
    pub owner: String,
    /// Label the weight-grant signing key is derived from.
    pub signer: String,
    /// Unix time the simulation starts at.
    pub genesis: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            owner: "owner".to_string(),
            signer: "tally-sim-signer".to_string(),
            genesis: DEFAULT_GENESIS,
        }
    }
}

impl SimConfig {
    /// Load configuration from `path` (if any) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        let config: Self = builder
            .add_source(
                ::config::Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read simulator configuration")?
            .try_deserialize()
            .context("invalid simulator configuration")?;

        config
            .ledger
            .validate()
            .context("invalid ledger configuration")?;
        Ok(config)
    }

    /// Ed25519 secret derived from the signer label.
    pub fn signer_secret(&self) -> [u8; 32] {
        *blake3::hash(self.signer.as_bytes()).as_bytes()
    }
}
