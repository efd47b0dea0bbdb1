//! Network-keyed deployment configuration.
//!
//! Each network has one TOML bundle at `<config dir>/<network>.toml`. Any field can be
//! overridden from the environment with a `BRIDGE_` prefix (e.g.
//! `BRIDGE_SOURCE_CHAIN_ID=2`). Every field is required: a missing field is a fatal
//! error, never filled from a default.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix of environment variables overriding configuration fields.
pub const CONFIG_ENV_PREFIX: &str = "BRIDGE_";

/// Keys read from the environment. Other `BRIDGE_` variables belong to the CLI.
const CONFIG_FIELDS: [&str; 6] = [
    "committee_members",
    "committee_member_stake",
    "wrapped_native_token_address",
    "supported_tokens",
    "source_chain_id",
    "daily_bridge_limits",
];

/// Largest chain id the bridge initializer accepts.
pub const MAX_SOURCE_CHAIN_ID: u64 = u8::MAX as u64;

/// Validated configuration of a bridge deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDeploymentConfig {
    /// Committee members, in voting order.
    pub committee_members: Vec<Address>,
    /// Stake of each committee member, index-aligned with `committee_members`.
    pub committee_member_stake: Vec<u64>,
    pub wrapped_native_token_address: Address,
    /// Tokens the bridge accepts, in token-id order.
    pub supported_tokens: Vec<Address>,
    /// At most [`MAX_SOURCE_CHAIN_ID`].
    pub source_chain_id: u64,
    /// Limiter schedule, passed to the limiter constructor as given.
    pub daily_bridge_limits: Vec<u64>,
}

/// Configuration as read from the source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBridgeConfig {
    pub committee_members: Option<Vec<Address>>,
    pub committee_member_stake: Option<Vec<u64>>,
    pub wrapped_native_token_address: Option<Address>,
    pub supported_tokens: Option<Vec<Address>>,
    pub source_chain_id: Option<u64>,
    pub daily_bridge_limits: Option<Vec<u64>>,
}

impl RawBridgeConfig {
    /// Check every field and build the validated configuration.
    ///
    /// Fields are checked in declaration order; the first missing one is reported.
    pub fn validate(self, network: &str) -> Result<BridgeDeploymentConfig, ConfigError> {
        let missing = |field| ConfigError::MissingField {
            network: network.to_string(),
            field,
        };
        let invalid = |field, reason: String| ConfigError::Invalid {
            network: network.to_string(),
            field,
            reason,
        };

        let committee_members = self
            .committee_members
            .ok_or_else(|| missing("committee_members"))?;
        let committee_member_stake = self
            .committee_member_stake
            .ok_or_else(|| missing("committee_member_stake"))?;
        let wrapped_native_token_address = self
            .wrapped_native_token_address
            .ok_or_else(|| missing("wrapped_native_token_address"))?;
        let supported_tokens = self
            .supported_tokens
            .ok_or_else(|| missing("supported_tokens"))?;
        let source_chain_id = self
            .source_chain_id
            .ok_or_else(|| missing("source_chain_id"))?;
        let daily_bridge_limits = self
            .daily_bridge_limits
            .ok_or_else(|| missing("daily_bridge_limits"))?;

        if committee_member_stake.len() != committee_members.len() {
            return Err(invalid(
                "committee_member_stake",
                format!(
                    "{} stakes for {} committee members",
                    committee_member_stake.len(),
                    committee_members.len()
                ),
            ));
        }

        if source_chain_id > MAX_SOURCE_CHAIN_ID {
            return Err(invalid(
                "source_chain_id",
                format!("{source_chain_id} does not fit the bridge's uint8 chain id"),
            ));
        }

        if let Some(member) = duplicate(&committee_members) {
            return Err(invalid(
                "committee_members",
                format!("{member} is listed twice"),
            ));
        }

        if let Some(token) = duplicate(&supported_tokens) {
            return Err(invalid(
                "supported_tokens",
                format!("{token} is listed twice"),
            ));
        }

        Ok(BridgeDeploymentConfig {
            committee_members,
            committee_member_stake,
            wrapped_native_token_address,
            supported_tokens,
            source_chain_id,
            daily_bridge_limits,
        })
    }
}

fn duplicate(addresses: &[Address]) -> Option<Address> {
    addresses
        .iter()
        .enumerate()
        .find(|(i, a)| addresses[..*i].contains(a))
        .map(|(_, a)| *a)
}

/// Source of network-keyed configuration bundles.
pub trait ConfigProvider {
    fn resolve(&self, network: &str) -> Result<BridgeDeploymentConfig, ConfigError>;
}

/// Reads `<dir>/<network>.toml`, layered with `BRIDGE_*` environment overrides.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    dir: PathBuf,
    env_overrides: bool,
}

impl FileConfigProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            env_overrides: true,
        }
    }

    /// Ignore environment overrides and read only the file.
    pub fn without_env(mut self) -> Self {
        self.env_overrides = false;
        self
    }

    pub fn path_for(&self, network: &str) -> PathBuf {
        self.dir.join(format!("{network}.toml"))
    }

    fn figment(&self, path: &Path) -> Figment {
        let figment = Figment::new().merge(Toml::file(path));
        if self.env_overrides {
            figment.merge(Env::prefixed(CONFIG_ENV_PREFIX).only(&CONFIG_FIELDS))
        } else {
            figment
        }
    }
}

impl ConfigProvider for FileConfigProvider {
    fn resolve(&self, network: &str) -> Result<BridgeDeploymentConfig, ConfigError> {
        let path = self.path_for(network);
        if !path.is_file() {
            return Err(ConfigError::MissingBundle {
                network: network.to_string(),
                path,
            });
        }

        let raw: RawBridgeConfig =
            self.figment(&path)
                .extract()
                .map_err(|e| ConfigError::Load {
                    network: network.to_string(),
                    source: Box::new(e),
                })?;

        tracing::debug!(network, path = %path.display(), "Resolved configuration bundle");
        raw.validate(network)
    }
}
