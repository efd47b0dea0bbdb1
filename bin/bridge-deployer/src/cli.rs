use std::{path::PathBuf, time::Duration};

use alloy_core::primitives::Address;
use bridge_deploy::Tag;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use url::Url;

/// The default RPC endpoint (a local hardhat or anvil node).
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

#[derive(Parser)]
#[command(name = "bridge-deployer")]
#[command(
    author,
    version,
    about = "Deploy and wire the bridge contracts, resuming from earlier runs"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "BRIDGE_VERBOSITY", default_value_t = LevelFilter::INFO, global = true)]
    pub verbosity: LevelFilter,

    /// The network to deploy to.
    ///
    /// Selects the configuration bundle (`<config-dir>/<network>.toml`) and the ledger
    /// directory (`<deployments>/<network>/`).
    #[arg(short, long, env = "BRIDGE_NETWORK", default_value = "localhost", global = true)]
    pub network: String,

    /// The URL of the chain's JSON-RPC endpoint.
    #[arg(long, alias = "rpc", env = "BRIDGE_RPC_URL", default_value = DEFAULT_RPC_URL, global = true)]
    pub rpc_url: Url,

    /// The unlocked node account deploying the contracts.
    ///
    /// If not provided, the node's first account is used.
    #[arg(long, env = "BRIDGE_FROM", global = true)]
    pub from: Option<Address>,

    /// The root of the deployment ledger.
    #[arg(long, env = "BRIDGE_DEPLOYMENTS", default_value = "deployments", global = true)]
    pub deployments: PathBuf,

    /// The compiled contract artifacts directory.
    #[arg(long, env = "BRIDGE_ARTIFACTS", default_value = "artifacts", global = true)]
    pub artifacts: PathBuf,

    /// The directory holding one configuration bundle per network.
    #[arg(long, alias = "config", env = "BRIDGE_CONFIG_DIR", default_value = "deploy_configs", global = true)]
    pub config_dir: PathBuf,

    /// How long to wait for a transaction to be included, in seconds.
    #[arg(long, env = "BRIDGE_INCLUSION_TIMEOUT", default_value_t = 120, global = true)]
    pub inclusion_timeout: u64,

    /// Interval between receipt polls, in milliseconds.
    #[arg(long, env = "BRIDGE_POLL_INTERVAL", default_value_t = 500, global = true)]
    pub poll_interval: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn inclusion_timeout(&self) -> Duration {
        Duration::from_secs(self.inclusion_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Deploy whatever the ledger does not hold yet, then wire ownership.
    Deploy {
        /// The groups of contracts to deploy, run in tag order.
        #[arg(long, value_delimiter = ',', env = "BRIDGE_TAGS", default_value = "bridge")]
        tags: Vec<Tag>,
    },
    /// List the recorded deployments and check proxies against the chain.
    Status,
}

impl Command {
    /// Selected tags, deduplicated and in run order.
    pub fn tags(&self) -> Vec<Tag> {
        match self {
            Command::Deploy { tags } => {
                let mut tags = tags.clone();
                tags.sort();
                tags.dedup();
                tags
            }
            Command::Status => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_deploy_defaults_to_bridge() {
        let cli = Cli::try_parse_from(["bridge-deployer", "deploy"]).unwrap();

        assert_eq!(cli.command.tags(), vec![Tag::Bridge]);
        assert_eq!(cli.network, "localhost");
        assert_eq!(cli.inclusion_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_tags_run_mocks_first() {
        let cli = Cli::try_parse_from([
            "bridge-deployer",
            "--network",
            "sepolia",
            "deploy",
            "--tags",
            "bridge,mock,bridge",
        ])
        .unwrap();

        assert_eq!(cli.command.tags(), vec![Tag::Mock, Tag::Bridge]);
        assert_eq!(cli.network, "sepolia");
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let result = Cli::try_parse_from(["bridge-deployer", "deploy", "--tags", "l2"]);
        assert!(result.is_err());
    }
}
