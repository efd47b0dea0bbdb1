//! bridge-deployer deploys the bridge contracts and resumes interrupted deployments.

mod cli;

use anyhow::{Context, Result};
use bridge_deploy::{
    Artifact, ArtifactStore, ChainClient, ConfigProvider, DEFAULT_REQUEST_TIMEOUT, DeployContext,
    DeploymentLedger, FileConfigProvider, FileLedger, FsArtifactStore, PlanOutcome,
    RpcChainClient, RpcChainClientConfig, Tag, TransferOutcome, bridge_plan,
    chain::ProxyArtifacts, mock_tokens_plan,
};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::{Cli, Command};

const ERC1967_PROXY: &str = "ERC1967Proxy";
const TRANSPARENT_PROXY: &str = "TransparentUpgradeableProxy";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match &cli.command {
        Command::Deploy { .. } => deploy(&cli).await,
        Command::Status => status(&cli).await,
    }
}

async fn deploy(cli: &Cli) -> Result<()> {
    let tags = cli.command.tags();

    // Fail on an incomplete configuration before touching the chain.
    let config = if tags.iter().any(Tag::needs_config) {
        let provider = FileConfigProvider::new(&cli.config_dir);
        Some(provider.resolve(&cli.network)?)
    } else {
        None
    };

    let artifacts = FsArtifactStore::open(&cli.artifacts)?;
    let chain = connect(cli, &artifacts).await?;
    let ledger = open_ledger(cli, &chain).await?;
    let ctx = DeployContext::new(&artifacts, &ledger, &chain);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Tag", "Contract", "Address", "Implementation", "Result"]);

    for tag in tags {
        tracing::info!(%tag, network = %cli.network, "Running deployment plan");

        let outcome = match (tag, &config) {
            (Tag::Bridge, Some(config)) => bridge_plan().execute(config, ctx).await?,
            (Tag::Bridge, None) => anyhow::bail!("The bridge plan needs a configuration"),
            (Tag::Mock, _) => mock_tokens_plan::<()>().execute(&(), ctx).await?,
        };

        summarize(&mut table, tag, &outcome, &ledger)?;
    }

    println!("{table}");
    Ok(())
}

fn summarize(
    table: &mut Table,
    tag: Tag,
    outcome: &PlanOutcome,
    ledger: &impl DeploymentLedger,
) -> Result<()> {
    for (name, address) in outcome.addresses.iter() {
        let implementation = ledger
            .get_or_null(name)?
            .and_then(|r| r.implementation_address())
            .map(|a| a.to_string())
            .unwrap_or_default();
        let result = if outcome.deployed.contains(name) {
            "deployed"
        } else {
            "reused"
        };
        table.add_row(vec![
            tag.to_string(),
            name.clone(),
            address.to_string(),
            implementation,
            result.to_string(),
        ]);
    }

    for transfer in &outcome.transfers {
        let result = match &transfer.outcome {
            TransferOutcome::Transferred(receipt) => {
                format!("ownership transferred in {}", receipt.transaction_hash)
            }
            TransferOutcome::AlreadyOwned => "ownership already transferred".to_string(),
        };
        table.add_row(vec![
            tag.to_string(),
            format!("{} -> {}", transfer.owned, transfer.new_owner),
            String::new(),
            String::new(),
            result,
        ]);
    }

    Ok(())
}

async fn status(cli: &Cli) -> Result<()> {
    let artifacts = FsArtifactStore::open(&cli.artifacts)?;
    let chain = connect(cli, &artifacts).await?;
    let ledger = open_ledger(cli, &chain).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Contract",
        "Address",
        "Block",
        "Implementation",
        "Status",
    ]);

    for name in ledger.names()? {
        let Some(record) = ledger.get_or_null(&name)? else {
            continue;
        };

        let (implementation, state) = match record.implementation_address() {
            None => (String::new(), "ok".to_string()),
            Some(recorded) => {
                let state = match chain.get_implementation_address(record.address).await {
                    Ok(current) if current == recorded => "ok".to_string(),
                    Ok(current) => {
                        tracing::warn!(name = %name, %recorded, %current, "Proxy implementation drifted");
                        format!("drift: now {current}")
                    }
                    Err(e) => {
                        tracing::warn!(name = %name, error = %e, "Could not read proxy implementation");
                        "unreachable".to_string()
                    }
                };
                (recorded.to_string(), state)
            }
        };

        table.add_row(vec![
            name,
            record.address.to_string(),
            record.receipt.block_number.to_string(),
            implementation,
            state,
        ]);
    }

    println!("{table}");
    Ok(())
}

async fn connect(cli: &Cli, artifacts: &FsArtifactStore) -> Result<RpcChainClient> {
    // Only proxy deployments need these, so a tree without them still serves plain
    // plans and status.
    let proxies = ProxyArtifacts {
        erc1967: proxy_artifact(artifacts, ERC1967_PROXY),
        transparent: proxy_artifact(artifacts, TRANSPARENT_PROXY),
    };

    let chain = RpcChainClient::connect(RpcChainClientConfig {
        rpc_url: cli.rpc_url.clone(),
        from: cli.from,
        inclusion_timeout: cli.inclusion_timeout(),
        poll_interval: cli.poll_interval(),
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
        proxies,
    })
    .await
    .with_context(|| format!("Failed to connect to {}", cli.rpc_url))?;

    let timestamp = chain.get_latest_block_timestamp().await?;
    let head_time = chrono::DateTime::from_timestamp(timestamp as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string());

    tracing::info!(network = %cli.network, head_time = %head_time, "Chain head");

    Ok(chain)
}

fn proxy_artifact(artifacts: &FsArtifactStore, name: &str) -> Option<Artifact> {
    match artifacts.read_artifact(name) {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            tracing::debug!(name, error = %e, "Proxy artifact unavailable");
            None
        }
    }
}

async fn open_ledger(cli: &Cli, chain: &RpcChainClient) -> Result<FileLedger> {
    Ok(FileLedger::open_for_chain(&cli.deployments, &cli.network, chain).await?)
}
