//! bridge-deploy - Deployment orchestration for the bridge contracts.
//!
//! This crate deploys the bridge committee, vault, limiter and facade onto an EVM chain,
//! wires each contract's arguments from the addresses of earlier deployments and hands
//! the auxiliary contracts over to the facade. Runs are resumable: every confirmed
//! deployment is recorded in a ledger and skipped on the next run.

pub mod abi;

mod artifacts;
pub use artifacts::{Artifact, ArtifactStore, FsArtifactStore, MemoryArtifactStore};

mod bridge;
pub use bridge::{
    BRIDGE_COMMITTEE, BRIDGE_LIMITER, BRIDGE_VAULT, MOCK_USDC, MOCK_WBTC, SUI_BRIDGE, Tag,
    bridge_plan, mock_tokens_plan,
};

pub mod chain;
pub use chain::{
    ChainClient, PendingDeployment, ProxyKind, ProxyOptions, RpcChainClient,
    RpcChainClientConfig, TxReceipt,
};

mod config;
pub use config::{
    BridgeDeploymentConfig, CONFIG_ENV_PREFIX, ConfigProvider, FileConfigProvider,
    MAX_SOURCE_CHAIN_ID, RawBridgeConfig,
};

mod deployer;
pub use deployer::{DeployContext, PlainDeployer, ProxyDeployer};

mod error;
pub use error::{ConfigError, DeployError, Result};

pub mod ledger;
pub use ledger::{DeploymentLedger, DeploymentRecord, FileLedger, MemoryLedger};

mod ownership;
pub use ownership::{OwnershipHandshake, TransferOutcome};

mod plan;
pub use plan::{
    ArgsBuilder, DeploymentPlan, DeploymentStep, OwnershipTransfer, PlanOutcome, RunState,
    StepKind, TransferReport,
};

mod rpc;
pub use rpc::{DEFAULT_REQUEST_TIMEOUT, RpcError};
