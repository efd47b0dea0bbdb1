//! Chain access used by the orchestrator.
//!
//! [`ChainClient`] is the seam between the deployment logic and the network. The
//! orchestrator awaits every call to completion before issuing the next one, so
//! implementations never see two outstanding transactions from the same run.

mod rpc;

pub use rpc::{
    DEFAULT_INCLUSION_TIMEOUT, DEFAULT_POLL_INTERVAL, IMPLEMENTATION_SLOT, ProxyArtifacts,
    RpcChainClient, RpcChainClientConfig,
};

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

use crate::artifacts::Artifact;

/// Kind of upgrade proxy placed in front of an implementation contract.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProxyKind {
    /// ERC-1967 proxy whose upgrade logic lives in the implementation.
    #[default]
    Uups,
    /// OpenZeppelin transparent proxy administered by the deployer.
    Transparent,
}

/// Options for deploying a contract behind a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyOptions {
    pub kind: ProxyKind,
    /// Name of the initializer function called through the proxy on creation.
    pub initializer: String,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            kind: ProxyKind::Uups,
            initializer: "initialize".to_string(),
        }
    }
}

impl ProxyOptions {
    pub fn uups() -> Self {
        Self::default()
    }

    pub fn transparent() -> Self {
        Self {
            kind: ProxyKind::Transparent,
            ..Self::default()
        }
    }
}

/// A contract-creation transaction that has been submitted but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDeployment {
    /// Hash of the transaction creating the contract (the proxy, for proxy deployments).
    pub tx_hash: B256,
    /// Address the contract will live at once mined, when known up front.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// Receipt of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub from: Address,
    pub transaction_hash: B256,
    pub block_hash: B256,
    pub block_number: u64,
    pub transaction_index: u64,
    /// Address of the created contract, for contract-creation transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    /// Whether the transaction executed without reverting.
    pub status: bool,
}

/// Network access needed to deploy and wire the contracts.
///
/// Every method either completes or fails; there are no automatic retries behind
/// this interface besides the inclusion wait policy.
pub trait ChainClient: Send + Sync {
    /// Chain id of the connected network.
    fn chain_id(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// Submit a creation transaction with `init_code` (bytecode followed by encoded
    /// constructor arguments).
    fn deploy_contract(
        &self,
        init_code: Bytes,
    ) -> impl Future<Output = anyhow::Result<PendingDeployment>> + Send;

    /// Deploy `factory` as an implementation and submit a proxy pointing at it,
    /// calling the implementation with `init_data` on creation.
    ///
    /// The returned pending deployment tracks the proxy creation transaction.
    fn deploy_proxy(
        &self,
        factory: &Artifact,
        init_data: Bytes,
        options: &ProxyOptions,
    ) -> impl Future<Output = anyhow::Result<PendingDeployment>> + Send;

    /// Block until the transaction is included, failing if it reverted or was not
    /// included within the client's wait policy.
    fn wait_for_inclusion(
        &self,
        pending: &PendingDeployment,
    ) -> impl Future<Output = anyhow::Result<TxReceipt>> + Send;

    /// Receipt of `tx_hash`, or `None` if the chain does not know it (yet).
    fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = anyhow::Result<Option<TxReceipt>>> + Send;

    /// Current implementation behind an ERC-1967 proxy.
    fn get_implementation_address(
        &self,
        proxy: Address,
    ) -> impl Future<Output = anyhow::Result<Address>> + Send;

    /// Timestamp of the latest block, in seconds.
    fn get_latest_block_timestamp(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// Read-only call against the latest block.
    fn call(&self, to: Address, data: Bytes)
    -> impl Future<Output = anyhow::Result<Bytes>> + Send;

    /// Submit a state-changing call from the deploying account.
    fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = anyhow::Result<PendingDeployment>> + Send;
}
