//! [`ChainClient`] over Ethereum JSON-RPC.
//!
//! Transactions are sent with `eth_sendTransaction`, so the node signs with one of its
//! own unlocked accounts (anvil, hardhat node, or a signing proxy in front of a node).

use std::time::Duration;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes, U64, b256},
};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use url::Url;

use super::{ChainClient, PendingDeployment, ProxyKind, ProxyOptions, TxReceipt};
use crate::{artifacts::Artifact, rpc::JsonRpc};

/// ERC-1967 implementation slot: `bytes32(uint256(keccak256("eip1967.proxy.implementation")) - 1)`.
pub const IMPLEMENTATION_SLOT: B256 =
    b256!("360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// Default time to wait for a transaction to be included.
pub const DEFAULT_INCLUSION_TIMEOUT: Duration = Duration::from_secs(120);

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Proxy contracts placed in front of upgradeable implementations.
///
/// Either may be absent: a missing artifact only fails a deployment that needs it.
#[derive(Debug, Clone, Default)]
pub struct ProxyArtifacts {
    /// `ERC1967Proxy(address implementation, bytes data)`.
    pub erc1967: Option<Artifact>,
    /// `TransparentUpgradeableProxy(address logic, address initialOwner, bytes data)`.
    pub transparent: Option<Artifact>,
}

impl ProxyArtifacts {
    /// The proxy contract deployed for `kind`.
    pub fn get(&self, kind: ProxyKind) -> anyhow::Result<&Artifact> {
        match kind {
            ProxyKind::Uups => self
                .erc1967
                .as_ref()
                .context("No ERC1967Proxy artifact configured"),
            ProxyKind::Transparent => self
                .transparent
                .as_ref()
                .context("No TransparentUpgradeableProxy artifact configured"),
        }
    }
}

/// Connection settings for [`RpcChainClient`].
#[derive(Debug, Clone)]
pub struct RpcChainClientConfig {
    pub rpc_url: Url,
    /// Deploying account. Defaults to the node's first account.
    pub from: Option<Address>,
    pub inclusion_timeout: Duration,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub proxies: ProxyArtifacts,
}

/// Receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    from: Address,
    transaction_hash: B256,
    block_hash: B256,
    block_number: U64,
    transaction_index: U64,
    contract_address: Option<Address>,
    /// Absent on pre-Byzantium receipts.
    status: Option<U64>,
}

impl From<RpcReceipt> for TxReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            from: receipt.from,
            transaction_hash: receipt.transaction_hash,
            block_hash: receipt.block_hash,
            block_number: receipt.block_number.to(),
            transaction_index: receipt.transaction_index.to(),
            contract_address: receipt.contract_address,
            status: receipt.status.is_none_or(|s| s == U64::from(1)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    timestamp: U64,
}

/// The transaction has no receipt yet.
#[derive(Debug, thiserror::Error)]
#[error("transaction {0} not yet included")]
struct NotYetIncluded(B256);

/// JSON-RPC backed chain client.
#[derive(Debug)]
pub struct RpcChainClient {
    rpc: JsonRpc,
    from: Address,
    inclusion_timeout: Duration,
    poll_interval: Duration,
    proxies: ProxyArtifacts,
}

impl RpcChainClient {
    /// Connect to the node and resolve the deploying account.
    pub async fn connect(config: RpcChainClientConfig) -> anyhow::Result<Self> {
        let rpc = JsonRpc::new(config.rpc_url, config.request_timeout)?;

        let from = match config.from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> = rpc
                    .call("eth_accounts", vec![])
                    .await
                    .context("Failed to list node accounts")?;
                accounts
                    .first()
                    .copied()
                    .context("Node exposes no accounts; pass an explicit deployer address")?
            }
        };

        tracing::info!(rpc_url = %rpc.url(), deployer = %from, "Connected to chain");

        Ok(Self {
            rpc,
            from,
            inclusion_timeout: config.inclusion_timeout,
            poll_interval: config.poll_interval,
            proxies: config.proxies,
        })
    }

    /// The deploying account.
    pub fn deployer(&self) -> Address {
        self.from
    }

    fn proxy_init_code(
        &self,
        proxy: &Artifact,
        implementation: Address,
        init_data: Bytes,
        kind: ProxyKind,
    ) -> Bytes {
        let args = match kind {
            ProxyKind::Uups => DynSolValue::Tuple(vec![
                DynSolValue::Address(implementation),
                DynSolValue::Bytes(init_data.to_vec()),
            ]),
            ProxyKind::Transparent => DynSolValue::Tuple(vec![
                DynSolValue::Address(implementation),
                DynSolValue::Address(self.from),
                DynSolValue::Bytes(init_data.to_vec()),
            ]),
        };

        let mut init_code = proxy.bytecode.to_vec();
        init_code.extend_from_slice(&args.abi_encode_params());
        init_code.into()
    }
}

impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        let chain_id: U64 = self.rpc.call("eth_chainId", vec![]).await?;
        Ok(chain_id.to())
    }

    async fn deploy_contract(&self, init_code: Bytes) -> anyhow::Result<PendingDeployment> {
        let tx_hash: B256 = self
            .rpc
            .call(
                "eth_sendTransaction",
                vec![serde_json::json!({
                    "from": self.from,
                    "data": init_code,
                })],
            )
            .await
            .context("Failed to submit contract creation")?;

        tracing::debug!(tx_hash = %tx_hash, "Contract creation submitted");

        // The node picks the nonce, so the address is only known from the receipt.
        Ok(PendingDeployment {
            tx_hash,
            address: None,
        })
    }

    async fn deploy_proxy(
        &self,
        factory: &Artifact,
        init_data: Bytes,
        options: &ProxyOptions,
    ) -> anyhow::Result<PendingDeployment> {
        let proxy = self.proxies.get(options.kind)?;

        let pending = self.deploy_contract(factory.bytecode.clone()).await?;
        let receipt = self
            .wait_for_inclusion(&pending)
            .await
            .with_context(|| format!("Implementation of {} was not deployed", factory.contract_name))?;
        let implementation = receipt
            .contract_address
            .context("Implementation receipt has no contract address")?;

        tracing::info!(
            contract = %factory.contract_name,
            implementation = %implementation,
            kind = %options.kind,
            "Implementation deployed, creating proxy"
        );

        let init_code = self.proxy_init_code(proxy, implementation, init_data, options.kind);
        self.deploy_contract(init_code).await
    }

    async fn wait_for_inclusion(&self, pending: &PendingDeployment) -> anyhow::Result<TxReceipt> {
        let tx_hash = pending.tx_hash;
        let max_polls = (self.inclusion_timeout.as_millis() / self.poll_interval.as_millis().max(1))
            .max(1) as usize;

        let receipt = (|| async {
            self.transaction_receipt(tx_hash)
                .await?
                .ok_or_else(|| anyhow::Error::new(NotYetIncluded(tx_hash)))
        })
        .retry(
            ConstantBuilder::default()
                .with_delay(self.poll_interval)
                .with_max_times(max_polls),
        )
        .when(|e| e.is::<NotYetIncluded>())
        .await
        .with_context(|| {
            format!(
                "Transaction {tx_hash} was not included within {}s",
                self.inclusion_timeout.as_secs()
            )
        })?;

        if !receipt.status {
            anyhow::bail!(
                "Transaction {tx_hash} reverted in block {}",
                receipt.block_number
            );
        }

        Ok(receipt)
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> anyhow::Result<Option<TxReceipt>> {
        let receipt: Option<RpcReceipt> = self
            .rpc
            .call("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await?;
        Ok(receipt.map(Into::into))
    }

    async fn get_implementation_address(&self, proxy: Address) -> anyhow::Result<Address> {
        let word: B256 = self
            .rpc
            .call(
                "eth_getStorageAt",
                vec![
                    serde_json::json!(proxy),
                    serde_json::json!(IMPLEMENTATION_SLOT),
                    serde_json::json!("latest"),
                ],
            )
            .await
            .context("Failed to read ERC-1967 implementation slot")?;

        let implementation = Address::from_word(word);
        if implementation.is_zero() {
            anyhow::bail!("{proxy} has an empty ERC-1967 implementation slot");
        }
        Ok(implementation)
    }

    async fn get_latest_block_timestamp(&self) -> anyhow::Result<u64> {
        let block: BlockHeader = self
            .rpc
            .call(
                "eth_getBlockByNumber",
                vec![serde_json::json!("latest"), serde_json::json!(false)],
            )
            .await?;
        Ok(block.timestamp.to())
    }

    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        self.rpc
            .call(
                "eth_call",
                vec![
                    serde_json::json!({ "from": self.from, "to": to, "data": data }),
                    serde_json::json!("latest"),
                ],
            )
            .await
    }

    async fn send_transaction(&self, to: Address, data: Bytes) -> anyhow::Result<PendingDeployment> {
        let tx_hash: B256 = self
            .rpc
            .call(
                "eth_sendTransaction",
                vec![serde_json::json!({ "from": self.from, "to": to, "data": data })],
            )
            .await
            .with_context(|| format!("Failed to submit transaction to {to}"))?;

        Ok(PendingDeployment {
            tx_hash,
            address: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_conversion() {
        let receipt: RpcReceipt = serde_json::from_value(serde_json::json!({
            "from": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "blockNumber": "0x1a",
            "transactionIndex": "0x2",
            "contractAddress": "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512",
            "status": "0x1",
            "gasUsed": "0x5208"
        }))
        .unwrap();

        let receipt = TxReceipt::from(receipt);
        assert_eq!(receipt.block_number, 26);
        assert_eq!(receipt.transaction_index, 2);
        assert!(receipt.status);
        assert!(receipt.contract_address.is_some());
    }

    #[test]
    fn test_reverted_receipt() {
        let receipt: RpcReceipt = serde_json::from_value(serde_json::json!({
            "from": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "blockNumber": "0x1",
            "transactionIndex": "0x0",
            "contractAddress": null,
            "status": "0x0"
        }))
        .unwrap();

        assert!(!TxReceipt::from(receipt).status);
    }

    #[test]
    fn test_missing_proxy_artifact_fails_only_its_kind() {
        let proxies = ProxyArtifacts {
            erc1967: Some(Artifact {
                contract_name: "ERC1967Proxy".to_string(),
                abi: Default::default(),
                bytecode: Bytes::from_static(b"proxy"),
            }),
            transparent: None,
        };

        assert_eq!(
            proxies.get(ProxyKind::Uups).unwrap().contract_name,
            "ERC1967Proxy"
        );
        assert!(proxies.get(ProxyKind::Transparent).is_err());
        assert!(ProxyArtifacts::default().get(ProxyKind::Uups).is_err());
    }

    #[test]
    fn test_implementation_slot_matches_eip1967() {
        use alloy_core::primitives::{U256, keccak256};

        let hash = U256::from_be_bytes(keccak256("eip1967.proxy.implementation").0);
        assert_eq!(B256::from(hash - U256::from(1)), IMPLEMENTATION_SLOT);
    }
}
