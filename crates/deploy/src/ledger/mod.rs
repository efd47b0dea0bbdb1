//! Persisted record of what has already been deployed.
//!
//! The ledger is the only durable state of a deployment run. A record is written once
//! per logical contract name, when its deployment is confirmed, and is never
//! overwritten by the orchestrator afterwards.

mod file;
mod memory;

pub use file::FileLedger;
pub use memory::MemoryLedger;

use alloy_core::{
    json_abi::JsonAbi,
    primitives::{Address, B256},
};
use serde::{Deserialize, Serialize};

use crate::chain::{PendingDeployment, TxReceipt};

/// Prefix of the metadata string of proxy records.
const IMPLEMENTATION_METADATA_PREFIX: &str = "implementationAddress: ";

/// Inclusion details of the transaction that created a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReceipt {
    pub from: Address,
    pub transaction_hash: B256,
    pub block_hash: B256,
    pub block_number: u64,
    pub transaction_index: u64,
}

impl From<&TxReceipt> for RecordReceipt {
    fn from(receipt: &TxReceipt) -> Self {
        Self {
            from: receipt.from,
            transaction_hash: receipt.transaction_hash,
            block_hash: receipt.block_hash,
            block_number: receipt.block_number,
            transaction_index: receipt.transaction_index,
        }
    }
}

/// A confirmed deployment, as stored in the ledger.
///
/// The JSON form follows the hardhat-deploy `deployments/<network>/<Name>.json` layout so
/// existing tooling can read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub address: Address,
    pub abi: JsonAbi,
    pub receipt: RecordReceipt,
    /// Empty for plain contracts, the implementation address for proxies.
    #[serde(default)]
    pub metadata: String,
}

impl DeploymentRecord {
    pub fn plain(address: Address, abi: JsonAbi, receipt: &TxReceipt) -> Self {
        Self {
            address,
            abi,
            receipt: receipt.into(),
            metadata: String::new(),
        }
    }

    pub fn proxy(
        address: Address,
        implementation: Address,
        abi: JsonAbi,
        receipt: &TxReceipt,
    ) -> Self {
        Self {
            address,
            abi,
            receipt: receipt.into(),
            metadata: format!("{IMPLEMENTATION_METADATA_PREFIX}{implementation}"),
        }
    }

    /// Implementation address recorded for a proxy deployment.
    pub fn implementation_address(&self) -> Option<Address> {
        self.metadata
            .strip_prefix(IMPLEMENTATION_METADATA_PREFIX)
            .and_then(|s| s.trim().parse().ok())
    }
}

/// Durable mapping from logical contract name to its deployment record.
///
/// Besides records, the ledger journals deployment transactions that were submitted
/// but not yet recorded, so a crashed run can be reconciled against the chain instead
/// of deploying a second copy.
pub trait DeploymentLedger: Send + Sync {
    /// Record stored under `name`, if any.
    fn get_or_null(&self, name: &str) -> anyhow::Result<Option<DeploymentRecord>>;

    /// Store the record for `name` and drop its pending entry.
    ///
    /// Fails if a record already exists: records are immutable.
    fn save(&self, name: &str, record: &DeploymentRecord) -> anyhow::Result<()>;

    /// Deployment transaction submitted for `name` but not recorded yet.
    fn pending(&self, name: &str) -> anyhow::Result<Option<PendingDeployment>>;

    fn mark_pending(&self, name: &str, pending: &PendingDeployment) -> anyhow::Result<()>;

    fn clear_pending(&self, name: &str) -> anyhow::Result<()>;

    /// Names of all recorded deployments, sorted.
    fn names(&self) -> anyhow::Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;

    use super::*;

    fn receipt() -> TxReceipt {
        TxReceipt {
            from: address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            transaction_hash: B256::repeat_byte(0x11),
            block_hash: B256::repeat_byte(0x22),
            block_number: 7,
            transaction_index: 0,
            contract_address: None,
            status: true,
        }
    }

    #[test]
    fn test_proxy_metadata_round_trips_implementation() {
        let implementation = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");
        let record = DeploymentRecord::proxy(
            address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"),
            implementation,
            JsonAbi::new(),
            &receipt(),
        );

        assert!(record.metadata.starts_with("implementationAddress: 0x"));
        assert_eq!(record.implementation_address(), Some(implementation));
    }

    #[test]
    fn test_plain_record_has_no_implementation() {
        let record = DeploymentRecord::plain(
            address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"),
            JsonAbi::new(),
            &receipt(),
        );

        assert!(record.metadata.is_empty());
        assert_eq!(record.implementation_address(), None);
    }

    #[test]
    fn test_record_json_layout() {
        let record = DeploymentRecord::plain(
            address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"),
            JsonAbi::new(),
            &receipt(),
        );
        let json = serde_json::to_value(&record).unwrap();

        assert!(json["receipt"]["transactionHash"].is_string());
        assert_eq!(json["receipt"]["blockNumber"], 7);
        assert!(json["abi"].is_array());
    }
}
