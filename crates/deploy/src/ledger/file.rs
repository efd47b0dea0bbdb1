use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};

use super::{DeploymentLedger, DeploymentRecord};
use crate::{
    chain::{ChainClient, PendingDeployment},
    error::DeployError,
};

/// Name of the file pinning a ledger directory to a chain.
const CHAIN_ID_FILENAME: &str = ".chainId";

const RECORD_EXTENSION: &str = ".json";
const PENDING_EXTENSION: &str = ".pending.json";

/// Ledger stored as one JSON file per contract under `<root>/<network>/`.
///
/// The directory is pinned to the chain it was first opened against; opening it
/// against another chain fails, so records of one network are never reused on another.
#[derive(Debug, Clone)]
pub struct FileLedger {
    dir: PathBuf,
    chain_id: u64,
}

impl FileLedger {
    pub fn open(root: &Path, network: &str, chain_id: u64) -> anyhow::Result<Self> {
        let dir = root.join(network);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create ledger directory {}", dir.display()))?;

        let chain_id_path = dir.join(CHAIN_ID_FILENAME);
        if chain_id_path.exists() {
            let content = std::fs::read_to_string(&chain_id_path)
                .with_context(|| format!("Failed to read {}", chain_id_path.display()))?;
            let recorded: u64 = content.trim().parse().with_context(|| {
                format!("Malformed chain id in {}", chain_id_path.display())
            })?;

            if recorded != chain_id {
                anyhow::bail!(
                    "Ledger {} belongs to chain {recorded}, but the connected chain is {chain_id}",
                    dir.display()
                );
            }
        } else {
            write_atomic(&chain_id_path, chain_id.to_string().as_bytes())?;
        }

        tracing::debug!(dir = %dir.display(), chain_id, "Opened deployment ledger");

        Ok(Self { dir, chain_id })
    }

    /// Open the ledger of `network`, pinned to the chain `chain` is connected to.
    pub async fn open_for_chain(
        root: &Path,
        network: &str,
        chain: &impl ChainClient,
    ) -> crate::error::Result<Self> {
        let chain_id = chain.chain_id().await.map_err(DeployError::Chain)?;
        Self::open(root, network, chain_id).map_err(|source| DeployError::Ledger {
            name: network.to_string(),
            source,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn record_path(&self, name: &str) -> anyhow::Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}{RECORD_EXTENSION}")))
    }

    fn pending_path(&self, name: &str) -> anyhow::Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}{PENDING_EXTENSION}")))
    }
}

impl DeploymentLedger for FileLedger {
    fn get_or_null(&self, name: &str) -> anyhow::Result<Option<DeploymentRecord>> {
        read_json(&self.record_path(name)?)
    }

    fn save(&self, name: &str, record: &DeploymentRecord) -> anyhow::Result<()> {
        let path = self.record_path(name)?;
        if path.exists() {
            anyhow::bail!(
                "Deployment `{name}` is already recorded at {}",
                path.display()
            );
        }

        write_json(&path, record)?;
        self.clear_pending(name)?;

        tracing::debug!(name, path = %path.display(), "Deployment recorded");
        Ok(())
    }

    fn pending(&self, name: &str) -> anyhow::Result<Option<PendingDeployment>> {
        read_json(&self.pending_path(name)?)
    }

    fn mark_pending(&self, name: &str, pending: &PendingDeployment) -> anyhow::Result<()> {
        write_json(&self.pending_path(name)?, pending)
    }

    fn clear_pending(&self, name: &str) -> anyhow::Result<()> {
        let path = self.pending_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    fn names(&self) -> anyhow::Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let file_name = entry?.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with('.') || file_name.ends_with(PENDING_EXTENSION) {
                continue;
            }
            if let Some(name) = file_name.strip_suffix(RECORD_EXTENSION) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Names become file names, so they must not escape the ledger directory.
fn validate_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.ends_with(".pending")
    {
        anyhow::bail!("Invalid deployment name: `{name}`");
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    serde_json::from_str(&content)
        .map(Some)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_atomic(path, json.as_bytes())
}

/// Write through a sibling temp file and rename, so readers never see a torn file.
fn write_atomic(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_core::{
        json_abi::JsonAbi,
        primitives::{Address, B256, address},
    };
    use tempdir::TempDir;

    use super::*;
    use crate::chain::TxReceipt;

    fn record(address: Address) -> DeploymentRecord {
        let receipt = TxReceipt {
            from: address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            transaction_hash: B256::repeat_byte(0x11),
            block_hash: B256::repeat_byte(0x22),
            block_number: 3,
            transaction_index: 1,
            contract_address: Some(address),
            status: true,
        };
        DeploymentRecord::plain(address, JsonAbi::new(), &receipt)
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp_dir = TempDir::new("bridge-ledger").unwrap();
        let vault = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

        let ledger = FileLedger::open(temp_dir.path(), "localhost", 31337).unwrap();
        assert!(ledger.get_or_null("BridgeVault").unwrap().is_none());
        ledger.save("BridgeVault", &record(vault)).unwrap();

        let reopened = FileLedger::open(temp_dir.path(), "localhost", 31337).unwrap();
        let loaded = reopened.get_or_null("BridgeVault").unwrap().unwrap();
        assert_eq!(loaded, record(vault));
        assert_eq!(reopened.names().unwrap(), vec!["BridgeVault".to_string()]);
    }

    #[test]
    fn test_save_refuses_overwrite() {
        let temp_dir = TempDir::new("bridge-ledger").unwrap();
        let ledger = FileLedger::open(temp_dir.path(), "localhost", 31337).unwrap();

        ledger
            .save("BridgeVault", &record(Address::repeat_byte(1)))
            .unwrap();
        let result = ledger.save("BridgeVault", &record(Address::repeat_byte(2)));

        assert!(result.is_err(), "Overwriting a record should fail");
        let kept = ledger.get_or_null("BridgeVault").unwrap().unwrap();
        assert_eq!(kept.address, Address::repeat_byte(1));
    }

    #[test]
    fn test_chain_id_mismatch_is_rejected() {
        let temp_dir = TempDir::new("bridge-ledger").unwrap();
        FileLedger::open(temp_dir.path(), "sepolia", 11155111).unwrap();

        let result = FileLedger::open(temp_dir.path(), "sepolia", 1);
        assert!(result.is_err(), "Opening against another chain should fail");
    }

    #[test]
    fn test_pending_entry_is_cleared_by_save() {
        let temp_dir = TempDir::new("bridge-ledger").unwrap();
        let ledger = FileLedger::open(temp_dir.path(), "localhost", 31337).unwrap();
        let pending = PendingDeployment {
            tx_hash: B256::repeat_byte(0xab),
            address: Some(Address::repeat_byte(3)),
        };

        ledger.mark_pending("SuiBridge", &pending).unwrap();
        assert_eq!(ledger.pending("SuiBridge").unwrap(), Some(pending));
        assert!(ledger.names().unwrap().is_empty(), "Pending entries are not records");

        ledger
            .save("SuiBridge", &record(Address::repeat_byte(3)))
            .unwrap();
        assert!(ledger.pending("SuiBridge").unwrap().is_none());
    }

    #[test]
    fn test_corrupted_record_is_an_error() {
        let temp_dir = TempDir::new("bridge-ledger").unwrap();
        let ledger = FileLedger::open(temp_dir.path(), "localhost", 31337).unwrap();
        std::fs::write(ledger.dir().join("BridgeVault.json"), "{ invalid json }").unwrap();

        assert!(ledger.get_or_null("BridgeVault").is_err());
    }

    #[test]
    fn test_names_must_stay_inside_ledger() {
        let temp_dir = TempDir::new("bridge-ledger").unwrap();
        let ledger = FileLedger::open(temp_dir.path(), "localhost", 31337).unwrap();

        assert!(ledger.get_or_null("../escape").is_err());
        assert!(ledger.get_or_null(".chainId").is_err());
    }
}
