//! Compiled contract artifacts.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::{json_abi::JsonAbi, primitives::Bytes};
use anyhow::Context;
use serde::Deserialize;

use crate::error::{DeployError, Result};

/// ABI and creation bytecode of a compiled contract.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

/// Read-only lookup of compiled contracts by name.
pub trait ArtifactStore: Send + Sync {
    /// Return the artifact for `name`, or [`DeployError::ArtifactNotFound`].
    fn read_artifact(&self, name: &str) -> Result<Artifact>;
}

/// Artifact store reading a hardhat `artifacts/` tree.
///
/// Artifacts live at `artifacts/<source path>/<Name>.sol/<Name>.json`. The store indexes
/// the tree once on construction and ignores the `.dbg.json` sidecar files.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
    index: HashMap<String, PathBuf>,
}

impl FsArtifactStore {
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            anyhow::bail!("Artifacts directory not found: {}", root.display());
        }

        let mut index = HashMap::new();
        Self::index_dir(&root, &mut index)?;
        tracing::debug!(root = %root.display(), artifacts = index.len(), "Indexed contract artifacts");

        Ok(Self { root, index })
    }

    fn index_dir(dir: &Path, index: &mut HashMap<String, PathBuf>) -> anyhow::Result<()> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                // build-info holds compiler inputs, not artifacts
                if path.file_name().is_some_and(|n| n == "build-info") {
                    continue;
                }
                Self::index_dir(&path, index)?;
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.ends_with(".dbg.json") {
                continue;
            }
            if let Some(name) = file_name.strip_suffix(".json") {
                if let Some(previous) = index.insert(name.to_string(), path.clone()) {
                    tracing::warn!(
                        contract = name,
                        kept = %path.display(),
                        shadowed = %previous.display(),
                        "Duplicate artifact name"
                    );
                }
            }
        }

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsArtifactStore {
    fn read_artifact(&self, name: &str) -> Result<Artifact> {
        let not_found = |reason: String| DeployError::ArtifactNotFound {
            name: name.to_string(),
            reason,
        };

        let path = self
            .index
            .get(name)
            .ok_or_else(|| not_found(format!("no artifact under {}", self.root.display())))?;

        let content = std::fs::read_to_string(path)
            .map_err(|e| not_found(format!("failed to read {}: {e}", path.display())))?;
        let artifact: Artifact = serde_json::from_str(&content)
            .map_err(|e| not_found(format!("failed to parse {}: {e}", path.display())))?;

        if artifact.bytecode.is_empty() {
            return Err(not_found("artifact has no creation bytecode".to_string()));
        }

        Ok(artifact)
    }
}

/// Artifact store backed by a map, for wiring plans without a compiler output tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
    artifacts: HashMap<String, Artifact>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, artifact: Artifact) -> Self {
        self.insert(artifact);
        self
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts
            .insert(artifact.contract_name.clone(), artifact);
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn read_artifact(&self, name: &str) -> Result<Artifact> {
        let artifact = self
            .artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| DeployError::ArtifactNotFound {
                name: name.to_string(),
                reason: "not registered".to_string(),
            })?;

        if artifact.bytecode.is_empty() {
            return Err(DeployError::ArtifactNotFound {
                name: name.to_string(),
                reason: "artifact has no creation bytecode".to_string(),
            });
        }

        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const VAULT_ARTIFACT: &str = r#"{
        "_format": "hh-sol-artifact-1",
        "contractName": "BridgeVault",
        "sourceName": "contracts/BridgeVault.sol",
        "abi": [
            {"type": "constructor", "inputs": [{"name": "_wETH", "type": "address", "internalType": "address"}], "stateMutability": "nonpayable"}
        ],
        "bytecode": "0x6080604052",
        "deployedBytecode": "0x6080",
        "linkReferences": {},
        "deployedLinkReferences": {}
    }"#;

    fn write_artifact(root: &Path, source: &str, name: &str, content: &str) {
        let dir = root.join("contracts").join(source);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{name}.json")), content).unwrap();
        std::fs::write(dir.join(format!("{name}.dbg.json")), "{}").unwrap();
    }

    #[test]
    fn test_reads_hardhat_artifact() {
        let temp_dir = TempDir::new("bridge-artifacts").unwrap();
        write_artifact(temp_dir.path(), "BridgeVault.sol", "BridgeVault", VAULT_ARTIFACT);

        let store = FsArtifactStore::open(temp_dir.path()).unwrap();
        let artifact = store.read_artifact("BridgeVault").unwrap();

        assert_eq!(artifact.contract_name, "BridgeVault");
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert!(artifact.abi.constructor().is_some());
    }

    #[test]
    fn test_missing_artifact_is_not_found() {
        let temp_dir = TempDir::new("bridge-artifacts").unwrap();
        write_artifact(temp_dir.path(), "BridgeVault.sol", "BridgeVault", VAULT_ARTIFACT);

        let store = FsArtifactStore::open(temp_dir.path()).unwrap();
        let err = store.read_artifact("SuiBridge").unwrap_err();

        assert!(matches!(err, DeployError::ArtifactNotFound { ref name, .. } if name == "SuiBridge"));
    }

    #[test]
    fn test_interface_without_bytecode_is_not_found() {
        let temp_dir = TempDir::new("bridge-artifacts").unwrap();
        let interface = VAULT_ARTIFACT
            .replace("\"0x6080604052\"", "\"0x\"")
            .replace("BridgeVault", "IBridgeVault");
        write_artifact(temp_dir.path(), "IBridgeVault.sol", "IBridgeVault", &interface);

        let store = FsArtifactStore::open(temp_dir.path()).unwrap();
        let err = store.read_artifact("IBridgeVault").unwrap_err();

        assert!(matches!(err, DeployError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_missing_root_fails() {
        let temp_dir = TempDir::new("bridge-artifacts").unwrap();
        assert!(FsArtifactStore::open(temp_dir.path().join("nope")).is_err());
    }
}
