use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use super::{DeploymentLedger, DeploymentRecord};
use crate::chain::PendingDeployment;

#[derive(Debug, Default)]
struct Entries {
    records: BTreeMap<String, DeploymentRecord>,
    pending: BTreeMap<String, PendingDeployment>,
}

/// In-memory ledger. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<Entries>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = (String, DeploymentRecord)>) -> Self {
        let ledger = Self::default();
        if let Ok(mut entries) = ledger.entries.lock() {
            entries.records.extend(records);
        }
        ledger
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Ledger lock poisoned"))
    }
}

impl DeploymentLedger for MemoryLedger {
    fn get_or_null(&self, name: &str) -> anyhow::Result<Option<DeploymentRecord>> {
        Ok(self.lock()?.records.get(name).cloned())
    }

    fn save(&self, name: &str, record: &DeploymentRecord) -> anyhow::Result<()> {
        let mut entries = self.lock()?;
        if entries.records.contains_key(name) {
            anyhow::bail!("Deployment `{name}` is already recorded");
        }
        entries.records.insert(name.to_string(), record.clone());
        entries.pending.remove(name);
        Ok(())
    }

    fn pending(&self, name: &str) -> anyhow::Result<Option<PendingDeployment>> {
        Ok(self.lock()?.pending.get(name).cloned())
    }

    fn mark_pending(&self, name: &str, pending: &PendingDeployment) -> anyhow::Result<()> {
        self.lock()?
            .pending
            .insert(name.to_string(), pending.clone());
        Ok(())
    }

    fn clear_pending(&self, name: &str) -> anyhow::Result<()> {
        self.lock()?.pending.remove(name);
        Ok(())
    }

    fn names(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.lock()?.records.keys().cloned().collect())
    }
}
