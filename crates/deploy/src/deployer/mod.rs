//! Single-contract deployers.
//!
//! A deployer turns a contract name and its arguments into a
//! [`DeploymentRecord`](crate::ledger::DeploymentRecord). It never writes the record
//! itself: on any failure nothing is recorded and the next run starts the step over.

mod plain;
mod proxy;

pub use plain::PlainDeployer;
pub use proxy::ProxyDeployer;

use std::future::Future;

use crate::{
    artifacts::ArtifactStore,
    chain::{ChainClient, PendingDeployment, TxReceipt},
    error::{DeployError, Result},
    ledger::DeploymentLedger,
};

/// Collaborators shared by every step of a run.
///
/// The ledger is passed explicitly rather than reached through global state, so a run
/// can be pointed at an in-memory ledger.
pub struct DeployContext<'a, A, L, C> {
    pub artifacts: &'a A,
    pub ledger: &'a L,
    pub chain: &'a C,
}

impl<A, L, C> Clone for DeployContext<'_, A, L, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, L, C> Copy for DeployContext<'_, A, L, C> {}

impl<'a, A, L, C> DeployContext<'a, A, L, C>
where
    A: ArtifactStore,
    L: DeploymentLedger,
    C: ChainClient,
{
    pub fn new(artifacts: &'a A, ledger: &'a L, chain: &'a C) -> Self {
        Self {
            artifacts,
            ledger,
            chain,
        }
    }

    pub fn proxy_deployer(&self) -> ProxyDeployer<'a, A, L, C> {
        ProxyDeployer::new(*self)
    }

    pub fn plain_deployer(&self) -> PlainDeployer<'a, A, L, C> {
        PlainDeployer::new(*self)
    }

    /// Submit a creation transaction for `name` and wait for it, or pick up the one a
    /// previous run already submitted.
    ///
    /// The submitted transaction is journaled in the ledger before waiting. If a journal
    /// entry exists, its receipt is looked up first: a successful one is adopted without
    /// submitting anything, a reverted or unknown one is discarded and a fresh
    /// transaction is sent.
    pub(crate) async fn submit_or_recover<F, Fut>(
        &self,
        name: &str,
        submit: F,
    ) -> Result<(PendingDeployment, TxReceipt)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<PendingDeployment>>,
    {
        let ledger_err = |source| DeployError::Ledger {
            name: name.to_string(),
            source,
        };
        let tx_err = |source| DeployError::Transaction {
            step: name.to_string(),
            dependencies: Vec::new(),
            source,
        };

        if let Some(pending) = self.ledger.pending(name).map_err(ledger_err)? {
            match self.chain.transaction_receipt(pending.tx_hash).await {
                Ok(Some(receipt)) if receipt.status => {
                    tracing::info!(
                        name,
                        tx_hash = %pending.tx_hash,
                        block_number = receipt.block_number,
                        "Recovered deployment submitted by an earlier run"
                    );
                    return Ok((pending, receipt));
                }
                Ok(Some(_)) => {
                    tracing::warn!(name, tx_hash = %pending.tx_hash, "Earlier deployment reverted, redeploying");
                }
                Ok(None) => {
                    tracing::warn!(name, tx_hash = %pending.tx_hash, "Earlier deployment unknown to the chain, redeploying");
                }
                Err(e) => return Err(tx_err(e.context("Failed to reconcile earlier deployment"))),
            }
            self.ledger.clear_pending(name).map_err(ledger_err)?;
        }

        let pending = submit().await.map_err(tx_err)?;
        self.ledger.mark_pending(name, &pending).map_err(ledger_err)?;

        tracing::debug!(name, tx_hash = %pending.tx_hash, "Waiting for inclusion");

        let receipt = self
            .chain
            .wait_for_inclusion(&pending)
            .await
            .map_err(tx_err)?;

        Ok((pending, receipt))
    }
}

/// Address of the contract created by `receipt`, falling back to the address known at
/// submission time.
pub(crate) fn created_address(
    name: &str,
    pending: &PendingDeployment,
    receipt: &TxReceipt,
) -> Result<alloy_core::primitives::Address> {
    receipt
        .contract_address
        .or(pending.address)
        .ok_or_else(|| DeployError::Transaction {
            step: name.to_string(),
            dependencies: Vec::new(),
            source: anyhow::anyhow!(
                "receipt of {} carries no contract address",
                receipt.transaction_hash
            ),
        })
}
