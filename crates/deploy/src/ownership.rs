//! Ownership hand-off between deployed contracts.

use alloy_core::{primitives::Address, sol_types::SolCall};

use crate::{
    abi::IOwnable,
    chain::{ChainClient, TxReceipt},
    error::{DeployError, Result},
};

/// Result of an ownership transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// `transferOwnership` was sent and included.
    Transferred(TxReceipt),
    /// The contract was already owned by the new owner; nothing was sent.
    AlreadyOwned,
}

/// Transfers ownership of an `Ownable` contract to another deployed contract.
pub struct OwnershipHandshake<'a, C> {
    chain: &'a C,
}

impl<'a, C: ChainClient> OwnershipHandshake<'a, C> {
    pub fn new(chain: &'a C) -> Self {
        Self { chain }
    }

    /// Make `new_owner` the owner of `owned`.
    ///
    /// Both addresses must be resolved: if either is missing no transaction is sent.
    /// When `owned` already reports `new_owner` as its owner the call succeeds without
    /// sending anything, which keeps re-runs of a completed plan side-effect free. The
    /// same check settles a transfer that fails to be included.
    pub async fn transfer(
        &self,
        owned: Option<Address>,
        new_owner: Option<Address>,
    ) -> Result<TransferOutcome> {
        let (owned, new_owner) = match (owned, new_owner) {
            (Some(owned), Some(new_owner)) => (owned, new_owner),
            (owned, new_owner) => {
                return Err(DeployError::Precondition(format!(
                    "ownership transfer needs both addresses (owned: {}, new owner: {})",
                    display_or_missing(owned),
                    display_or_missing(new_owner)
                )));
            }
        };

        let step = format!("transferOwnership({owned})");
        let tx_err = |source| DeployError::Transaction {
            step: step.clone(),
            dependencies: Vec::new(),
            source,
        };

        let current = self.current_owner(owned).await.map_err(tx_err)?;
        if current == new_owner {
            tracing::info!(%owned, %new_owner, "Ownership already transferred");
            return Ok(TransferOutcome::AlreadyOwned);
        }

        tracing::info!(%owned, from = %current, to = %new_owner, "Transferring ownership");

        let data = IOwnable::transferOwnershipCall {
            newOwner: new_owner,
        }
        .abi_encode();
        let pending = self
            .chain
            .send_transaction(owned, data.into())
            .await
            .map_err(tx_err)?;
        let receipt = match self.chain.wait_for_inclusion(&pending).await {
            Ok(receipt) => receipt,
            Err(e) => {
                // A transfer sent by an interrupted run may land first and make this one
                // revert. Ownership is then already where it should be.
                if self.current_owner(owned).await.ok() == Some(new_owner) {
                    tracing::warn!(
                        %owned,
                        %new_owner,
                        tx_hash = %pending.tx_hash,
                        error = %e,
                        "Transfer failed but ownership is already in place"
                    );
                    return Ok(TransferOutcome::AlreadyOwned);
                }
                return Err(tx_err(e));
            }
        };

        tracing::info!(%owned, %new_owner, block_number = receipt.block_number, "Ownership transferred");

        Ok(TransferOutcome::Transferred(receipt))
    }

    async fn current_owner(&self, owned: Address) -> anyhow::Result<Address> {
        let output = self
            .chain
            .call(owned, IOwnable::ownerCall {}.abi_encode().into())
            .await?;
        let decoded = IOwnable::ownerCall::abi_decode_returns(&output, true)
            .map_err(|e| anyhow::anyhow!("Failed to decode owner() of {owned}: {e}"))?;
        Ok(decoded._0)
    }
}

fn display_or_missing(address: Option<Address>) -> String {
    address.map_or_else(|| "missing".to_string(), |a| a.to_string())
}
