use alloy_core::{dyn_abi::DynSolValue, primitives::Bytes};

use super::{DeployContext, created_address};
use crate::{
    abi::encode_constructor_args,
    artifacts::ArtifactStore,
    chain::ChainClient,
    error::{DeployError, Result},
    ledger::{DeploymentLedger, DeploymentRecord},
};

/// Deploys a contract directly, passing the arguments to its constructor.
pub struct PlainDeployer<'a, A, L, C> {
    ctx: DeployContext<'a, A, L, C>,
}

impl<'a, A, L, C> PlainDeployer<'a, A, L, C>
where
    A: ArtifactStore,
    L: DeploymentLedger,
    C: ChainClient,
{
    pub fn new(ctx: DeployContext<'a, A, L, C>) -> Self {
        Self { ctx }
    }

    pub async fn deploy(&self, name: &str, args: Vec<DynSolValue>) -> Result<DeploymentRecord> {
        let artifact = self.ctx.artifacts.read_artifact(name)?;

        let encoded_args =
            encode_constructor_args(&artifact.abi, args).map_err(|reason| DeployError::Encoding {
                step: name.to_string(),
                reason,
            })?;
        let init_code: Bytes = [artifact.bytecode.as_ref(), encoded_args.as_ref()]
            .concat()
            .into();

        tracing::info!(name, "Deploying contract");

        let (pending, receipt) = self
            .ctx
            .submit_or_recover(name, || self.ctx.chain.deploy_contract(init_code))
            .await?;

        let address = created_address(name, &pending, &receipt)?;

        tracing::info!(name, %address, block_number = receipt.block_number, "Contract deployed");

        Ok(DeploymentRecord::plain(address, artifact.abi, &receipt))
    }
}
