use alloy_core::dyn_abi::DynSolValue;

use super::{DeployContext, created_address};
use crate::{
    abi::encode_initializer_call,
    artifacts::ArtifactStore,
    chain::{ChainClient, ProxyOptions},
    error::{DeployError, Result},
    ledger::{DeploymentLedger, DeploymentRecord},
};

/// Deploys an implementation contract behind an upgrade proxy.
///
/// The arguments are passed to the initializer through the proxy, never to the
/// implementation constructor. The returned record points at the proxy, carries the
/// implementation ABI and notes the implementation address.
pub struct ProxyDeployer<'a, A, L, C> {
    ctx: DeployContext<'a, A, L, C>,
}

impl<'a, A, L, C> ProxyDeployer<'a, A, L, C>
where
    A: ArtifactStore,
    L: DeploymentLedger,
    C: ChainClient,
{
    pub fn new(ctx: DeployContext<'a, A, L, C>) -> Self {
        Self { ctx }
    }

    pub async fn deploy(
        &self,
        name: &str,
        args: Vec<DynSolValue>,
        options: &ProxyOptions,
    ) -> Result<DeploymentRecord> {
        let artifact = self.ctx.artifacts.read_artifact(name)?;

        let init_data = encode_initializer_call(&artifact.abi, &options.initializer, args)
            .map_err(|reason| DeployError::Encoding {
                step: name.to_string(),
                reason,
            })?;

        tracing::info!(name, kind = %options.kind, initializer = %options.initializer, "Deploying proxy");

        let (pending, receipt) = self
            .ctx
            .submit_or_recover(name, || {
                self.ctx.chain.deploy_proxy(&artifact, init_data, options)
            })
            .await?;

        let proxy = created_address(name, &pending, &receipt)?;

        let implementation = self
            .ctx
            .chain
            .get_implementation_address(proxy)
            .await
            .map_err(|source| DeployError::ImplementationUnresolved {
                step: name.to_string(),
                proxy,
                source,
            })?;

        tracing::info!(
            name,
            %proxy,
            %implementation,
            block_number = receipt.block_number,
            "Proxy deployed"
        );

        Ok(DeploymentRecord::proxy(
            proxy,
            implementation,
            artifact.abi,
            &receipt,
        ))
    }
}
