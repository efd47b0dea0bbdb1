//! Ordered deployment plans.
//!
//! A plan is a list of steps, each deploying one named contract, followed by ownership
//! transfers between the deployed contracts. Steps run strictly in order; a step only
//! sees the addresses of the steps it declares as dependencies.

use std::collections::{BTreeMap, HashSet};

use alloy_core::{dyn_abi::DynSolValue, primitives::Address};
use derive_more::Deref;

use crate::{
    artifacts::ArtifactStore,
    chain::{ChainClient, ProxyOptions},
    deployer::DeployContext,
    error::{DeployError, Result},
    ledger::DeploymentLedger,
    ownership::{OwnershipHandshake, TransferOutcome},
};

/// Builds the arguments of a step from the addresses resolved so far and the network
/// configuration.
pub type ArgsBuilder<C> = Box<dyn Fn(&RunState, &C) -> Result<Vec<DynSolValue>> + Send + Sync>;

/// Addresses resolved during a run, keyed by logical contract name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct RunState(BTreeMap<String, Address>);

impl RunState {
    /// Address of `name`, or a precondition error if it is not resolved yet.
    pub fn address_of(&self, name: &str) -> Result<Address> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| DeployError::Precondition(format!("`{name}` has no address yet")))
    }

    /// View of the state restricted to `names`.
    fn restrict(&self, names: &[String]) -> Self {
        Self(
            names
                .iter()
                .filter_map(|n| self.0.get(n).map(|a| (n.clone(), *a)))
                .collect(),
        )
    }

    fn insert(&mut self, name: &str, address: Address) {
        self.0.insert(name.to_string(), address);
    }
}

impl FromIterator<(String, Address)> for RunState {
    fn from_iter<T: IntoIterator<Item = (String, Address)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How a step deploys its contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Proxy(ProxyOptions),
    Plain,
}

/// One contract deployment within a plan.
pub struct DeploymentStep<C> {
    /// Logical name; also the ledger key and the artifact name.
    pub name: String,
    pub kind: StepKind,
    /// Steps whose addresses the arguments are built from.
    pub depends_on: Vec<String>,
    args_builder: ArgsBuilder<C>,
}

impl<C> std::fmt::Debug for DeploymentStep<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentStep")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

impl<C> DeploymentStep<C> {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            depends_on: Vec::new(),
            args_builder: Box::new(|_, _| Ok(Vec::new())),
        }
    }

    pub fn proxy(name: impl Into<String>, options: ProxyOptions) -> Self {
        Self::new(name, StepKind::Proxy(options))
    }

    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(name, StepKind::Plain)
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn args<F>(mut self, builder: F) -> Self
    where
        F: Fn(&RunState, &C) -> Result<Vec<DynSolValue>> + Send + Sync + 'static,
    {
        self.args_builder = Box::new(builder);
        self
    }

    /// Build the arguments from the declared dependencies only.
    pub fn build_args(&self, state: &RunState, config: &C) -> Result<Vec<DynSolValue>> {
        (self.args_builder)(&state.restrict(&self.depends_on), config)
    }
}

/// Transfer of ownership of one deployed contract to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipTransfer {
    pub owned: String,
    pub new_owner: String,
}

/// Outcome of one ownership transfer of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub owned: String,
    pub new_owner: String,
    pub outcome: TransferOutcome,
}

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Address of every step of the plan.
    pub addresses: RunState,
    /// Steps deployed by this run, in order.
    pub deployed: Vec<String>,
    /// Steps skipped because the ledger already had a record.
    pub reused: Vec<String>,
    pub transfers: Vec<TransferReport>,
}

/// Ordered deployments plus the ownership transfers that wire them together.
pub struct DeploymentPlan<C> {
    steps: Vec<DeploymentStep<C>>,
    transfers: Vec<OwnershipTransfer>,
}

impl<C> Default for DeploymentPlan<C> {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            transfers: Vec::new(),
        }
    }
}

impl<C> DeploymentPlan<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: DeploymentStep<C>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn transfer_ownership(
        mut self,
        owned: impl Into<String>,
        new_owner: impl Into<String>,
    ) -> Self {
        self.transfers.push(OwnershipTransfer {
            owned: owned.into(),
            new_owner: new_owner.into(),
        });
        self
    }

    pub fn steps(&self) -> &[DeploymentStep<C>] {
        &self.steps
    }

    pub fn transfers(&self) -> &[OwnershipTransfer] {
        &self.transfers
    }

    /// Check that every dependency is declared by an earlier step and that transfers
    /// only reference steps of the plan.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for step in &self.steps {
            for dependency in &step.depends_on {
                if !seen.contains(dependency.as_str()) {
                    return Err(DeployError::InvalidPlan(format!(
                        "step `{}` depends on `{dependency}`, which is not deployed before it",
                        step.name
                    )));
                }
            }
            if !seen.insert(step.name.as_str()) {
                return Err(DeployError::InvalidPlan(format!(
                    "step `{}` appears twice",
                    step.name
                )));
            }
        }

        for transfer in &self.transfers {
            for name in [&transfer.owned, &transfer.new_owner] {
                if !seen.contains(name.as_str()) {
                    return Err(DeployError::InvalidPlan(format!(
                        "ownership transfer references unknown step `{name}`"
                    )));
                }
            }
            if transfer.owned == transfer.new_owner {
                return Err(DeployError::InvalidPlan(format!(
                    "`{}` cannot own itself",
                    transfer.owned
                )));
            }
        }

        Ok(())
    }

    /// Run the plan against `ctx`.
    ///
    /// Steps with a ledger record are reused without touching the chain. Every newly
    /// deployed contract is recorded before the next step starts, so a failure leaves
    /// the ledger holding exactly the steps that completed.
    pub async fn execute<A, L, Ch>(
        &self,
        config: &C,
        ctx: DeployContext<'_, A, L, Ch>,
    ) -> Result<PlanOutcome>
    where
        C: Sync,
        A: ArtifactStore,
        L: DeploymentLedger,
        Ch: ChainClient,
    {
        self.validate()?;

        let mut outcome = PlanOutcome::default();

        for step in &self.steps {
            let ledger_err = |source| DeployError::Ledger {
                name: step.name.clone(),
                source,
            };

            if let Some(record) = ctx.ledger.get_or_null(&step.name).map_err(ledger_err)? {
                tracing::info!(name = %step.name, address = %record.address, "Reusing recorded deployment");
                outcome.addresses.insert(&step.name, record.address);
                outcome.reused.push(step.name.clone());
                continue;
            }

            let args = step.build_args(&outcome.addresses, config)?;

            let record = match &step.kind {
                StepKind::Proxy(options) => {
                    ctx.proxy_deployer()
                        .deploy(&step.name, args, options)
                        .await
                }
                StepKind::Plain => ctx.plain_deployer().deploy(&step.name, args).await,
            }
            .map_err(|e| e.with_dependencies(&step.depends_on))?;

            ctx.ledger.save(&step.name, &record).map_err(ledger_err)?;

            outcome.addresses.insert(&step.name, record.address);
            outcome.deployed.push(step.name.clone());
        }

        let handshake = OwnershipHandshake::new(ctx.chain);
        for transfer in &self.transfers {
            tracing::info!(owned = %transfer.owned, new_owner = %transfer.new_owner, "Wiring ownership");

            let result = handshake
                .transfer(
                    outcome.addresses.get(&transfer.owned).copied(),
                    outcome.addresses.get(&transfer.new_owner).copied(),
                )
                .await
                .map_err(|e| {
                    e.with_dependencies(&[transfer.owned.clone(), transfer.new_owner.clone()])
                })?;

            outcome.transfers.push(TransferReport {
                owned: transfer.owned.clone(),
                new_owner: transfer.new_owner.clone(),
                outcome: result,
            });
        }

        tracing::info!(
            deployed = outcome.deployed.len(),
            reused = outcome.reused.len(),
            transfers = outcome.transfers.len(),
            "Deployment plan complete"
        );

        Ok(outcome)
    }
}
