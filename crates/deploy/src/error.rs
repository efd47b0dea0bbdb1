//! Error taxonomy for a deployment run.
//!
//! Every variant aborts the current run. Re-running the whole plan is the retry
//! mechanism: steps that already have a ledger record are skipped.

use std::path::PathBuf;

use alloy_core::primitives::Address;

/// Errors raised while resolving the network configuration bundle.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required field is absent from the bundle.
    #[error("missing required configuration field `{field}` for network `{network}`")]
    MissingField {
        network: String,
        field: &'static str,
    },
    /// A field is present but unusable.
    #[error("invalid configuration field `{field}` for network `{network}`: {reason}")]
    Invalid {
        network: String,
        field: &'static str,
        reason: String,
    },
    /// No configuration bundle exists for the network.
    #[error("no configuration bundle for network `{network}` at {}", path.display())]
    MissingBundle { network: String, path: PathBuf },
    /// The configuration source could not be read or parsed.
    #[error("failed to load configuration for network `{network}`: {source}")]
    Load {
        network: String,
        #[source]
        source: Box<figment::Error>,
    },
}

impl ConfigError {
    /// The offending field name, if the error is about a single field.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingField { field, .. } | ConfigError::Invalid { field, .. } => {
                Some(field)
            }
            ConfigError::MissingBundle { .. } | ConfigError::Load { .. } => None,
        }
    }
}

/// Errors surfaced by the deployment orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No usable compiled artifact exists for the contract.
    #[error("artifact not found for `{name}`: {reason}")]
    ArtifactNotFound { name: String, reason: String },

    /// The deployment transaction was rejected, reverted or never included.
    #[error("transaction for step `{step}` failed (dependencies: [{}])", dependencies.join(", "))]
    Transaction {
        step: String,
        dependencies: Vec<String>,
        #[source]
        source: anyhow::Error,
    },

    /// The proxy was mined but its implementation slot could not be resolved.
    #[error("could not resolve implementation of proxy {proxy} for step `{step}`")]
    ImplementationUnresolved {
        step: String,
        proxy: Address,
        #[source]
        source: anyhow::Error,
    },

    /// The arguments built for a step do not fit the contract ABI.
    #[error("failed to encode arguments for step `{step}`: {reason}")]
    Encoding { step: String, reason: String },

    /// An operation ran before the state it depends on exists.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// The plan is not a valid topological order of its dependencies.
    #[error("invalid deployment plan: {0}")]
    InvalidPlan(String),

    /// Reading or writing the deployment ledger failed.
    #[error("deployment ledger error for `{name}`")]
    Ledger {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A chain query outside of any single step failed.
    #[error("chain query failed")]
    Chain(#[source] anyhow::Error),
}

impl DeployError {
    /// Name of the step the error is attributed to, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            DeployError::Transaction { step, .. }
            | DeployError::ImplementationUnresolved { step, .. }
            | DeployError::Encoding { step, .. } => Some(step),
            DeployError::ArtifactNotFound { name, .. } | DeployError::Ledger { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }

    /// Attach the logical names a failed transaction depended on.
    pub fn with_dependencies(mut self, names: &[String]) -> Self {
        if let DeployError::Transaction { dependencies, .. } = &mut self {
            *dependencies = names.to_vec();
        }
        self
    }
}

pub type Result<T, E = DeployError> = std::result::Result<T, E>;
