//! The bridge deployment plans.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use serde::{Deserialize, Serialize};

use crate::{
    chain::ProxyOptions,
    config::BridgeDeploymentConfig,
    plan::{DeploymentPlan, DeploymentStep},
};

pub const BRIDGE_COMMITTEE: &str = "BridgeCommittee";
pub const BRIDGE_VAULT: &str = "BridgeVault";
pub const BRIDGE_LIMITER: &str = "BridgeLimiter";
pub const SUI_BRIDGE: &str = "SuiBridge";

pub const MOCK_WBTC: &str = "WBTC";
pub const MOCK_USDC: &str = "USDC";

/// Selectable group of deployments.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// Mock ERC-20 tokens for test networks.
    Mock,
    /// Committee, vault, limiter and bridge, plus the ownership hand-off.
    Bridge,
}

impl Tag {
    /// Whether the tag's plan reads the network configuration.
    pub fn needs_config(&self) -> bool {
        matches!(self, Tag::Bridge)
    }
}

/// Committee, vault, limiter and bridge facade, followed by handing the vault and
/// limiter over to the bridge.
pub fn bridge_plan() -> DeploymentPlan<BridgeDeploymentConfig> {
    DeploymentPlan::new()
        .step(
            DeploymentStep::proxy(BRIDGE_COMMITTEE, ProxyOptions::uups()).args(
                |_, config: &BridgeDeploymentConfig| {
                    Ok(vec![
                        addresses(&config.committee_members),
                        uints(&config.committee_member_stake),
                    ])
                },
            ),
        )
        .step(
            DeploymentStep::plain(BRIDGE_VAULT).args(|_, config: &BridgeDeploymentConfig| {
                Ok(vec![DynSolValue::Address(
                    config.wrapped_native_token_address,
                )])
            }),
        )
        .step(
            DeploymentStep::plain(BRIDGE_LIMITER).args(|_, config: &BridgeDeploymentConfig| {
                Ok(vec![uints(&config.daily_bridge_limits)])
            }),
        )
        .step(
            DeploymentStep::proxy(SUI_BRIDGE, ProxyOptions::uups())
                .depends_on([BRIDGE_COMMITTEE, BRIDGE_VAULT, BRIDGE_LIMITER])
                .args(|state, config: &BridgeDeploymentConfig| {
                    Ok(vec![
                        addresses(&config.supported_tokens),
                        DynSolValue::Address(state.address_of(BRIDGE_COMMITTEE)?),
                        DynSolValue::Address(state.address_of(BRIDGE_VAULT)?),
                        DynSolValue::Address(state.address_of(BRIDGE_LIMITER)?),
                        DynSolValue::Address(config.wrapped_native_token_address),
                        uint(config.source_chain_id),
                    ])
                }),
        )
        .transfer_ownership(BRIDGE_VAULT, SUI_BRIDGE)
        .transfer_ownership(BRIDGE_LIMITER, SUI_BRIDGE)
}

/// Mock tokens deployed on test networks, constructed with `(name, symbol)`.
pub fn mock_tokens_plan<C>() -> DeploymentPlan<C> {
    DeploymentPlan::new()
        .step(DeploymentStep::plain(MOCK_WBTC).args(|_, _| Ok(token("Wrapped Bitcoin", "wBTC"))))
        .step(DeploymentStep::plain(MOCK_USDC).args(|_, _| Ok(token("USD Coin", "USDC"))))
}

fn token(name: &str, symbol: &str) -> Vec<DynSolValue> {
    vec![
        DynSolValue::String(name.to_string()),
        DynSolValue::String(symbol.to_string()),
    ]
}

fn addresses(values: &[Address]) -> DynSolValue {
    DynSolValue::Array(values.iter().copied().map(DynSolValue::Address).collect())
}

// Width is fixed up against the ABI at encoding time.
fn uint(value: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 256)
}

fn uints(values: &[u64]) -> DynSolValue {
    DynSolValue::Array(values.iter().copied().map(uint).collect())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::plan::{RunState, StepKind};

    fn config() -> BridgeDeploymentConfig {
        BridgeDeploymentConfig {
            committee_members: vec![Address::repeat_byte(0xa1), Address::repeat_byte(0xa2)],
            committee_member_stake: vec![5000, 5000],
            wrapped_native_token_address: Address::repeat_byte(0xee),
            supported_tokens: vec![Address::repeat_byte(0x01), Address::repeat_byte(0x02)],
            source_chain_id: 1,
            daily_bridge_limits: vec![100, 200],
        }
    }

    #[test]
    fn test_bridge_plan_is_valid() {
        let plan = bridge_plan();
        plan.validate().unwrap();

        let names: Vec<_> = plan.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [BRIDGE_COMMITTEE, BRIDGE_VAULT, BRIDGE_LIMITER, SUI_BRIDGE]
        );
        assert_eq!(plan.transfers().len(), 2);
        assert!(
            plan.transfers()
                .iter()
                .all(|t| t.new_owner == SUI_BRIDGE)
        );
    }

    #[test]
    fn test_proxied_steps() {
        let plan = bridge_plan();
        let proxied: Vec<_> = plan
            .steps()
            .iter()
            .filter(|s| matches!(s.kind, StepKind::Proxy(_)))
            .map(|s| s.name.as_str())
            .collect();

        assert_eq!(proxied, [BRIDGE_COMMITTEE, SUI_BRIDGE]);
    }

    #[test]
    fn test_bridge_args_use_resolved_addresses() {
        let plan = bridge_plan();
        let state: RunState = [
            (BRIDGE_COMMITTEE.to_string(), Address::repeat_byte(0xc0)),
            (BRIDGE_VAULT.to_string(), Address::repeat_byte(0xc1)),
            (BRIDGE_LIMITER.to_string(), Address::repeat_byte(0xc2)),
        ]
        .into_iter()
        .collect();

        let args = plan.steps()[3].build_args(&state, &config()).unwrap();

        assert_eq!(args.len(), 6);
        assert_eq!(args[1], DynSolValue::Address(Address::repeat_byte(0xc0)));
        assert_eq!(args[2], DynSolValue::Address(Address::repeat_byte(0xc1)));
        assert_eq!(args[3], DynSolValue::Address(Address::repeat_byte(0xc2)));
        assert_eq!(args[4], DynSolValue::Address(Address::repeat_byte(0xee)));
    }

    #[test]
    fn test_bridge_args_fail_before_dependencies_exist() {
        let plan = bridge_plan();

        let result = plan.steps()[3].build_args(&RunState::default(), &config());
        assert!(result.is_err());
    }

    #[test]
    fn test_tags_parse() {
        assert_eq!(Tag::from_str("bridge").unwrap(), Tag::Bridge);
        assert_eq!(Tag::from_str("MOCK").unwrap(), Tag::Mock);
        assert!(Tag::from_str("l2").is_err());
        assert!(Tag::Mock < Tag::Bridge);
    }
}
