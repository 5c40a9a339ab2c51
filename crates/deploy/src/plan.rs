//! The perpetual-stack deployment plan.
//!
//! Declares the fixed component set, the linking calls that wire components
//! together once everything is deployed, the seeding chain and the addresses
//! exported to the frontend.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    Amount, ArtifactEntry, ComponentName, ComponentSpec, ConstructorArg, DependencyGraph,
    SeedArg, SeedStep, SetupAction,
    error::{DeployError, Result},
};

pub const TOKEN_FACTORY: &str = "TokenFactory";
pub const COLLATERAL_TOKEN: &str = "CollateralToken";
pub const PRICE_FEEDER: &str = "PriceFeeder";
pub const PERPETUAL: &str = "Perpetual";
pub const AMM: &str = "Amm";
pub const FUNDING_CALCULATOR: &str = "FundingCalculator";

pub const WRITE_PRICE_STEP: &str = "write-price";
pub const CONFIRM_PRICE_STEP: &str = "confirm-price";
pub const APPROVE_STEP: &str = "approve-collateral";
pub const DEPOSIT_STEP: &str = "deposit";
pub const CREATE_POOL_STEP: &str = "create-pool";

/// Literal values used by the perpetual-stack plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    pub collateral_name: String,
    pub collateral_symbol: String,
    /// Description of the index tracked by the price feeder.
    pub index_description: String,
    pub share_token_name: String,
    pub share_token_symbol: String,
    /// Initial index price pushed to the oracle.
    pub index_price: Amount,
    /// Allowance granted to the perpetual contract over the admin's collateral.
    pub collateral_approval: Amount,
    pub deposit: Amount,
    /// Amount used to create the AMM pool.
    pub pool_amount: Amount,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            collateral_name: "Terra UST".to_string(),
            collateral_symbol: "UST".to_string(),
            index_description: "Dow Jones Index".to_string(),
            share_token_name: "Dow Harmony Index Perpetual Share Token".to_string(),
            share_token_symbol: "DOW-HUSD".to_string(),
            index_price: Amount::whole("30000"),
            collateral_approval: Amount::base_units("9999999999999999999999999999"),
            deposit: Amount::whole("70000"),
            pool_amount: Amount::whole("1"),
        }
    }
}

/// Everything the orchestrator executes, as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub components: Vec<ComponentSpec>,
    pub setup: Vec<SetupAction>,
    pub seed: Vec<SeedStep>,
    pub artifact: Vec<ArtifactEntry>,
}

impl DeploymentPlan {
    /// The plan for the perpetual stack.
    pub fn perpetual_stack(config: &PlanConfig) -> Self {
        let components = vec![
            ComponentSpec::new(TOKEN_FACTORY),
            ComponentSpec::new(COLLATERAL_TOKEN)
                .artifact("UST")
                .arg(ConstructorArg::string(&config.collateral_name))
                .arg(ConstructorArg::string(&config.collateral_symbol)),
            ComponentSpec::new(PRICE_FEEDER).arg(ConstructorArg::string(&config.index_description)),
            ComponentSpec::new(PERPETUAL)
                .arg(ConstructorArg::address_of(COLLATERAL_TOKEN))
                .arg(ConstructorArg::address_of(PRICE_FEEDER)),
            ComponentSpec::new(AMM)
                .artifact("AMM")
                .arg(ConstructorArg::string(&config.share_token_name))
                .arg(ConstructorArg::string(&config.share_token_symbol))
                .arg(ConstructorArg::address_of(TOKEN_FACTORY))
                .arg(ConstructorArg::address_of(PRICE_FEEDER))
                .arg(ConstructorArg::address_of(PERPETUAL)),
            ComponentSpec::new(FUNDING_CALCULATOR).arg(ConstructorArg::address_of(AMM)),
        ];

        let setup = vec![
            SetupAction::new(AMM, "setFundingCalculator").arg(FUNDING_CALCULATOR),
            SetupAction::new(PERPETUAL, "setupAmm")
                .arg(AMM)
                .requires(FUNDING_CALCULATOR),
        ];

        let seed = vec![
            SeedStep::new(WRITE_PRICE_STEP, PRICE_FEEDER, "updateValue")
                .amount(config.index_price.clone()),
            SeedStep::new(CONFIRM_PRICE_STEP, PRICE_FEEDER, "confirmValueUpdate")
                .after(WRITE_PRICE_STEP),
            SeedStep::new(APPROVE_STEP, COLLATERAL_TOKEN, "approve")
                .address_of(PERPETUAL)
                .amount(config.collateral_approval.clone())
                .after(CONFIRM_PRICE_STEP),
            SeedStep::new(DEPOSIT_STEP, PERPETUAL, "deposit")
                .amount(config.deposit.clone())
                .after(APPROVE_STEP),
            SeedStep::new(CREATE_POOL_STEP, AMM, "createPool")
                .amount(config.pool_amount.clone())
                .after(DEPOSIT_STEP),
        ];

        let artifact = vec![
            ArtifactEntry::new("REACT_APP_COLLATERAL_TOKEN_ADDRESS", COLLATERAL_TOKEN),
            ArtifactEntry::new("REACT_APP_PERPETUAL_ADDRESS", PERPETUAL),
            ArtifactEntry::new("REACT_APP_AMM_ADDRESS", AMM),
        ];

        Self {
            components,
            setup,
            seed,
            artifact,
        }
    }

    pub fn component(&self, name: &ComponentName) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| &c.name == name)
    }

    pub fn graph(&self) -> Result<DependencyGraph> {
        DependencyGraph::from_specs(&self.components)
    }

    /// Validate the whole plan and return the deployment order.
    ///
    /// Runs before any remote call: the graph must be acyclic and its ordering
    /// must deploy dependencies first, every action, step and artifact entry
    /// must name a known component, seed amounts must convert to base units,
    /// seed steps must have unique names, and preconditions may only name
    /// earlier steps.
    pub fn validate(&self) -> Result<Vec<ComponentName>> {
        let graph = self.graph()?;
        let order = graph.ordering()?;
        graph.check_order(&order)?;

        let unknown = |component: &ComponentName, required_by: String| {
            DeployError::UnresolvedDependency {
                component: component.clone(),
                required_by,
            }
        };

        for action in &self.setup {
            if let Some(missing) = action.referenced().find(|c| !graph.contains(c)) {
                return Err(unknown(missing, action.to_string()));
            }
        }

        let mut earlier: HashSet<&str> = HashSet::new();
        for step in &self.seed {
            if !graph.contains(&step.target) {
                return Err(unknown(&step.target, step.name.clone()));
            }
            for arg in &step.arguments {
                match arg {
                    SeedArg::AddressOf(c) if !graph.contains(c) => {
                        return Err(unknown(c, step.name.clone()));
                    }
                    SeedArg::Amount(amount) => {
                        amount
                            .to_base_units()
                            .map_err(|err| DeployError::BootstrapStepFailed {
                                step: step.name.clone(),
                                source: err.into(),
                            })?;
                    }
                    _ => {}
                }
            }
            if let Some(missing) = step
                .precondition
                .iter()
                .find(|p| !earlier.contains(p.as_str()))
            {
                return Err(DeployError::InvalidPlan(format!(
                    "seed step `{}` depends on `{}`, which does not run before it",
                    step.name, missing
                )));
            }
            if !earlier.insert(step.name.as_str()) {
                return Err(DeployError::InvalidPlan(format!(
                    "seed step `{}` is declared twice",
                    step.name
                )));
            }
        }

        for entry in &self.artifact {
            if !graph.contains(&entry.component) {
                return Err(unknown(&entry.component, entry.key.clone()));
            }
        }

        Ok(order)
    }
}
