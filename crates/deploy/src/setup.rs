//! Post-deployment linking calls.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    ComponentInvoker, ComponentName, ComponentRegistry, Token,
    error::{DeployError, Result},
};

/// One linking call, e.g. `Amm.setFundingCalculator(FundingCalculator)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupAction {
    pub target: ComponentName,
    pub operation: String,
    /// Components whose addresses are passed as arguments, in order.
    pub arguments: Vec<ComponentName>,
    /// Additional components that must be deployed before the call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precondition: Vec<ComponentName>,
}

impl SetupAction {
    pub fn new(target: impl Into<ComponentName>, operation: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            operation: operation.into(),
            arguments: Vec::new(),
            precondition: Vec::new(),
        }
    }

    pub fn arg(mut self, component: impl Into<ComponentName>) -> Self {
        self.arguments.push(component.into());
        self
    }

    pub fn requires(mut self, component: impl Into<ComponentName>) -> Self {
        self.precondition.push(component.into());
        self
    }

    /// Every component that must be deployed before this action can run.
    pub fn referenced(&self) -> impl Iterator<Item = &ComponentName> {
        std::iter::once(&self.target)
            .chain(self.arguments.iter())
            .chain(self.precondition.iter())
    }
}

impl fmt::Display for SetupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<_> = self.arguments.iter().map(|a| a.as_str()).collect();
        write!(f, "{}.{}({})", self.target, self.operation, args.join(", "))
    }
}

pub struct SetupInvoker<'a, I> {
    invoker: &'a I,
}

impl<'a, I: ComponentInvoker> SetupInvoker<'a, I> {
    pub fn new(invoker: &'a I) -> Self {
        Self { invoker }
    }

    /// Apply one linking call.
    ///
    /// Ordering across actions is the caller's job; this only checks that
    /// everything the action references already has an address.
    pub async fn apply(&self, registry: &ComponentRegistry, action: &SetupAction) -> Result<()> {
        let label = action.to_string();

        for component in action.referenced() {
            registry.require_address(component, &label)?;
        }

        let target = registry.require_address(&action.target, &label)?;
        let args = action
            .arguments
            .iter()
            .map(|c| registry.require_address(c, &label).map(Token::Address))
            .collect::<Result<Vec<_>>>()?;

        self.invoker
            .invoke(target, &action.operation, &args)
            .await
            .map_err(|source| DeployError::SetupFailed {
                action: label.clone(),
                source,
            })?;

        tracing::info!(action = %label, target = %target, "Setup action applied");
        Ok(())
    }

    /// Apply every action in order, stopping at the first failure.
    ///
    /// Once all actions succeed every deployed component is marked as set up.
    pub async fn apply_all(
        &self,
        registry: &mut ComponentRegistry,
        actions: &[SetupAction],
    ) -> Result<()> {
        for action in actions {
            self.apply(registry, action).await?;
        }

        let deployed: Vec<_> = registry.records().map(|r| r.name.clone()).collect();
        for name in &deployed {
            registry.mark_setup_complete(name)?;
        }

        Ok(())
    }
}
