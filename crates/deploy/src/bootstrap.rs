//! Seeding of initial on-chain state.
//!
//! Seed steps run as a strict chain. Each step names the steps that must have
//! completed before it: the oracle value is written and then confirmed in two
//! separate steps, collateral is approved before it is deposited, and the
//! deposit exists before the pool that consumes it is created.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    Amount, ComponentInvoker, ComponentName, ComponentRegistry, Token,
    error::{DeployError, Result},
};

/// An argument of a seed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedArg {
    Literal(Token),
    /// Converted to base units when the step runs.
    Amount(Amount),
    AddressOf(ComponentName),
}

/// One bootstrap call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedStep {
    pub name: String,
    pub target: ComponentName,
    pub operation: String,
    pub arguments: Vec<SeedArg>,
    /// Names of steps that must have completed first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precondition: Vec<String>,
}

impl SeedStep {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<ComponentName>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            operation: operation.into(),
            arguments: Vec::new(),
            precondition: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: SeedArg) -> Self {
        self.arguments.push(arg);
        self
    }

    pub fn amount(self, amount: Amount) -> Self {
        self.arg(SeedArg::Amount(amount))
    }

    pub fn address_of(self, component: impl Into<ComponentName>) -> Self {
        self.arg(SeedArg::AddressOf(component.into()))
    }

    pub fn after(mut self, step: impl Into<String>) -> Self {
        self.precondition.push(step.into());
        self
    }

    /// Resolve component references and convert amounts to base units.
    pub fn resolve_args(&self, registry: &ComponentRegistry) -> Result<Vec<Token>> {
        self.arguments
            .iter()
            .map(|arg| match arg {
                SeedArg::Literal(token) => Ok(token.clone()),
                SeedArg::Amount(amount) => amount.to_base_units().map(Token::Uint),
                SeedArg::AddressOf(name) => registry
                    .require_address(name, &self.name)
                    .map(Token::Address),
            })
            .collect()
    }
}

impl fmt::Display for SeedArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedArg::Literal(token) => write!(f, "{token}"),
            SeedArg::Amount(amount) => write!(f, "{amount}"),
            SeedArg::AddressOf(name) => write!(f, "&{name}"),
        }
    }
}

impl fmt::Display for SeedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<_> = self.arguments.iter().map(|a| a.to_string()).collect();
        write!(f, "{}.{}({})", self.target, self.operation, args.join(", "))
    }
}

pub struct BootstrapSequencer<'a, I> {
    invoker: &'a I,
}

impl<'a, I: ComponentInvoker> BootstrapSequencer<'a, I> {
    pub fn new(invoker: &'a I) -> Self {
        Self { invoker }
    }

    /// Run every step in order, halting on the first failure.
    ///
    /// A step whose preconditions have not completed is rejected before it is
    /// sent to the ledger. There is no retry of a partial sequence.
    pub async fn run_sequence(
        &self,
        registry: &mut ComponentRegistry,
        steps: &[SeedStep],
    ) -> Result<()> {
        for step in steps {
            if let Some(missing) = step.precondition.iter().find(|p| !registry.is_seeded(p)) {
                return Err(DeployError::BootstrapStepFailed {
                    step: step.name.clone(),
                    source: anyhow::anyhow!("Precondition `{missing}` has not completed"),
                });
            }

            let (target, args) = registry
                .require_address(&step.target, &step.name)
                .and_then(|target| Ok((target, step.resolve_args(registry)?)))
                .map_err(|err| DeployError::BootstrapStepFailed {
                    step: step.name.clone(),
                    source: err.into(),
                })?;

            tracing::debug!(
                step = %step.name,
                target = %step.target,
                operation = %step.operation,
                args = ?args,
                "Running seed step"
            );

            self.invoker
                .invoke(target, &step.operation, &args)
                .await
                .map_err(|source| DeployError::BootstrapStepFailed {
                    step: step.name.clone(),
                    source,
                })?;

            registry.record_seed(&step.name);
            tracing::info!(step = %step.name, target = %step.target, "Seed step completed");
        }

        Ok(())
    }
}
