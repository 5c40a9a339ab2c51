//! Deploys a single component and records its address.

use alloy_core::primitives::Address;

use crate::{
    ComponentDeployer, ComponentRegistry, ComponentSpec, DeployRequest,
    error::{DeployError, Result},
};

pub struct DeploymentDriver<'a, D> {
    deployer: &'a D,
}

impl<'a, D: ComponentDeployer> DeploymentDriver<'a, D> {
    pub fn new(deployer: &'a D) -> Self {
        Self { deployer }
    }

    /// Deploy `spec` and record the returned address in `registry`.
    ///
    /// Constructor references are resolved before the remote call, so a
    /// component whose dependencies are missing never reaches the ledger.
    /// There is no retry: a failed deployment has no address to resume from.
    pub async fn deploy(
        &self,
        registry: &mut ComponentRegistry,
        spec: &ComponentSpec,
    ) -> Result<Address> {
        let args = spec.resolve_args(registry)?;

        tracing::debug!(
            component = %spec.name,
            artifact = %spec.artifact,
            args = ?args,
            "Submitting deployment"
        );

        let request = DeployRequest {
            component: spec.name.clone(),
            artifact: spec.artifact.clone(),
            args,
        };

        let address = self
            .deployer
            .deploy(&request)
            .await
            .map_err(|source| DeployError::DeploymentFailed {
                component: spec.name.clone(),
                source,
            })?;

        if address == Address::ZERO {
            return Err(DeployError::DeploymentFailed {
                component: spec.name.clone(),
                source: anyhow::anyhow!("Ledger returned no address"),
            });
        }

        registry.record_deployment(spec, address);
        tracing::info!(component = %spec.name, address = %address, "Component deployed");

        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConstructorArg, InMemoryLedger, LedgerCall, Token};

    #[tokio::test]
    async fn test_constructor_args_receive_dependency_addresses() {
        let ledger = InMemoryLedger::new();
        let driver = DeploymentDriver::new(&ledger);
        let mut registry = ComponentRegistry::new("development");

        let a = driver
            .deploy(&mut registry, &ComponentSpec::new("A"))
            .await
            .unwrap();
        let b = driver
            .deploy(
                &mut registry,
                &ComponentSpec::new("B").arg(ConstructorArg::address_of("A")),
            )
            .await
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.address(&"B".into()), Some(b));

        let calls = ledger.calls().await;
        assert_eq!(
            calls[1],
            LedgerCall::Deploy {
                component: "B".into(),
                args: vec![Token::Address(a)],
            }
        );
    }

    #[tokio::test]
    async fn test_missing_dependency_never_reaches_the_ledger() {
        let ledger = InMemoryLedger::new();
        let driver = DeploymentDriver::new(&ledger);
        let mut registry = ComponentRegistry::new("development");

        let err = driver
            .deploy(
                &mut registry,
                &ComponentSpec::new("B").arg(ConstructorArg::address_of("A")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::UnresolvedDependency { .. }));
        assert!(ledger.calls().await.is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_reported_with_component_name() {
        let ledger = InMemoryLedger::new().fail_deployment_of("A");
        let driver = DeploymentDriver::new(&ledger);
        let mut registry = ComponentRegistry::new("development");

        let err = driver
            .deploy(&mut registry, &ComponentSpec::new("A"))
            .await
            .unwrap_err();

        match err {
            DeployError::DeploymentFailed { component, .. } => assert_eq!(component.as_str(), "A"),
            other => panic!("expected DeploymentFailed, got {other:?}"),
        }
        assert!(!registry.is_deployed(&"A".into()));
    }
}
