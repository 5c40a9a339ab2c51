//! Boundary with the remote ledger.
//!
//! The orchestrator only sees two operations: deploy a component and get its
//! address back, or invoke an operation on a deployed address. Both block
//! until the ledger reports the outcome.

use std::future::Future;

use alloy_core::primitives::Address;
use anyhow::Result;

use crate::{ComponentName, Token};

/// A deployment request with every constructor argument resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub component: ComponentName,
    pub artifact: String,
    pub args: Vec<Token>,
}

/// Deploys components and returns the address the ledger assigned.
pub trait ComponentDeployer: Send + Sync {
    fn deploy(&self, request: &DeployRequest) -> impl Future<Output = Result<Address>> + Send;
}

/// Invokes an operation on an already deployed component.
pub trait ComponentInvoker: Send + Sync {
    fn invoke(
        &self,
        target: Address,
        operation: &str,
        args: &[Token],
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<T: ComponentDeployer> ComponentDeployer for &T {
    fn deploy(&self, request: &DeployRequest) -> impl Future<Output = Result<Address>> + Send {
        (**self).deploy(request)
    }
}

impl<T: ComponentInvoker> ComponentInvoker for &T {
    fn invoke(
        &self,
        target: Address,
        operation: &str,
        args: &[Token],
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).invoke(target, operation, args)
    }
}
