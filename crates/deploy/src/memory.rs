//! In-memory ledger used for dry runs and tests.
//!
//! Assigns sequential addresses, records every call it receives and can be
//! told to reject chosen deployments or operations.

use std::collections::{HashMap, HashSet};

use alloy_core::primitives::Address;
use anyhow::Result;
use tokio::sync::Mutex;

use crate::{ComponentDeployer, ComponentInvoker, ComponentName, DeployRequest, Token};

/// A call received by the in-memory ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    Deploy {
        component: ComponentName,
        args: Vec<Token>,
    },
    Invoke {
        target: Address,
        operation: String,
        args: Vec<Token>,
    },
}

#[derive(Debug, Default)]
struct LedgerState {
    next_address: u64,
    deployed: HashMap<Address, ComponentName>,
    calls: Vec<LedgerCall>,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    failing_deployments: HashSet<ComponentName>,
    failing_operations: HashSet<String>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any deployment of `component`.
    pub fn fail_deployment_of(mut self, component: impl Into<ComponentName>) -> Self {
        self.failing_deployments.insert(component.into());
        self
    }

    /// Reject any invocation of `operation`.
    pub fn fail_operation(mut self, operation: impl Into<String>) -> Self {
        self.failing_operations.insert(operation.into());
        self
    }

    /// Every call received so far, including rejected ones.
    pub async fn calls(&self) -> Vec<LedgerCall> {
        self.state.lock().await.calls.clone()
    }

    /// Operations invoked so far, in order.
    pub async fn invoked_operations(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|call| match call {
                LedgerCall::Invoke { operation, .. } => Some(operation.clone()),
                LedgerCall::Deploy { .. } => None,
            })
            .collect()
    }

    pub async fn component_at(&self, address: Address) -> Option<ComponentName> {
        self.state.lock().await.deployed.get(&address).cloned()
    }
}

/// Addresses start at `0x...1000` so they never collide with precompiles.
fn sequential_address(n: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&(0x1000 + n).to_be_bytes());
    Address::from(bytes)
}

impl ComponentDeployer for InMemoryLedger {
    async fn deploy(&self, request: &DeployRequest) -> Result<Address> {
        let mut state = self.state.lock().await;
        state.calls.push(LedgerCall::Deploy {
            component: request.component.clone(),
            args: request.args.clone(),
        });

        if self.failing_deployments.contains(&request.component) {
            anyhow::bail!("Deployment of {} rejected", request.component);
        }

        let address = sequential_address(state.next_address);
        state.next_address += 1;
        state.deployed.insert(address, request.component.clone());
        Ok(address)
    }
}

impl ComponentInvoker for InMemoryLedger {
    async fn invoke(&self, target: Address, operation: &str, args: &[Token]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(LedgerCall::Invoke {
            target,
            operation: operation.to_string(),
            args: args.to_vec(),
        });

        if !state.deployed.contains_key(&target) {
            anyhow::bail!("No component deployed at {}", target);
        }
        if self.failing_operations.contains(operation) {
            anyhow::bail!("Call to {} reverted", operation);
        }
        Ok(())
    }
}
