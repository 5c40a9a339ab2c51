//! Per-run record of deployed components.

use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::Address;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ComponentName, ComponentSpec, ConstructorArg,
    error::{DeployError, Result},
};

/// State recorded for one component during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub name: ComponentName,
    pub artifact: String,
    pub constructor_args: Vec<ConstructorArg>,
    pub deployed_address: Option<Address>,
    pub setup_complete: bool,
}

/// Mapping from component name to its record, scoped to one orchestration run.
///
/// Records are only ever added or updated; nothing is removed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRegistry {
    environment: String,
    components: BTreeMap<ComponentName, ComponentRecord>,
    deploy_order: Vec<ComponentName>,
    seeded_steps: Vec<String>,
}

impl ComponentRegistry {
    /// Create an empty registry for the given target environment.
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            components: BTreeMap::new(),
            deploy_order: Vec::new(),
            seeded_steps: Vec::new(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Record the address assigned to a freshly deployed component.
    ///
    /// A later deployment of the same name overwrites the address.
    pub fn record_deployment(&mut self, spec: &ComponentSpec, address: Address) {
        let record = ComponentRecord {
            name: spec.name.clone(),
            artifact: spec.artifact.clone(),
            constructor_args: spec.constructor_args.clone(),
            deployed_address: Some(address),
            setup_complete: false,
        };

        if self.components.insert(spec.name.clone(), record).is_none() {
            self.deploy_order.push(spec.name.clone());
        }
    }

    pub fn get(&self, name: &ComponentName) -> Option<&ComponentRecord> {
        self.components.get(name)
    }

    pub fn address(&self, name: &ComponentName) -> Option<Address> {
        self.components.get(name).and_then(|r| r.deployed_address)
    }

    pub fn is_deployed(&self, name: &ComponentName) -> bool {
        self.address(name).is_some()
    }

    /// Address of a deployed component, or `UnresolvedDependency` naming the requester.
    pub fn require_address(&self, name: &ComponentName, required_by: &str) -> Result<Address> {
        self.address(name)
            .ok_or_else(|| DeployError::UnresolvedDependency {
                component: name.clone(),
                required_by: required_by.to_string(),
            })
    }

    pub fn mark_setup_complete(&mut self, name: &ComponentName) -> Result<()> {
        match self.components.get_mut(name) {
            Some(record) if record.deployed_address.is_some() => {
                record.setup_complete = true;
                Ok(())
            }
            _ => Err(DeployError::UnresolvedDependency {
                component: name.clone(),
                required_by: "setup".to_string(),
            }),
        }
    }

    /// Record that a bootstrap step completed.
    pub fn record_seed(&mut self, step: &str) {
        self.seeded_steps.push(step.to_string());
    }

    pub fn seeded_steps(&self) -> &[String] {
        &self.seeded_steps
    }

    pub fn is_seeded(&self, step: &str) -> bool {
        self.seeded_steps.iter().any(|s| s == step)
    }

    /// Records in the order the components were deployed.
    pub fn records(&self) -> impl Iterator<Item = &ComponentRecord> {
        self.deploy_order
            .iter()
            .filter_map(|name| self.components.get(name))
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            environment: self.environment.clone(),
            created_at: Utc::now(),
            components: self.records().cloned().collect(),
            seeded_steps: self.seeded_steps.clone(),
        }
    }

    /// Write a JSON snapshot of this registry for operators.
    ///
    /// The snapshot is informational: runs are never resumed from it.
    pub fn save_snapshot(&self, path: &Path) -> anyhow::Result<()> {
        self.snapshot().save_to_file(path)
    }
}

/// Serializable view of a registry at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub environment: String,
    pub created_at: DateTime<Utc>,
    pub components: Vec<ComponentRecord>,
    pub seeded_steps: Vec<String>,
}

impl RegistrySnapshot {
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize registry snapshot")?;

        crate::fs::FsHandler::write_atomic(path, json.as_bytes()).context(format!(
            "Failed to write registry snapshot to {}",
            path.display()
        ))?;

        tracing::debug!(path = %path.display(), "Registry snapshot saved");
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).context(format!(
            "Failed to read registry snapshot from {}",
            path.display()
        ))?;

        serde_json::from_str(&content).context("Failed to parse registry snapshot JSON")
    }
}
