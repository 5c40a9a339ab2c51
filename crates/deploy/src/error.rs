//! Error types for the deployment orchestrator.
//!
//! Every fatal error carries the name of the component, linking action or seed
//! step that failed. Remote failures keep the collaborator error as their source.

use std::path::PathBuf;

use thiserror::Error;

use crate::ComponentName;

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Errors surfaced by the orchestrator and its phases.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The dependency graph contains a cycle.
    #[error("Cyclic dependency detected involving component `{component}`")]
    CyclicDependency {
        /// A component that is part of the cycle.
        component: ComponentName,
    },

    /// A component address was requested before that component was deployed.
    #[error("Component `{component}` is not deployed yet (required by `{required_by}`)")]
    UnresolvedDependency {
        /// The component whose address is missing.
        component: ComponentName,
        /// The component, action or step that needed it.
        required_by: String,
    },

    /// The remote deployment collaborator rejected or failed a deployment.
    #[error("Failed to deploy component `{component}`")]
    DeploymentFailed {
        component: ComponentName,
        #[source]
        source: anyhow::Error,
    },

    /// A post-deployment linking call failed.
    #[error("Setup action `{action}` failed")]
    SetupFailed {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// A bootstrap step failed or was attempted before its preconditions.
    #[error("Bootstrap step `{step}` failed")]
    BootstrapStepFailed {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    /// The configuration artifact could not be written.
    #[error("Failed to emit configuration artifact to {}", path.display())]
    EmitFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A human-readable amount could not be converted to base units.
    #[error("Invalid amount `{value}`: {reason}")]
    InvalidAmount { value: String, reason: String },

    /// The deployment plan is malformed.
    #[error("Invalid deployment plan: {0}")]
    InvalidPlan(String),
}

impl DeployError {
    /// Whether this error aborts the run.
    ///
    /// Only an emit failure leaves the already-applied deployment valid.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DeployError::EmitFailed { .. })
    }
}
