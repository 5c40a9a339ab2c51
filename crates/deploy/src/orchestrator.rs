//! Top-level run controller.
//!
//! A run walks the phases `Deploying -> Linking -> Seeding -> Emitting` in
//! order. Any error in the first three phases moves the run to `Failed` and
//! nothing after it executes. Runs are not resumable: every run starts from
//! an empty registry.

use serde::{Deserialize, Serialize};

use crate::{
    BootstrapSequencer, ComponentDeployer, ComponentInvoker, ComponentRegistry, ConfigArtifact,
    ConfigEmitter, DeploymentDriver, DeploymentPlan, SetupInvoker,
    error::{DeployError, Result},
};

/// Environments the orchestrator deploys to unless configured otherwise.
pub const DEFAULT_TARGET_ENVIRONMENTS: [&str; 2] = ["development", "harmony_testnet"];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum OrchestratorState {
    NotStarted,
    Deploying,
    Linking,
    Seeding,
    Emitting,
    Done,
    Failed,
}

impl OrchestratorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestratorState::Done | OrchestratorState::Failed)
    }

    /// Whether `next` is a legal transition from this state.
    pub fn can_transition_to(&self, next: OrchestratorState) -> bool {
        use OrchestratorState::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (NotStarted, Deploying | Done) => true,
            (Deploying, Linking) => true,
            (Linking, Seeding) => true,
            (Seeding, Emitting) => true,
            (Emitting, Done) => true,
            _ => false,
        }
    }
}

/// Outcome of a run that did not fail.
#[derive(Debug)]
pub struct RunReport {
    pub environment: String,
    /// The environment is not a deployment target; nothing was done.
    pub skipped: bool,
    pub registry: ComponentRegistry,
    pub artifact: Option<ConfigArtifact>,
    /// Set when every phase succeeded except writing the artifact.
    pub emit_error: Option<DeployError>,
}

impl RunReport {
    pub fn skipped(environment: impl Into<String>) -> Self {
        let environment = environment.into();
        Self {
            registry: ComponentRegistry::new(environment.clone()),
            environment,
            skipped: true,
            artifact: None,
            emit_error: None,
        }
    }
}

pub struct Orchestrator<D, I> {
    deployer: D,
    invoker: I,
    plan: DeploymentPlan,
    emitter: ConfigEmitter,
    target_environments: Vec<String>,
    state: OrchestratorState,
}

impl<D: ComponentDeployer, I: ComponentInvoker> Orchestrator<D, I> {
    pub fn new(deployer: D, invoker: I, plan: DeploymentPlan, emitter: ConfigEmitter) -> Self {
        Self {
            deployer,
            invoker,
            plan,
            emitter,
            target_environments: DEFAULT_TARGET_ENVIRONMENTS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            state: OrchestratorState::NotStarted,
        }
    }

    /// Replace the allow-list of environments this orchestrator deploys to.
    pub fn target_environments<S: Into<String>>(
        mut self,
        environments: impl IntoIterator<Item = S>,
    ) -> Self {
        self.target_environments = environments.into_iter().map(Into::into).collect();
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    pub fn is_target(&self, environment: &str) -> bool {
        self.target_environments.iter().any(|e| e == environment)
    }

    fn advance(&mut self, next: OrchestratorState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "Orchestrator state transition");
        self.state = next;
    }

    /// Execute a full run against `environment`.
    ///
    /// For environments outside the allow-list this is a no-op that goes
    /// straight to `Done`.
    pub async fn run(&mut self, environment: &str) -> Result<RunReport> {
        self.state = OrchestratorState::NotStarted;

        if !self.is_target(environment) {
            tracing::info!(
                environment = %environment,
                targets = ?self.target_environments,
                "Environment is not a deployment target, skipping"
            );
            self.advance(OrchestratorState::Done);
            return Ok(RunReport::skipped(environment));
        }

        match self.execute(environment).await {
            Ok(report) => Ok(report),
            Err(err) => {
                tracing::error!(
                    environment = %environment,
                    state = %self.state,
                    error = %err,
                    "Orchestration failed"
                );
                self.advance(OrchestratorState::Failed);
                Err(err)
            }
        }
    }

    async fn execute(&mut self, environment: &str) -> Result<RunReport> {
        let order = self.plan.validate()?;
        let mut registry = ComponentRegistry::new(environment);

        self.advance(OrchestratorState::Deploying);
        tracing::info!(environment = %environment, components = order.len(), "Deploying components...");
        let driver = DeploymentDriver::new(&self.deployer);
        for name in &order {
            let spec = self
                .plan
                .component(name)
                .ok_or_else(|| DeployError::InvalidPlan(format!("unknown component `{name}`")))?;
            driver.deploy(&mut registry, spec).await?;
        }

        self.advance(OrchestratorState::Linking);
        tracing::info!(actions = self.plan.setup.len(), "Linking components...");
        SetupInvoker::new(&self.invoker)
            .apply_all(&mut registry, &self.plan.setup)
            .await?;

        self.advance(OrchestratorState::Seeding);
        tracing::info!(steps = self.plan.seed.len(), "Seeding initial state...");
        BootstrapSequencer::new(&self.invoker)
            .run_sequence(&mut registry, &self.plan.seed)
            .await?;

        self.advance(OrchestratorState::Emitting);
        let (artifact, emit_error) = match self.emitter.emit(&registry) {
            Ok(artifact) => (Some(artifact), None),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "Configuration artifact not written; deployed components are unaffected"
                );
                (None, Some(err))
            }
        };

        self.advance(OrchestratorState::Done);
        tracing::info!(environment = %environment, "✓ Orchestration complete");

        Ok(RunReport {
            environment: environment.to_string(),
            skipped: false,
            registry,
            artifact,
            emit_error,
        })
    }
}
