use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    ComponentDeployer, ComponentInvoker, ConfigEmitter, DEFAULT_TARGET_ENVIRONMENTS,
    DeploymentPlan, InMemoryLedger, Orchestrator, PlanConfig, RpcLedger, RunReport,
    fs::RunLock,
};

/// The default name for the perpstack configuration file.
pub const PERPCONF_FILENAME: &str = "Perpstack.toml";
/// Registry snapshot written after each completed run.
pub const REGISTRY_SNAPSHOT_FILENAME: &str = "registry.json";
/// Lock file guarding one environment against concurrent runs.
pub const LOCK_FILENAME: &str = ".lock";
/// Artifact written by dry runs, inside the environment directory.
pub const DRY_RUN_ARTIFACT_FILENAME: &str = "dry-run.env";

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_CONFIG_ARTIFACT: &str = "../frontend/.env";
pub const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";
pub const DEFAULT_OUTDATA: &str = "data";

/// Main deployer holding everything needed to run the orchestration.
///
/// This struct can be serialized to/from TOML format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployer {
    /// The target-environment discriminator of this run.
    pub environment: String,
    /// Environments that are actually deployed to. Any other environment is a no-op.
    pub target_environments: Vec<String>,
    /// JSON-RPC endpoint of the ledger node.
    pub rpc_url: Url,
    /// Sender account. Defaults to the node's first unlocked account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Directory holding compiled component artifacts (`<Name>.json`).
    pub artifacts_dir: PathBuf,
    /// Path to the output data directory.
    pub outdata: PathBuf,
    /// Path of the `KEY=VALUE` configuration artifact for the frontend.
    pub config_artifact: PathBuf,
    /// Maximum time to wait for a transaction receipt.
    pub receipt_timeout_secs: u64,
    /// Delay between two receipt lookups.
    pub receipt_poll_interval_ms: u64,
    /// Literal values of the deployment plan.
    pub plan: PlanConfig,
}

impl Default for Deployer {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            target_environments: DEFAULT_TARGET_ENVIRONMENTS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("Default RPC URL should be valid"),
            from: None,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            outdata: PathBuf::from(DEFAULT_OUTDATA),
            config_artifact: PathBuf::from(DEFAULT_CONFIG_ARTIFACT),
            receipt_timeout_secs: crate::ledger::DEFAULT_RECEIPT_TIMEOUT.as_secs(),
            receipt_poll_interval_ms: crate::ledger::DEFAULT_POLL_INTERVAL.as_millis() as u64,
            plan: PlanConfig::default(),
        }
    }
}

impl Deployer {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deployer config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(PERPCONF_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Directory holding the state of runs against this deployer's environment.
    pub fn environment_dir(&self) -> PathBuf {
        self.outdata.join(&self.environment)
    }

    /// Save the deployer's configuration next to the environment's run state.
    pub fn save_config(&self) -> Result<PathBuf> {
        let dir = self.environment_dir();
        crate::fs::FsHandler::create_dir(&dir).context("Failed to create environment directory")?;
        let config_path = dir.join(PERPCONF_FILENAME);
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    pub fn is_target(&self) -> bool {
        self.target_environments.iter().any(|e| e == &self.environment)
    }

    /// Run the orchestration against the configured environment.
    ///
    /// With `dry_run`, components are deployed to an in-memory ledger and the
    /// artifact is written inside the environment directory instead of the
    /// configured location.
    pub async fn deploy(&self, dry_run: bool) -> Result<RunReport> {
        if !self.is_target() {
            tracing::info!(
                environment = %self.environment,
                "Environment is not a deployment target, nothing to do"
            );
            return Ok(RunReport::skipped(&self.environment));
        }

        let env_dir = self.environment_dir();
        let _lock = RunLock::acquire(&env_dir.join(LOCK_FILENAME))?;

        let plan = DeploymentPlan::perpetual_stack(&self.plan);

        tracing::info!(
            environment = %self.environment,
            dry_run,
            components = plan.components.len(),
            "Starting deployment process..."
        );

        let report = if dry_run {
            let emitter = ConfigEmitter::new(
                env_dir.join(DRY_RUN_ARTIFACT_FILENAME),
                plan.artifact.clone(),
            );
            let ledger = InMemoryLedger::new();
            self.orchestrate(&ledger, plan, emitter).await?
        } else {
            let emitter = ConfigEmitter::new(self.config_artifact.clone(), plan.artifact.clone());
            let ledger = RpcLedger::connect(
                self.rpc_url.clone(),
                self.from,
                self.artifacts_dir.clone(),
            )
            .await
            .context("Failed to connect to ledger")?
            .receipt_timeout(Duration::from_secs(self.receipt_timeout_secs))
            .poll_interval(Duration::from_millis(self.receipt_poll_interval_ms));
            self.orchestrate(&ledger, plan, emitter).await?
        };

        report
            .registry
            .save_snapshot(&env_dir.join(REGISTRY_SNAPSHOT_FILENAME))?;

        Ok(report)
    }

    async fn orchestrate<L>(
        &self,
        ledger: &L,
        plan: DeploymentPlan,
        emitter: ConfigEmitter,
    ) -> Result<RunReport>
    where
        L: ComponentDeployer + ComponentInvoker,
    {
        let mut orchestrator = Orchestrator::new(ledger, ledger, plan, emitter)
            .target_environments(self.target_environments.clone());

        orchestrator
            .run(&self.environment)
            .await
            .context(format!("Deployment to {} failed", self.environment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegistrySnapshot;
    use tempdir::TempDir;

    fn deployer(dir: &TempDir) -> Deployer {
        Deployer {
            outdata: dir.path().join("data"),
            config_artifact: dir.path().join("frontend/.env"),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new("deployer").unwrap();
        let mut config = deployer(&dir);
        config.from = Some(Address::repeat_byte(0x42));

        let path = config.save_config().unwrap();
        assert!(path.ends_with("development/Perpstack.toml"));

        assert_eq!(Deployer::load_from_file(&path).unwrap(), config);
        assert_eq!(
            Deployer::load_from_file(&config.environment_dir()).unwrap(),
            config
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Deployer::load_from_file(Path::new("/nonexistent/Perpstack.toml")).is_err());
    }

    #[test]
    fn test_load_from_directory_reports_resolved_path() {
        let dir = TempDir::new("deployer").unwrap();
        let err = Deployer::load_from_file(dir.path()).unwrap_err();
        let expected = dir.path().join(PERPCONF_FILENAME);
        assert!(err.to_string().contains(&expected.display().to_string()));
    }

    #[tokio::test]
    async fn test_dry_run_writes_snapshot_and_local_artifact() {
        let dir = TempDir::new("deployer").unwrap();
        let config = deployer(&dir);

        let report = config.deploy(true).await.unwrap();
        assert!(!report.skipped);

        let env_dir = config.environment_dir();
        assert!(env_dir.join(DRY_RUN_ARTIFACT_FILENAME).exists());
        assert!(!config.config_artifact.exists());

        let snapshot =
            RegistrySnapshot::load_from_file(&env_dir.join(REGISTRY_SNAPSHOT_FILENAME)).unwrap();
        assert_eq!(snapshot.components.len(), 6);
        assert_eq!(snapshot.seeded_steps.len(), 5);
    }

    #[tokio::test]
    async fn test_non_target_environment_touches_nothing() {
        let dir = TempDir::new("deployer").unwrap();
        let config = Deployer {
            environment: "mainnet".to_string(),
            ..deployer(&dir)
        };

        let report = config.deploy(false).await.unwrap();
        assert!(report.skipped);
        assert!(!config.outdata.exists());
    }
}
