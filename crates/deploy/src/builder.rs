//! Builder module for creating a [`Deployer`] configuration.
//!
//! This module provides the [`DeployerBuilder`] struct which layers explicit
//! overrides on top of a base configuration, validates them and prepares the
//! output data directory.

use std::path::PathBuf;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use url::Url;

use crate::{Deployer, PlanConfig};

/// Builder for creating a [`Deployer`] configuration.
///
/// # Example
///
/// ```no_run
/// use perpstack_deploy::DeployerBuilder;
///
/// # fn example() -> anyhow::Result<()> {
/// let deployer = DeployerBuilder::new("harmony_testnet")
///     .rpc_url("https://api.s0.b.hmny.io")
///     .outdata("data")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeployerBuilder {
    /// Configuration the overrides are applied to.
    base: Deployer,
    /// The environment to run against.
    environment: Option<String>,
    /// The RPC URL, validated on build.
    rpc_url: Option<String>,
    from: Option<Address>,
    artifacts_dir: Option<PathBuf>,
    outdata: Option<PathBuf>,
    config_artifact: Option<PathBuf>,
    target_environments: Option<Vec<String>>,
    plan: Option<PlanConfig>,
}

impl DeployerBuilder {
    /// Create a new [`DeployerBuilder`] for the given environment on top of defaults.
    pub fn new(environment: impl Into<String>) -> Self {
        Self::from_config(Deployer::default()).environment(environment)
    }

    /// Start from an existing configuration (e.g. loaded from a file).
    pub fn from_config(base: Deployer) -> Self {
        Self {
            base,
            environment: None,
            rpc_url: None,
            from: None,
            artifacts_dir: None,
            outdata: None,
            config_artifact: None,
            target_environments: None,
            plan: None,
        }
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn from_account(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn artifacts_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(path.into());
        self
    }

    /// Set the output data directory.
    ///
    /// If not set, defaults to `./data`.
    pub fn outdata(mut self, path: impl Into<PathBuf>) -> Self {
        self.outdata = Some(path.into());
        self
    }

    pub fn config_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_artifact = Some(path.into());
        self
    }

    pub fn target_environments<S: Into<String>>(
        mut self,
        environments: impl IntoIterator<Item = S>,
    ) -> Self {
        self.target_environments = Some(environments.into_iter().map(Into::into).collect());
        self
    }

    pub fn plan(mut self, plan: PlanConfig) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Build the [`Deployer`] configuration.
    ///
    /// This method:
    /// 1. Applies the overrides to the base configuration
    /// 2. Validates the RPC URL
    /// 3. Creates the output data directory if it doesn't exist, for target
    ///    environments only
    pub fn build(self) -> Result<Deployer> {
        let mut deployer = self.base;

        if let Some(environment) = self.environment {
            deployer.environment = environment;
        }
        if let Some(url) = self.rpc_url {
            deployer.rpc_url =
                Url::parse(&url).context(format!("Invalid RPC URL: {}", url))?;
        }
        if let Some(from) = self.from {
            deployer.from = Some(from);
        }
        if let Some(path) = self.artifacts_dir {
            deployer.artifacts_dir = path;
        }
        if let Some(path) = self.outdata {
            deployer.outdata = path;
        }
        if let Some(path) = self.config_artifact {
            deployer.config_artifact = path;
        }
        if let Some(targets) = self.target_environments {
            deployer.target_environments = targets;
        }
        if let Some(plan) = self.plan {
            deployer.plan = plan;
        }

        if deployer.environment.trim().is_empty() {
            anyhow::bail!("The environment name must not be empty");
        }

        if !deployer.is_target() {
            tracing::debug!(
                environment = %deployer.environment,
                "Not a deployment target, leaving output data directory untouched"
            );
            return Ok(deployer);
        }

        // Create the output data directory if it doesn't exist
        if !deployer.outdata.try_exists().context(format!(
            "Failed to check if output data directory exists at path {}. Ensure you provided valid permissions to the directory.",
            deployer.outdata.display()
        ))? {
            std::fs::create_dir_all(&deployer.outdata)
                .context("Failed to create output data directory")?;
        }

        deployer.outdata = deployer
            .outdata
            .canonicalize()
            .context("Failed to canonicalize output data directory path")?;

        tracing::info!(
            environment = %deployer.environment,
            rpc_url = %deployer.rpc_url,
            outdata_path = %deployer.outdata.display(),
            "Building deployer configuration..."
        );

        Ok(deployer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_builder_defaults() {
        let builder = DeployerBuilder::new("development");
        assert_eq!(builder.environment.as_deref(), Some("development"));
        assert!(builder.rpc_url.is_none());
        assert!(builder.outdata.is_none());
        assert!(builder.plan.is_none());
    }

    #[test]
    fn test_builder_applies_overrides() {
        let dir = TempDir::new("builder").unwrap();
        let deployer = DeployerBuilder::new("harmony_testnet")
            .rpc_url("http://localhost:9500")
            .from_account(Address::repeat_byte(1))
            .outdata(dir.path().join("out"))
            .config_artifact("frontend/.env")
            .target_environments(["harmony_testnet"])
            .build()
            .unwrap();

        assert_eq!(deployer.environment, "harmony_testnet");
        assert_eq!(deployer.rpc_url.as_str(), "http://localhost:9500/");
        assert_eq!(deployer.from, Some(Address::repeat_byte(1)));
        assert!(deployer.outdata.is_absolute());
        assert!(deployer.outdata.exists());
        assert_eq!(deployer.config_artifact, PathBuf::from("frontend/.env"));
        assert!(deployer.is_target());
    }

    #[test]
    fn test_builder_rejects_invalid_url() {
        let dir = TempDir::new("builder").unwrap();
        let result = DeployerBuilder::new("development")
            .rpc_url("not a url")
            .outdata(dir.path())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_non_target_build_creates_nothing() {
        let dir = TempDir::new("builder").unwrap();
        let outdata = dir.path().join("out");
        let deployer = DeployerBuilder::new("mainnet")
            .outdata(&outdata)
            .build()
            .unwrap();

        assert!(!deployer.is_target());
        assert_eq!(deployer.outdata, outdata);
        assert!(!outdata.exists());
    }

    #[test]
    fn test_builder_keeps_base_configuration() {
        let dir = TempDir::new("builder").unwrap();
        let base = Deployer {
            environment: "staging".to_string(),
            receipt_timeout_secs: 7,
            outdata: dir.path().to_path_buf(),
            ..Default::default()
        };

        let deployer = DeployerBuilder::from_config(base).build().unwrap();
        assert_eq!(deployer.environment, "staging");
        assert_eq!(deployer.receipt_timeout_secs, 7);
        assert!(!deployer.is_target());
    }
}
