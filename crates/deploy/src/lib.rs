//! perpstack-deploy - Deployment library for the perpetual-swap component stack.
//!
//! This crate deploys the six on-chain components of a perpetual-swap market
//! (token factory, collateral token, price feeder, perpetual, AMM and funding
//! calculator) in dependency order, links them, seeds the initial market state
//! and emits the addresses the frontend needs.

mod error;
pub use error::{DeployError, Result};

mod component;
pub use component::{ComponentName, ComponentSpec, ConstructorArg, Token};

mod registry;
pub use registry::{ComponentRecord, ComponentRegistry, RegistrySnapshot};

mod graph;
pub use graph::{DependencyEdge, DependencyGraph};

mod units;
pub use units::{Amount, BASE_UNIT_DECIMALS};

mod collaborator;
pub use collaborator::{ComponentDeployer, ComponentInvoker, DeployRequest};

mod driver;
pub use driver::DeploymentDriver;

mod setup;
pub use setup::{SetupAction, SetupInvoker};

mod bootstrap;
pub use bootstrap::{BootstrapSequencer, SeedArg, SeedStep};

mod artifact;
pub use artifact::{ArtifactEntry, ConfigArtifact, ConfigEmitter};

mod memory;
pub use memory::{InMemoryLedger, LedgerCall};

pub mod plan;
pub use plan::{DeploymentPlan, PlanConfig};

mod orchestrator;
pub use orchestrator::{DEFAULT_TARGET_ENVIRONMENTS, Orchestrator, OrchestratorState, RunReport};

mod ledger;
pub use ledger::{DEFAULT_POLL_INTERVAL, DEFAULT_RECEIPT_TIMEOUT, RpcLedger};

mod deployer;
pub use deployer::{
    DRY_RUN_ARTIFACT_FILENAME, Deployer, LOCK_FILENAME, PERPCONF_FILENAME,
    REGISTRY_SNAPSHOT_FILENAME,
};

mod builder;
pub use builder::DeployerBuilder;

pub mod fs;
mod rpc;
