//! End-to-end tests for perpstack-deploy.
//!
//! These tests drive the public API against the in-memory ledger, so they need
//! no running node.
//! Run with: cargo test --test orchestrator_test

use alloy_core::primitives::{Address, U256};
use perpstack_deploy::{
    Amount, ArtifactEntry, BootstrapSequencer, ComponentName, ComponentRegistry, ComponentSpec,
    ConfigArtifact, ConfigEmitter, ConstructorArg, DeployError, DeploymentDriver, DeploymentPlan,
    InMemoryLedger, LedgerCall, Orchestrator, OrchestratorState, PlanConfig, SeedStep,
    SetupAction, Token, plan,
};
use tempdir::TempDir;

const ENV: &str = "development";

/// Initialize tracing for tests (idempotent).
fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

fn name(s: &str) -> ComponentName {
    ComponentName::from(s)
}

fn ether(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
}

/// A -> B -> C chain where C also depends on A directly, followed by D and E.
fn chained_plan() -> DeploymentPlan {
    DeploymentPlan {
        components: vec![
            ComponentSpec::new("A"),
            ComponentSpec::new("B").arg(ConstructorArg::address_of("A")),
            ComponentSpec::new("C")
                .arg(ConstructorArg::address_of("A"))
                .arg(ConstructorArg::address_of("B")),
            ComponentSpec::new("D").arg(ConstructorArg::address_of("C")),
            ComponentSpec::new("E").arg(ConstructorArg::address_of("D")),
        ],
        setup: vec![SetupAction::new("A", "link").arg("E")],
        seed: vec![SeedStep::new("poke", "B", "poke")],
        artifact: vec![ArtifactEntry::new("A_ADDRESS", "A")],
    }
}

#[tokio::test]
async fn test_constructor_arguments_receive_dependency_addresses() {
    let ledger = InMemoryLedger::new();
    let driver = DeploymentDriver::new(&ledger);
    let plan = chained_plan();
    let mut registry = ComponentRegistry::new(ENV);

    for component in plan.validate().unwrap().iter().take(3) {
        let spec = plan.component(component).unwrap();
        driver.deploy(&mut registry, spec).await.unwrap();
    }

    let a = registry.address(&name("A")).unwrap();
    let b = registry.address(&name("B")).unwrap();

    let calls = ledger.calls().await;
    assert_eq!(
        calls[1],
        LedgerCall::Deploy {
            component: name("B"),
            args: vec![Token::Address(a)],
        }
    );
    assert_eq!(
        calls[2],
        LedgerCall::Deploy {
            component: name("C"),
            args: vec![Token::Address(a), Token::Address(b)],
        }
    );
}

#[tokio::test]
async fn test_out_of_order_deployment_never_reaches_the_ledger() {
    let ledger = InMemoryLedger::new();
    let driver = DeploymentDriver::new(&ledger);
    let plan = chained_plan();
    let mut registry = ComponentRegistry::new(ENV);

    let err = driver
        .deploy(&mut registry, plan.component(&name("C")).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::UnresolvedDependency { ref component, .. } if component == &name("A")));
    assert!(ledger.calls().await.is_empty());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_seed_sequence_halts_on_failed_deposit() {
    init_test_tracing();
    let dir = TempDir::new("orchestrator_test").unwrap();
    let ledger = InMemoryLedger::new().fail_operation("deposit");
    let plan = DeploymentPlan::perpetual_stack(&PlanConfig::default());
    let emitter = ConfigEmitter::new(dir.path().join(".env"), plan.artifact.clone());
    let mut orchestrator = Orchestrator::new(&ledger, &ledger, plan, emitter);

    let err = orchestrator.run(ENV).await.unwrap_err();

    assert!(matches!(err, DeployError::BootstrapStepFailed { ref step, .. } if step == plan::DEPOSIT_STEP));
    assert_eq!(orchestrator.state(), OrchestratorState::Failed);
    assert_eq!(
        ledger.invoked_operations().await,
        vec![
            "setFundingCalculator",
            "setupAmm",
            "updateValue",
            "confirmValueUpdate",
            "approve",
            "deposit",
        ]
    );
    assert!(!dir.path().join(".env").exists());
}

#[tokio::test]
async fn test_seed_amounts_are_sent_in_base_units() {
    let ledger = InMemoryLedger::new();
    let driver = DeploymentDriver::new(&ledger);
    let plan = DeploymentPlan::perpetual_stack(&PlanConfig::default());
    let mut registry = ComponentRegistry::new(ENV);
    for component in plan.validate().unwrap() {
        driver
            .deploy(&mut registry, plan.component(&component).unwrap())
            .await
            .unwrap();
    }

    BootstrapSequencer::new(&ledger)
        .run_sequence(&mut registry, &plan.seed)
        .await
        .unwrap();

    let perpetual = registry.address(&name(plan::PERPETUAL)).unwrap();
    let invokes: Vec<_> = ledger
        .calls()
        .await
        .into_iter()
        .filter_map(|call| match call {
            LedgerCall::Invoke { operation, args, .. } => Some((operation, args)),
            LedgerCall::Deploy { .. } => None,
        })
        .collect();

    assert_eq!(
        invokes,
        vec![
            ("updateValue".to_string(), vec![Token::Uint(ether(30000))]),
            ("confirmValueUpdate".to_string(), vec![]),
            (
                "approve".to_string(),
                vec![
                    Token::Address(perpetual),
                    Token::Uint(
                        Amount::base_units("9999999999999999999999999999")
                            .to_base_units()
                            .unwrap()
                    ),
                ]
            ),
            ("deposit".to_string(), vec![Token::Uint(ether(70000))]),
            ("createPool".to_string(), vec![Token::Uint(ether(1))]),
        ]
    );
}

#[tokio::test]
async fn test_confirm_before_write_is_rejected() {
    let ledger = InMemoryLedger::new();
    let driver = DeploymentDriver::new(&ledger);
    let plan = DeploymentPlan::perpetual_stack(&PlanConfig::default());
    let mut registry = ComponentRegistry::new(ENV);
    driver
        .deploy(&mut registry, plan.component(&name(plan::PRICE_FEEDER)).unwrap())
        .await
        .unwrap();

    let confirm = plan
        .seed
        .iter()
        .find(|s| s.name == plan::CONFIRM_PRICE_STEP)
        .unwrap()
        .clone();

    let err = BootstrapSequencer::new(&ledger)
        .run_sequence(&mut registry, &[confirm])
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::BootstrapStepFailed { .. }));
    assert!(ledger.invoked_operations().await.is_empty());
}

#[tokio::test]
async fn test_deployment_failure_stops_the_run() {
    init_test_tracing();
    let dir = TempDir::new("orchestrator_test").unwrap();
    let ledger = InMemoryLedger::new().fail_deployment_of("C");
    let plan = chained_plan();
    let emitter = ConfigEmitter::new(dir.path().join(".env"), plan.artifact.clone());
    let mut orchestrator = Orchestrator::new(&ledger, &ledger, plan, emitter);

    let err = orchestrator.run(ENV).await.unwrap_err();

    assert!(matches!(err, DeployError::DeploymentFailed { ref component, .. } if component == &name("C")));
    assert_eq!(orchestrator.state(), OrchestratorState::Failed);

    let attempted: Vec<_> = ledger
        .calls()
        .await
        .into_iter()
        .map(|call| match call {
            LedgerCall::Deploy { component, .. } => component.to_string(),
            LedgerCall::Invoke { operation, .. } => operation,
        })
        .collect();
    assert_eq!(attempted, vec!["A", "B", "C"]);
    assert!(!dir.path().join(".env").exists());
}

#[tokio::test]
async fn test_non_target_environment_is_idempotent() {
    init_test_tracing();
    let dir = TempDir::new("orchestrator_test").unwrap();
    let ledger = InMemoryLedger::new();
    let plan = DeploymentPlan::perpetual_stack(&PlanConfig::default());
    let emitter = ConfigEmitter::new(dir.path().join(".env"), plan.artifact.clone());
    let mut orchestrator = Orchestrator::new(&ledger, &ledger, plan, emitter);

    for _ in 0..2 {
        let report = orchestrator.run("mainnet").await.unwrap();
        assert!(report.skipped);
        assert!(report.registry.is_empty());
        assert_eq!(orchestrator.state(), OrchestratorState::Done);
    }

    assert!(ledger.calls().await.is_empty());
    assert!(!dir.path().join(".env").exists());
}

#[tokio::test]
async fn test_artifact_holds_the_latest_addresses() {
    init_test_tracing();
    let dir = TempDir::new("orchestrator_test").unwrap();
    let path = dir.path().join("frontend/.env");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "REACT_APP_AMM_ADDRESS=0x00000000000000000000000000000000000000ff\n")
        .unwrap();

    let ledger = InMemoryLedger::new();
    let plan = DeploymentPlan::perpetual_stack(&PlanConfig::default());
    let emitter = ConfigEmitter::new(&path, plan.artifact.clone());
    let mut orchestrator = Orchestrator::new(&ledger, &ledger, plan, emitter);

    let report = orchestrator.run(ENV).await.unwrap();
    let written = ConfigArtifact::load_from_file(&path).unwrap();

    assert_eq!(Some(&written), report.artifact.as_ref());
    let keys: Vec<_> = written.entries().iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "REACT_APP_COLLATERAL_TOKEN_ADDRESS",
            "REACT_APP_PERPETUAL_ADDRESS",
            "REACT_APP_AMM_ADDRESS",
        ]
    );

    for (key, component) in [
        ("REACT_APP_COLLATERAL_TOKEN_ADDRESS", plan::COLLATERAL_TOKEN),
        ("REACT_APP_PERPETUAL_ADDRESS", plan::PERPETUAL),
        ("REACT_APP_AMM_ADDRESS", plan::AMM),
    ] {
        let address = written.get(key).unwrap();
        assert_eq!(Some(address), report.registry.address(&name(component)));
        assert_eq!(ledger.component_at(address).await, Some(name(component)));
    }
    assert_ne!(
        written.get("REACT_APP_AMM_ADDRESS"),
        Some(Address::with_last_byte(0xff))
    );
}
