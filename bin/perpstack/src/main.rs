//! perpstack is a CLI tool to deploy and bootstrap a perpetual-swap market in one command.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use cli::{Cli, Command, DeployArgs, InitArgs, ShowArgs};
use perpstack_deploy::{
    ConfigArtifact, Deployer, DeployerBuilder, DeploymentPlan, PERPCONF_FILENAME, RunReport,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Deploy(args) => deploy(cli.config.as_deref(), args).await,
        Command::Plan => plan(cli.config.as_deref()),
        Command::Show(args) => show(cli.config.as_deref(), args),
        Command::Init(args) => init(cli.config.as_deref(), args),
    }
}

/// Resolve the configuration file path, accepting a directory holding one.
fn config_file(path: Option<&Path>) -> PathBuf {
    match path {
        Some(path) if path.is_dir() => path.join(PERPCONF_FILENAME),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(PERPCONF_FILENAME),
    }
}

/// Layer defaults, the configuration file and `PERP_` environment variables.
fn load_config(path: Option<&Path>) -> Result<Deployer> {
    let config_path = config_file(path);

    if path.is_some() && !config_path.exists() {
        anyhow::bail!(
            "Configuration file not found: {}",
            config_path.display()
        );
    }

    let deployer: Deployer = Figment::from(Serialized::defaults(Deployer::default()))
        .merge(Toml::file(&config_path))
        .merge(
            Env::prefixed("PERP_")
                .ignore(&["verbosity", "config"])
                .split("__"),
        )
        .extract()
        .context("Failed to load configuration")?;

    tracing::debug!(
        config_path = %config_path.display(),
        environment = %deployer.environment,
        "Configuration resolved"
    );

    Ok(deployer)
}

async fn deploy(config: Option<&Path>, args: DeployArgs) -> Result<()> {
    let mut builder = DeployerBuilder::from_config(load_config(config)?);

    if let Some(environment) = args.environment {
        builder = builder.environment(environment);
    }
    if let Some(rpc_url) = args.rpc_url {
        builder = builder.rpc_url(rpc_url);
    }
    if let Some(from) = args.from {
        builder = builder.from_account(from);
    }
    if let Some(artifacts) = args.artifacts {
        builder = builder.artifacts_dir(artifacts);
    }
    if let Some(env_out) = args.env_out {
        builder = builder.config_artifact(env_out);
    }
    if let Some(outdata) = args.outdata {
        builder = builder.outdata(outdata);
    }

    // Build the deployer configuration
    let deployer = builder.build()?;

    if deployer.is_target() {
        // Save the configuration next to the run state before deploying
        deployer.save_config()?;
    }

    let report = deployer.deploy(args.dry_run).await?;
    print_report(&report);

    if let Some(err) = &report.emit_error {
        anyhow::bail!(
            "Components were deployed but the configuration artifact could not be written: {}",
            err
        );
    }

    Ok(())
}

fn plan(config: Option<&Path>) -> Result<()> {
    let deployer = load_config(config)?;
    let plan = DeploymentPlan::perpetual_stack(&deployer.plan);
    let order = plan.validate().context("The deployment plan is invalid")?;

    let mut components = Table::new();
    components
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Component", "Artifact", "Constructor arguments"]);
    for (position, name) in order.iter().enumerate() {
        let Some(spec) = plan.component(name) else {
            continue;
        };
        let args = spec
            .constructor_args
            .iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        components.add_row(vec![
            (position + 1).to_string(),
            name.to_string(),
            spec.artifact.clone(),
            args,
        ]);
    }

    let mut setup = Table::new();
    setup.load_preset(UTF8_FULL).set_header(vec!["Setup action"]);
    for action in &plan.setup {
        setup.add_row(vec![action.to_string()]);
    }

    let mut seed = Table::new();
    seed.load_preset(UTF8_FULL)
        .set_header(vec!["Seed step", "Call", "After"]);
    for step in &plan.seed {
        seed.add_row(vec![
            step.name.clone(),
            step.to_string(),
            step.precondition.join(", "),
        ]);
    }

    println!("{components}\n{setup}\n{seed}");
    Ok(())
}

fn show(config: Option<&Path>, args: ShowArgs) -> Result<()> {
    let path = match args.env_out {
        Some(path) => path,
        None => load_config(config)?.config_artifact,
    };

    let artifact = ConfigArtifact::load_from_file(&path)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Key", "Address"]);
    for (key, address) in artifact.entries() {
        table.add_row(vec![key.clone(), address.to_string()]);
    }
    println!("{}\n{table}", path.display());
    Ok(())
}

fn init(config: Option<&Path>, args: InitArgs) -> Result<()> {
    let path = config_file(config);
    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists, use --force to overwrite it",
            path.display()
        );
    }

    Deployer::default().save_to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn print_report(report: &RunReport) {
    if report.skipped {
        println!(
            "Environment `{}` is not a deployment target, nothing was deployed.",
            report.environment
        );
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Component", "Address", "Linked"]);
    for record in report.registry.records() {
        table.add_row(vec![
            record.name.to_string(),
            record
                .deployed_address
                .map(|a| a.to_string())
                .unwrap_or_default(),
            record.setup_complete.to_string(),
        ]);
    }
    println!("{table}");

    if let Some(artifact) = &report.artifact {
        println!("\n{}", artifact.render());
    }
}
