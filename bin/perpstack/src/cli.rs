use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "perpstack")]
#[command(
    author,
    version,
    about = "Deploy, link and seed a perpetual-swap component stack"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "PERP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a configuration file, or to a directory holding a `Perpstack.toml`.
    ///
    /// Values from the file are overridden by `PERP_`-prefixed environment
    /// variables, which are in turn overridden by command line flags.
    #[arg(short, long, global = true, env = "PERP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy, link and seed the component stack against an environment.
    Deploy(DeployArgs),
    /// Validate the deployment plan and print it.
    Plan,
    /// Print the configuration artifact written by the last run.
    Show(ShowArgs),
    /// Write a default configuration file.
    Init(InitArgs),
}

#[derive(Args)]
pub struct DeployArgs {
    /// The target environment (e.g. `development`, `harmony_testnet`).
    #[arg(short, long)]
    pub environment: Option<String>,

    /// The JSON-RPC endpoint of the ledger node.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<String>,

    /// The sender account. Defaults to the first account of the node.
    #[arg(long)]
    pub from: Option<Address>,

    /// Directory holding the compiled component artifacts.
    #[arg(long, alias = "artifacts-dir")]
    pub artifacts: Option<PathBuf>,

    /// Where to write the `KEY=VALUE` configuration artifact.
    #[arg(long)]
    pub env_out: Option<PathBuf>,

    /// The output data directory (run state, registry snapshots).
    #[arg(long)]
    pub outdata: Option<PathBuf>,

    /// Deploy against an in-memory ledger instead of the configured node.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Path of the configuration artifact. Defaults to the configured one.
    #[arg(long)]
    pub env_out: Option<PathBuf>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}
