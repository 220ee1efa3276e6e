use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    enumerate::{self, EnumerateArgs},
    run::{self, RunArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "simbatch", about = "Parameter sweep campaigns for external simulation jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and run one sandbox per parameter point of a plan.
    Run(RunArgs),
    /// Print every parameter point of a plan as one JSON line, in run order.
    Enumerate(EnumerateArgs),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Keep any subscriber installed earlier.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            init_logging(args.verbose);
            run::run(&args)
        }
        Command::Enumerate(args) => {
            init_logging(false);
            enumerate::run(&args)
        }
    }
}
