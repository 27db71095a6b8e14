mod common;
mod run_svi;
mod run_vmp;

use crate::common::*;
use run_svi::*;
use run_vmp::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about, term_width = 80)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Batch (parallel) variational message passing on simulated sequences
    Vmp(VmpArgs),
    /// Stochastic variational inference on simulated sequences
    Svi(SviArgs),
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.commands {
        Commands::Vmp(args) => {
            run_vmp(args)?;
        }
        Commands::Svi(args) => {
            run_svi(args)?;
        }
    }

    Ok(())
}
