use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use vitonhd::{
    batch_device, export::run_export, init_tracing, inspect::run_inspect, BatchBackend,
    LoaderArgs, BACKEND_NAME,
};

#[derive(Parser)]
#[command(name = "vitonhd")]
#[command(about = "Inspect and export samples of a paired person/garment try-on dataset")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print per-channel statistics and run a few batches through the dataloader
    Inspect {
        #[command(flatten)]
        loader: LoaderArgs,

        /// Number of samples to examine
        #[arg(long, default_value = "10")]
        num_samples: usize,
    },

    /// Write every channel of the first samples back to PNG
    Export {
        #[command(flatten)]
        loader: LoaderArgs,

        /// Output directory for the exported channels
        #[arg(short, long)]
        output: PathBuf,

        /// Number of samples to export
        #[arg(long, default_value = "4")]
        num_samples: usize,
    },

    /// Show backend information
    Info,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            loader,
            num_samples,
        } => {
            let config = loader.resolve()?;
            println!("Using backend: {BACKEND_NAME}");
            run_inspect::<BatchBackend>(&config, num_samples)
        }

        Commands::Export {
            loader,
            output,
            num_samples,
        } => {
            let config = loader.resolve()?;
            run_export(&config, &output, num_samples)
        }

        Commands::Info => {
            println!("vitonhd {}", env!("CARGO_PKG_VERSION"));
            println!("  Backend: {BACKEND_NAME}");
            println!("  Device: {:?}", batch_device());
            Ok(())
        }
    }
}
