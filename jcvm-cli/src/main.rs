//! Host emulation front end: load a flash image, run the bootstrap entry,
//! optionally persist the mutated image.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use jcvm::consts::{STARTING_CLASS, STARTING_METHOD, STARTING_PACKAGE};
use jcvm::Interpreter;
use jcvm_cap::FlashMemory;
use jcvm_types::PackageId;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jcvm", about = "Secure Java Card VM host emulator", version)]
struct Args {
    /// Path of the flash memory image.
    #[arg(short = 'm', long = "memory", value_name = "FILE")]
    memory: PathBuf,

    /// Persist modifications back to the memory file on exit.
    #[arg(short = 's', long = "save")]
    save: bool,
}

fn run(args: &Args) -> anyhow::Result<()> {
    let flash = FlashMemory::load(&args.memory)
        .with_context(|| format!("loading flash image {}", args.memory.display()))?;

    let package = PackageId::new(STARTING_PACKAGE)
        .context("the card manager package id exceeds the registry bound")?;

    let mut vm = Interpreter::new(flash);
    let state = vm
        .runtime(package, STARTING_CLASS, STARTING_METHOD)
        .context("bootstrap run failed")?;
    debug!(?state, "run complete");

    if args.save {
        debug!(file = %args.memory.display(), "saving flash image");
        let flash = FlashMemory::from(vm);
        flash
            .save(&args.memory)
            .with_context(|| format!("saving flash image {}", args.memory.display()))?;
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}
