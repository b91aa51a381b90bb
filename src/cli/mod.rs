// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains the generator on paired LR/HR images
//   2. `eval`  — loads a checkpoint and reports PSNR per image

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "residual-sr",
    version,
    about = "Train and evaluate a residual super-resolution network."
)]
pub struct Cli {
    /// The subcommand to run (train or eval)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Eval(args)  => run_eval(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}' / '{}'", args.lr_dir, args.hr_dir);
    let checkpoint_dir = args.checkpoint_dir.clone();

    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoints saved to '{checkpoint_dir}'.");
    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    use crate::application::eval_use_case::EvalUseCase;

    let report = EvalUseCase::new(args.into()).execute()?;

    match (report.mean_psnr(), report.mean_mse()) {
        (Some(psnr), Some(mse)) => println!(
            "\nAverage over {} images (epoch {}): PSNR {:.3} dB, MSE {:.6}",
            report.scores.len(),
            report.epoch,
            psnr,
            mse,
        ),
        _ => println!("\nNo images were evaluated."),
    }
    Ok(())
}
