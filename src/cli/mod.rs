// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Parses command line arguments with `clap` and hands off to the
// use cases in Layer 2. Printing results happens here.
//
//   1. `train`   : fits the network and prints the test accuracy
//   2. `evaluate`: scores a saved checkpoint
//   3. `summary` : prints the architecture table
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, SummaryArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "resnet-v2-cifar",
    version,
    about = "Train a pre-activation ResNet on CIFAR-10 with Burn."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::Summary(args)  => run_summary(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on data in: {}", args.data_dir);

    let use_case = TrainUseCase::new(args.try_into()?);
    let report   = use_case.execute()?;

    println!("== Using real-time data augmentation, training done ==");
    println!(
        "Best val_acc {:.4} at epoch {}",
        report.best_val_acc, report.best_epoch
    );
    println!("Accy: {:06.5}", report.test.accuracy());
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let stats = EvaluateUseCase::new(args.checkpoint_dir)
        .with_data_dir(args.data_dir)
        .with_device(args.device.map(Into::into))
        .with_batch_size(args.batch_size)
        .with_limit(args.limit)
        .execute()?;

    println!("Loss: {:.5}", stats.mean_loss());
    println!("Accy: {:06.5}", stats.accuracy());
    Ok(())
}

fn run_summary(args: SummaryArgs) -> Result<()> {
    use crate::application::summary_use_case::SummaryUseCase;

    let table = SummaryUseCase::new(args.try_into()?).render()?;
    println!("{table}");
    Ok(())
}
