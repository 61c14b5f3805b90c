use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use jointtag_core::TaggerConfig;
use jointtag_trainer::{Schedule, TrainOptions, run_training};

/// CLI arguments
#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train a joint POS/chunk tagger on CoNLL-2000 data")]
#[command(version)]
struct Cli {
    /// Training file (word POS CHUNK per line)
    #[arg(short, long)]
    train: PathBuf,

    /// Validation file
    #[arg(short, long)]
    valid: Option<PathBuf>,

    /// JSON tagger configuration; sizes derived from data are overwritten
    #[arg(short, long, env = "JOINTTAG_CONFIG")]
    config: Option<PathBuf>,

    /// Output directory for parameters, vocabularies and history
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of passes over the training data
    #[arg(short, long, default_value_t = 10)]
    epochs: usize,

    /// Update operations per batch
    #[arg(short, long, value_enum, default_value_t = Schedule::Joint)]
    schedule: Schedule,

    /// Condition chunking on the predicted POS tag instead of the POS distribution
    #[arg(long)]
    argmax: bool,

    /// Initialisation and shuffling seed
    #[arg(long, env = "JOINTTAG_SEED")]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => TaggerConfig::from_json_file(path)?,
        None => TaggerConfig::default(),
    };
    if cli.argmax {
        config.argmax = true;
    }
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    let options = TrainOptions {
        train_path: cli.train,
        valid_path: cli.valid,
        output_dir: cli.output,
        epochs: cli.epochs,
        schedule: cli.schedule,
        config,
    };
    run_training(&options)?;
    Ok(())
}
