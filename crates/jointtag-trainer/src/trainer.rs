//! Training loop for the joint tagger.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use candle_core::Device;
use clap::ValueEnum;
use jointtag_core::{
    Batch, InferenceModel, Objective, ParamMode, ParamStore, Tagger, TaggerConfig, TaggerOutput,
    TrainingModel,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::batcher::Batcher;
use crate::data::load_conll;
use crate::vocab::Vocabularies;

/// Which update operations run on each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Schedule {
    /// POS loss only.
    Pos,
    /// Chunk loss only.
    Chunk,
    /// Sum of both losses in a single update.
    Joint,
    /// A POS update followed by a chunk update.
    Alternate,
}

impl Schedule {
    pub fn objectives(self) -> &'static [Objective] {
        match self {
            Schedule::Pos => &[Objective::Pos],
            Schedule::Chunk => &[Objective::Chunk],
            Schedule::Joint => &[Objective::Joint],
            Schedule::Alternate => &[Objective::Pos, Objective::Chunk],
        }
    }
}

/// Mean losses and accuracies over a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EpochStats {
    pub pos_loss: f32,
    pub chunk_loss: f32,
    pub pos_accuracy: f32,
    pub chunk_accuracy: f32,
    pub steps: usize,
}

impl EpochStats {
    fn add(&mut self, output: &TaggerOutput) -> Result<()> {
        self.pos_loss += output.pos.loss_value()?;
        self.chunk_loss += output.chunk.loss_value()?;
        self.pos_accuracy += output.pos.accuracy;
        self.chunk_accuracy += output.chunk.accuracy;
        self.steps += 1;
        Ok(())
    }

    fn mean(mut self) -> Self {
        if self.steps > 0 {
            let n = self.steps as f32;
            self.pos_loss /= n;
            self.chunk_loss /= n;
            self.pos_accuracy /= n;
            self.chunk_accuracy /= n;
        }
        self
    }
}

/// Training and evaluation models bound to one parameter store.
pub struct Trainer {
    store: ParamStore,
    train: TrainingModel,
    eval: InferenceModel,
    config: TaggerConfig,
}

impl Trainer {
    pub fn new(config: &TaggerConfig, device: &Device) -> Result<Self> {
        let store = ParamStore::new(config.seed, device);
        let train = TrainingModel::new(config, &store, ParamMode::Create)
            .context("building training model")?;
        let eval = InferenceModel::new(config, &store, ParamMode::Reuse)
            .context("building evaluation model")?;
        info!(
            parameters = store.num_weights()?,
            argmax = config.argmax,
            "tagger ready"
        );

        Ok(Self {
            store,
            train,
            eval,
            config: config.clone(),
        })
    }

    /// One pass over `batches`, updating parameters according to `schedule`.
    pub fn train_epoch(&mut self, batches: &[Batch], schedule: Schedule) -> Result<EpochStats> {
        let mut stats = EpochStats::default();
        for (i, batch) in batches.iter().enumerate() {
            for &objective in schedule.objectives() {
                let step = self.train.run(objective, batch)?;
                stats.add(&step.output)?;
                debug!(
                    batch = i,
                    objective = objective.name(),
                    grad_norm = step.grad_norm,
                    "step"
                );
            }
        }
        Ok(stats.mean())
    }

    /// Score `batches` without dropout or updates.
    pub fn evaluate(&self, batches: &[Batch]) -> Result<EpochStats> {
        let mut stats = EpochStats::default();
        for batch in batches {
            stats.add(&self.eval.forward(batch)?)?;
        }
        Ok(stats.mean())
    }

    /// Write parameters and configuration into `dir`.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        self.store
            .save(dir.join("params.safetensors"))
            .context("saving parameters")?;
        std::fs::write(
            dir.join("config.json"),
            serde_json::to_string_pretty(&self.config)?,
        )?;
        info!("Model saved to {:?}", dir);
        Ok(())
    }
}

/// Everything `run_training` needs.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub train_path: PathBuf,
    pub valid_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub epochs: usize,
    pub schedule: Schedule,
    /// Base configuration; vocabulary and tag sizes are filled in from the data.
    pub config: TaggerConfig,
}

/// Per-epoch results.
#[derive(Debug, Clone, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub train: EpochStats,
    pub valid: Option<EpochStats>,
}

pub fn run_training(options: &TrainOptions) -> Result<Vec<EpochReport>> {
    let device = Device::Cpu;

    if !options.train_path.exists() {
        bail!("Training data not found: {:?}", options.train_path);
    }
    let train_sentences = load_conll(&options.train_path)
        .with_context(|| format!("loading {:?}", options.train_path))?;
    info!("Loaded {} training sentences", train_sentences.len());

    let vocabs = Vocabularies::build(&train_sentences);
    let config = options
        .config
        .clone()
        .with_vocab(vocabs.words.len(), vocabs.pos.len(), vocabs.chunks.len());
    config.validate()?;

    let batcher = Batcher::new(&config);
    let train_windows = batcher.windows(&vocabs.encode_all(&train_sentences)?);

    let valid_batches = match &options.valid_path {
        Some(path) => {
            let sentences = load_conll(path).with_context(|| format!("loading {path:?}"))?;
            let windows = batcher.windows(&vocabs.encode_all(&sentences)?);
            Some(batcher.to_batches(&windows, &device)?)
        }
        None => None,
    };

    let mut trainer = Trainer::new(&config, &device)?;
    let mut reports = Vec::with_capacity(options.epochs);

    for epoch in 0..options.epochs {
        let mut windows = train_windows.clone();
        Batcher::shuffle(&mut windows, config.seed.wrapping_add(epoch as u64));
        let batches = batcher.to_batches(&windows, &device)?;

        let train = trainer.train_epoch(&batches, options.schedule)?;
        let valid = valid_batches
            .as_deref()
            .map(|batches| trainer.evaluate(batches))
            .transpose()?;

        info!(
            "Epoch {}/{} - pos loss {:.4} acc {:.2}% | chunk loss {:.4} acc {:.2}%",
            epoch + 1,
            options.epochs,
            train.pos_loss,
            train.pos_accuracy * 100.0,
            train.chunk_loss,
            train.chunk_accuracy * 100.0
        );
        if let Some(valid) = &valid {
            info!(
                "Validation - pos acc {:.2}% | chunk acc {:.2}%",
                valid.pos_accuracy * 100.0,
                valid.chunk_accuracy * 100.0
            );
        }

        reports.push(EpochReport {
            epoch: epoch + 1,
            train,
            valid,
        });
    }

    if let Some(dir) = &options.output_dir {
        trainer.save(dir)?;
        vocabs.save(dir.join("vocab.json"))?;
        std::fs::write(dir.join("history.json"), serde_json::to_string_pretty(&reports)?)?;
    }

    Ok(reports)
}
