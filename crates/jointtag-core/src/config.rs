//! # Tagger Configuration
//!
//! Dimensions, regularisation and optimizer settings for the joint
//! POS/chunk tagger. A configuration is validated once, before any
//! parameter is created.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaggerError};

/// Default Adam step size.
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;

/// Forget-gate bias added inside every LSTM cell.
pub const FORGET_BIAS: f64 = 1.0;

/// Configuration of a joint POS/chunk tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    /// Sequence length of every batch row.
    pub num_steps: usize,
    /// Rows per batch.
    pub batch_size: usize,
    /// Rows in the word embedding table.
    pub vocab_size: usize,
    /// Size of the POS tag space.
    pub num_pos_tags: usize,
    /// Size of the chunk tag space.
    pub num_chunk_tags: usize,
    pub word_embedding_size: usize,
    /// Width of the POS embedding, and of the chunk decoder's conditioning slot.
    pub pos_embedding_size: usize,
    pub encoder_size: usize,
    pub pos_decoder_size: usize,
    pub chunk_decoder_size: usize,
    /// Stacked LSTM layers in the shared encoder.
    pub num_shared_layers: usize,
    /// Dropout retention probability during training.
    pub keep_prob: f32,
    /// Global gradient norm threshold.
    pub max_grad_norm: f32,
    /// Condition the chunk decoder on the hard POS prediction (`true`)
    /// or on the softmax expectation over POS embeddings (`false`).
    pub argmax: bool,
    /// Adam step size.
    pub learning_rate: f64,
    /// Seed for parameter initialisation.
    pub seed: u64,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            num_steps: 20,
            batch_size: 64,
            vocab_size: 20_000,
            num_pos_tags: 45,
            num_chunk_tags: 23,
            word_embedding_size: 400,
            pos_embedding_size: 400,
            encoder_size: 200,
            pos_decoder_size: 200,
            chunk_decoder_size: 200,
            num_shared_layers: 1,
            keep_prob: 0.5,
            max_grad_norm: 5.0,
            argmax: false,
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: 42,
        }
    }
}

impl TaggerConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the sequence geometry.
    pub fn with_shape(mut self, batch_size: usize, num_steps: usize) -> Self {
        self.batch_size = batch_size;
        self.num_steps = num_steps;
        self
    }

    /// Set the vocabulary and tag space sizes.
    pub fn with_vocab(mut self, vocab_size: usize, num_pos_tags: usize, num_chunk_tags: usize) -> Self {
        self.vocab_size = vocab_size;
        self.num_pos_tags = num_pos_tags;
        self.num_chunk_tags = num_chunk_tags;
        self
    }

    /// Select hard (`true`) or soft (`false`) POS conditioning.
    pub fn with_argmax(mut self, argmax: bool) -> Self {
        self.argmax = argmax;
        self
    }

    /// Set the dropout retention probability.
    pub fn with_keep_prob(mut self, keep_prob: f32) -> Self {
        self.keep_prob = keep_prob;
        self
    }

    /// Set the initialisation seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of label rows in a batch: `batch_size * num_steps`.
    #[must_use]
    pub fn tokens_per_batch(&self) -> usize {
        self.batch_size * self.num_steps
    }

    /// Input width of the chunk decoder's recurrent layer.
    #[must_use]
    pub fn chunk_input_size(&self) -> usize {
        self.pos_embedding_size + self.encoder_size
    }

    /// Dropout rate to apply in training, or `None` when dropout is disabled.
    #[must_use]
    pub fn training_dropout(&self) -> Option<f32> {
        (self.keep_prob < 1.0).then(|| 1.0 - self.keep_prob)
    }

    /// Check every size and hyperparameter, failing on the first problem found.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("num_steps", self.num_steps),
            ("batch_size", self.batch_size),
            ("vocab_size", self.vocab_size),
            ("num_pos_tags", self.num_pos_tags),
            ("num_chunk_tags", self.num_chunk_tags),
            ("word_embedding_size", self.word_embedding_size),
            ("pos_embedding_size", self.pos_embedding_size),
            ("encoder_size", self.encoder_size),
            ("pos_decoder_size", self.pos_decoder_size),
            ("chunk_decoder_size", self.chunk_decoder_size),
            ("num_shared_layers", self.num_shared_layers),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0) {
            return Err(TaggerError::InvalidConfig(format!("{name} must be positive")));
        }

        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            return Err(TaggerError::InvalidConfig(format!(
                "keep_prob must be in (0, 1], got {}",
                self.keep_prob
            )));
        }
        if !(self.max_grad_norm.is_finite() && self.max_grad_norm > 0.0) {
            return Err(TaggerError::InvalidConfig(format!(
                "max_grad_norm must be positive, got {}",
                self.max_grad_norm
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TaggerError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.vocab_size > u32::MAX as usize {
            return Err(TaggerError::InvalidConfig(
                "vocab_size does not fit in u32 token ids".into(),
            ));
        }

        Ok(())
    }
}
