//! # Joint POS/Chunk Tagger
//!
//! Assembles the full network:
//!
//! ```text
//! tokens [B, T]
//!   → word_embedding            [B, T, W]   (dropout when training)
//!   → SharedEncoder             [T, B, E]
//!   → PosDecoder                [B*T, P]    → pos loss / predictions
//!   → PosConditioning           [B, T, Pe]
//!   → ChunkDecoder(enc ⊕ cond)  [B*T, C]    → chunk loss / predictions
//! ```
//!
//! [`TrainingModel`] applies dropout and owns the three update operations;
//! [`InferenceModel`] has neither. Both read parameters from a
//! [`ParamStore`], so a training model and an evaluation model built on the
//! same store share every weight.

use candle_core::{Module, Tensor};
use candle_nn::Embedding;
use candle_nn::ops::dropout;
use tracing::debug;

use crate::batch::{Batch, check_token_range};
use crate::config::TaggerConfig;
use crate::error::{Result, TaggerError};
use crate::layout::BatchMajor;
use crate::loss::{TaskOutput, task_loss};
use crate::model::conditioning::conditioning_for;
use crate::model::decoders::{ChunkDecoder, PosDecoder};
use crate::model::encoder::SharedEncoder;
use crate::nn::LstmState;
use crate::optim::{Objective, UpdateOp};
use crate::params::{Initializer, ParamMode, ParamScope, ParamStore};

/// Everything one forward pass over a labelled batch produces.
#[derive(Debug, Clone)]
pub struct TaggerOutput {
    /// `[batch * steps, num_pos_tags]`
    pub pos_logits: Tensor,
    /// `[batch * steps, num_chunk_tags]`
    pub chunk_logits: Tensor,
    pub pos: TaskOutput,
    pub chunk: TaskOutput,
    /// `pos.loss + chunk.loss`
    pub joint_loss: Tensor,
    /// Chunk decoder conditioning input, `[batch, steps, pos_embedding_size]`.
    pub conditioning: BatchMajor,
    pub pos_state: LstmState,
    pub chunk_state: LstmState,
}

impl TaggerOutput {
    /// The loss minimised by `objective`.
    pub fn loss(&self, objective: Objective) -> &Tensor {
        match objective {
            Objective::Pos => &self.pos.loss,
            Objective::Chunk => &self.chunk.loss,
            Objective::Joint => &self.joint_loss,
        }
    }
}

/// Tag predictions for unlabelled tokens, each `u32 [batch, steps]`.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub pos: Tensor,
    pub chunk: Tensor,
}

/// Forward computation shared by training and inference models.
pub trait Tagger {
    fn config(&self) -> &TaggerConfig;

    /// POS embedding table `[num_pos_tags, pos_embedding_size]`.
    fn pos_embedding(&self) -> &Tensor;

    /// Compute logits, losses, accuracies and predictions for a batch.
    fn forward(&self, batch: &Batch) -> Result<TaggerOutput>;
}

struct Decoded {
    pos_logits: Tensor,
    pos_predictions: Tensor,
    pos_state: LstmState,
    chunk_logits: Tensor,
    chunk_state: LstmState,
    conditioning: BatchMajor,
}

/// Layers and parameter handles of the network.
struct TaggerNet {
    config: TaggerConfig,
    word_embedding: Embedding,
    pos_embedding: Tensor,
    encoder: SharedEncoder,
    pos_decoder: PosDecoder,
    chunk_decoder: ChunkDecoder,
}

impl TaggerNet {
    fn new(config: &TaggerConfig, scope: &ParamScope<'_>) -> Result<Self> {
        config.validate()?;

        let word_table = scope.get(
            &[config.vocab_size, config.word_embedding_size],
            "word_embedding",
            Initializer::GlorotUniform,
        )?;
        let pos_embedding = scope.get(
            &[config.num_pos_tags, config.pos_embedding_size],
            "pos_embedding",
            Initializer::GlorotUniform,
        )?;

        let encoder = SharedEncoder::new(config, &scope.pp("encoder"))?;
        let pos_decoder = PosDecoder::new(config, &scope.pp("pos_decoder"))?;
        let chunk_decoder = ChunkDecoder::new(
            config,
            conditioning_for(config.argmax),
            &scope.pp("chunk_decoder"),
        )?;

        Ok(Self {
            config: config.clone(),
            word_embedding: Embedding::new(word_table, config.word_embedding_size),
            pos_embedding,
            encoder,
            pos_decoder,
            chunk_decoder,
        })
    }

    fn decode(&self, tokens: &Tensor, drop_rate: Option<f32>) -> Result<Decoded> {
        let (batch, steps) = tokens.dims2()?;

        let mut inputs = self.word_embedding.forward(tokens)?;
        if let Some(rate) = drop_rate {
            inputs = dropout(&inputs, rate)?;
        }

        let encoding = self.encoder.forward(&BatchMajor::new(inputs)?, drop_rate)?;

        let (pos_logits, pos_state) = self.pos_decoder.forward(&encoding, drop_rate)?;
        let pos_predictions = pos_logits.argmax(candle_core::D::Minus1)?;

        let conditioning = self.chunk_decoder.condition(
            &pos_logits,
            &pos_predictions,
            &self.pos_embedding,
            batch,
            steps,
        )?;
        let (chunk_logits, chunk_state) =
            self.chunk_decoder
                .forward(&encoding, &conditioning, drop_rate)?;

        Ok(Decoded {
            pos_logits,
            pos_predictions,
            pos_state,
            chunk_logits,
            chunk_state,
            conditioning,
        })
    }

    fn forward(&self, batch: &Batch, drop_rate: Option<f32>) -> Result<TaggerOutput> {
        batch.check(&self.config)?;
        let decoded = self.decode(&batch.tokens, drop_rate)?;

        let normalizer = self.config.tokens_per_batch();
        let pos = task_loss(&decoded.pos_logits, &batch.pos_targets, normalizer)?;
        let chunk = task_loss(&decoded.chunk_logits, &batch.chunk_targets, normalizer)?;
        let joint_loss = (&pos.loss + &chunk.loss)?;

        Ok(TaggerOutput {
            pos_logits: decoded.pos_logits,
            chunk_logits: decoded.chunk_logits,
            pos,
            chunk,
            joint_loss,
            conditioning: decoded.conditioning,
            pos_state: decoded.pos_state,
            chunk_state: decoded.chunk_state,
        })
    }

    fn log_built(&self, kind: &str, mode: ParamMode, store: &ParamStore) -> Result<()> {
        let params = store.len()?;
        let weights = store.num_weights()?;
        debug!(
            kind,
            ?mode,
            conditioning = self.chunk_decoder.conditioning().name(),
            shared_layers = self.config.num_shared_layers,
            params,
            weights,
            "built tagger"
        );
        Ok(())
    }
}

/// Tagger in training mode: dropout on, update operations available.
pub struct TrainingModel {
    net: TaggerNet,
    pos_op: UpdateOp,
    chunk_op: UpdateOp,
    joint_op: UpdateOp,
}

/// Result of one update step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub objective: Objective,
    /// Global gradient norm before clipping.
    pub grad_norm: f32,
    pub output: TaggerOutput,
}

impl TrainingModel {
    /// Build the network against `store` and create its three update operations.
    ///
    /// The first model on a fresh store uses [`ParamMode::Create`].
    pub fn new(config: &TaggerConfig, store: &ParamStore, mode: ParamMode) -> Result<Self> {
        let net = TaggerNet::new(config, &store.root(mode))?;

        let vars = store.vars();
        let pos_op = UpdateOp::new(Objective::Pos, vars.clone(), config)?;
        let chunk_op = UpdateOp::new(Objective::Chunk, vars.clone(), config)?;
        let joint_op = UpdateOp::new(Objective::Joint, vars, config)?;

        net.log_built("training", mode, store)?;
        Ok(Self {
            net,
            pos_op,
            chunk_op,
            joint_op,
        })
    }

    /// The update operation for `objective`.
    pub fn update_op(&self, objective: Objective) -> &UpdateOp {
        match objective {
            Objective::Pos => &self.pos_op,
            Objective::Chunk => &self.chunk_op,
            Objective::Joint => &self.joint_op,
        }
    }

    /// Run a forward pass and one update step against `objective`.
    ///
    /// The batch is validated before anything is computed, so a rejected
    /// batch leaves every parameter untouched.
    pub fn run(&mut self, objective: Objective, batch: &Batch) -> Result<StepOutput> {
        let output = self.net.forward(batch, self.net.config.training_dropout())?;
        let op = match objective {
            Objective::Pos => &mut self.pos_op,
            Objective::Chunk => &mut self.chunk_op,
            Objective::Joint => &mut self.joint_op,
        };
        let grad_norm = op.apply(output.loss(objective))?;

        Ok(StepOutput {
            objective,
            grad_norm,
            output,
        })
    }
}

impl Tagger for TrainingModel {
    fn config(&self) -> &TaggerConfig {
        &self.net.config
    }

    fn pos_embedding(&self) -> &Tensor {
        &self.net.pos_embedding
    }

    fn forward(&self, batch: &Batch) -> Result<TaggerOutput> {
        self.net.forward(batch, self.net.config.training_dropout())
    }
}

/// Tagger in inference mode: no dropout, no update operations.
pub struct InferenceModel {
    net: TaggerNet,
}

impl InferenceModel {
    /// Build the network against `store`.
    ///
    /// Use [`ParamMode::Reuse`] to evaluate a [`TrainingModel`]'s weights,
    /// or [`ParamMode::Create`] on a fresh store before loading a checkpoint.
    pub fn new(config: &TaggerConfig, store: &ParamStore, mode: ParamMode) -> Result<Self> {
        let net = TaggerNet::new(config, &store.root(mode))?;
        net.log_built("inference", mode, store)?;
        Ok(Self { net })
    }

    /// Tag unlabelled token ids `u32 [batch, steps]` of any non-empty batch size and length.
    pub fn predict(&self, tokens: &Tensor) -> Result<Prediction> {
        let (batch, steps) = tokens.dims2()?;
        if batch == 0 || steps == 0 {
            return Err(TaggerError::ShapeMismatch {
                what: "tokens".into(),
                expected: vec![batch.max(1), steps.max(1)],
                actual: vec![batch, steps],
            });
        }
        check_token_range(tokens, self.net.config.vocab_size)?;

        let decoded = self.net.decode(tokens, None)?;
        let chunk = decoded.chunk_logits.argmax(candle_core::D::Minus1)?;

        Ok(Prediction {
            pos: decoded.pos_predictions.reshape((batch, steps))?,
            chunk: chunk.reshape((batch, steps))?,
        })
    }
}

impl Tagger for InferenceModel {
    fn config(&self) -> &TaggerConfig {
        &self.net.config
    }

    fn pos_embedding(&self) -> &Tensor {
        &self.net.pos_embedding
    }

    fn forward(&self, batch: &Batch) -> Result<TaggerOutput> {
        self.net.forward(batch, None)
    }
}
