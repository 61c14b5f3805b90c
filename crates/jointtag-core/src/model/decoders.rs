//! # Task Decoders
//!
//! Both decoders read the time-major shared encoding, convert it to
//! batch-major at their edge, run their own LSTM and project each step
//! onto their tag space. Logit rows come out as `[batch * steps, tags]`
//! in batch-major order, matching the one-hot target rows.
//!
//! The chunk decoder additionally concatenates a POS conditioning tensor
//! (see [`super::conditioning`]) in front of the encoding.

use candle_core::{D, Module, Tensor};
use candle_nn::Linear;

use crate::config::{FORGET_BIAS, TaggerConfig};
use crate::error::{Result, TaggerError};
use crate::layout::{BatchMajor, TimeMajor};
use crate::model::conditioning::PosConditioning;
use crate::nn::{LstmLayer, LstmState};
use crate::params::{Initializer, ParamScope};

/// LSTM followed by an affine projection to tag logits.
#[derive(Debug, Clone)]
struct TagHead {
    rnn: LstmLayer,
    projection: Linear,
}

impl TagHead {
    fn new(input_size: usize, hidden_size: usize, num_tags: usize, scope: &ParamScope<'_>) -> Result<Self> {
        let rnn = LstmLayer::new(input_size, hidden_size, FORGET_BIAS, &scope.pp("rnn"))?;
        let weight = scope.get(&[num_tags, hidden_size], "softmax_w", Initializer::GlorotUniform)?;
        let bias = scope.get(&[num_tags], "softmax_b", Initializer::Zeros)?;

        Ok(Self {
            rnn,
            projection: Linear::new(weight, Some(bias)),
        })
    }

    fn forward(&self, input: &BatchMajor, drop_rate: Option<f32>) -> Result<(Tensor, LstmState)> {
        let (hidden, state) = self.rnn.forward(input, drop_rate)?;
        let logits = self.projection.forward(&hidden.flatten_rows()?)?;
        Ok((logits, state))
    }
}

/// Decoder producing POS logits.
#[derive(Debug, Clone)]
pub struct PosDecoder {
    head: TagHead,
}

impl PosDecoder {
    pub fn new(config: &TaggerConfig, scope: &ParamScope<'_>) -> Result<Self> {
        let head = TagHead::new(
            config.encoder_size,
            config.pos_decoder_size,
            config.num_pos_tags,
            scope,
        )?;
        Ok(Self { head })
    }

    /// Returns logits `[batch * steps, num_pos_tags]` and the final LSTM state.
    pub fn forward(&self, encoding: &TimeMajor, drop_rate: Option<f32>) -> Result<(Tensor, LstmState)> {
        self.head.forward(&encoding.to_batch_major()?, drop_rate)
    }
}

/// Decoder producing chunk logits, conditioned on the POS decoder.
pub struct ChunkDecoder {
    head: TagHead,
    conditioning: Box<dyn PosConditioning>,
    pos_embedding_size: usize,
}

impl ChunkDecoder {
    pub fn new(
        config: &TaggerConfig,
        conditioning: Box<dyn PosConditioning>,
        scope: &ParamScope<'_>,
    ) -> Result<Self> {
        let head = TagHead::new(
            config.chunk_input_size(),
            config.chunk_decoder_size,
            config.num_chunk_tags,
            scope,
        )?;
        Ok(Self {
            head,
            conditioning,
            pos_embedding_size: config.pos_embedding_size,
        })
    }

    pub fn conditioning(&self) -> &dyn PosConditioning {
        self.conditioning.as_ref()
    }

    /// Build the conditioning tensor `[batch, steps, pos_embedding_size]`.
    pub fn condition(
        &self,
        pos_logits: &Tensor,
        pos_predictions: &Tensor,
        pos_embedding: &Tensor,
        batch: usize,
        steps: usize,
    ) -> Result<BatchMajor> {
        let rows = self
            .conditioning
            .condition(pos_logits, pos_predictions, pos_embedding)?;
        if rows.dims() != [batch * steps, self.pos_embedding_size] {
            return Err(TaggerError::ShapeMismatch {
                what: format!("{} conditioning", self.conditioning.name()),
                expected: vec![batch * steps, self.pos_embedding_size],
                actual: rows.dims().to_vec(),
            });
        }
        BatchMajor::new(rows.reshape((batch, steps, self.pos_embedding_size))?)
    }

    /// Returns logits `[batch * steps, num_chunk_tags]` and the final LSTM state.
    pub fn forward(
        &self,
        encoding: &TimeMajor,
        conditioning: &BatchMajor,
        drop_rate: Option<f32>,
    ) -> Result<(Tensor, LstmState)> {
        let encoding = encoding.to_batch_major()?;
        let inputs = Tensor::cat(&[conditioning.tensor(), encoding.tensor()], D::Minus1)?;
        self.head.forward(&BatchMajor::new(inputs)?, drop_rate)
    }
}
