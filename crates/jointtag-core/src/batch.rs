//! Validated model inputs for one step.

use candle_core::{DType, Device, Tensor};
use candle_nn::encoding::one_hot;

use crate::config::TaggerConfig;
use crate::error::{Result, TaggerError};

/// Token ids and one-hot targets for one batch.
///
/// ```text
/// tokens         u32 [batch_size, num_steps]
/// pos_targets    f32 [batch_size * num_steps, num_pos_tags]
/// chunk_targets  f32 [batch_size * num_steps, num_chunk_tags]
/// ```
///
/// Target rows are batch-major: row `b * num_steps + t` labels `tokens[b][t]`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub tokens: Tensor,
    pub pos_targets: Tensor,
    pub chunk_targets: Tensor,
}

impl Batch {
    /// Wrap prepared tensors after checking them against `config`.
    pub fn from_tensors(
        config: &TaggerConfig,
        tokens: Tensor,
        pos_targets: Tensor,
        chunk_targets: Tensor,
    ) -> Result<Self> {
        let rows = config.tokens_per_batch();
        check_dims("tokens", &tokens, &[config.batch_size, config.num_steps])?;
        check_dims("pos targets", &pos_targets, &[rows, config.num_pos_tags])?;
        check_dims("chunk targets", &chunk_targets, &[rows, config.num_chunk_tags])?;

        let tokens = tokens.to_dtype(DType::U32)?;
        check_token_range(&tokens, config.vocab_size)?;

        Ok(Self {
            tokens,
            pos_targets: pos_targets.to_dtype(DType::F32)?,
            chunk_targets: chunk_targets.to_dtype(DType::F32)?,
        })
    }

    /// Check this batch against the geometry and vocabulary of `config`.
    pub fn check(&self, config: &TaggerConfig) -> Result<()> {
        let rows = config.tokens_per_batch();
        check_dims("tokens", &self.tokens, &[config.batch_size, config.num_steps])?;
        check_dims("pos targets", &self.pos_targets, &[rows, config.num_pos_tags])?;
        check_dims("chunk targets", &self.chunk_targets, &[rows, config.num_chunk_tags])?;
        check_token_range(&self.tokens, config.vocab_size)
    }

    /// Build a batch from flat batch-major id slices of length `batch_size * num_steps`.
    pub fn from_ids(
        config: &TaggerConfig,
        tokens: &[u32],
        pos_tags: &[u32],
        chunk_tags: &[u32],
        device: &Device,
    ) -> Result<Self> {
        let rows = config.tokens_per_batch();
        for (what, ids) in [("tokens", tokens), ("pos tags", pos_tags), ("chunk tags", chunk_tags)] {
            if ids.len() != rows {
                return Err(TaggerError::ShapeMismatch {
                    what: what.into(),
                    expected: vec![rows],
                    actual: vec![ids.len()],
                });
            }
        }
        check_tags("pos", pos_tags, config.num_pos_tags)?;
        check_tags("chunk", chunk_tags, config.num_chunk_tags)?;

        let token_tensor = Tensor::from_slice(tokens, (config.batch_size, config.num_steps), device)?;
        let pos_targets = one_hot(Tensor::from_slice(pos_tags, rows, device)?, config.num_pos_tags, 1f32, 0f32)?;
        let chunk_targets = one_hot(
            Tensor::from_slice(chunk_tags, rows, device)?,
            config.num_chunk_tags,
            1f32,
            0f32,
        )?;

        Self::from_tensors(config, token_tensor, pos_targets, chunk_targets)
    }

    /// Number of label rows.
    pub fn rows(&self) -> usize {
        self.pos_targets.dims().first().copied().unwrap_or(0)
    }
}

fn check_dims(what: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    if tensor.dims() != expected {
        return Err(TaggerError::ShapeMismatch {
            what: what.to_string(),
            expected: expected.to_vec(),
            actual: tensor.dims().to_vec(),
        });
    }
    Ok(())
}

/// Fail if any id in a `u32` token tensor is not below `vocab_size`.
pub(crate) fn check_token_range(tokens: &Tensor, vocab_size: usize) -> Result<()> {
    if tokens.elem_count() == 0 {
        return Ok(());
    }
    let max_id = tokens.flatten_all()?.max(0)?.to_scalar::<u32>()?;
    if max_id as usize >= vocab_size {
        return Err(TaggerError::TokenOutOfRange {
            id: max_id,
            vocab_size,
        });
    }
    Ok(())
}

fn check_tags(task: &'static str, ids: &[u32], num_tags: usize) -> Result<()> {
    match ids.iter().find(|&&id| id as usize >= num_tags) {
        Some(&id) => Err(TaggerError::TagOutOfRange { task, id, num_tags }),
        None => Ok(()),
    }
}
