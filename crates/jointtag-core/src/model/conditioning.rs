//! # POS-to-Chunk Conditioning
//!
//! The chunk decoder sees, next to the shared encoding, a per-token
//! vector derived from the POS decoder. Two strategies exist:
//!
//! - [`HardConditioning`]: embedding of the top-1 POS prediction. The
//!   prediction is discrete, so no gradient reaches the POS decoder
//!   along this path; the POS embedding table still learns.
//! - [`SoftConditioning`]: `softmax(pos_logits) · pos_embedding`, the
//!   expected POS embedding under the decoder's distribution. Fully
//!   differentiable.

use candle_core::{D, Tensor};
use candle_nn::ops::softmax;

use crate::error::Result;

/// Turns POS decoder output into the chunk decoder's conditioning rows.
pub trait PosConditioning: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Produce `[rows, pos_embedding_size]` from POS logits `[rows, num_pos_tags]`,
    /// top-1 POS predictions `u32 [rows]` and the table `[num_pos_tags, pos_embedding_size]`.
    fn condition(
        &self,
        pos_logits: &Tensor,
        pos_predictions: &Tensor,
        pos_embedding: &Tensor,
    ) -> Result<Tensor>;
}

/// Embedding lookup of the predicted POS tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardConditioning;

impl PosConditioning for HardConditioning {
    fn name(&self) -> &'static str {
        "argmax"
    }

    fn condition(
        &self,
        _pos_logits: &Tensor,
        pos_predictions: &Tensor,
        pos_embedding: &Tensor,
    ) -> Result<Tensor> {
        Ok(pos_embedding.index_select(&pos_predictions.detach(), 0)?)
    }
}

/// Probability-weighted average of POS embeddings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftConditioning;

impl PosConditioning for SoftConditioning {
    fn name(&self) -> &'static str {
        "softmax"
    }

    fn condition(
        &self,
        pos_logits: &Tensor,
        _pos_predictions: &Tensor,
        pos_embedding: &Tensor,
    ) -> Result<Tensor> {
        let probs = softmax(pos_logits, D::Minus1)?;
        Ok(probs.matmul(pos_embedding)?)
    }
}

/// Strategy selected by the `argmax` configuration flag.
pub fn conditioning_for(argmax: bool) -> Box<dyn PosConditioning> {
    if argmax {
        Box::new(HardConditioning)
    } else {
        Box::new(SoftConditioning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn table() -> Tensor {
        // Three tags, embedding width two.
        Tensor::new(&[[1f32, 0.0], [0.0, 1.0], [2.0, 2.0]], &Device::Cpu).unwrap()
    }

    #[test]
    fn hard_looks_up_predicted_rows() {
        let logits = Tensor::zeros((2, 3), candle_core::DType::F32, &Device::Cpu).unwrap();
        let predictions = Tensor::new(&[2u32, 0], &Device::Cpu).unwrap();

        let rows = HardConditioning.condition(&logits, &predictions, &table()).unwrap();
        assert_eq!(
            rows.to_vec2::<f32>().unwrap(),
            vec![vec![2.0, 2.0], vec![1.0, 0.0]]
        );
    }

    #[test]
    fn soft_is_expected_embedding() {
        let logits = Tensor::new(&[[0f32, 0.0, 0.0]], &Device::Cpu).unwrap();
        let predictions = Tensor::new(&[0u32], &Device::Cpu).unwrap();

        let rows = SoftConditioning.condition(&logits, &predictions, &table()).unwrap();
        let row = rows.to_vec2::<f32>().unwrap().remove(0);
        assert!((row[0] - 1.0).abs() < 1e-6);
        assert!((row[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn soft_approaches_hard_for_confident_logits() {
        let logits = Tensor::new(&[[0f32, 60.0, 0.0]], &Device::Cpu).unwrap();
        let predictions = Tensor::new(&[1u32], &Device::Cpu).unwrap();

        let soft = SoftConditioning.condition(&logits, &predictions, &table()).unwrap();
        let hard = HardConditioning.condition(&logits, &predictions, &table()).unwrap();
        let diff = (soft - hard).unwrap().abs().unwrap().max_all().unwrap();
        assert!(diff.to_scalar::<f32>().unwrap() < 1e-5);
    }

    #[test]
    fn flag_selects_strategy() {
        assert_eq!(conditioning_for(true).name(), "argmax");
        assert_eq!(conditioning_for(false).name(), "softmax");
    }
}
