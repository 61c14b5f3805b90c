//! Cross-entropy loss and top-1 accuracy for one tagging task.

use candle_core::{D, DType, Tensor};
use candle_nn::ops::log_softmax;

use crate::error::{Result, TaggerError};

/// Loss and metrics of one task over one batch.
#[derive(Debug, Clone)]
pub struct TaskOutput {
    /// Mean softmax cross-entropy, a differentiable scalar.
    pub loss: Tensor,
    /// Fraction of rows whose top-1 prediction matches the label.
    pub accuracy: f32,
    /// Top-1 class per row, `u32 [rows]`.
    pub predictions: Tensor,
    /// Class of each one-hot label row, `u32 [rows]`.
    pub targets: Tensor,
}

impl TaskOutput {
    /// Scalar value of the loss.
    pub fn loss_value(&self) -> Result<f32> {
        Ok(self.loss.to_scalar::<f32>()?)
    }
}

/// Score `logits [rows, classes]` against one-hot `labels [rows, classes]`.
///
/// Accuracy is the number of matching rows divided by `normalizer`, which
/// the model sets to `batch_size * num_steps`.
pub fn task_loss(logits: &Tensor, labels: &Tensor, normalizer: usize) -> Result<TaskOutput> {
    let (rows, classes) = logits.dims2()?;
    if labels.dims() != logits.dims() {
        return Err(TaggerError::ShapeMismatch {
            what: "one-hot labels".into(),
            expected: vec![rows, classes],
            actual: labels.dims().to_vec(),
        });
    }

    let log_probs = log_softmax(logits, D::Minus1)?;
    let cross_entropy = (labels * log_probs)?.sum(D::Minus1)?.neg()?;
    let loss = cross_entropy.mean_all()?;

    let targets = labels.argmax(D::Minus1)?;
    let predictions = logits.argmax(D::Minus1)?;
    let num_true = predictions
        .eq(&targets)?
        .to_dtype(DType::F32)?
        .sum_all()?
        .to_scalar::<f32>()?;

    Ok(TaskOutput {
        loss,
        accuracy: num_true / normalizer as f32,
        predictions,
        targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn one_hot(classes: &[usize], depth: usize) -> Tensor {
        let mut data = vec![0f32; classes.len() * depth];
        for (row, &class) in classes.iter().enumerate() {
            data[row * depth + class] = 1.0;
        }
        Tensor::from_vec(data, (classes.len(), depth), &Device::Cpu).unwrap()
    }

    fn peaked(classes: &[usize], depth: usize, peak: f32) -> Tensor {
        let mut data = vec![0f32; classes.len() * depth];
        for (row, &class) in classes.iter().enumerate() {
            data[row * depth + class] = peak;
        }
        Tensor::from_vec(data, (classes.len(), depth), &Device::Cpu).unwrap()
    }

    #[test]
    fn accuracy_counts_matching_rows() {
        // batch_size = 2, num_steps = 3, four tags.
        let labels = one_hot(&[0, 1, 2, 3, 0, 1], 4);
        let logits = peaked(&[0, 1, 3, 3, 2, 1], 4, 100.0);

        let out = task_loss(&logits, &labels, 6).unwrap();
        assert_eq!(out.accuracy, 4.0 / 6.0);
        assert_eq!(out.predictions.to_vec1::<u32>().unwrap(), vec![0, 1, 3, 3, 2, 1]);
        assert_eq!(out.targets.to_vec1::<u32>().unwrap(), vec![0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn confident_correct_logits_give_zero_loss() {
        let labels = one_hot(&[2, 0, 1], 3);
        let logits = peaked(&[2, 0, 1], 3, 100.0);

        let out = task_loss(&logits, &labels, 3).unwrap();
        let loss = out.loss_value().unwrap();
        assert!(loss >= 0.0);
        assert!(loss < 1e-6);
        assert_eq!(out.accuracy, 1.0);
    }

    #[test]
    fn uniform_logits_give_log_classes() {
        let labels = one_hot(&[0, 3], 4);
        let logits = Tensor::zeros((2, 4), DType::F32, &Device::Cpu).unwrap();

        let loss = task_loss(&logits, &labels, 2).unwrap().loss_value().unwrap();
        assert!((loss - 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn lower_loss_means_higher_accuracy_on_dominant_class() {
        let labels = one_hot(&[1, 1, 1, 1, 1, 0], 3);
        let good = peaked(&[1, 1, 1, 1, 1, 1], 3, 4.0);
        let bad = peaked(&[2, 2, 2, 1, 1, 1], 3, 4.0);

        let good = task_loss(&good, &labels, 6).unwrap();
        let bad = task_loss(&bad, &labels, 6).unwrap();
        assert!(good.loss_value().unwrap() < bad.loss_value().unwrap());
        assert!(good.accuracy > bad.accuracy);
    }

    #[test]
    fn mismatched_labels_rejected() {
        let labels = one_hot(&[0, 1], 3);
        let logits = Tensor::zeros((2, 4), DType::F32, &Device::Cpu).unwrap();
        let err = task_loss(&logits, &labels, 2).unwrap_err();
        assert!(matches!(err, TaggerError::ShapeMismatch { .. }));
    }
}
