//! # Tensor Layout
//!
//! Sequence tensors cross component boundaries in one of two layouts:
//!
//! ```text
//! BatchMajor  [batch, steps, features]   embeddings, decoder inputs
//! TimeMajor   [steps, batch, features]   shared encoder output
//! ```
//!
//! The wrappers make the layout part of each signature. Transpositions
//! happen only in [`BatchMajor::to_time_major`] and
//! [`TimeMajor::to_batch_major`].

use candle_core::Tensor;

use crate::error::{Result, TaggerError};

/// A `[batch, steps, features]` sequence tensor.
#[derive(Debug, Clone)]
pub struct BatchMajor(Tensor);

/// A `[steps, batch, features]` sequence tensor.
#[derive(Debug, Clone)]
pub struct TimeMajor(Tensor);

impl BatchMajor {
    /// Wrap a rank-3 tensor already laid out batch-first.
    pub fn new(tensor: Tensor) -> Result<Self> {
        ensure_rank3(&tensor, "batch-major sequence")?;
        Ok(Self(tensor))
    }

    pub fn tensor(&self) -> &Tensor {
        &self.0
    }

    /// `(batch, steps, features)`
    pub fn dims3(&self) -> Result<(usize, usize, usize)> {
        Ok(self.0.dims3()?)
    }

    pub fn to_time_major(&self) -> Result<TimeMajor> {
        Ok(TimeMajor(self.0.transpose(0, 1)?.contiguous()?))
    }

    /// Merge batch and step axes: `[batch * steps, features]`, row `b * steps + t`.
    pub fn flatten_rows(&self) -> Result<Tensor> {
        let (batch, steps, features) = self.dims3()?;
        Ok(self.0.reshape((batch * steps, features))?)
    }
}

impl TimeMajor {
    /// Wrap a rank-3 tensor already laid out time-first.
    pub fn new(tensor: Tensor) -> Result<Self> {
        ensure_rank3(&tensor, "time-major sequence")?;
        Ok(Self(tensor))
    }

    pub fn tensor(&self) -> &Tensor {
        &self.0
    }

    /// `(steps, batch, features)`
    pub fn dims3(&self) -> Result<(usize, usize, usize)> {
        Ok(self.0.dims3()?)
    }

    pub fn to_batch_major(&self) -> Result<BatchMajor> {
        Ok(BatchMajor(self.0.transpose(0, 1)?.contiguous()?))
    }
}

fn ensure_rank3(tensor: &Tensor, what: &str) -> Result<()> {
    if tensor.rank() != 3 {
        return Err(TaggerError::ShapeMismatch {
            what: what.to_string(),
            expected: vec![0, 0, 0],
            actual: tensor.dims().to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn round_trip_preserves_values() {
        let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let tensor = Tensor::from_vec(data.clone(), (2, 3, 4), &Device::Cpu).unwrap();

        let time_major = BatchMajor::new(tensor).unwrap().to_time_major().unwrap();
        assert_eq!(time_major.dims3().unwrap(), (3, 2, 4));

        // [t=0, b=1] is the second batch row's first step.
        let row: Vec<f32> = time_major.tensor().get(0).unwrap().get(1).unwrap().to_vec1().unwrap();
        assert_eq!(row, vec![12.0, 13.0, 14.0, 15.0]);

        let back = time_major.to_batch_major().unwrap();
        let flat: Vec<f32> = back.tensor().flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(flat, data);
    }

    #[test]
    fn flatten_rows_is_batch_major() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let tensor = Tensor::from_vec(data, (2, 3, 2), &Device::Cpu).unwrap();
        let rows = BatchMajor::new(tensor).unwrap().flatten_rows().unwrap();
        assert_eq!(rows.dims(), &[6, 2]);
        let row4: Vec<f32> = rows.get(4).unwrap().to_vec1().unwrap();
        assert_eq!(row4, vec![8.0, 9.0]);
    }

    #[test]
    fn rank_is_checked() {
        let tensor = Tensor::zeros((2, 3), DType::F32, &Device::Cpu).unwrap();
        assert!(BatchMajor::new(tensor.clone()).is_err());
        assert!(TimeMajor::new(tensor).is_err());
    }
}
