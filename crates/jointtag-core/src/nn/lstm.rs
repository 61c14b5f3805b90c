//! # LSTM Layer
//!
//! A single-layer LSTM unrolled over a batch-major sequence, with a
//! constant bias added to the forget gate before its sigmoid.
//!
//! Parameters (under the layer's scope):
//!
//! ```text
//! kernel  [input_size + hidden_size, 4 * hidden_size]   gate order i, j, f, o
//! bias    [4 * hidden_size]
//! ```

use candle_core::{D, DType, Tensor};
use candle_nn::ops::{dropout, sigmoid};

use crate::error::{Result, TaggerError};
use crate::layout::BatchMajor;
use crate::params::{Initializer, ParamScope};

/// Hidden and cell state after the last time step, each `[batch, hidden_size]`.
#[derive(Debug, Clone)]
pub struct LstmState {
    pub h: Tensor,
    pub c: Tensor,
}

/// LSTM layer with its own parameters.
#[derive(Debug, Clone)]
pub struct LstmLayer {
    kernel: Tensor,
    bias: Tensor,
    input_size: usize,
    hidden_size: usize,
    forget_bias: f64,
}

impl LstmLayer {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        forget_bias: f64,
        scope: &ParamScope<'_>,
    ) -> Result<Self> {
        let kernel = scope.get(
            &[input_size + hidden_size, 4 * hidden_size],
            "kernel",
            Initializer::GlorotUniform,
        )?;
        let bias = scope.get(&[4 * hidden_size], "bias", Initializer::Zeros)?;

        Ok(Self {
            kernel,
            bias,
            input_size,
            hidden_size,
            forget_bias,
        })
    }

    /// Run the layer over `[batch, steps, input_size]` starting from zero state.
    ///
    /// With `drop_rate` set, inverted dropout is applied to the outputs
    /// (never to the carried state).
    pub fn forward(
        &self,
        input: &BatchMajor,
        drop_rate: Option<f32>,
    ) -> Result<(BatchMajor, LstmState)> {
        let (batch, steps, features) = input.dims3()?;
        if features != self.input_size {
            return Err(TaggerError::ShapeMismatch {
                what: "lstm input".into(),
                expected: vec![batch, steps, self.input_size],
                actual: vec![batch, steps, features],
            });
        }

        let device = input.tensor().device();
        let mut h = Tensor::zeros((batch, self.hidden_size), DType::F32, device)?;
        let mut c = Tensor::zeros((batch, self.hidden_size), DType::F32, device)?;
        let mut outputs = Vec::with_capacity(steps);

        for t in 0..steps {
            let x_t = input.tensor().narrow(1, t, 1)?.squeeze(1)?;
            let gates = Tensor::cat(&[&x_t, &h], D::Minus1)?
                .matmul(&self.kernel)?
                .broadcast_add(&self.bias)?;
            let gates = gates.chunk(4, D::Minus1)?;
            let (i, j, f, o) = (&gates[0], &gates[1], &gates[2], &gates[3]);

            let forget = sigmoid(&f.affine(1.0, self.forget_bias)?)?;
            c = ((c * forget)? + (sigmoid(i)? * j.tanh()?)?)?;
            h = (c.tanh()? * sigmoid(o)?)?;
            outputs.push(h.clone());
        }

        let mut output = Tensor::stack(&outputs, 1)?;
        if let Some(rate) = drop_rate {
            output = dropout(&output, rate)?;
        }

        Ok((BatchMajor::new(output)?, LstmState { h, c }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamMode, ParamStore};
    use candle_core::Device;

    fn layer(store: &ParamStore) -> LstmLayer {
        LstmLayer::new(3, 5, 1.0, &store.root(ParamMode::Create).pp("rnn")).unwrap()
    }

    #[test]
    fn output_and_state_shapes() {
        let store = ParamStore::new(0, &Device::Cpu);
        let lstm = layer(&store);
        let input = Tensor::ones((2, 4, 3), DType::F32, &Device::Cpu).unwrap();

        let (output, state) = lstm.forward(&BatchMajor::new(input).unwrap(), None).unwrap();
        assert_eq!(output.dims3().unwrap(), (2, 4, 5));
        assert_eq!(state.h.dims(), &[2, 5]);
        assert_eq!(state.c.dims(), &[2, 5]);
    }

    #[test]
    fn last_output_equals_final_hidden_state() {
        let store = ParamStore::new(0, &Device::Cpu);
        let lstm = layer(&store);
        let input = Tensor::ones((1, 3, 3), DType::F32, &Device::Cpu).unwrap();

        let (output, state) = lstm.forward(&BatchMajor::new(input).unwrap(), None).unwrap();
        let last: Vec<f32> = output.tensor().get(0).unwrap().get(2).unwrap().to_vec1().unwrap();
        let h: Vec<f32> = state.h.get(0).unwrap().to_vec1().unwrap();
        assert_eq!(last, h);
    }

    #[test]
    fn zero_weights_keep_cell_at_zero() {
        // With zero kernel and bias every gate pre-activation is 0, so
        // j = tanh(0) = 0 and the cell never moves away from zero.
        let store = ParamStore::new(0, &Device::Cpu);
        let lstm = layer(&store);
        let zeros = Tensor::zeros((8, 20), DType::F32, &Device::Cpu).unwrap();
        let input = Tensor::ones((1, 2, 3), DType::F32, &Device::Cpu).unwrap();
        let kernel = store.get("rnn/kernel").unwrap().unwrap();
        let var = store
            .vars()
            .into_iter()
            .find(|v| v.as_tensor().id() == kernel.id())
            .unwrap();
        var.set(&zeros).unwrap();

        let (_, state) = lstm.forward(&BatchMajor::new(input).unwrap(), None).unwrap();
        let c: Vec<f32> = state.c.flatten_all().unwrap().to_vec1().unwrap();
        assert!(c.iter().all(|v| v.abs() < 1e-7));
    }

    #[test]
    fn wrong_input_width_rejected() {
        let store = ParamStore::new(0, &Device::Cpu);
        let lstm = layer(&store);
        let input = Tensor::ones((1, 2, 4), DType::F32, &Device::Cpu).unwrap();
        assert!(lstm.forward(&BatchMajor::new(input).unwrap(), None).is_err());
    }
}
