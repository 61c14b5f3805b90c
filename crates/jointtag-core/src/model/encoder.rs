use crate::config::{FORGET_BIAS, TaggerConfig};
use crate::error::Result;
use crate::layout::{BatchMajor, TimeMajor};
use crate::nn::LstmLayer;
use crate::params::ParamScope;

/// Shared LSTM stack over word embeddings, used by both decoders.
///
/// Takes `[batch, steps, word_embedding_size]` and returns
/// `[steps, batch, encoder_size]`.
#[derive(Debug, Clone)]
pub struct SharedEncoder {
    layers: Vec<LstmLayer>,
}

impl SharedEncoder {
    pub fn new(config: &TaggerConfig, scope: &ParamScope<'_>) -> Result<Self> {
        let layers = (0..config.num_shared_layers)
            .map(|i| {
                let input_size = if i == 0 {
                    config.word_embedding_size
                } else {
                    config.encoder_size
                };
                LstmLayer::new(
                    input_size,
                    config.encoder_size,
                    FORGET_BIAS,
                    &scope.pp(&format!("layer_{i}")),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { layers })
    }

    pub fn forward(&self, embedded: &BatchMajor, drop_rate: Option<f32>) -> Result<TimeMajor> {
        let mut hidden = embedded.clone();
        for layer in &self.layers {
            let (output, _) = layer.forward(&hidden, drop_rate)?;
            hidden = output;
        }
        hidden.to_time_major()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamMode, ParamStore};
    use candle_core::{DType, Device, Tensor};

    #[test]
    fn output_is_time_major() {
        let config = TaggerConfig {
            word_embedding_size: 4,
            encoder_size: 6,
            num_shared_layers: 2,
            ..TaggerConfig::default()
        };
        let store = ParamStore::new(0, &Device::Cpu);
        let encoder = SharedEncoder::new(&config, &store.root(ParamMode::Create).pp("encoder")).unwrap();

        let input = Tensor::ones((2, 5, 4), DType::F32, &Device::Cpu).unwrap();
        let output = encoder.forward(&BatchMajor::new(input).unwrap(), None).unwrap();
        assert_eq!(output.dims3().unwrap(), (5, 2, 6));
        assert_eq!(
            store.names().unwrap(),
            vec![
                "encoder/layer_0/bias",
                "encoder/layer_0/kernel",
                "encoder/layer_1/bias",
                "encoder/layer_1/kernel",
            ]
        );
    }
}
