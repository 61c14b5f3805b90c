//! Fixed-geometry batching.
//!
//! Sentences are concatenated into one token stream which is cut into
//! windows of `batch_size * num_steps` tokens. Row `b` of a window holds
//! stream positions `b * num_steps .. (b + 1) * num_steps`. The final
//! window is padded with id 0 (`<pad>` in every vocabulary).

use candle_core::Device;
use jointtag_core::{Batch, TaggerConfig};
use oorandom::Rand32;

/// Id-encoded sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSentence {
    pub tokens: Vec<u32>,
    pub pos: Vec<u32>,
    pub chunks: Vec<u32>,
}

/// One batch worth of flat, batch-major ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub tokens: Vec<u32>,
    pub pos: Vec<u32>,
    pub chunks: Vec<u32>,
}

/// Cuts encoded corpora into windows and tensors.
#[derive(Debug, Clone)]
pub struct Batcher {
    config: TaggerConfig,
}

impl Batcher {
    pub fn new(config: &TaggerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Split the concatenated corpus into windows.
    pub fn windows(&self, sentences: &[EncodedSentence]) -> Vec<Window> {
        let size = self.config.tokens_per_batch();
        let tokens: Vec<u32> = sentences.iter().flat_map(|s| s.tokens.iter().copied()).collect();
        let pos: Vec<u32> = sentences.iter().flat_map(|s| s.pos.iter().copied()).collect();
        let chunks: Vec<u32> = sentences.iter().flat_map(|s| s.chunks.iter().copied()).collect();

        let pad = |slice: &[u32]| {
            let mut out = slice.to_vec();
            out.resize(size, 0);
            out
        };

        tokens
            .chunks(size)
            .zip(pos.chunks(size))
            .zip(chunks.chunks(size))
            .map(|((t, p), c)| Window {
                tokens: pad(t),
                pos: pad(p),
                chunks: pad(c),
            })
            .collect()
    }

    /// Shuffle window order deterministically for `seed`.
    pub fn shuffle(windows: &mut [Window], seed: u64) {
        let mut rng = Rand32::new(seed);
        for i in (1..windows.len()).rev() {
            let j = rng.rand_range(0..(i as u32 + 1)) as usize;
            windows.swap(i, j);
        }
    }

    /// Turn a window into a validated model batch.
    pub fn to_batch(&self, window: &Window, device: &Device) -> jointtag_core::Result<Batch> {
        Batch::from_ids(&self.config, &window.tokens, &window.pos, &window.chunks, device)
    }

    /// Convert every window.
    pub fn to_batches(&self, windows: &[Window], device: &Device) -> jointtag_core::Result<Vec<Batch>> {
        windows.iter().map(|w| self.to_batch(w, device)).collect()
    }
}
