//! # Jointtag Core
//!
//! A multi-task sequence labeller that predicts part-of-speech and chunk
//! tags together. A shared LSTM encoder feeds two task decoders; the
//! chunk decoder is conditioned on the POS decoder's output, either
//! through the embedding of the predicted POS tag or through the
//! softmax-weighted average of POS embeddings.
//!
//! ## Quick Start
//!
//! ```rust
//! use candle_core::Device;
//! use jointtag_core::{Batch, InferenceModel, Objective, ParamMode, ParamStore, Tagger, TaggerConfig, TrainingModel};
//!
//! let config = TaggerConfig {
//!     word_embedding_size: 8,
//!     pos_embedding_size: 4,
//!     encoder_size: 8,
//!     pos_decoder_size: 8,
//!     chunk_decoder_size: 8,
//!     ..TaggerConfig::default()
//! }
//! .with_shape(2, 3)
//! .with_vocab(10, 4, 3);
//!
//! let store = ParamStore::new(config.seed, &Device::Cpu);
//! let mut train = TrainingModel::new(&config, &store, ParamMode::Create).unwrap();
//! let eval = InferenceModel::new(&config, &store, ParamMode::Reuse).unwrap();
//!
//! let batch = Batch::from_ids(&config, &[1, 2, 3, 4, 5, 6], &[0, 1, 2, 3, 0, 1], &[0, 1, 2, 0, 1, 2], &Device::Cpu).unwrap();
//! let step = train.run(Objective::Joint, &batch).unwrap();
//! assert!(step.grad_norm > 0.0);
//!
//! let out = eval.forward(&batch).unwrap();
//! assert!(out.pos.accuracy <= 1.0);
//! ```
pub mod batch;
pub mod config;
pub mod error;
pub mod layout;
pub mod loss;
pub mod model;
pub mod nn;
pub mod optim;
pub mod params;

// Re-export primary API
pub use batch::Batch;
pub use config::TaggerConfig;
pub use error::{Result, TaggerError};
pub use layout::{BatchMajor, TimeMajor};
pub use loss::{TaskOutput, task_loss};
pub use model::{
    HardConditioning, InferenceModel, PosConditioning, Prediction, SoftConditioning, StepOutput,
    Tagger, TaggerOutput, TrainingModel,
};
pub use optim::{Objective, UpdateOp, clip_by_global_norm};
pub use params::{Initializer, ParamMode, ParamScope, ParamStore};
