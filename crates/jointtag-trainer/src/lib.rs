//! # Jointtag Trainer
//!
//! Reference harness around `jointtag-core`: reads CoNLL-2000 data,
//! builds vocabularies, cuts the corpus into fixed-size batches and runs
//! the epoch loop with a choice of update schedule.

pub mod batcher;
pub mod data;
pub mod trainer;
pub mod vocab;

pub use batcher::{Batcher, EncodedSentence, Window};
pub use data::{TaggedSentence, load_conll, parse_conll};
pub use trainer::{EpochReport, EpochStats, Schedule, TrainOptions, Trainer, run_training};
pub use vocab::{Vocab, Vocabularies};
