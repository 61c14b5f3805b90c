pub mod conditioning;
pub mod decoders;
pub mod encoder;
pub mod tagger;

pub use conditioning::{HardConditioning, PosConditioning, SoftConditioning, conditioning_for};
pub use decoders::{ChunkDecoder, PosDecoder};
pub use encoder::SharedEncoder;
pub use tagger::{InferenceModel, Prediction, StepOutput, Tagger, TaggerOutput, TrainingModel};
