pub mod lstm;

pub use lstm::{LstmLayer, LstmState};
