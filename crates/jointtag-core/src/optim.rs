//! # Gradient-Clipped Adam Updates
//!
//! An [`UpdateOp`] turns a scalar objective into one optimisation step:
//! back-propagate, clip the global gradient norm, apply Adam. Each op
//! keeps its own moment estimates, so alternating between the POS, chunk
//! and joint ops never mixes their statistics.

use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use tracing::trace;

use crate::config::TaggerConfig;
use crate::error::Result;

/// Which loss an update operation minimises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Objective {
    Pos,
    Chunk,
    /// Unweighted sum of the POS and chunk losses.
    Joint,
}

impl Objective {
    pub const ALL: [Objective; 3] = [Objective::Pos, Objective::Chunk, Objective::Joint];

    pub fn name(self) -> &'static str {
        match self {
            Objective::Pos => "pos",
            Objective::Chunk => "chunk",
            Objective::Joint => "joint",
        }
    }
}

/// Rescale the gradients of `vars` so their combined L2 norm is at most `max_norm`.
///
/// Returns the norm before clipping. Parameters without a gradient are
/// skipped and stay without one.
pub fn clip_by_global_norm(grads: &mut GradStore, vars: &[Var], max_norm: f32) -> Result<f32> {
    let mut sum_sq = 0f32;
    for var in vars {
        if let Some(grad) = grads.get(var) {
            sum_sq += grad.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }
    let global_norm = sum_sq.sqrt();

    if global_norm > max_norm {
        let scale = f64::from(max_norm / global_norm);
        for var in vars {
            if let Some(clipped) = grads.get(var).map(|g| g.affine(scale, 0.0)).transpose()? {
                grads.insert(var, clipped);
            }
        }
    }

    Ok(global_norm)
}

/// One optimisation step against a fixed objective.
pub struct UpdateOp {
    objective: Objective,
    vars: Vec<Var>,
    optimizer: AdamW,
    max_grad_norm: f32,
    steps: usize,
}

impl UpdateOp {
    /// Build an op over every trainable parameter in `vars`.
    pub fn new(objective: Objective, vars: Vec<Var>, config: &TaggerConfig) -> Result<Self> {
        let params = ParamsAdamW {
            lr: config.learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
        };
        let optimizer = AdamW::new(vars.clone(), params)?;

        Ok(Self {
            objective,
            vars,
            optimizer,
            max_grad_norm: config.max_grad_norm,
            steps: 0,
        })
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Number of times this op has been applied.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Minimise `loss` by one step, mutating the parameters in place.
    ///
    /// Returns the global gradient norm before clipping.
    pub fn apply(&mut self, loss: &Tensor) -> Result<f32> {
        let mut grads = loss.backward()?;
        let grad_norm = clip_by_global_norm(&mut grads, &self.vars, self.max_grad_norm)?;
        self.optimizer.step(&grads)?;
        self.steps += 1;

        trace!(
            objective = self.objective.name(),
            step = self.steps,
            grad_norm,
            "applied update"
        );
        Ok(grad_norm)
    }
}
