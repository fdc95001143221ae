use thiserror::Error;

use crate::context::ContextError;
use crate::generator::EmitError;
use crate::graph::GraphError;
use crate::loader::LoadError;
use crate::plan::PlanError;

/// Any fatal error of a run.
#[derive(Error, Debug)]
pub enum GypError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl GypError {
    /// The error's kind as reported on stderr, e.g. `DuplicateTargetError`.
    pub fn kind(&self) -> &'static str {
        match self {
            GypError::Context(_) => "GypError",
            GypError::Load(e) => e.kind(),
            GypError::Graph(e) => e.kind(),
            GypError::Plan(e) => e.kind(),
            GypError::Emit(e) => e.kind(),
        }
    }
}
