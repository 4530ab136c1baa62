use crate::result::{AiError, AiResult};

/// A self-contained inference unit.
///
/// Inputs are snapshots handed in by callers (infra services); this crate
/// stays storage-agnostic.
pub trait AiJob: Send + Sync + 'static {
    type Input: Send + Sync + 'static;

    /// The input snapshot the job will run inference on.
    fn input(&self) -> &Self::Input;

    /// Execute inference and return an insight.
    ///
    /// Must not mutate inventory state.
    fn run(&self) -> Result<AiResult, AiError>;
}
