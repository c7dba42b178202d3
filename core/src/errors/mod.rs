mod config_error;
mod handle_error;
mod invariant_error;

pub use config_error::ConfigError;
pub use handle_error::HandleError;
pub use invariant_error::InvariantError;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type wrapping every failure this crate reports.
#[derive(Debug, Error, Diagnostic)]
pub enum GcRootsError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Handle(#[from] HandleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Invariant(#[from] InvariantError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}
