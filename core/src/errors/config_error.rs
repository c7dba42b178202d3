use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid handle configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("`{field}` must be between 1 and {max}")]
    #[diagnostic(help("blocks are addressed with 32-bit slot indices"))]
    BlockSizeOutOfRange { field: &'static str, max: usize },

    #[error("`floor_blocks` must be at least 1")]
    ZeroFloor,
}
