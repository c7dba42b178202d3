use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum InvariantError {
    #[error("block {block} tracks {tracked} live slots but holds {actual}")]
    LiveCountMismatch {
        block: u32,
        tracked: usize,
        actual: usize,
    },

    #[error("block {block} free list has {actual} entries, expected {expected}")]
    FreeListMismatch {
        block: u32,
        expected: usize,
        actual: usize,
    },

    #[error("store tracks {tracked} live slots but its blocks hold {actual}")]
    GlobalCountMismatch { tracked: usize, actual: usize },

    #[error("no block is reserved although blocks were allocated before")]
    MissingFloorBlock,

    #[error("block {block} is empty after shrinking to a floor of {floor}")]
    EmptyBlockAfterShrink { block: u32, floor: usize },
}
