use miette::Diagnostic;
use thiserror::Error;

use crate::roots::{HandleLocation, NodeState};

#[derive(Debug, Error, Diagnostic)]
pub enum HandleError {
    #[error("handle {location} does not belong to any block")]
    UnknownLocation { location: HandleLocation },

    #[error("handle {location} is not in use")]
    #[diagnostic(help("the handle was already destroyed or never created"))]
    FreeSlot { location: HandleLocation },

    #[error("handle {location} is {state:?}, expected a strong handle")]
    NotStrong {
        location: HandleLocation,
        state: NodeState,
    },

    #[error("handle {location} is not weak")]
    NotWeak { location: HandleLocation },
}
