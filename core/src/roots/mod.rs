//! Roots held outside the managed heap.
//!
//! - [`GlobalHandles`]: strong and weak handles in fixed-size blocks
//! - [`ObjectGroups`]: handles whose liveness is decided together
//! - [`ImplicitRefs`]: one-directional parent -> children keep-alive edges
//! - [`EternalHandles`]: permanent, index-addressed roots

mod block;
mod node;

pub mod eternal;
pub mod global_handles;
pub mod implicit_refs;
pub mod object_groups;

use std::fmt;

pub use block::{Block, BlockStore, Slot};
pub use eternal::EternalHandles;
pub use global_handles::GlobalHandles;
pub use implicit_refs::{ImplicitRefGroup, ImplicitRefs};
pub use node::{NodeState, WeakCallback};
pub use object_groups::{GroupId, ObjectGroup, ObjectGroups, RetainedObjectInfo};

/// Address of one slot in a [`BlockStore`]: the identity of a handle for its
/// whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleLocation {
    block: u32,
    slot: u32,
}

impl HandleLocation {
    pub(crate) fn new(block: u32, slot: u32) -> Self {
        Self { block, slot }
    }

    pub fn block(self) -> u32 {
        self.block
    }

    pub fn slot(self) -> u32 {
        self.slot
    }
}

impl fmt::Display for HandleLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.block, self.slot)
    }
}
