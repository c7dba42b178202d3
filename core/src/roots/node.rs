use std::fmt;

use super::block::Slot;
use super::HandleLocation;
use crate::isolate::Isolate;
use crate::runtime::gc::ErasedGc;

/// Invoked once when a weak handle's referent is found unreachable. The
/// callback either destroys the handle, revives it with
/// [`GlobalHandles::clear_weak`](super::GlobalHandles::clear_weak), or leaves
/// it near death. It gets the whole isolate, so it may allocate, register
/// groups or run a nested collection.
pub type WeakCallback = Box<dyn FnOnce(&mut Isolate, HandleLocation)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Free,
    Strong,
    WeakPending,
    NearDeath,
}

impl NodeState {
    pub fn is_in_use(self) -> bool {
        self != NodeState::Free
    }
}

pub(crate) struct Node {
    value: Option<ErasedGc>,
    state: NodeState,
    independent: bool,
    callback: Option<WeakCallback>,
    next_free: Option<u32>,
}

impl Node {
    pub(crate) fn acquire(&mut self, object: ErasedGc) {
        self.value = Some(object);
        self.state = NodeState::Strong;
        self.independent = false;
        self.callback = None;
    }

    pub(crate) fn release(&mut self) {
        self.value = None;
        self.state = NodeState::Free;
        self.independent = false;
        self.callback = None;
    }

    pub(crate) fn value(&self) -> Option<ErasedGc> {
        self.value
    }

    pub(crate) fn set_value(&mut self, object: Option<ErasedGc>) {
        self.value = object;
    }

    pub(crate) fn state(&self) -> NodeState {
        self.state
    }

    pub(crate) fn is_independent(&self) -> bool {
        self.independent
    }

    pub(crate) fn mark_independent(&mut self) {
        self.independent = true;
    }

    pub(crate) fn make_weak(&mut self, callback: WeakCallback, independent: bool) {
        self.state = NodeState::WeakPending;
        self.callback = Some(callback);
        self.independent |= independent;
    }

    pub(crate) fn make_strong(&mut self) {
        self.state = NodeState::Strong;
        self.callback = None;
    }

    pub(crate) fn mark_near_death(&mut self) {
        self.state = NodeState::NearDeath;
    }

    pub(crate) fn take_callback(&mut self) -> Option<WeakCallback> {
        self.callback.take()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self {
            value: None,
            state: NodeState::Free,
            independent: false,
            callback: None,
            next_free: None,
        }
    }
}

impl Slot for Node {
    fn is_free(&self) -> bool {
        self.state == NodeState::Free
    }

    fn next_free(&self) -> Option<u32> {
        self.next_free
    }

    fn set_next_free(&mut self, next: Option<u32>) {
        self.next_free = next;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("value", &self.value)
            .field("state", &self.state)
            .field("independent", &self.independent)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
