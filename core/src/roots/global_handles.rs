//! The global handle table.
//!
//! Every handle lives in a [`Node`] owned by a block of the table's
//! [`BlockStore`]. Strong nodes are roots. Weak nodes are roots only until a
//! collection finds their referent unreachable; they then turn near death and
//! their callback runs once the collection has finished moving objects.

use std::collections::VecDeque;

use tracing::warn;

use super::block::BlockStore;
use super::node::{Node, NodeState, WeakCallback};
use super::HandleLocation;
use crate::config::HandleConfig;
use crate::errors::{HandleError, InvariantError};
use crate::isolate::Isolate;
use crate::runtime::gc::ErasedGc;

#[derive(Debug)]
pub struct GlobalHandles {
    store: BlockStore<Node>,
    floor_blocks: usize,
    verify_on_end_pass: bool,
    pending_callbacks: VecDeque<HandleLocation>,
}

impl GlobalHandles {
    pub fn new() -> Self {
        Self::with_config(&HandleConfig::default())
    }

    pub fn with_config(config: &HandleConfig) -> Self {
        Self {
            store: BlockStore::new(config.block_size),
            floor_blocks: config.floor_blocks.max(1),
            verify_on_end_pass: config.verify_on_end_pass,
            pending_callbacks: VecDeque::new(),
        }
    }

    /// Creates a strong handle to `object`.
    pub fn create(&mut self, object: ErasedGc) -> HandleLocation {
        self.store.allocate(|node| node.acquire(object))
    }

    /// Frees a handle in any in-use state.
    pub fn destroy(&mut self, location: HandleLocation) -> Result<(), HandleError> {
        self.in_use_node_mut(location)?.release();
        self.store.release(location);
        Ok(())
    }

    /// Turns a strong handle weak. With `independent` set, the handle is later
    /// resolved by its own reachability only, never through object groups or
    /// implicit references.
    pub fn make_weak<F>(
        &mut self,
        location: HandleLocation,
        callback: F,
        independent: bool,
    ) -> Result<(), HandleError>
    where
        F: FnOnce(&mut Isolate, HandleLocation) + 'static,
    {
        let node = self.in_use_node_mut(location)?;
        if node.state() != NodeState::Strong {
            return Err(HandleError::NotStrong {
                location,
                state: node.state(),
            });
        }
        let callback: WeakCallback = Box::new(callback);
        node.make_weak(callback, independent);
        Ok(())
    }

    /// Revives a weak or near-death handle back to strong. Any callback that
    /// has not fired yet is dropped.
    pub fn clear_weak(&mut self, location: HandleLocation) -> Result<(), HandleError> {
        let node = self.in_use_node_mut(location)?;
        match node.state() {
            NodeState::WeakPending | NodeState::NearDeath => {
                node.make_strong();
                Ok(())
            }
            _ => Err(HandleError::NotWeak { location }),
        }
    }

    pub fn mark_independent(&mut self, location: HandleLocation) -> Result<(), HandleError> {
        self.in_use_node_mut(location)?.mark_independent();
        Ok(())
    }

    pub fn get(&self, location: HandleLocation) -> Option<ErasedGc> {
        self.store
            .get(location)
            .filter(|node| node.state().is_in_use())
            .and_then(Node::value)
    }

    pub fn set(&mut self, location: HandleLocation, object: ErasedGc) -> Result<(), HandleError> {
        self.in_use_node_mut(location)?.set_value(Some(object));
        Ok(())
    }

    pub fn state(&self, location: HandleLocation) -> Option<NodeState> {
        self.store.get(location).map(Node::state)
    }

    pub fn is_weak(&self, location: HandleLocation) -> bool {
        self.state(location) == Some(NodeState::WeakPending)
    }

    pub fn is_near_death(&self, location: HandleLocation) -> bool {
        self.state(location) == Some(NodeState::NearDeath)
    }

    pub fn is_independent(&self, location: HandleLocation) -> bool {
        self.store
            .get(location)
            .is_some_and(|node| node.state().is_in_use() && node.is_independent())
    }

    pub fn block_count(&self) -> usize {
        self.store.block_count()
    }

    pub fn global_handles_count(&self) -> usize {
        self.store.live_count()
    }

    pub fn number_of_weak_handles(&self) -> usize {
        self.count_in_state(NodeState::WeakPending)
    }

    pub fn number_of_near_death_handles(&self) -> usize {
        self.count_in_state(NodeState::NearDeath)
    }

    fn count_in_state(&self, state: NodeState) -> usize {
        self.store
            .iter()
            .filter(|(_, node)| node.state() == state)
            .count()
    }

    pub fn iterate_strong_roots(&self, f: impl FnMut(HandleLocation, ErasedGc)) {
        self.iterate_in_state(NodeState::Strong, f);
    }

    pub fn iterate_weak_roots(&self, f: impl FnMut(HandleLocation, ErasedGc)) {
        self.iterate_in_state(NodeState::WeakPending, f);
    }

    pub fn iterate_near_death(&self, f: impl FnMut(HandleLocation, ErasedGc)) {
        self.iterate_in_state(NodeState::NearDeath, f);
    }

    fn iterate_in_state(&self, state: NodeState, mut f: impl FnMut(HandleLocation, ErasedGc)) {
        for (location, node) in self.store.iter() {
            if node.state() != state {
                continue;
            }
            if let Some(object) = node.value() {
                f(location, object);
            }
        }
    }

    /// Handles classified near death whose callbacks have not been dispatched.
    /// A collector keeps their referents alive for the current pass.
    pub fn iterate_pending_weak_roots(&self, mut f: impl FnMut(HandleLocation, ErasedGc)) {
        for &location in &self.pending_callbacks {
            if let Some(object) = self
                .store
                .get(location)
                .filter(|node| node.state() == NodeState::NearDeath)
                .and_then(Node::value)
            {
                f(location, object);
            }
        }
    }

    /// Classify phase: every weak handle whose referent is not reachable
    /// becomes near death and is queued for dispatch. Returns how many.
    pub fn identify_weak_handles(&mut self, mut is_reachable: impl FnMut(ErasedGc) -> bool) -> usize {
        let mut found = 0;
        for (location, node) in self.store.iter_mut() {
            if node.state() != NodeState::WeakPending {
                continue;
            }
            if node.value().is_some_and(&mut is_reachable) {
                continue;
            }
            node.mark_near_death();
            self.pending_callbacks.push_back(location);
            found += 1;
        }
        found
    }

    /// Takes the next queued near-death handle whose callback is still armed.
    /// Queued handles that were destroyed or revived in the meantime are
    /// skipped.
    pub fn pop_pending_callback(&mut self) -> Option<(HandleLocation, WeakCallback)> {
        while let Some(location) = self.pending_callbacks.pop_front() {
            let callback = match self.store.get_mut(location) {
                Some(node) if node.state() == NodeState::NearDeath => node.take_callback(),
                _ => None,
            };
            if let Some(callback) = callback {
                return Some((location, callback));
            }
        }
        None
    }

    /// Rewrites every in-use handle through `forward`. A referent that did not
    /// survive leaves the handle empty.
    pub fn relocate(&mut self, mut forward: impl FnMut(ErasedGc) -> Option<ErasedGc>) {
        for (_, node) in self.store.iter_mut() {
            if node.state().is_in_use() {
                let moved = node.value().and_then(&mut forward);
                node.set_value(moved);
            }
        }
    }

    /// Shrinks the block store to its floor once a pass has finished.
    pub fn end_pass(&mut self) -> usize {
        let leaked = self.number_of_near_death_handles();
        if leaked > 0 {
            warn!(leaked, "weak handles left near death after their callbacks");
        }
        let released = self.store.shrink(self.floor_blocks);
        if cfg!(debug_assertions) && self.verify_on_end_pass {
            let verified = self
                .verify_block_invariants()
                .and_then(|()| self.store.verify_shrunk(self.floor_blocks));
            if let Err(err) = verified {
                panic!("global handle table corrupted: {err}");
            }
        }
        released
    }

    pub fn verify_block_invariants(&self) -> Result<(), InvariantError> {
        self.store.verify()
    }

    fn in_use_node_mut(&mut self, location: HandleLocation) -> Result<&mut Node, HandleError> {
        let node = self
            .store
            .get_mut(location)
            .ok_or(HandleError::UnknownLocation { location })?;
        if node.state().is_in_use() {
            Ok(node)
        } else {
            Err(HandleError::FreeSlot { location })
        }
    }
}

impl Default for GlobalHandles {
    fn default() -> Self {
        Self::new()
    }
}
