use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;

use super::marker;
use super::sweeper::{self, Forwarding};
use super::trace::Trace;

pub type GcCell<T> = RefCell<T>;

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Gc<T> {
    index: usize,
    _marker: PhantomData<T>,
}

impl<T> Copy for Gc<T> {}

impl<T> Clone for Gc<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Gc<T> {
    pub fn erase(self) -> ErasedGc {
        self.index
    }

    /// Reattaches a type to an erased reference, e.g. one read back from a handle.
    pub fn from_erased(gc: ErasedGc) -> Self {
        Self {
            index: gc,
            _marker: PhantomData,
        }
    }

    pub(crate) fn forward(&mut self, forwarding: &Forwarding) {
        if let Some(index) = forwarding.get(self.index) {
            self.index = index;
        }
    }
}

/// Untyped reference to a managed object. It changes whenever the heap
/// compacts, which is why roots held outside the heap are relocated.
pub type ErasedGc = usize;

pub(super) trait TraceAny: Trace + Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Trace + Any> TraceAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(super) struct GcBox {
    pub(super) marked: bool,
    pub(super) value: Box<dyn TraceAny>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub before: usize,
    pub after: usize,
    pub collected: usize,
    pub moved: usize,
    pub rounds: usize,
    pub groups_resolved: usize,
    pub implicit_groups_consumed: usize,
    pub weak_callbacks: usize,
    pub blocks_released: usize,
}

pub struct Heap {
    slots: Vec<Option<GcBox>>,
    live_count: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live_count: 0,
        }
    }

    pub fn alloc<T: Trace + Any>(&mut self, value: T) -> Gc<T> {
        let index = self.slots.len();
        self.slots.push(Some(GcBox {
            marked: false,
            value: Box::new(value),
        }));
        self.live_count += 1;
        Gc {
            index,
            _marker: PhantomData,
        }
    }

    pub fn get<T: Trace + Any>(&self, gc: Gc<T>) -> Option<&T> {
        self.get_erased(gc.index)
    }

    pub fn get_erased<T: Trace + Any>(&self, gc: ErasedGc) -> Option<&T> {
        self.slots
            .get(gc)
            .and_then(|slot| slot.as_ref())
            .and_then(|boxed| boxed.value.as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: Trace + Any>(&mut self, gc: Gc<T>) -> Option<&mut T> {
        self.slots
            .get_mut(gc.index)
            .and_then(|slot| slot.as_mut())
            .and_then(|boxed| boxed.value.as_any_mut().downcast_mut::<T>())
    }

    pub fn contains<T>(&self, gc: Gc<T>) -> bool {
        self.exists(gc.index)
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Non-moving mark-sweep from an explicit root list.
    pub fn collect(&mut self, roots: &[ErasedGc]) -> CollectStats {
        let before = self.live_count;
        marker::mark_from_roots(self, roots);
        let collected = sweeper::sweep(self);
        self.finish_cycle(collected);
        CollectStats {
            before,
            after: self.live_count,
            collected,
            ..CollectStats::default()
        }
    }

    /// Marks everything reachable from `roots`; returns how many objects were
    /// newly marked. Marks persist until the next sweep or compaction.
    pub fn mark_from_roots(&mut self, roots: &[ErasedGc]) -> usize {
        marker::mark_from_roots(self, roots)
    }

    /// Frees unmarked objects and slides survivors down, forwarding every
    /// reference held inside surviving objects.
    pub fn compact(&mut self) -> (usize, Forwarding) {
        let (collected, forwarding) = sweeper::compact(&mut self.slots);
        self.finish_cycle(collected);
        (collected, forwarding)
    }

    fn finish_cycle(&mut self, collected: usize) {
        self.live_count -= collected;
    }

    pub fn is_marked(&self, index: ErasedGc) -> bool {
        self.slots
            .get(index)
            .and_then(|slot| slot.as_ref())
            .map(|boxed| boxed.marked)
            .unwrap_or(false)
    }

    pub(crate) fn exists(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .and_then(|slot| slot.as_ref())
            .is_some()
    }

    pub(crate) fn mark(&mut self, index: usize) {
        if let Some(Some(slot)) = self.slots.get_mut(index) {
            slot.marked = true;
        }
    }

    pub(crate) fn trace_index(&self, index: usize, tracer: &mut super::trace::Tracer) {
        if let Some(Some(slot)) = self.slots.get(index) {
            slot.value.trace(tracer);
        }
    }

    pub(crate) fn sweep_unmarked(&mut self) -> usize {
        let mut freed = 0;
        for slot in &mut self.slots {
            if let Some(boxed) = slot {
                if boxed.marked {
                    boxed.marked = false;
                } else {
                    *slot = None;
                    freed += 1;
                }
            }
        }
        freed
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
