//! One runtime instance: the managed heap together with every root store that
//! points into it, and the collection pass that ties them together.

use tracing::debug;

use crate::config::HandleConfig;
use crate::errors::GcRootsError;
use crate::roots::{
    EternalHandles, GlobalHandles, HandleLocation, ImplicitRefGroup, ImplicitRefs, ObjectGroups,
};
use crate::runtime::gc::{CollectStats, ErasedGc, Heap};

pub struct Isolate {
    heap: Heap,
    global_handles: GlobalHandles,
    eternal_handles: EternalHandles,
    object_groups: ObjectGroups,
    implicit_refs: ImplicitRefs,
    collections: usize,
}

impl Isolate {
    pub fn new() -> Self {
        Self::with_config(HandleConfig::default())
    }

    pub fn with_config(config: HandleConfig) -> Self {
        Self {
            heap: Heap::new(),
            global_handles: GlobalHandles::with_config(&config),
            eternal_handles: EternalHandles::with_config(&config),
            object_groups: ObjectGroups::new(),
            implicit_refs: ImplicitRefs::new(),
            collections: 0,
        }
    }

    /// Builds an isolate from a JSON configuration document.
    pub fn from_json_config(source: &str) -> Result<Self, GcRootsError> {
        let config = HandleConfig::from_json(source)?;
        Ok(Self::with_config(config))
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn global_handles(&self) -> &GlobalHandles {
        &self.global_handles
    }

    pub fn global_handles_mut(&mut self) -> &mut GlobalHandles {
        &mut self.global_handles
    }

    pub fn eternal_handles(&self) -> &EternalHandles {
        &self.eternal_handles
    }

    pub fn eternal_handles_mut(&mut self) -> &mut EternalHandles {
        &mut self.eternal_handles
    }

    pub fn object_groups_mut(&mut self) -> &mut ObjectGroups {
        &mut self.object_groups
    }

    pub fn implicit_refs_mut(&mut self) -> &mut ImplicitRefs {
        &mut self.implicit_refs
    }

    pub fn collections(&self) -> usize {
        self.collections
    }

    /// Implicit reference groups after coalescing every pending registration.
    pub fn implicit_ref_groups(&mut self) -> &[ImplicitRefGroup] {
        self.compute_object_groups_and_implicit_references();
        self.implicit_refs.groups()
    }

    fn compute_object_groups_and_implicit_references(&mut self) {
        self.object_groups.compute_pending();
        self.implicit_refs.resolve(self.object_groups.parents());
    }

    /// Runs one full, compacting collection pass.
    pub fn collect_all_garbage(&mut self) -> CollectStats {
        let before = self.heap.live_count();
        self.compute_object_groups_and_implicit_references();

        let mut roots = Vec::new();
        self.global_handles
            .iterate_strong_roots(|_, object| roots.push(object));
        self.eternal_handles
            .iterate_roots(|_, object| roots.push(object));
        self.heap.mark_from_roots(&roots);

        let (rounds, groups_resolved, implicit_groups_consumed) = self.mark_grouped_roots();

        let heap = &self.heap;
        self.global_handles
            .identify_weak_handles(|object| heap.is_marked(object));
        let mut near_death = Vec::new();
        self.global_handles
            .iterate_pending_weak_roots(|_, object| near_death.push(object));
        self.heap.mark_from_roots(&near_death);

        let (collected, forwarding) = self.heap.compact();
        self.global_handles.relocate(|object| forwarding.get(object));
        self.eternal_handles.relocate(|object| forwarding.get(object));

        // Registrations made by callbacks belong to the next pass.
        self.object_groups.clear();
        self.implicit_refs.clear();
        let weak_callbacks = self.post_garbage_collection_processing();

        let blocks_released = self.global_handles.end_pass();
        self.collections += 1;

        let stats = CollectStats {
            before,
            after: self.heap.live_count(),
            collected,
            moved: forwarding.moved_count(),
            rounds,
            groups_resolved,
            implicit_groups_consumed,
            weak_callbacks,
            blocks_released,
        };
        debug!(?stats, "collection pass finished");
        stats
    }

    /// Dispatch phase: runs the callback of every near-death handle queued by
    /// [`GlobalHandles::identify_weak_handles`], in classification order.
    /// Returns how many callbacks ran.
    ///
    /// A callback may run a nested collection. That pass dispatches whatever
    /// is still queued, so every callback fires once and the outer loop simply
    /// finds the queue drained.
    pub fn post_garbage_collection_processing(&mut self) -> usize {
        let mut invoked = 0;
        while let Some((location, callback)) = self.global_handles.pop_pending_callback() {
            callback(self, location);
            invoked += 1;
        }
        if invoked > 0 {
            debug!(invoked, "dispatched weak callbacks");
        }
        invoked
    }

    /// Classifies weak handles against `is_reachable` and dispatches the
    /// callbacks of the unreachable ones, without a heap pass.
    pub fn process_weak_handles(&mut self, is_reachable: impl FnMut(ErasedGc) -> bool) -> usize {
        self.global_handles.identify_weak_handles(is_reachable);
        self.post_garbage_collection_processing()
    }

    /// Resolves object groups and implicit references until a round changes
    /// nothing. Each round can only make progress by consuming a group, so
    /// the loop is bounded by the number of registered groups.
    fn mark_grouped_roots(&mut self) -> (usize, usize, usize) {
        let mut rounds = 0;
        let mut groups_resolved = 0;
        let mut implicit_groups_consumed = 0;

        loop {
            rounds += 1;
            let heap = &self.heap;
            let handles = &self.global_handles;
            let mut discovered = Vec::new();

            let resolved = self.object_groups.iterate_object_groups(
                |member| discovered.extend(propagated_object(handles, member)),
                |member| propagated_object(handles, member).is_none_or(|object| !heap.is_marked(object)),
            );
            let consumed = self.implicit_refs.propagate(
                |parent| handles.get(parent).is_some_and(|object| heap.is_marked(object)),
                |child| discovered.extend(propagated_object(handles, child)),
            );

            self.heap.mark_from_roots(&discovered);
            groups_resolved += resolved;
            implicit_groups_consumed += consumed;
            if resolved == 0 && consumed == 0 {
                break;
            }
        }

        (rounds, groups_resolved, implicit_groups_consumed)
    }
}

impl Default for Isolate {
    fn default() -> Self {
        Self::new()
    }
}

/// The object a grouped handle contributes to liveness propagation. Independent
/// weak handles take no part in it.
fn propagated_object(handles: &GlobalHandles, location: HandleLocation) -> Option<ErasedGc> {
    if handles.is_weak(location) && handles.is_independent(location) {
        return None;
    }
    handles.get(location)
}
