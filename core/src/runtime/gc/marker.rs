use super::heap::{ErasedGc, Heap};
use super::trace::Tracer;

/// Grey worklist for one marking step.
struct Marker {
    worklist: Vec<ErasedGc>,
    tracer: Tracer,
    newly_marked: usize,
}

impl Marker {
    fn new() -> Self {
        Self {
            worklist: Vec::new(),
            tracer: Tracer::new(),
            newly_marked: 0,
        }
    }

    fn shade(&mut self, heap: &mut Heap, object: ErasedGc) {
        if heap.exists(object) && !heap.is_marked(object) {
            heap.mark(object);
            self.newly_marked += 1;
            self.worklist.push(object);
        }
    }

    fn drain(&mut self, heap: &mut Heap) {
        while let Some(object) = self.worklist.pop() {
            heap.trace_index(object, &mut self.tracer);
            for child in self.tracer.take_discovered() {
                self.shade(heap, child);
            }
        }
    }
}

/// Marks the transitive closure of `roots`. Objects marked by an earlier step
/// of the same cycle are not traced again, which lets a collector mark in
/// several rounds. Returns how many objects this call marked.
pub fn mark_from_roots(heap: &mut Heap, roots: &[ErasedGc]) -> usize {
    let mut marker = Marker::new();
    for &root in roots {
        marker.shade(heap, root);
    }
    marker.drain(heap);
    marker.newly_marked
}
