use super::heap::{ErasedGc, GcBox, Heap};
use super::trace::Trace;

pub fn sweep(heap: &mut Heap) -> usize {
    heap.sweep_unmarked()
}

/// Old-to-new address map produced by a compaction.
#[derive(Debug, Default)]
pub struct Forwarding {
    targets: Vec<Option<ErasedGc>>,
}

impl Forwarding {
    /// New address of `old`, or `None` if the object was reclaimed.
    pub fn get(&self, old: ErasedGc) -> Option<ErasedGc> {
        self.targets.get(old).copied().flatten()
    }

    pub fn moved_count(&self) -> usize {
        self.targets
            .iter()
            .enumerate()
            .filter(|(old, target)| target.is_some_and(|new| new != *old))
            .count()
    }
}

pub(super) fn compact(slots: &mut Vec<Option<GcBox>>) -> (usize, Forwarding) {
    let mut targets = vec![None; slots.len()];
    let mut survivors = Vec::with_capacity(slots.len());
    let mut freed = 0;

    for (old, slot) in slots.drain(..).enumerate() {
        match slot {
            Some(mut boxed) if boxed.marked => {
                boxed.marked = false;
                targets[old] = Some(survivors.len());
                survivors.push(Some(boxed));
            }
            Some(_) => freed += 1,
            None => {}
        }
    }

    let forwarding = Forwarding { targets };
    for boxed in survivors.iter_mut().flatten() {
        boxed.value.relocate(&forwarding);
    }
    *slots = survivors;
    (freed, forwarding)
}
