//! Eternal handles: roots that are never released, addressed by index.

use super::block::{BlockStore, Slot};
use super::HandleLocation;
use crate::config::HandleConfig;
use crate::runtime::gc::ErasedGc;

#[derive(Debug, Default)]
struct EternalSlot {
    value: Option<ErasedGc>,
    in_use: bool,
    next_free: Option<u32>,
}

impl Slot for EternalSlot {
    fn is_free(&self) -> bool {
        !self.in_use
    }

    fn next_free(&self) -> Option<u32> {
        self.next_free
    }

    fn set_next_free(&mut self, next: Option<u32>) {
        self.next_free = next;
    }
}

#[derive(Debug)]
pub struct EternalHandles {
    store: BlockStore<EternalSlot>,
    size: usize,
}

impl EternalHandles {
    pub fn new() -> Self {
        Self::with_config(&HandleConfig::default())
    }

    pub fn with_config(config: &HandleConfig) -> Self {
        Self {
            store: BlockStore::new(config.eternal_block_size),
            size: 0,
        }
    }

    /// Stores `object` permanently and returns its index. Indices start at 0
    /// and grow by one per call.
    pub fn create(&mut self, object: ErasedGc) -> usize {
        let location = self.store.allocate(|slot| {
            slot.value = Some(object);
            slot.in_use = true;
        });
        let index = self.index_of(location);
        debug_assert_eq!(index, self.size, "eternal indices must be dense");
        self.size += 1;
        index
    }

    /// The current, possibly relocated, reference stored at `index`.
    pub fn get(&self, index: usize) -> Option<ErasedGc> {
        self.store
            .get(self.location_of(index)?)
            .filter(|slot| slot.in_use)
            .and_then(|slot| slot.value)
    }

    pub fn number_of_handles(&self) -> usize {
        self.size
    }

    pub fn block_count(&self) -> usize {
        self.store.block_count()
    }

    pub fn iterate_roots(&self, mut f: impl FnMut(usize, ErasedGc)) {
        for (location, slot) in self.store.iter() {
            if let Some(object) = slot.value.filter(|_| slot.in_use) {
                f(self.index_of(location), object);
            }
        }
    }

    pub fn relocate(&mut self, mut forward: impl FnMut(ErasedGc) -> Option<ErasedGc>) {
        for (_, slot) in self.store.iter_mut() {
            if slot.in_use {
                slot.value = slot.value.and_then(&mut forward);
            }
        }
    }

    fn index_of(&self, location: HandleLocation) -> usize {
        location.block() as usize * self.store.block_size() + location.slot() as usize
    }

    fn location_of(&self, index: usize) -> Option<HandleLocation> {
        let block_size = self.store.block_size();
        let block = u32::try_from(index / block_size).ok()?;
        Some(HandleLocation::new(block, (index % block_size) as u32))
    }
}

impl Default for EternalHandles {
    fn default() -> Self {
        Self::new()
    }
}
