use tracing::debug;

use super::HandleLocation;
use crate::errors::InvariantError;

/// A storage cell managed by a [`BlockStore`]. Free cells thread the block's
/// free list through `next_free`.
pub trait Slot: Default {
    fn is_free(&self) -> bool;
    fn next_free(&self) -> Option<u32>;
    fn set_next_free(&mut self, next: Option<u32>);
}

/// Fixed-capacity array of slots with an intrusive free list.
#[derive(Debug)]
pub struct Block<S> {
    slots: Box<[S]>,
    first_free: Option<u32>,
    live: usize,
    listed: bool,
}

impl<S: Slot> Block<S> {
    fn new(size: usize) -> Self {
        let mut slots: Vec<S> = (0..size).map(|_| S::default()).collect();
        for (index, slot) in slots.iter_mut().enumerate() {
            let next = index + 1;
            slot.set_next_free((next < size).then_some(next as u32));
        }
        Self {
            slots: slots.into_boxed_slice(),
            first_free: (size > 0).then_some(0),
            live: 0,
            listed: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn pop_free(&mut self) -> Option<u32> {
        let index = self.first_free?;
        let slot = &mut self.slots[index as usize];
        self.first_free = slot.next_free();
        slot.set_next_free(None);
        self.live += 1;
        Some(index)
    }

    fn push_free(&mut self, index: u32) {
        self.slots[index as usize].set_next_free(self.first_free);
        self.first_free = Some(index);
        self.live -= 1;
    }

    fn count_in_use(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_free()).count()
    }

    fn free_list_len(&self) -> usize {
        let mut len = 0;
        let mut cursor = self.first_free;
        while let Some(index) = cursor {
            len += 1;
            if len > self.slots.len() {
                break;
            }
            cursor = self
                .slots
                .get(index as usize)
                .and_then(|slot| slot.next_free());
        }
        len
    }
}

/// Grow-on-demand collection of [`Block`]s.
///
/// Block ids are stable: a released block leaves a vacancy that the next
/// growth reuses, so a [`HandleLocation`] stays valid for as long as its
/// block holds a live slot.
#[derive(Debug)]
pub struct BlockStore<S> {
    blocks: Vec<Option<Block<S>>>,
    vacant: Vec<u32>,
    available: Vec<u32>,
    block_size: usize,
    block_count: usize,
    live: usize,
    ever_grown: bool,
}

impl<S: Slot> BlockStore<S> {
    pub fn new(block_size: usize) -> Self {
        Self {
            blocks: Vec::new(),
            vacant: Vec::new(),
            available: Vec::new(),
            block_size: block_size.max(1),
            block_count: 0,
            live: 0,
            ever_grown: false,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn blocks(&self) -> impl Iterator<Item = (u32, &Block<S>)> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(id, block)| block.as_ref().map(|block| (id as u32, block)))
    }

    /// Takes a free slot, growing by exactly one block when none is left, and
    /// initialises it with `init`.
    pub fn allocate(&mut self, init: impl FnOnce(&mut S)) -> HandleLocation {
        loop {
            let Some(&id) = self.available.last() else {
                self.grow();
                continue;
            };
            let Some(block) = self.blocks.get_mut(id as usize).and_then(Option::as_mut) else {
                self.available.pop();
                continue;
            };
            let Some(slot) = block.pop_free() else {
                block.listed = false;
                self.available.pop();
                continue;
            };
            if block.first_free.is_none() {
                block.listed = false;
                self.available.pop();
            }
            init(&mut block.slots[slot as usize]);
            self.live += 1;
            return HandleLocation::new(id, slot);
        }
    }

    /// Returns a slot to its block's free list. The caller resets the slot
    /// contents first.
    pub fn release(&mut self, location: HandleLocation) {
        let Some(block) = self
            .blocks
            .get_mut(location.block() as usize)
            .and_then(Option::as_mut)
        else {
            return;
        };
        block.push_free(location.slot());
        if !block.listed {
            block.listed = true;
            self.available.push(location.block());
        }
        self.live -= 1;
    }

    pub fn get(&self, location: HandleLocation) -> Option<&S> {
        self.blocks
            .get(location.block() as usize)?
            .as_ref()?
            .slots
            .get(location.slot() as usize)
    }

    pub fn get_mut(&mut self, location: HandleLocation) -> Option<&mut S> {
        self.blocks
            .get_mut(location.block() as usize)?
            .as_mut()?
            .slots
            .get_mut(location.slot() as usize)
    }

    /// Every slot, free or not, in block order.
    pub fn iter(&self) -> impl Iterator<Item = (HandleLocation, &S)> {
        self.blocks().flat_map(|(id, block)| {
            block
                .slots
                .iter()
                .enumerate()
                .map(move |(slot, cell)| (HandleLocation::new(id, slot as u32), cell))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (HandleLocation, &mut S)> {
        self.blocks
            .iter_mut()
            .enumerate()
            .filter_map(|(id, block)| block.as_mut().map(|block| (id as u32, block)))
            .flat_map(|(id, block)| {
                block
                    .slots
                    .iter_mut()
                    .enumerate()
                    .map(move |(slot, cell)| (HandleLocation::new(id, slot as u32), cell))
            })
    }

    fn grow(&mut self) {
        let mut block = Block::new(self.block_size);
        block.listed = true;
        let id = match self.vacant.pop() {
            Some(id) => {
                self.blocks[id as usize] = Some(block);
                id
            }
            None => {
                self.blocks.push(Some(block));
                (self.blocks.len() - 1) as u32
            }
        };
        self.available.push(id);
        self.block_count += 1;
        self.ever_grown = true;
        debug!(block = id, blocks = self.block_count, "grew block store");
    }

    /// Releases empty blocks, highest id first, until only `floor` blocks
    /// remain or no empty block is left. Returns how many were released.
    pub fn shrink(&mut self, floor: usize) -> usize {
        let mut released = 0;
        for id in (0..self.blocks.len()).rev() {
            if self.block_count <= floor {
                break;
            }
            if self.blocks[id].as_ref().is_some_and(Block::is_empty) {
                self.blocks[id] = None;
                self.vacant.push(id as u32);
                self.block_count -= 1;
                released += 1;
            }
        }
        if released > 0 {
            let blocks = &self.blocks;
            self.available
                .retain(|id| blocks.get(*id as usize).is_some_and(Option::is_some));
            while matches!(self.blocks.last(), Some(None)) {
                self.blocks.pop();
            }
            let len = self.blocks.len() as u32;
            self.vacant.retain(|id| *id < len);
            self.vacant.sort_unstable_by(|a, b| b.cmp(a));
            debug!(released, blocks = self.block_count, "shrank block store");
        }
        released
    }

    /// Recomputes every counter from the slots themselves.
    pub fn verify(&self) -> Result<(), InvariantError> {
        let mut total = 0;
        for (id, block) in self.blocks() {
            let actual = block.count_in_use();
            if actual != block.live {
                return Err(InvariantError::LiveCountMismatch {
                    block: id,
                    tracked: block.live,
                    actual,
                });
            }
            let expected = block.capacity() - block.live;
            let free = block.free_list_len();
            if free != expected {
                return Err(InvariantError::FreeListMismatch {
                    block: id,
                    expected,
                    actual: free,
                });
            }
            total += actual;
        }
        if total != self.live {
            return Err(InvariantError::GlobalCountMismatch {
                tracked: self.live,
                actual: total,
            });
        }
        if self.ever_grown && self.block_count == 0 {
            return Err(InvariantError::MissingFloorBlock);
        }
        Ok(())
    }

    /// Checks the post-shrink condition: beyond the floor, no block is empty.
    pub fn verify_shrunk(&self, floor: usize) -> Result<(), InvariantError> {
        if self.block_count <= floor {
            return Ok(());
        }
        match self.blocks().find(|(_, block)| block.is_empty()) {
            Some((block, _)) => Err(InvariantError::EmptyBlockAfterShrink { block, floor }),
            None => Ok(()),
        }
    }
}
