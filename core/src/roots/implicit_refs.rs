//! Implicit references: a live parent keeps its children alive. Unlike object
//! groups, the edge only points one way.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{GroupId, HandleLocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitRefGroup {
    parent: HandleLocation,
    children: Vec<HandleLocation>,
}

impl ImplicitRefGroup {
    pub fn parent(&self) -> HandleLocation {
        self.parent
    }

    pub fn children(&self) -> &[HandleLocation] {
        &self.children
    }
}

#[derive(Debug, Default)]
pub struct ImplicitRefs {
    groups: Vec<ImplicitRefGroup>,
    pending: Vec<(GroupId, HandleLocation)>,
}

impl ImplicitRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `child` as kept alive by whichever handle the object group
    /// mechanism associates with `id`.
    pub fn set_reference_from_group(&mut self, id: GroupId, child: HandleLocation) {
        self.pending.push((id, child));
    }

    pub fn add_implicit_references(&mut self, parent: HandleLocation, children: &[HandleLocation]) {
        self.attach(parent, children.iter().copied());
    }

    /// Turns pending id registrations into groups, in ascending id order.
    /// Ids without a parent handle are dropped.
    pub fn resolve(&mut self, parents: &FxHashMap<GroupId, HandleLocation>) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let mut by_id: BTreeMap<GroupId, Vec<HandleLocation>> = BTreeMap::new();
        for (id, child) in self.pending.drain(..) {
            by_id.entry(id).or_default().push(child);
        }

        let mut resolved = 0;
        for (id, children) in by_id {
            match parents.get(&id) {
                Some(&parent) => {
                    self.attach(parent, children);
                    resolved += 1;
                }
                None => debug!(
                    id = id.raw(),
                    children = children.len(),
                    "dropping implicit references of a group without members"
                ),
            }
        }
        resolved
    }

    fn attach(&mut self, parent: HandleLocation, children: impl IntoIterator<Item = HandleLocation>) {
        match self.groups.iter_mut().find(|group| group.parent == parent) {
            Some(group) => group.children.extend(children),
            None => self.groups.push(ImplicitRefGroup {
                parent,
                children: children.into_iter().collect(),
            }),
        }
    }

    /// Marks the children of every group whose parent is live and consumes
    /// that group. Groups with a parent not yet known to be live stay for a
    /// later round. Returns how many groups were consumed.
    pub fn propagate<L, M>(&mut self, mut is_live: L, mut mark: M) -> usize
    where
        L: FnMut(HandleLocation) -> bool,
        M: FnMut(HandleLocation),
    {
        let mut consumed = 0;
        self.groups.retain(|group| {
            if !is_live(group.parent) {
                return true;
            }
            for &child in &group.children {
                mark(child);
            }
            consumed += 1;
            false
        });
        consumed
    }

    pub fn groups(&self) -> &[ImplicitRefGroup] {
        &self.groups
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
