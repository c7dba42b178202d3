//! Object groups: handles whose liveness is decided together.
//!
//! Groups are registered eagerly with a full member list, or lazily by
//! attaching handles to a [`GroupId`] one at a time. Lazy registrations are
//! coalesced into groups right before each traversal.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::HandleLocation;

/// Embedder-supplied id keying lazily built groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u128);

impl GroupId {
    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u128 {
        self.0
    }
}

impl From<u128> for GroupId {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

/// An external resource attached to a group, released when the group is
/// found live. `dispose` consumes the box, so it runs at most once.
pub trait RetainedObjectInfo {
    fn dispose(self: Box<Self>);

    fn label(&self) -> &str;

    fn hash_code(&self) -> i64 {
        0
    }

    fn element_count(&self) -> Option<usize> {
        None
    }
}

pub struct ObjectGroup {
    id: Option<GroupId>,
    members: Vec<HandleLocation>,
    info: Option<Box<dyn RetainedObjectInfo>>,
}

impl ObjectGroup {
    /// The id this group was built from; `None` for eagerly added groups.
    pub fn id(&self) -> Option<GroupId> {
        self.id
    }

    pub fn members(&self) -> &[HandleLocation] {
        &self.members
    }

    pub fn info_label(&self) -> Option<&str> {
        self.info.as_deref().map(|info| info.label())
    }
}

impl fmt::Debug for ObjectGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectGroup")
            .field("id", &self.id)
            .field("members", &self.members)
            .field("info", &self.info_label())
            .finish()
    }
}

#[derive(Default)]
pub struct ObjectGroups {
    groups: Vec<ObjectGroup>,
    pending_members: Vec<(GroupId, HandleLocation)>,
    pending_infos: FxHashMap<GroupId, Box<dyn RetainedObjectInfo>>,
    parents: FxHashMap<GroupId, HandleLocation>,
}

impl ObjectGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object_group(
        &mut self,
        members: &[HandleLocation],
        info: Option<Box<dyn RetainedObjectInfo>>,
    ) {
        self.groups.push(ObjectGroup {
            id: None,
            members: members.to_vec(),
            info,
        });
    }

    pub fn set_object_group_id(&mut self, location: HandleLocation, id: GroupId) {
        self.pending_members.push((id, location));
    }

    pub fn set_retained_object_info(&mut self, id: GroupId, info: Box<dyn RetainedObjectInfo>) {
        if let Some(replaced) = self.pending_infos.insert(id, info) {
            replaced.dispose();
        }
    }

    /// Coalesces lazy registrations into groups, in ascending id order with
    /// members in attachment order. Registrations for an id whose group is
    /// still registered join that group. Retained info waits for its group
    /// until the end of the pass. Returns how many groups were built.
    pub fn compute_pending(&mut self) -> usize {
        if self.pending_members.is_empty() && self.pending_infos.is_empty() {
            return 0;
        }

        let mut by_id: BTreeMap<GroupId, Vec<HandleLocation>> = BTreeMap::new();
        for (id, location) in self.pending_members.drain(..) {
            self.parents.entry(id).or_insert(location);
            by_id.entry(id).or_default().push(location);
        }

        let mut built = 0;
        for (id, members) in by_id {
            match self.group_mut(id) {
                Some(group) => group.members.extend(members),
                None => {
                    self.groups.push(ObjectGroup {
                        id: Some(id),
                        members,
                        info: None,
                    });
                    built += 1;
                }
            }
        }

        let infos = std::mem::take(&mut self.pending_infos);
        for (id, info) in infos {
            match self.group_mut(id) {
                Some(group) => {
                    if let Some(replaced) = group.info.replace(info) {
                        replaced.dispose();
                    }
                }
                None => {
                    self.pending_infos.insert(id, info);
                }
            }
        }
        built
    }

    fn group_mut(&mut self, id: GroupId) -> Option<&mut ObjectGroup> {
        self.groups.iter_mut().find(|group| group.id == Some(id))
    }

    /// First handle attached to each id, as seen by the coalescing so far.
    pub fn parents(&self) -> &FxHashMap<GroupId, HandleLocation> {
        &self.parents
    }

    /// Resolves every group that `can_skip` cannot skip entirely.
    ///
    /// Members are queried in order and the query stops at the first member
    /// that cannot be skipped. A group whose members can all be skipped stays
    /// registered untouched. Any other group has every member passed to
    /// `visit`, its retained info disposed, and is removed. Returns the number
    /// of groups resolved.
    pub fn iterate_object_groups<V, S>(&mut self, mut visit: V, mut can_skip: S) -> usize
    where
        V: FnMut(HandleLocation),
        S: FnMut(HandleLocation) -> bool,
    {
        self.compute_pending();

        let mut resolved = 0;
        let mut remaining = Vec::with_capacity(self.groups.len());
        for group in std::mem::take(&mut self.groups) {
            if group.members.iter().all(|&member| can_skip(member)) {
                remaining.push(group);
                continue;
            }
            trace!(members = group.members.len(), "resolving object group");
            for &member in &group.members {
                visit(member);
            }
            if let Some(info) = group.info {
                info.dispose();
            }
            resolved += 1;
        }
        self.groups = remaining;
        resolved
    }

    /// Ends the pass: drops every group and pending registration without
    /// disposing the info of a group. Info whose id never gained a member is
    /// disposed here.
    pub fn clear(&mut self) {
        if !self.groups.is_empty() {
            debug!(unresolved = self.groups.len(), "dropping unresolved object groups");
        }
        for (id, info) in self.pending_infos.drain() {
            let has_members = self.groups.iter().any(|group| group.id == Some(id))
                || self.pending_members.iter().any(|&(member_id, _)| member_id == id);
            if !has_members {
                debug!(id = id.raw(), "disposing retained info of a group without members");
                info.dispose();
            }
        }
        self.groups.clear();
        self.pending_members.clear();
        self.parents.clear();
    }

    pub fn groups(&self) -> &[ObjectGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl fmt::Debug for ObjectGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectGroups")
            .field("groups", &self.groups)
            .field("pending_members", &self.pending_members)
            .field("pending_infos", &self.pending_infos.len())
            .finish()
    }
}
