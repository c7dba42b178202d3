//! Root handles for a moving, tracing garbage collector.
//!
//! An [`Isolate`] owns a managed [`Heap`](runtime::gc::Heap) plus every root
//! store pointing into it: the strong/weak [`GlobalHandles`] table, the
//! [`ObjectGroups`] and [`ImplicitRefs`] registries, and the permanent
//! [`EternalHandles`] pool.

pub mod config;
pub mod errors;
pub mod isolate;
pub mod roots;
pub mod runtime;

pub use config::HandleConfig;
pub use errors::GcRootsError;
pub use isolate::Isolate;
pub use roots::{
    EternalHandles, GlobalHandles, GroupId, HandleLocation, ImplicitRefGroup, ImplicitRefs,
    NodeState, ObjectGroups, RetainedObjectInfo,
};
