use std::cell::RefCell;

use super::heap::{ErasedGc, Gc};
use super::sweeper::Forwarding;

/// Implemented by every value stored in the heap.
///
/// `trace` reports outgoing references to the marker; `relocate` rewrites
/// them once compaction has moved their targets. Values without references
/// keep the empty default.
pub trait Trace {
    fn trace(&self, tracer: &mut Tracer);

    fn relocate(&mut self, _forwarding: &Forwarding) {}
}

/// Collects the references discovered while tracing one object.
#[derive(Default)]
pub struct Tracer {
    discovered: Vec<ErasedGc>,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_erased(&mut self, gc: ErasedGc) {
        self.discovered.push(gc);
    }

    pub(crate) fn take_discovered(&mut self) -> Vec<ErasedGc> {
        std::mem::take(&mut self.discovered)
    }
}

macro_rules! impl_leaf_trace {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Trace for $ty {
                fn trace(&self, _tracer: &mut Tracer) {}
            }
        )*
    };
}

impl_leaf_trace!(bool, i64, f64, String);

impl<T: Trace> Trace for Option<T> {
    fn trace(&self, tracer: &mut Tracer) {
        if let Some(value) = self {
            value.trace(tracer);
        }
    }

    fn relocate(&mut self, forwarding: &Forwarding) {
        if let Some(value) = self {
            value.relocate(forwarding);
        }
    }
}

impl<T: Trace> Trace for Vec<T> {
    fn trace(&self, tracer: &mut Tracer) {
        self.iter().for_each(|value| value.trace(tracer));
    }

    fn relocate(&mut self, forwarding: &Forwarding) {
        self.iter_mut().for_each(|value| value.relocate(forwarding));
    }
}

impl<T: Trace> Trace for RefCell<T> {
    fn trace(&self, tracer: &mut Tracer) {
        self.borrow().trace(tracer);
    }

    fn relocate(&mut self, forwarding: &Forwarding) {
        self.get_mut().relocate(forwarding);
    }
}

impl<T> Trace for Gc<T> {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.mark_erased(self.erase());
    }

    fn relocate(&mut self, forwarding: &Forwarding) {
        self.forward(forwarding);
    }
}
