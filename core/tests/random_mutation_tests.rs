use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use gcroots::{HandleConfig, HandleLocation, Isolate, NodeState};
use proptest::prelude::*;
use proptest::sample::Index;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Strong,
    Weak,
}

#[derive(Debug, Clone)]
enum Op {
    CreateStrong,
    CreateWeak,
    MakeWeak(Index),
    Destroy(Index),
    Collect,
    RemoveAll,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => Just(Op::CreateStrong),
        6 => Just(Op::CreateWeak),
        2 => any::<Index>().prop_map(Op::MakeWeak),
        4 => any::<Index>().prop_map(Op::Destroy),
        1 => Just(Op::Collect),
        1 => Just(Op::RemoveAll),
    ]
}

type Model = Rc<RefCell<BTreeMap<HandleLocation, Kind>>>;

struct Harness {
    isolate: Isolate,
    model: Model,
    next_value: i64,
}

impl Harness {
    fn new() -> Self {
        // Small blocks so a short run crosses many block boundaries.
        let config = HandleConfig {
            block_size: 8,
            ..HandleConfig::default()
        };
        Self {
            isolate: Isolate::with_config(config),
            model: Rc::default(),
            next_value: 0,
        }
    }

    fn create_strong(&mut self) -> HandleLocation {
        self.next_value += 1;
        let object = self.isolate.heap_mut().alloc(self.next_value).erase();
        let location = self.isolate.global_handles_mut().create(object);
        let previous = self.model.borrow_mut().insert(location, Kind::Strong);
        assert_eq!(previous, None, "create must hand out a free slot");
        location
    }

    fn make_weak(&mut self, location: HandleLocation) {
        let model = Rc::clone(&self.model);
        self.isolate
            .global_handles_mut()
            .make_weak(
                location,
                move |isolate, location| {
                    let removed = model.borrow_mut().remove(&location);
                    assert_eq!(removed, Some(Kind::Weak));
                    isolate
                        .global_handles_mut()
                        .destroy(location)
                        .expect("callback disposes its handle");
                },
                true,
            )
            .expect("strong handle can be made weak");
        self.model.borrow_mut().insert(location, Kind::Weak);
    }

    fn pick(&self, index: &Index) -> Option<(HandleLocation, Kind)> {
        let model = self.model.borrow();
        if model.is_empty() {
            return None;
        }
        let position = index.index(model.len());
        model.iter().nth(position).map(|(&location, &kind)| (location, kind))
    }

    fn apply(&mut self, op: &Op) {
        match op {
            Op::CreateStrong => {
                self.create_strong();
            }
            Op::CreateWeak => {
                let location = self.create_strong();
                self.make_weak(location);
            }
            Op::MakeWeak(index) => {
                if let Some((location, Kind::Strong)) = self.pick(index) {
                    self.make_weak(location);
                }
            }
            Op::Destroy(index) => {
                if let Some((location, _)) = self.pick(index) {
                    self.isolate
                        .global_handles_mut()
                        .destroy(location)
                        .expect("tracked handle is live");
                    self.model.borrow_mut().remove(&location);
                }
            }
            Op::Collect => {
                let weak_before = self.count(Kind::Weak);
                let stats = self.isolate.collect_all_garbage();
                assert_eq!(stats.weak_callbacks, weak_before);
                assert_eq!(self.count(Kind::Weak), 0);
            }
            Op::RemoveAll => {
                let locations: Vec<_> = self.model.borrow().keys().copied().collect();
                for location in locations {
                    self.isolate
                        .global_handles_mut()
                        .destroy(location)
                        .expect("tracked handle is live");
                }
                self.model.borrow_mut().clear();
                assert_eq!(self.isolate.global_handles().global_handles_count(), 0);
            }
        }
    }

    fn count(&self, kind: Kind) -> usize {
        self.model.borrow().values().filter(|&&k| k == kind).count()
    }

    fn check(&self) {
        let handles = self.isolate.global_handles();
        assert_eq!(handles.global_handles_count(), self.model.borrow().len());
        assert_eq!(handles.number_of_weak_handles(), self.count(Kind::Weak));
        assert_eq!(handles.number_of_near_death_handles(), 0);
        handles
            .verify_block_invariants()
            .expect("block counters should match the slots");
        for (&location, &kind) in self.model.borrow().iter() {
            let expected = match kind {
                Kind::Strong => NodeState::Strong,
                Kind::Weak => NodeState::WeakPending,
            };
            assert_eq!(handles.state(location), Some(expected));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_mutation(ops in prop::collection::vec(op(), 1..400)) {
        let mut harness = Harness::new();
        for op in &ops {
            harness.apply(op);
            harness.check();
        }

        harness.apply(&Op::Collect);
        harness.apply(&Op::RemoveAll);
        harness.check();
        harness.isolate.collect_all_garbage();
        prop_assert!(harness.isolate.global_handles().block_count() <= 1);
        prop_assert_eq!(harness.isolate.heap().live_count(), 0);
    }
}
