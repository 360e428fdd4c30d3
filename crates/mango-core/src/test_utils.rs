//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::cell::RefCell;
use std::rc::Rc;

use crate::command_queue::CommandQueue;
use crate::id::{ComponentType, Group, RawIndex, ReactorId};
use crate::reactor::Action;
use crate::schedule::Specificity;
use crate::stage::{Stage, StageSet};
use crate::world::World;

// ===========================================================================
// Component types
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct B(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter(pub u64);

// ===========================================================================
// Stage helpers
// ===========================================================================

pub fn tag(group: u16, instance: u16) -> StageSet {
    [Stage::new(Group(group), instance)].into_iter().collect()
}

// ===========================================================================
// Notification recorder
// ===========================================================================

/// Collects the raw indices passed to emerge / breakup notifications.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<Vec<RawIndex>>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> impl FnMut(&[RawIndex]) + 'static {
        let calls = Rc::clone(&self.calls);
        move |indices: &[RawIndex]| calls.borrow_mut().push(indices.to_vec())
    }

    pub fn calls(&self) -> Vec<Vec<RawIndex>> {
        self.calls.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<Vec<RawIndex>> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }
}

// ===========================================================================
// Scenario worlds
// ===========================================================================

/// `pair` joins one `A` with one `B`; no predicates.
pub struct PairWorld {
    pub world: World,
    pub pair: ReactorId,
    pub a: ComponentType,
    pub b: ComponentType,
    pub emerged: Recorder,
    pub broken: Recorder,
}

pub fn pair_world() -> PairWorld {
    pair_world_with(World::new())
}

pub fn pair_world_with(mut world: World) -> PairWorld {
    let a = world.register_component::<A>();
    let b = world.register_component::<B>();
    let pair = world
        .define_reactor("pair", Action::idle(&[a, b]))
        .expect("pair reactor");
    let emerged = Recorder::new();
    let broken = Recorder::new();
    world.subscribe_emerge(pair, emerged.sink());
    world.subscribe_breakup(pair, broken.sink());
    PairWorld {
        world,
        pair,
        a,
        b,
        emerged,
        broken,
    }
}

/// `count` joins every `Tick` with the singleton `Counter` and bumps the
/// counter once per tuple per step.
pub struct CountWorld {
    pub world: World,
    pub count: ReactorId,
    pub tick: ComponentType,
    pub counter: ComponentType,
}

pub fn count_world() -> CountWorld {
    let mut world = World::new();
    let tick = world.register_component::<Tick>();
    let counter = world.register_component::<Counter>();
    let count = world
        .define_reactor(
            "count",
            Action::binary(|_: &mut CommandQueue, _: &mut Tick, counter: &mut Counter| {
                counter.0 += 1;
            }),
        )
        .expect("count reactor");
    world.mark_as_singleton(count, counter);
    world.schedule(count, Specificity::top(0));
    CountWorld {
        world,
        count,
        tick,
        counter,
    }
}

// ===========================================================================
// Assertions
// ===========================================================================

pub fn assert_no_dangling(world: &World) {
    let dangling = world.audit();
    assert!(dangling.is_empty(), "dangling references: {dangling:?}");
}
