//! Staging tables and the partial-static registry.
//!
//! Both hold, per reactor and per component type, raw indices of components
//! that passed the reactor's compatibility predicate:
//!
//! - [`StagingTables`]: one-shot candidates waiting for partners. An entry is
//!   removed the moment it is consumed into a tuple.
//! - [`PartialStatics`]: components of a type the reactor reuses. They join
//!   any number of tuples and are never consumed by formation.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::PartnerOrder;
use crate::id::{ComponentRef, ComponentType, RawIndex, ReactorId};

#[derive(Debug, Default)]
struct PerReactor {
    lists: BTreeMap<ReactorId, BTreeMap<ComponentType, Vec<RawIndex>>>,
}

impl PerReactor {
    fn get(&self, reactor: ReactorId, ty: ComponentType) -> &[RawIndex] {
        self.lists
            .get(&reactor)
            .and_then(|by_type| by_type.get(&ty))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn get_mut(&mut self, reactor: ReactorId, ty: ComponentType) -> &mut Vec<RawIndex> {
        self.lists.entry(reactor).or_default().entry(ty).or_default()
    }

    fn purge(&mut self, reactor: ReactorId, ty: ComponentType, removed: &BTreeSet<RawIndex>) -> usize {
        let Some(list) = self.lists.get_mut(&reactor).and_then(|by_type| by_type.get_mut(&ty))
        else {
            return 0;
        };
        let before = list.len();
        list.retain(|index| !removed.contains(index));
        before - list.len()
    }

    fn iter(&self) -> impl Iterator<Item = (ReactorId, ComponentRef)> + '_ {
        self.lists.iter().flat_map(|(&reactor, by_type)| {
            by_type.iter().flat_map(move |(&ty, list)| {
                list.iter()
                    .map(move |&index| (reactor, ComponentRef::new(ty, index)))
            })
        })
    }

    fn purge_all(&mut self, ty: ComponentType, removed: &BTreeSet<RawIndex>) -> usize {
        let reactors: Vec<ReactorId> = self.lists.keys().copied().collect();
        reactors
            .into_iter()
            .map(|reactor| self.purge(reactor, ty, removed))
            .sum()
    }

    fn len(&self) -> usize {
        self.lists
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }
}

/// Position of the first entry, scanning `list` in `order`, that `accept`s.
fn scan(list: &[RawIndex], order: PartnerOrder, mut accept: impl FnMut(RawIndex) -> bool) -> Option<usize> {
    match order {
        PartnerOrder::Lifo => list.iter().rposition(|&index| accept(index)),
        PartnerOrder::Fifo => list.iter().position(|&index| accept(index)),
    }
}

// ---------------------------------------------------------------------------
// StagingTables
// ---------------------------------------------------------------------------

/// Per-reactor, per-type queues of components awaiting partners.
#[derive(Debug, Default)]
pub struct StagingTables {
    queues: PerReactor,
}

impl StagingTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reactor: ReactorId, ty: ComponentType, index: RawIndex) {
        self.queues.get_mut(reactor, ty).push(index);
    }

    /// The queue in staging order, oldest first.
    pub fn queue(&self, reactor: ReactorId, ty: ComponentType) -> &[RawIndex] {
        self.queues.get(reactor, ty)
    }

    /// Position of the first entry, scanning in `order`, that `accept`s.
    pub fn select(
        &self,
        reactor: ReactorId,
        ty: ComponentType,
        order: PartnerOrder,
        accept: impl FnMut(RawIndex) -> bool,
    ) -> Option<usize> {
        scan(self.queue(reactor, ty), order, accept)
    }

    /// Consume the entry at `position`.
    pub fn take(&mut self, reactor: ReactorId, ty: ComponentType, position: usize) -> RawIndex {
        self.queues.get_mut(reactor, ty).remove(position)
    }

    /// Drop every entry of `ty` under `reactor` whose index is in `removed`.
    pub fn purge(&mut self, reactor: ReactorId, ty: ComponentType, removed: &BTreeSet<RawIndex>) -> usize {
        self.queues.purge(reactor, ty, removed)
    }

    /// [`purge`](Self::purge) under every reactor.
    pub fn purge_all(&mut self, ty: ComponentType, removed: &BTreeSet<RawIndex>) -> usize {
        self.queues.purge_all(ty, removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReactorId, ComponentRef)> + '_ {
        self.queues.iter()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.queues.lists.clear();
    }
}

// ---------------------------------------------------------------------------
// PartialStatics
// ---------------------------------------------------------------------------

/// Per-reactor, per-type lists of components flagged for reuse.
#[derive(Debug, Default)]
pub struct PartialStatics {
    lists: PerReactor,
}

impl PartialStatics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reactor: ReactorId, ty: ComponentType, index: RawIndex) {
        let list = self.lists.get_mut(reactor, ty);
        if !list.contains(&index) {
            list.push(index);
        }
    }

    /// Partial statics of `ty` in registration order.
    pub fn of(&self, reactor: ReactorId, ty: ComponentType) -> &[RawIndex] {
        self.lists.get(reactor, ty)
    }

    /// The first partial static of `ty`, scanning in `order`, that `accept`s.
    pub fn select(
        &self,
        reactor: ReactorId,
        ty: ComponentType,
        order: PartnerOrder,
        accept: impl FnMut(RawIndex) -> bool,
    ) -> Option<RawIndex> {
        let list = self.of(reactor, ty);
        scan(list, order, accept).map(|pos| list[pos])
    }

    pub fn contains(&self, reactor: ReactorId, ty: ComponentType, index: RawIndex) -> bool {
        self.of(reactor, ty).contains(&index)
    }

    pub fn remove(&mut self, reactor: ReactorId, ty: ComponentType, index: RawIndex) -> bool {
        let list = self.lists.get_mut(reactor, ty);
        match list.iter().position(|&i| i == index) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn purge(&mut self, reactor: ReactorId, ty: ComponentType, removed: &BTreeSet<RawIndex>) -> usize {
        self.lists.purge(reactor, ty, removed)
    }

    pub fn purge_all(&mut self, ty: ComponentType, removed: &BTreeSet<RawIndex>) -> usize {
        self.lists.purge_all(ty, removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReactorId, ComponentRef)> + '_ {
        self.lists.iter()
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.lists.lists.clear();
    }
}
