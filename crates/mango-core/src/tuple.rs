//! Novel tuples and the per-reactor tuple store.

use std::collections::{BTreeMap, BTreeSet};

use crate::id::{ComponentRef, RawIndex, ReactorId};

/// One component per typeset type, in typeset order, live for one reactor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NovelTuple {
    members: Vec<ComponentRef>,
}

impl NovelTuple {
    pub fn new(members: Vec<ComponentRef>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[ComponentRef] {
        &self.members
    }

    /// Raw indices in typeset order; the types are implied by the typeset.
    pub fn raw_indices(&self) -> Vec<RawIndex> {
        self.members.iter().map(|member| member.index).collect()
    }

    pub fn contains(&self, component: ComponentRef) -> bool {
        self.members.contains(&component)
    }
}

/// Formed tuples per reactor, in formation order.
#[derive(Debug, Default)]
pub struct TupleStore {
    tuples: BTreeMap<ReactorId, Vec<NovelTuple>>,
}

impl TupleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reactor: ReactorId, tuple: NovelTuple) {
        self.tuples.entry(reactor).or_default().push(tuple);
    }

    pub fn of(&self, reactor: ReactorId) -> &[NovelTuple] {
        self.tuples.get(&reactor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Slots of tuples whose member at `position` has one of `indices`.
    pub fn slots_referencing(
        &self,
        reactor: ReactorId,
        position: usize,
        indices: &BTreeSet<RawIndex>,
    ) -> Vec<usize> {
        self.of(reactor)
            .iter()
            .enumerate()
            .filter(|(_, tuple)| {
                tuple
                    .members
                    .get(position)
                    .is_some_and(|member| indices.contains(&member.index))
            })
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Remove the tuple at `slot`, keeping the order of the rest.
    pub fn remove(&mut self, reactor: ReactorId, slot: usize) -> Option<NovelTuple> {
        let tuples = self.tuples.get_mut(&reactor)?;
        if slot >= tuples.len() {
            return None;
        }
        let tuple = tuples.remove(slot);
        if tuples.is_empty() {
            self.tuples.remove(&reactor);
        }
        Some(tuple)
    }

    pub fn count(&self, reactor: ReactorId) -> usize {
        self.of(reactor).len()
    }

    pub fn total(&self) -> usize {
        self.tuples.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReactorId, &NovelTuple)> + '_ {
        self.tuples
            .iter()
            .flat_map(|(&reactor, tuples)| tuples.iter().map(move |tuple| (reactor, tuple)))
    }

    pub fn clear(&mut self) {
        self.tuples.clear();
    }
}
