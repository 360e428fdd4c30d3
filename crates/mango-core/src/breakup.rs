//! Deferred removal and tuple breakup.
//!
//! [`World::remove_where`] only marks components. The flush then runs, in
//! order:
//!
//! 1. mark every tuple whose member at a removed type's position is pending,
//! 2. break each marked tuple: pending members leave the partial statics,
//!    surviving non-static members are restaged, the breakup notification
//!    fires and the tuple is erased,
//! 3. purge pending components from all staging queues and partial statics,
//! 4. free storage and release stages.
//!
//! Storage is freed last, so no index structure can reference a freed slot.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::id::{ComponentRef, ComponentType, RawIndex, ReactorId};
use crate::stage::StageSet;
use crate::world::World;

/// Outcome of a removal flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Tuples broken up.
    pub broken: usize,
    /// Surviving members pushed back onto staging queues.
    pub restaged: usize,
    /// Components freed.
    pub freed: usize,
}

/// Where a dangling reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DanglingSite {
    Tuple,
    Staging,
    PartialStatic,
}

/// A reference to a component that is no longer tracked or live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dangling {
    pub site: DanglingSite,
    pub reactor: ReactorId,
    pub component: ComponentRef,
}

impl World {
    /// Mark every tracked component whose stages satisfy `predicate`.
    /// Returns how many were matched. Storage is untouched until
    /// [`flush_removals`](Self::flush_removals).
    pub fn remove_where(&mut self, predicate: impl Fn(&StageSet) -> bool) -> usize {
        let matched: Vec<ComponentRef> = self
            .stage_index
            .components()
            .filter(|(_, stages)| predicate(stages))
            .map(|(component, _)| component)
            .collect();
        for component in &matched {
            self.mark_removed(*component);
        }
        matched.len()
    }

    /// Mark a single component. Untracked components are ignored.
    pub fn remove(&mut self, component: ComponentRef) -> bool {
        if !self.stage_index.is_tracked(component.ty, component.index) {
            return false;
        }
        self.mark_removed(component);
        true
    }

    fn mark_removed(&mut self, component: ComponentRef) {
        self.pending_removals
            .entry(component.ty)
            .or_default()
            .insert(component.index);
    }

    pub fn pending_removal_count(&self) -> usize {
        self.pending_removals.values().map(BTreeSet::len).sum()
    }

    /// Break up tuples touching marked components, then free them.
    pub fn flush_removals(&mut self) -> RemovalReport {
        let mut report = RemovalReport::default();
        if self.pending_removals.is_empty() {
            return report;
        }
        let pending = std::mem::take(&mut self.pending_removals);

        for (reactor, slots) in self.mark_breakups(&pending) {
            // Highest slot first so the lower ones stay put.
            for slot in slots.into_iter().rev() {
                report.restaged += self.break_up(reactor, slot, &pending);
                report.broken += 1;
            }
        }

        for (&ty, indices) in &pending {
            let staged = self.staging.purge_all(ty, indices);
            let statics = self.statics.purge_all(ty, indices);
            if staged + statics > 0 {
                debug!(ty = ty.0, staged, statics, "purged removed components");
            }
        }

        for (ty, indices) in pending {
            for index in indices {
                let component = ComponentRef::new(ty, index);
                if let Err(err) = self.stores.free(component) {
                    warn!(ty = ty.0, index, %err, "free failed");
                }
                let released = self.stage_index.release(ty, index);
                debug!(ty = ty.0, index, stages = released.len(), "component freed");
                report.freed += 1;
            }
        }

        if self.config.audit_removals {
            let dangling = self.audit();
            for entry in &dangling {
                error!(?entry, "dangling reference after removal flush");
            }
            debug_assert!(dangling.is_empty(), "dangling references: {dangling:?}");
        }
        report
    }

    fn mark_breakups(
        &self,
        pending: &BTreeMap<ComponentType, BTreeSet<RawIndex>>,
    ) -> BTreeMap<ReactorId, BTreeSet<usize>> {
        let mut marked: BTreeMap<ReactorId, BTreeSet<usize>> = BTreeMap::new();
        for (&ty, indices) in pending {
            for (typeset, reactor) in self.typesets.interested_in(ty) {
                let Some(position) = typeset.position_of(ty) else {
                    continue;
                };
                let slots = self.tuples.slots_referencing(reactor, position, indices);
                if !slots.is_empty() {
                    marked.entry(reactor).or_default().extend(slots);
                }
            }
        }
        marked
    }

    /// Dissolve one tuple. Returns the number of members restaged.
    fn break_up(
        &mut self,
        reactor: ReactorId,
        slot: usize,
        pending: &BTreeMap<ComponentType, BTreeSet<RawIndex>>,
    ) -> usize {
        let Some(tuple) = self.tuples.remove(reactor, slot) else {
            return 0;
        };
        let mut restaged = 0;
        for member in tuple.members() {
            let removed = pending
                .get(&member.ty)
                .is_some_and(|indices| indices.contains(&member.index));
            if removed {
                self.statics.remove(reactor, member.ty, member.index);
            } else if !self.reactors.reuses(reactor, member.ty) {
                self.staging.push(reactor, member.ty, member.index);
                debug!(reactor = reactor.0, ty = member.ty.0, index = member.index, "restaged");
                restaged += 1;
            }
        }
        debug!(reactor = reactor.0, members = ?tuple.members(), "tuple broken up");
        if self.reactors.breaks_up(reactor) {
            self.reactors.notify_breakup(reactor, &tuple.raw_indices());
        }
        restaged
    }

    /// References held by tuples, staging queues, or partial statics whose
    /// component is untracked or not live in its pool.
    pub fn audit(&self) -> Vec<Dangling> {
        let healthy = |component: ComponentRef| {
            self.stage_index.is_tracked(component.ty, component.index)
                && self.stores.is_live(component)
        };
        let tuples = self.tuples.iter().flat_map(|(reactor, tuple)| {
            tuple
                .members()
                .iter()
                .map(move |&component| (DanglingSite::Tuple, reactor, component))
        });
        let staged = self
            .staging
            .iter()
            .map(|(reactor, component)| (DanglingSite::Staging, reactor, component));
        let statics = self
            .statics
            .iter()
            .map(|(reactor, component)| (DanglingSite::PartialStatic, reactor, component));

        tuples
            .chain(staged)
            .chain(statics)
            .filter(|&(_, _, component)| !healthy(component))
            .map(|(site, reactor, component)| Dangling {
                site,
                reactor,
                component,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Group;
    use crate::reactor::Action;
    use crate::stage::{Stage, in_group};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Left;
    #[derive(Debug)]
    struct Right;

    type Log = Rc<RefCell<Vec<Vec<RawIndex>>>>;

    fn pair_world() -> (World, ReactorId, Log) {
        let mut world = World::new();
        let left = world.register_component::<Left>();
        let right = world.register_component::<Right>();
        let pair = world
            .define_reactor("pair", Action::idle(&[left, right]))
            .unwrap();
        let log: Log = Rc::default();
        let sink = Rc::clone(&log);
        world.subscribe_breakup(pair, move |indices| sink.borrow_mut().push(indices.to_vec()));
        (world, pair, log)
    }

    fn tag(group: u16, instance: u16) -> StageSet {
        [Stage::new(Group(group), instance)].into_iter().collect()
    }

    #[test]
    fn marking_does_not_touch_storage() {
        let (mut world, pair, log) = pair_world();
        let a = world.init_component(Left, tag(1, 0)).unwrap();
        world.init_component(Right, StageSet::new()).unwrap();
        assert_eq!(world.remove_where(|stages| in_group(stages, Group(1))), 1);
        assert_eq!(world.pending_removal_count(), 1);
        assert_eq!(world.tuple_count(pair), 1);
        assert!(world.get::<Left>(a).is_some());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn flush_breaks_tuple_and_restages_survivor() {
        let (mut world, pair, log) = pair_world();
        let a = world.init_component(Left, tag(1, 0)).unwrap();
        let b = world.init_component(Right, StageSet::new()).unwrap();
        world.remove_where(|stages| in_group(stages, Group(1)));

        let report = world.flush_removals();
        assert_eq!(
            report,
            RemovalReport {
                broken: 1,
                restaged: 1,
                freed: 1
            }
        );
        assert_eq!(*log.borrow(), vec![vec![a.index, b.index]]);
        assert_eq!(world.tuple_count(pair), 0);
        assert_eq!(world.staged(pair, b.ty), &[b.index]);
        assert!(world.staged(pair, a.ty).is_empty());
        assert!(world.get::<Left>(a).is_none());
        assert!(world.audit().is_empty());
    }

    #[test]
    fn unrelated_tuples_survive() {
        let (mut world, pair, log) = pair_world();
        world.init_component(Left, tag(1, 0)).unwrap();
        world.init_component(Right, StageSet::new()).unwrap();
        let keep_a = world.init_component(Left, tag(2, 0)).unwrap();
        let keep_b = world.init_component(Right, StageSet::new()).unwrap();

        world.remove_where(|stages| in_group(stages, Group(1)));
        world.flush_removals();
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(world.tuples(pair)[0].members(), &[keep_a, keep_b]);
    }

    #[test]
    fn every_broken_tuple_notifies() {
        let (mut world, pair, log) = pair_world();
        for _ in 0..3 {
            world.init_component(Left, tag(1, 0)).unwrap();
            world.init_component(Right, StageSet::new()).unwrap();
        }
        assert_eq!(world.tuple_count(pair), 3);
        world.remove_where(|stages| in_group(stages, Group(1)));
        let report = world.flush_removals();
        assert_eq!(report.broken, 3);
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(world.tuple_count(pair), 0);
    }

    #[test]
    fn removing_partial_static_breaks_all_its_tuples() {
        let (mut world, pair, log) = pair_world();
        let left = world.component_type::<Left>().unwrap();
        world.mark_as_singleton(pair, left);
        world.init_component(Left, tag(1, 0)).unwrap();
        for _ in 0..2 {
            world.init_component(Right, StageSet::new()).unwrap();
        }
        world.remove_where(|stages| in_group(stages, Group(1)));
        let report = world.flush_removals();
        assert_eq!(report.broken, 2);
        assert_eq!(report.restaged, 2);
        assert!(world.partial_statics(pair, left).is_empty());
        assert_eq!(log.borrow().len(), 2);
        assert!(world.audit().is_empty());
    }

    #[test]
    fn removing_member_keeps_partial_static() {
        let (mut world, pair, _) = pair_world();
        let left = world.component_type::<Left>().unwrap();
        world.mark_as_singleton(pair, left);
        let a = world.init_component(Left, StageSet::new()).unwrap();
        let b = world.init_component(Right, tag(3, 0)).unwrap();
        world.remove(b);
        let report = world.flush_removals();
        assert_eq!(report.restaged, 0);
        assert_eq!(world.partial_statics(pair, left), &[a.index]);
        assert!(world.staged(pair, left).is_empty());
    }

    #[test]
    fn removed_staged_component_is_purged() {
        let (mut world, pair, log) = pair_world();
        let a = world.init_component(Left, tag(1, 0)).unwrap();
        world.remove(a);
        world.flush_removals();
        assert!(world.staged(pair, a.ty).is_empty());
        assert!(log.borrow().is_empty());
        assert!(world.audit().is_empty());
    }

    #[test]
    fn released_stage_instance_is_reused() {
        let (mut world, _, _) = pair_world();
        let stage = world.next_stage(Group(4)).unwrap();
        let a = world
            .init_component(Left, [stage].into_iter().collect())
            .unwrap();
        world.remove(a);
        world.flush_removals();
        assert_eq!(world.next_stage(Group(4)).unwrap(), stage);
    }

    #[test]
    fn remove_ignores_untracked() {
        let (mut world, _, _) = pair_world();
        let pending = world.create_component(Left, StageSet::new()).unwrap();
        assert!(!world.remove(pending));
        assert_eq!(world.flush_removals(), RemovalReport::default());
    }

    #[test]
    fn queued_component_with_attached_stage_survives_removal() {
        let (mut world, pair, _) = pair_world();
        let a = world.create_component(Left, StageSet::new()).unwrap();
        assert!(world.attach_stage(a, Stage::new(Group(9), 0)));

        assert_eq!(world.remove_where(|stages| in_group(stages, Group(9))), 0);
        assert_eq!(world.flush_removals().freed, 0);
        assert!(world.get::<Left>(a).is_some());

        world.flush_creations();
        let b = world.init_component(Right, StageSet::new()).unwrap();
        assert_eq!(world.tuples(pair)[0].members(), &[a, b]);
        assert!(world.audit().is_empty());

        assert_eq!(world.remove_where(|stages| in_group(stages, Group(9))), 1);
        assert_eq!(world.flush_removals().broken, 1);
        assert!(world.audit().is_empty());
    }

    #[test]
    fn audit_reports_dangling_staging_entry() {
        let (mut world, pair, _) = pair_world();
        let left = world.component_type::<Left>().unwrap();
        world.staging.push(pair, left, 42);
        assert_eq!(
            world.audit(),
            vec![Dangling {
                site: DanglingSite::Staging,
                reactor: pair,
                component: ComponentRef::new(left, 42),
            }]
        );
    }
}
