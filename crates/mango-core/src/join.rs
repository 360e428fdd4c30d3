//! Tuple formation.
//!
//! When a component is introduced, every reactor whose typeset contains its
//! type gets one chance to complete a tuple around it:
//!
//! 1. The reactor's compatibility predicate must accept the component.
//! 2. If the reactor reuses the component's type, the component becomes a
//!    partial static for it.
//! 3. A partner is chosen for every other typeset type. A partial static
//!    whose reuse predicate accepts the new component wins over a staged
//!    entry; staged entries are scanned in the configured [`PartnerOrder`]
//!    and must still pass the compatibility predicate.
//! 4. If any type has no partner the component is staged (unless it is a
//!    partial static) and nothing else changes. Staged partners are only
//!    consumed once every type has one.
//! 5. Otherwise the tuple is stored in typeset order and the emerge
//!    notification fires.
//!
//! [`PartnerOrder`]: crate::config::PartnerOrder

use tracing::{debug, trace};

use crate::id::{ComponentRef, ComponentType, ReactorId};
use crate::stage::StageSet;
use crate::tuple::NovelTuple;
use crate::typeset::Typeset;
use crate::world::World;

/// Outcome of a creation flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreationReport {
    /// Components whose stages were attached and which went through
    /// formation.
    pub considered: usize,
    /// Tuples formed across all reactors.
    pub formed: usize,
}

/// Where a tuple member comes from.
#[derive(Debug, Clone, Copy)]
enum Partner {
    /// The component being considered.
    Arrival,
    /// A partial static; not consumed.
    Static(ComponentRef),
    /// A staging entry at `position` in its queue; consumed on commit.
    Staged { member: ComponentRef, position: usize },
}

impl Partner {
    fn member(self, arrival: ComponentRef) -> ComponentRef {
        match self {
            Partner::Arrival => arrival,
            Partner::Static(member) | Partner::Staged { member, .. } => member,
        }
    }
}

impl World {
    /// Attach `stages` to a freshly allocated component and run formation.
    /// Returns the number of tuples formed.
    pub(crate) fn introduce(&mut self, component: ComponentRef, stages: &StageSet) -> usize {
        self.stage_index.track(component);
        self.stage_index
            .attach_all(component.ty, component.index, stages);
        self.consider(component)
    }

    /// Offer `component` to every interested reactor. Returns the number of
    /// tuples formed.
    pub(crate) fn consider(&mut self, component: ComponentRef) -> usize {
        let stages = self
            .stage_index
            .stages_of(component.ty, component.index)
            .clone();
        let mut formed = 0;
        for (typeset, reactor) in self.typesets.interested_in(component.ty) {
            if self.consider_for(reactor, &typeset, component, &stages) {
                formed += 1;
            }
        }
        formed
    }

    fn consider_for(
        &mut self,
        reactor: ReactorId,
        typeset: &Typeset,
        arrival: ComponentRef,
        stages: &StageSet,
    ) -> bool {
        let ComponentRef { ty, index } = arrival;
        if !self.reactors.is_compatible(reactor, ty, stages) {
            trace!(reactor = reactor.0, ty = ty.0, index, "incompatible, skipped");
            return false;
        }

        let is_static = self.reactors.reuses(reactor, ty);
        if is_static {
            self.statics.insert(reactor, ty, index);
            debug!(reactor = reactor.0, ty = ty.0, index, "partial static registered");
        }

        let Some(partners) = self.select_partners(reactor, typeset, arrival, stages) else {
            if !is_static {
                self.staging.push(reactor, ty, index);
                debug!(reactor = reactor.0, ty = ty.0, index, "staged");
            }
            return false;
        };

        self.commit(reactor, arrival, partners);
        true
    }

    /// One partner per typeset type, or `None` if some type has none.
    /// Nothing is consumed here.
    fn select_partners(
        &self,
        reactor: ReactorId,
        typeset: &Typeset,
        arrival: ComponentRef,
        stages: &StageSet,
    ) -> Option<Vec<Partner>> {
        typeset
            .types()
            .iter()
            .map(|&other| {
                if other == arrival.ty {
                    Some(Partner::Arrival)
                } else {
                    self.select_partner(reactor, other, stages)
                }
            })
            .collect()
    }

    fn select_partner(
        &self,
        reactor: ReactorId,
        other: ComponentType,
        stages: &StageSet,
    ) -> Option<Partner> {
        let order = self.config.partner_order;

        let reused = self.statics.select(reactor, other, order, |candidate| {
            let candidate_stages = self.stage_index.stages_of(other, candidate);
            self.reactors
                .reuse_accepts(reactor, stages, other, candidate_stages)
        });
        if let Some(index) = reused {
            return Some(Partner::Static(ComponentRef::new(other, index)));
        }

        let position = self.staging.select(reactor, other, order, |candidate| {
            let candidate_stages = self.stage_index.stages_of(other, candidate);
            let compatible = self
                .reactors
                .is_compatible(reactor, other, candidate_stages);
            trace!(reactor = reactor.0, ty = other.0, index = candidate, compatible, "candidate");
            compatible
        });
        match position {
            Some(position) => {
                let index = self.staging.queue(reactor, other)[position];
                Some(Partner::Staged {
                    member: ComponentRef::new(other, index),
                    position,
                })
            }
            None => {
                trace!(reactor = reactor.0, ty = other.0, "no partner");
                None
            }
        }
    }

    fn commit(&mut self, reactor: ReactorId, arrival: ComponentRef, partners: Vec<Partner>) {
        // One entry per type, so positions in distinct queues stay valid.
        for partner in &partners {
            if let Partner::Staged { member, position } = *partner {
                self.staging.take(reactor, member.ty, position);
            }
        }

        let members: Vec<ComponentRef> = partners
            .into_iter()
            .map(|partner| partner.member(arrival))
            .collect();
        let tuple = NovelTuple::new(members);
        debug!(
            reactor = reactor.0,
            name = self.reactors.name(reactor),
            members = ?tuple.members(),
            "tuple formed"
        );
        let indices = self.reactors.emerges(reactor).then(|| tuple.raw_indices());
        self.tuples.push(reactor, tuple);
        if let Some(indices) = indices {
            self.reactors.notify_emerge(reactor, &indices);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{PartnerOrder, WorldConfig};
    use crate::id::{ComponentRef, Group, RawIndex};
    use crate::reactor::Action;
    use crate::stage::{Stage, StageSet, in_group};
    use crate::world::World;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Left;
    #[derive(Debug)]
    struct Right;

    fn pair_world(config: WorldConfig) -> (World, crate::id::ReactorId) {
        let mut world = World::with_config(config);
        let left = world.register_component::<Left>();
        let right = world.register_component::<Right>();
        let pair = world
            .define_reactor("pair", Action::idle(&[left, right]))
            .unwrap();
        (world, pair)
    }

    fn at(group: u16, instance: u16) -> StageSet {
        [Stage::new(Group(group), instance)].into_iter().collect()
    }

    #[test]
    fn lone_component_is_staged() {
        let (mut world, pair) = pair_world(WorldConfig::default());
        let a = world.init_component(Left, StageSet::new()).unwrap();
        assert_eq!(world.staged(pair, a.ty), &[a.index]);
        assert_eq!(world.tuple_count(pair), 0);
    }

    #[test]
    fn second_type_completes_the_tuple() {
        let (mut world, pair) = pair_world(WorldConfig::default());
        let a = world.init_component(Left, StageSet::new()).unwrap();
        let b = world.init_component(Right, StageSet::new()).unwrap();
        assert_eq!(world.tuples(pair)[0].members(), &[a, b]);
        assert!(world.staged(pair, a.ty).is_empty());
        assert!(world.staged(pair, b.ty).is_empty());
    }

    #[test]
    fn tuple_members_follow_typeset_order() {
        let (mut world, pair) = pair_world(WorldConfig::default());
        let b = world.init_component(Right, StageSet::new()).unwrap();
        let a = world.init_component(Left, StageSet::new()).unwrap();
        assert_eq!(world.tuples(pair)[0].members(), &[a, b]);
    }

    #[test]
    fn lifo_prefers_latest_staged() {
        let (mut world, pair) = pair_world(WorldConfig::default());
        let first = world.init_component(Left, StageSet::new()).unwrap();
        let second = world.init_component(Left, StageSet::new()).unwrap();
        let b = world.init_component(Right, StageSet::new()).unwrap();
        assert_eq!(world.tuples(pair)[0].members(), &[second, b]);
        assert_eq!(world.staged(pair, first.ty), &[first.index]);
    }

    #[test]
    fn fifo_prefers_oldest_staged() {
        let config = WorldConfig {
            partner_order: PartnerOrder::Fifo,
            ..WorldConfig::default()
        };
        let (mut world, pair) = pair_world(config);
        let first = world.init_component(Left, StageSet::new()).unwrap();
        let second = world.init_component(Left, StageSet::new()).unwrap();
        let b = world.init_component(Right, StageSet::new()).unwrap();
        assert_eq!(world.tuples(pair)[0].members(), &[first, b]);
        assert_eq!(world.staged(pair, second.ty), &[second.index]);
    }

    #[test]
    fn incompatible_component_is_ignored() {
        let (mut world, pair) = pair_world(WorldConfig::default());
        world.set_compatibility(pair, |_, stages| in_group(stages, Group(1)));
        let a = world.init_component(Left, at(2, 0)).unwrap();
        assert!(world.staged(pair, a.ty).is_empty());
    }

    #[test]
    fn staged_candidate_rechecked_against_current_compatibility() {
        let (mut world, pair) = pair_world(WorldConfig::default());
        let a = world.init_component(Left, at(1, 0)).unwrap();
        world.set_compatibility(pair, |_, stages| in_group(stages, Group(2)));
        let b = world.init_component(Right, at(2, 0)).unwrap();
        assert_eq!(world.tuple_count(pair), 0);
        assert_eq!(world.staged(pair, a.ty), &[a.index]);
        assert_eq!(world.staged(pair, b.ty), &[b.index]);
    }

    #[test]
    fn rule_out_keeps_already_selected_partners() {
        #[derive(Debug)]
        struct Third;
        let mut world = World::new();
        let left = world.register_component::<Left>();
        let right = world.register_component::<Right>();
        let third = world.register_component::<Third>();
        let trio = world
            .define_reactor("trio", Action::idle(&[left, right, third]))
            .unwrap();

        let a = world.init_component(Left, StageSet::new()).unwrap();
        let b = world.init_component(Right, StageSet::new()).unwrap();
        assert_eq!(world.tuple_count(trio), 0);
        assert_eq!(world.staged(trio, left), &[a.index]);
        assert_eq!(world.staged(trio, right), &[b.index]);

        world.init_component(Third, StageSet::new()).unwrap();
        assert_eq!(world.tuple_count(trio), 1);
        assert!(world.staged(trio, left).is_empty());
    }

    #[test]
    fn partial_static_fans_out() {
        let (mut world, pair) = pair_world(WorldConfig::default());
        let left = world.component_type::<Left>().unwrap();
        world.mark_as_singleton(pair, left);
        let a = world.init_component(Left, StageSet::new()).unwrap();
        assert!(world.staged(pair, left).is_empty());
        assert_eq!(world.partial_statics(pair, left), &[a.index]);

        for _ in 0..3 {
            world.init_component(Right, StageSet::new()).unwrap();
        }
        assert_eq!(world.tuple_count(pair), 3);
        assert!(world.tuples(pair).iter().all(|t| t.members()[0] == a));
        assert_eq!(world.partial_statics(pair, left), &[a.index]);
    }

    #[test]
    fn reuse_predicate_filters_partial_statics() {
        let (mut world, pair) = pair_world(WorldConfig::default());
        let left = world.component_type::<Left>().unwrap();
        world.set_reuse(pair, left, |new, _, candidate| new == candidate);
        world.init_component(Left, at(0, 0)).unwrap();
        let a1 = world.init_component(Left, at(0, 1)).unwrap();

        let b = world.init_component(Right, at(0, 1)).unwrap();
        assert_eq!(world.tuples(pair)[0].members(), &[a1, b]);

        let lonely = world.init_component(Right, at(0, 5)).unwrap();
        assert_eq!(world.tuple_count(pair), 1);
        assert_eq!(world.staged(pair, lonely.ty), &[lonely.index]);
    }

    #[test]
    fn emerge_receives_raw_indices_in_typeset_order() {
        let (mut world, pair) = pair_world(WorldConfig::default());
        let seen: Rc<RefCell<Vec<Vec<RawIndex>>>> = Rc::default();
        let sink = Rc::clone(&seen);
        world.subscribe_emerge(pair, move |indices| sink.borrow_mut().push(indices.to_vec()));

        world.init_component(Right, StageSet::new()).unwrap();
        world.init_component(Right, StageSet::new()).unwrap();
        let a = world.init_component(Left, StageSet::new()).unwrap();
        assert_eq!(*seen.borrow(), vec![vec![a.index, 1]]);
    }

    #[test]
    fn reactors_sharing_a_typeset_each_form_a_tuple() {
        let (mut world, pair) = pair_world(WorldConfig::default());
        let left = world.component_type::<Left>().unwrap();
        let right = world.component_type::<Right>().unwrap();
        let twin = world
            .define_reactor("twin", Action::idle(&[left, right]))
            .unwrap();
        world.init_component(Left, StageSet::new()).unwrap();
        world.init_component(Right, StageSet::new()).unwrap();
        assert_eq!(world.tuple_count(pair), 1);
        assert_eq!(world.tuple_count(twin), 1);
    }

    #[test]
    fn single_type_reactor_forms_per_component() {
        let mut world = World::new();
        let left = world.register_component::<Left>();
        let solo = world.define_reactor("solo", Action::idle(&[left])).unwrap();
        let a = world.init_component(Left, StageSet::new()).unwrap();
        assert_eq!(world.tuples(solo)[0].members(), &[ComponentRef::new(left, a.index)]);
        assert!(world.staged(solo, left).is_empty());
    }
}
