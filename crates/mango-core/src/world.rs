//! The world: every index structure of the join engine plus the step loop.
//!
//! A [`World`] owns component storage, the stage index, the typeset registry,
//! reactor configuration, staging tables, partial statics, the tuple store,
//! and the schedule. Independent worlds share nothing.
//!
//! # Step phases
//!
//! 1. **Creation flush** -- components queued by [`World::create_component`]
//!    get their stages attached and go through tuple formation.
//! 2. **Execution** -- scheduled reactors run their action once per tuple,
//!    in specificity order. Commands they issue are applied afterwards:
//!    spawns are queued for the next step, removals are marked for this one.
//! 3. **Removal flush** -- marked components break up their tuples and are
//!    freed.

use std::any::Any;
use std::cell::{Ref, RefMut};
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, debug_span, warn};

use crate::breakup::RemovalReport;
use crate::command_queue::{Command, CommandQueue};
use crate::config::WorldConfig;
use crate::error::JoinError;
use crate::id::{ComponentRef, ComponentType, Group, RawIndex, ReactorId};
use crate::join::CreationReport;
use crate::reactor::{Action, ReactorTable};
use crate::schedule::{Scheduler, Specificity};
use crate::stage::{Stage, StageIndex, StageSet, in_group};
use crate::staging::{PartialStatics, StagingTables};
use crate::store::Stores;
use crate::tuple::{NovelTuple, TupleStore};
use crate::typeset::{Typeset, TypesetRegistry};

/// Counters for one [`World::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub tick: u64,
    /// Components that went through formation in the creation flush.
    pub considered: usize,
    pub formed: usize,
    /// Action invocations across all reactors.
    pub actions_run: usize,
    pub broken: usize,
    pub restaged: usize,
    pub freed: usize,
}

#[derive(Debug)]
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) stores: Stores,
    pub(crate) stage_index: StageIndex,
    pub(crate) typesets: TypesetRegistry,
    pub(crate) reactors: ReactorTable,
    pub(crate) staging: StagingTables,
    pub(crate) statics: PartialStatics,
    pub(crate) tuples: TupleStore,
    pub(crate) scheduler: Scheduler,
    pub(crate) commands: CommandQueue,
    /// Allocated components waiting for the next creation flush.
    pub(crate) pending_creations: Vec<(ComponentRef, StageSet)>,
    pub(crate) pending_removals: BTreeMap<ComponentType, BTreeSet<RawIndex>>,
    pub(crate) tick: u64,
    #[cfg(feature = "profiling")]
    pub(crate) last_profile: Option<crate::profiling::StepProfile>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            stores: Stores::new(),
            stage_index: StageIndex::new(),
            typesets: TypesetRegistry::new(),
            reactors: ReactorTable::new(),
            staging: StagingTables::new(),
            statics: PartialStatics::new(),
            tuples: TupleStore::new(),
            scheduler: Scheduler::new(),
            commands: CommandQueue::new(),
            pending_creations: Vec::new(),
            pending_removals: BTreeMap::new(),
            tick: 0,
            #[cfg(feature = "profiling")]
            last_profile: None,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Number of completed steps.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register `T` as a component type. Idempotent.
    pub fn register_component<T: std::fmt::Debug + 'static>(&mut self) -> ComponentType {
        self.stores.register::<T>()
    }

    pub fn component_type<T: 'static>(&self) -> Result<ComponentType, JoinError> {
        self.stores.type_of::<T>()
    }

    pub fn component_type_name(&self, ty: ComponentType) -> &'static str {
        self.stores.type_name(ty)
    }

    /// Define a reactor whose typeset is the action's parameter list.
    pub fn define_reactor(&mut self, name: &str, action: Action) -> Result<ReactorId, JoinError> {
        let types = action
            .params
            .iter()
            .map(|param| param.resolve(&self.stores))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(&unknown) = types.iter().find(|&&ty| !self.stores.contains(ty)) {
            return Err(JoinError::UnknownComponentType(unknown));
        }
        let typeset = Typeset::new(self.reactors.next_id(), &types)?;
        let id = self.reactors.allocate(name);
        debug!(reactor = id.0, name, types = ?typeset.types(), "reactor defined");
        self.typesets.consider(id, typeset);
        self.reactors.set_action(id, action);
        Ok(id)
    }

    /// Bind `reactor` to `types`, replacing any earlier binding. If the
    /// reactor already has an action, `types` must match its parameters.
    pub fn consider_typeset(
        &mut self,
        reactor: ReactorId,
        types: &[ComponentType],
    ) -> Result<(), JoinError> {
        let typeset = Typeset::new(reactor, types)?;
        if let Some(action) = self.reactors.get(reactor).and_then(|r| r.action()) {
            action.check_binding(reactor, &self.stores, types)?;
        }
        self.reactors.entry(reactor);
        self.typesets.consider(reactor, typeset);
        Ok(())
    }

    pub fn typeset_of(&self, reactor: ReactorId) -> Option<&Typeset> {
        self.typesets.typeset_of(reactor)
    }

    pub fn reactor_name(&self, reactor: ReactorId) -> &str {
        self.reactors.name(reactor)
    }

    pub fn set_compatibility(
        &mut self,
        reactor: ReactorId,
        predicate: impl Fn(ComponentType, &StageSet) -> bool + 'static,
    ) {
        self.reactors.set_compatibility(reactor, Box::new(predicate));
    }

    /// Components of `ty` must carry a stage in `group`; other types pass.
    pub fn require_group(&mut self, reactor: ReactorId, ty: ComponentType, group: Group) {
        self.set_compatibility(reactor, move |candidate, stages| {
            candidate != ty || in_group(stages, group)
        });
    }

    pub fn set_reuse(
        &mut self,
        reactor: ReactorId,
        ty: ComponentType,
        predicate: impl Fn(&StageSet, ComponentType, &StageSet) -> bool + 'static,
    ) {
        self.reactors.set_reuse(reactor, ty, Box::new(predicate));
    }

    /// Every instance of `ty` is a partial static for `reactor`.
    pub fn mark_as_singleton(&mut self, reactor: ReactorId, ty: ComponentType) {
        self.set_reuse(reactor, ty, |_, _, _| true);
    }

    /// [`mark_as_singleton`](Self::mark_as_singleton) for every reactor whose
    /// typeset contains `ty`.
    pub fn mark_singleton_everywhere(&mut self, ty: ComponentType) {
        for (_, reactor) in self.typesets.interested_in(ty) {
            self.mark_as_singleton(reactor, ty);
        }
    }

    pub fn subscribe_emerge(&mut self, reactor: ReactorId, notify: impl FnMut(&[RawIndex]) + 'static) {
        self.reactors.set_emerge(reactor, Box::new(notify));
    }

    pub fn subscribe_breakup(&mut self, reactor: ReactorId, notify: impl FnMut(&[RawIndex]) + 'static) {
        self.reactors.set_breakup(reactor, Box::new(notify));
    }

    pub fn schedule(&mut self, reactor: ReactorId, specificity: impl Into<Specificity>) {
        self.scheduler.schedule(reactor, specificity.into());
    }

    pub fn schedule_all(&mut self, plan: impl IntoIterator<Item = (ReactorId, Specificity)>) {
        self.scheduler.schedule_all(plan);
    }

    /// Clear the execution order. Typesets are kept.
    pub fn reset_schedule(&mut self) {
        self.scheduler.reset();
    }

    pub fn schedule_order(&self) -> Vec<ReactorId> {
        self.scheduler.order()
    }

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    /// Allocate a component now and queue it for the next creation flush.
    /// It joins no tuple until then.
    pub fn create_component<T: 'static>(
        &mut self,
        value: T,
        stages: StageSet,
    ) -> Result<ComponentRef, JoinError> {
        let ty = self.stores.type_of::<T>()?;
        self.create_boxed(ty, Box::new(value), stages)
    }

    fn create_boxed(
        &mut self,
        ty: ComponentType,
        value: Box<dyn Any>,
        stages: StageSet,
    ) -> Result<ComponentRef, JoinError> {
        let component = self.stores.allocate_boxed(ty, value)?;
        self.pending_creations.push((component, stages));
        Ok(component)
    }

    /// Allocate, attach stages and run formation immediately. Meant for
    /// setup before the first step.
    pub fn init_component<T: 'static>(
        &mut self,
        value: T,
        stages: StageSet,
    ) -> Result<ComponentRef, JoinError> {
        let ty = self.stores.type_of::<T>()?;
        let component = self.stores.allocate_boxed(ty, Box::new(value))?;
        self.introduce(component, &stages);
        Ok(component)
    }

    pub fn pending_creation_count(&self) -> usize {
        self.pending_creations.len()
    }

    /// Introduce every queued component, in creation order.
    pub fn flush_creations(&mut self) -> CreationReport {
        let mut report = CreationReport::default();
        for (component, stages) in std::mem::take(&mut self.pending_creations) {
            report.formed += self.introduce(component, &stages);
            report.considered += 1;
        }
        report
    }

    /// Add `stage` to a component. A component still waiting for the
    /// creation flush gets it on its queued stage set. Returns `false` for
    /// components that are neither queued nor tracked.
    pub fn attach_stage(&mut self, component: ComponentRef, stage: Stage) -> bool {
        if let Some((_, stages)) = self
            .pending_creations
            .iter_mut()
            .find(|(pending, _)| *pending == component)
        {
            stages.insert(stage);
            return true;
        }
        self.stage_index.attach(component.ty, component.index, stage)
    }

    /// Stages of `component`; empty if it is not tracked.
    pub fn stages_of(&self, component: ComponentRef) -> &StageSet {
        self.stage_index.stages_of(component.ty, component.index)
    }

    /// A fresh stage from `group`'s instance pool.
    pub fn next_stage(&mut self, group: Group) -> Result<Stage, JoinError> {
        self.stage_index
            .next_stage(group)
            .ok_or(JoinError::InstancesExhausted(group))
    }

    pub fn get<T: 'static>(&self, component: ComponentRef) -> Option<Ref<'_, T>> {
        let pool = self.stores.pool::<T>(component.ty).ok()?;
        Ref::filter_map(pool, |pool| pool.get(component.index)).ok()
    }

    pub fn get_mut<T: 'static>(&mut self, component: ComponentRef) -> Option<RefMut<'_, T>> {
        let pool = self.stores.pool_mut::<T>(component.ty).ok()?;
        RefMut::filter_map(pool, |pool| pool.get_mut(component.index)).ok()
    }

    /// The live instance of `T` with the lowest raw index.
    pub fn first<T: 'static>(&self) -> Option<ComponentRef> {
        let ty = self.stores.type_of::<T>().ok()?;
        let index = *self.stores.live_indices(ty).ok()?.first()?;
        Some(ComponentRef::new(ty, index))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn tuples(&self, reactor: ReactorId) -> &[NovelTuple] {
        self.tuples.of(reactor)
    }

    pub fn for_each_tuple(&self, reactor: ReactorId, f: impl FnMut(&NovelTuple)) {
        self.tuples.of(reactor).iter().for_each(f);
    }

    pub fn tuple_count(&self, reactor: ReactorId) -> usize {
        self.tuples.count(reactor)
    }

    pub fn total_tuples(&self) -> usize {
        self.tuples.total()
    }

    /// Staging queue of `ty` under `reactor`, oldest first.
    pub fn staged(&self, reactor: ReactorId, ty: ComponentType) -> &[RawIndex] {
        self.staging.queue(reactor, ty)
    }

    pub fn partial_statics(&self, reactor: ReactorId, ty: ComponentType) -> &[RawIndex] {
        self.statics.of(reactor, ty)
    }

    /// Components tracked by the stage index.
    pub fn component_count(&self) -> usize {
        self.stage_index.tracked_count()
    }

    /// Every tracked component with its stages, by type then raw index.
    pub fn components(&self) -> impl Iterator<Item = (ComponentRef, &StageSet)> + '_ {
        self.stage_index.components()
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Run every scheduled reactor over its tuples, then apply the commands
    /// they issued. Returns the number of action invocations.
    ///
    /// An action error stops execution, but commands issued before it are
    /// still applied.
    pub fn run_schedule(&mut self) -> Result<usize, JoinError> {
        let executed = self.execute();
        self.apply_commands();
        executed
    }

    fn execute(&mut self) -> Result<usize, JoinError> {
        let mut ran = 0;
        for reactor in self.scheduler.order() {
            ran += self.reactors.run(
                reactor,
                &mut self.commands,
                &self.stores,
                self.tuples.of(reactor),
            )?;
        }
        Ok(ran)
    }

    fn apply_commands(&mut self) {
        for command in self.commands.drain() {
            match command {
                Command::Spawn {
                    type_id,
                    type_name,
                    value,
                    stages,
                } => {
                    let created = self
                        .stores
                        .type_of_id(type_id, type_name)
                        .and_then(|ty| self.create_boxed(ty, value, stages));
                    if let Err(err) = created {
                        warn!(component = type_name, %err, "dropping spawn command");
                    }
                }
                Command::RemoveWhere(predicate) => {
                    self.remove_where(predicate);
                }
            }
        }
    }

    /// Run one step: creation flush, execution, removal flush.
    ///
    /// An execution error is returned after the removal flush has run, and
    /// the tick still advances.
    pub fn step(&mut self) -> Result<StepReport, JoinError> {
        let tick = self.tick;
        let span = debug_span!("step", tick);
        let _guard = span.enter();

        #[cfg(feature = "profiling")]
        let step_start = std::time::Instant::now();

        // Phase 1: creation flush.
        #[cfg(feature = "profiling")]
        let phase_start = std::time::Instant::now();
        let creations = self.flush_creations();
        #[cfg(feature = "profiling")]
        let creations_dur = phase_start.elapsed();

        // Phase 2: execution.
        #[cfg(feature = "profiling")]
        let phase_start = std::time::Instant::now();
        let executed = self.run_schedule();
        if let Err(err) = &executed {
            warn!(%err, "execution stopped");
        }
        #[cfg(feature = "profiling")]
        let execution_dur = phase_start.elapsed();

        // Phase 3: removal flush.
        #[cfg(feature = "profiling")]
        let phase_start = std::time::Instant::now();
        let removals: RemovalReport = self.flush_removals();
        #[cfg(feature = "profiling")]
        let removals_dur = phase_start.elapsed();

        #[cfg(feature = "profiling")]
        {
            self.last_profile = Some(crate::profiling::StepProfile {
                creations: creations_dur,
                execution: execution_dur,
                removals: removals_dur,
                total: step_start.elapsed(),
                tick,
            });
        }
        self.tick += 1;

        let report = StepReport {
            tick,
            considered: creations.considered,
            formed: creations.formed,
            actions_run: executed?,
            broken: removals.broken,
            restaged: removals.restaged,
            freed: removals.freed,
        };
        debug!(?report, "step complete");
        Ok(report)
    }

    #[cfg(feature = "profiling")]
    pub fn last_profile(&self) -> Option<&crate::profiling::StepProfile> {
        self.last_profile.as_ref()
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Drop every component and everything derived from them: stages,
    /// staging, partial statics, tuples, and queued work. Registrations and
    /// reactor configuration stay.
    pub fn reset_components(&mut self) {
        self.stores.clear();
        self.stage_index.clear();
        self.staging.clear();
        self.statics.clear();
        self.tuples.clear();
        self.pending_creations.clear();
        self.pending_removals.clear();
        self.commands.drain();
    }

    /// Drop predicates, subscriptions and the schedule. Typesets and actions
    /// stay.
    pub fn reset_reactors(&mut self) {
        self.reactors.reset_config();
        self.scheduler.reset();
    }

    pub fn reset(&mut self) {
        self.reset_components();
        self.reset_reactors();
        self.tick = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Specificity;

    #[derive(Debug, PartialEq)]
    struct Fuel(u32);
    #[derive(Debug, PartialEq)]
    struct Burner;

    fn burner_world() -> (World, ReactorId) {
        let mut world = World::new();
        world.register_component::<Fuel>();
        world.register_component::<Burner>();
        let burn = world
            .define_reactor(
                "burn",
                Action::binary(|_: &mut CommandQueue, fuel: &mut Fuel, _: &mut Burner| {
                    fuel.0 = fuel.0.saturating_sub(1);
                }),
            )
            .unwrap();
        world.schedule(burn, Specificity::top(1));
        (world, burn)
    }

    #[test]
    fn define_reactor_binds_action_params() {
        let (world, burn) = burner_world();
        let fuel = world.component_type::<Fuel>().unwrap();
        let burner = world.component_type::<Burner>().unwrap();
        assert_eq!(world.typeset_of(burn).unwrap().types(), &[fuel, burner]);
        assert_eq!(world.reactor_name(burn), "burn");
    }

    #[test]
    fn define_reactor_rejects_unregistered_type() {
        let mut world = World::new();
        let err = world
            .define_reactor("bad", Action::unary(|_: &mut CommandQueue, _: &mut Fuel| {}))
            .unwrap_err();
        assert!(matches!(err, JoinError::UnregisteredComponent(_)));
    }

    #[test]
    fn define_reactor_rejects_duplicate_types() {
        let mut world = World::new();
        let fuel = world.register_component::<Fuel>();
        let err = world
            .define_reactor("twice", Action::idle(&[fuel, fuel]))
            .unwrap_err();
        assert!(matches!(err, JoinError::DuplicateType { .. }));
        assert!(world.reactors.ids().next().is_none());
    }

    #[test]
    fn define_reactor_rejects_unknown_raw_type() {
        let mut world = World::new();
        let err = world
            .define_reactor("ghost", Action::idle(&[ComponentType(7)]))
            .unwrap_err();
        assert!(matches!(err, JoinError::UnknownComponentType(ComponentType(7))));
    }

    #[test]
    fn consider_typeset_checks_action_arity() {
        let (mut world, burn) = burner_world();
        let fuel = world.component_type::<Fuel>().unwrap();
        let err = world.consider_typeset(burn, &[fuel]).unwrap_err();
        assert!(matches!(
            err,
            JoinError::ArityMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn consider_typeset_checks_action_param_types() {
        let (mut world, burn) = burner_world();
        let fuel = world.component_type::<Fuel>().unwrap();
        let burner = world.component_type::<Burner>().unwrap();
        let err = world.consider_typeset(burn, &[burner, fuel]).unwrap_err();
        assert!(matches!(err, JoinError::TypeMismatch { ty, .. } if ty == burner));
        assert_eq!(world.typeset_of(burn).unwrap().types(), &[fuel, burner]);

        world.consider_typeset(burn, &[fuel, burner]).unwrap();
    }

    #[test]
    fn execution_error_still_flushes_removals() {
        let mut world = World::new();
        let fuel = world.register_component::<Fuel>();
        let burner = world.register_component::<Burner>();
        let broken = ReactorId(3);
        world.consider_typeset(broken, &[burner, fuel]).unwrap();
        world.reactors.set_action(
            broken,
            Action::binary(|_: &mut CommandQueue, _: &mut Fuel, _: &mut Burner| {}),
        );
        world.schedule(broken, Specificity::top(0));

        let doomed: StageSet = [Stage::new(Group(8), 0)].into_iter().collect();
        let f = world.init_component(Fuel(1), doomed).unwrap();
        world.init_component(Burner, StageSet::new()).unwrap();
        assert_eq!(world.tuple_count(broken), 1);
        world.remove_where(|stages| in_group(stages, Group(8)));

        let err = world.step().unwrap_err();
        assert!(matches!(err, JoinError::TypeMismatch { .. }));
        assert_eq!(world.pending_removal_count(), 0);
        assert!(world.get::<Fuel>(f).is_none());
        assert_eq!(world.tuple_count(broken), 0);
        assert_eq!(world.tick(), 1);
    }

    #[test]
    fn consider_typeset_for_bare_reactor() {
        let mut world = World::new();
        let fuel = world.register_component::<Fuel>();
        let burner = world.register_component::<Burner>();
        let r = ReactorId(5);
        world.consider_typeset(r, &[burner, fuel]).unwrap();
        world.init_component(Fuel(1), StageSet::new()).unwrap();
        world.init_component(Burner, StageSet::new()).unwrap();
        assert_eq!(world.tuple_count(r), 1);
        assert_eq!(world.reactor_name(r), "reactor#5");
    }

    #[test]
    fn created_component_waits_for_flush() {
        let (mut world, burn) = burner_world();
        world.init_component(Burner, StageSet::new()).unwrap();
        let fuel = world.create_component(Fuel(3), StageSet::new()).unwrap();
        assert_eq!(world.pending_creation_count(), 1);
        assert_eq!(world.tuple_count(burn), 0);
        assert!(world.stages_of(fuel).is_empty());

        let report = world.step().unwrap();
        assert_eq!(report.considered, 1);
        assert_eq!(report.formed, 1);
        assert_eq!(report.actions_run, 1);
        assert_eq!(world.get::<Fuel>(fuel).as_deref(), Some(&Fuel(2)));
    }

    #[test]
    fn actions_run_every_step() {
        let (mut world, _) = burner_world();
        let fuel = world.init_component(Fuel(5), StageSet::new()).unwrap();
        world.init_component(Burner, StageSet::new()).unwrap();
        for _ in 0..3 {
            world.step().unwrap();
        }
        assert_eq!(world.get::<Fuel>(fuel).map(|f| f.0), Some(2));
        assert_eq!(world.tick(), 3);
    }

    #[test]
    fn unscheduled_reactor_does_not_run() {
        let (mut world, _) = burner_world();
        world.reset_schedule();
        let fuel = world.init_component(Fuel(5), StageSet::new()).unwrap();
        world.init_component(Burner, StageSet::new()).unwrap();
        let report = world.step().unwrap();
        assert_eq!(report.actions_run, 0);
        assert_eq!(world.get::<Fuel>(fuel).map(|f| f.0), Some(5));
    }

    #[test]
    fn get_mut_and_first() {
        let mut world = World::new();
        world.register_component::<Fuel>();
        assert!(world.first::<Fuel>().is_none());
        let fuel = world.init_component(Fuel(1), StageSet::new()).unwrap();
        assert_eq!(world.first::<Fuel>(), Some(fuel));
        if let Some(mut f) = world.get_mut::<Fuel>(fuel) {
            f.0 = 9;
        }
        assert_eq!(world.get::<Fuel>(fuel).map(|f| f.0), Some(9));
        assert!(world.get::<Burner>(fuel).is_none());
    }

    #[test]
    fn require_group_filters_one_type() {
        let (mut world, burn) = burner_world();
        let fuel = world.component_type::<Fuel>().unwrap();
        world.require_group(burn, fuel, Group(2));
        let stray = world.init_component(Fuel(1), StageSet::new()).unwrap();
        assert!(world.staged(burn, fuel).is_empty());

        let stage = world.next_stage(Group(2)).unwrap();
        let placed = world
            .init_component(Fuel(1), [stage].into_iter().collect())
            .unwrap();
        assert_eq!(world.staged(burn, fuel), &[placed.index]);
        assert!(world.stages_of(stray).is_empty());
    }

    #[test]
    fn mark_singleton_everywhere_covers_all_reactors() {
        let (mut world, burn) = burner_world();
        let fuel = world.component_type::<Fuel>().unwrap();
        let burner = world.component_type::<Burner>().unwrap();
        let idle = world.define_reactor("idle", Action::idle(&[burner])).unwrap();
        world.mark_singleton_everywhere(burner);
        let b = world.init_component(Burner, StageSet::new()).unwrap();
        assert_eq!(world.partial_statics(burn, burner), &[b.index]);
        assert_eq!(world.partial_statics(idle, burner), &[b.index]);
        assert!(world.partial_statics(burn, fuel).is_empty());
    }

    #[test]
    fn attach_stage_extends_stage_set() {
        let mut world = World::new();
        world.register_component::<Fuel>();
        let fuel = world.init_component(Fuel(0), StageSet::new()).unwrap();
        assert!(world.attach_stage(fuel, Stage::new(Group(1), 6)));
        assert!(in_group(world.stages_of(fuel), Group(1)));
        assert_eq!(world.next_stage(Group(1)).unwrap(), Stage::new(Group(1), 7));
    }

    #[test]
    fn attach_stage_to_queued_component_waits_for_flush() {
        let mut world = World::new();
        world.register_component::<Fuel>();
        let fuel = world.create_component(Fuel(0), StageSet::new()).unwrap();
        assert!(world.attach_stage(fuel, Stage::new(Group(3), 0)));
        assert!(world.stages_of(fuel).is_empty());
        assert_eq!(world.component_count(), 0);

        world.flush_creations();
        assert!(in_group(world.stages_of(fuel), Group(3)));
    }

    #[test]
    fn attach_stage_to_unknown_component_is_refused() {
        let mut world = World::new();
        let fuel = world.register_component::<Fuel>();
        let stray = ComponentRef::new(fuel, 4);
        assert!(!world.attach_stage(stray, Stage::new(Group(3), 0)));
        assert_eq!(world.component_count(), 0);
        assert_eq!(world.next_stage(Group(3)).unwrap(), Stage::new(Group(3), 0));
    }

    #[test]
    fn next_stage_reports_exhausted_group() {
        let mut world = World::new();
        world.register_component::<Fuel>();
        let top: StageSet = [Stage::new(Group(1), u16::MAX)].into_iter().collect();
        world.init_component(Fuel(0), top).unwrap();
        assert!(matches!(
            world.next_stage(Group(1)),
            Err(JoinError::InstancesExhausted(Group(1)))
        ));
        assert!(world.next_stage(Group(2)).is_ok());
    }

    #[test]
    fn reset_components_keeps_reactors() {
        let (mut world, burn) = burner_world();
        world.init_component(Fuel(1), StageSet::new()).unwrap();
        world.init_component(Burner, StageSet::new()).unwrap();
        world.create_component(Burner, StageSet::new()).unwrap();
        world.reset_components();
        assert_eq!(world.tuple_count(burn), 0);
        assert_eq!(world.component_count(), 0);
        assert_eq!(world.pending_creation_count(), 0);
        assert_eq!(world.schedule_order(), vec![burn]);
    }

    #[test]
    fn reset_clears_schedule_and_tick() {
        let (mut world, burn) = burner_world();
        world.step().unwrap();
        world.reset();
        assert!(world.schedule_order().is_empty());
        assert_eq!(world.tick(), 0);
        assert!(world.typeset_of(burn).is_some());
    }
}
