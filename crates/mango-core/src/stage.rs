//! Stages and the stage index.
//!
//! A [`Stage`] is a `(Group, Instance)` tag. Every tracked component instance
//! owns a [`StageSet`], which is the surface that compatibility, reuse, and
//! removal predicates read. Instances within a group come from an
//! [`InstancePool`]: a monotonically advancing counter with free-list reuse.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::id::{ComponentRef, ComponentType, Group, Instance, RawIndex};

/// A temporal or spatial occupancy marker attached to component instances.
///
/// Ordered by group, then instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stage {
    pub group: Group,
    pub instance: Instance,
}

impl Stage {
    pub fn new(group: Group, instance: Instance) -> Self {
        Self { group, instance }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}, {}}}", self.group.0, self.instance)
    }
}

/// The unique, ordered set of stages held by one component instance.
pub type StageSet = BTreeSet<Stage>;

static EMPTY_STAGES: StageSet = BTreeSet::new();

/// Does `stages` hold any stage of `group`?
pub fn in_group(stages: &StageSet, group: Group) -> bool {
    stages
        .range(Stage::new(group, 0)..=Stage::new(group, Instance::MAX))
        .next()
        .is_some()
}

// ---------------------------------------------------------------------------
// InstancePool
// ---------------------------------------------------------------------------

/// Issues instance numbers for one group.
///
/// Invariant: `counter` is greater than every live instance of the group.
#[derive(Debug, Clone, Default)]
pub struct InstancePool {
    counter: u32,
    free: Vec<Instance>,
}

impl InstancePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out an instance, preferring the most recently freed one.
    /// `None` once every instance number of the group is live.
    pub fn next(&mut self) -> Option<Instance> {
        if let Some(instance) = self.free.pop() {
            return Some(instance);
        }
        let instance = Instance::try_from(self.counter).ok()?;
        self.counter += 1;
        Some(instance)
    }

    /// Record that `instance` is live: advance the counter past it, and make
    /// sure the free list will not hand it out again.
    pub fn claim(&mut self, instance: Instance) {
        let value = u32::from(instance);
        if value >= self.counter {
            self.counter = value + 1;
        } else if let Some(pos) = self.free.iter().position(|&i| i == instance) {
            self.free.swap_remove(pos);
        }
    }

    /// Return `instance` to the free list.
    pub fn free(&mut self, instance: Instance) {
        if u32::from(instance) < self.counter && !self.free.contains(&instance) {
            self.free.push(instance);
        }
    }

    /// The next never-issued instance number.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

// ---------------------------------------------------------------------------
// StageIndex
// ---------------------------------------------------------------------------

/// Maps `(ComponentType, RawIndex)` to the stage set of that instance.
///
/// A stage may be shared by several instances; its instance number goes back
/// to the group's free list only once the last holder is released.
#[derive(Debug, Default)]
pub struct StageIndex {
    stages: BTreeMap<ComponentType, BTreeMap<RawIndex, StageSet>>,
    pools: BTreeMap<Group, InstancePool>,
    holders: BTreeMap<Stage, usize>,
}

impl StageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an instance with an empty stage set. No-op if tracked.
    pub fn track(&mut self, component: ComponentRef) {
        self.stages
            .entry(component.ty)
            .or_default()
            .entry(component.index)
            .or_default();
    }

    /// Attach `stage` to a tracked instance, advancing the group's counter if
    /// needed. Returns `false` if the instance is untracked or already holds
    /// the stage.
    pub fn attach(&mut self, ty: ComponentType, index: RawIndex, stage: Stage) -> bool {
        let Some(stages) = self
            .stages
            .get_mut(&ty)
            .and_then(|by_index| by_index.get_mut(&index))
        else {
            return false;
        };
        if !stages.insert(stage) {
            return false;
        }
        *self.holders.entry(stage).or_insert(0) += 1;
        self.pools.entry(stage.group).or_default().claim(stage.instance);
        true
    }

    pub fn attach_all(&mut self, ty: ComponentType, index: RawIndex, stages: &StageSet) {
        for &stage in stages {
            self.attach(ty, index, stage);
        }
    }

    /// The instance's stage set. Untracked instances have the empty set.
    pub fn stages_of(&self, ty: ComponentType, index: RawIndex) -> &StageSet {
        self.stages
            .get(&ty)
            .and_then(|by_index| by_index.get(&index))
            .unwrap_or(&EMPTY_STAGES)
    }

    pub fn is_tracked(&self, ty: ComponentType, index: RawIndex) -> bool {
        self.stages
            .get(&ty)
            .is_some_and(|by_index| by_index.contains_key(&index))
    }

    /// Stop tracking an instance and return its stages to their groups.
    pub fn release(&mut self, ty: ComponentType, index: RawIndex) -> StageSet {
        let Some(by_index) = self.stages.get_mut(&ty) else {
            return StageSet::new();
        };
        let released = by_index.remove(&index).unwrap_or_default();
        if by_index.is_empty() {
            self.stages.remove(&ty);
        }
        for stage in &released {
            let last_holder = match self.holders.get_mut(stage) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    self.holders.remove(stage);
                    true
                }
                None => false,
            };
            if last_holder {
                self.pools.entry(stage.group).or_default().free(stage.instance);
            }
        }
        released
    }

    /// Allocate a fresh stage in `group`, or `None` if its instances are
    /// exhausted.
    pub fn next_stage(&mut self, group: Group) -> Option<Stage> {
        let instance = self.pools.entry(group).or_default().next()?;
        Some(Stage::new(group, instance))
    }

    pub fn pool(&self, group: Group) -> Option<&InstancePool> {
        self.pools.get(&group)
    }

    /// Every tracked instance with its stages, by type then index.
    pub fn components(&self) -> impl Iterator<Item = (ComponentRef, &StageSet)> + '_ {
        self.stages.iter().flat_map(|(&ty, by_index)| {
            by_index
                .iter()
                .map(move |(&index, stages)| (ComponentRef::new(ty, index), stages))
        })
    }

    pub fn tracked_count(&self) -> usize {
        self.stages.values().map(BTreeMap::len).sum()
    }

    pub fn clear(&mut self) {
        self.stages.clear();
        self.pools.clear();
        self.holders.clear();
    }
}
