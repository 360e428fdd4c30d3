//! Reactors: registered computations bound to one typeset.
//!
//! A reactor carries:
//! - an optional compatibility predicate deciding which components it will
//!   stage or join (absent means always compatible),
//! - per-type reuse predicates marking that type's instances as partial
//!   statics,
//! - optional emerge / breakup notifications,
//! - an optional [`Action`] run once per live tuple each step.
//!
//! Setting a predicate or subscription replaces the previous one.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};

use crate::command_queue::CommandQueue;
use crate::error::JoinError;
use crate::id::{ComponentRef, ComponentType, RawIndex, ReactorId};
use crate::stage::StageSet;
use crate::store::Stores;
use crate::tuple::NovelTuple;

/// `(type of candidate, stages of candidate) -> compatible?`
pub type CompatibilityFn = Box<dyn Fn(ComponentType, &StageSet) -> bool>;

/// `(stages of the new member, type of candidate, stages of candidate) -> reuse?`
pub type ReuseFn = Box<dyn Fn(&StageSet, ComponentType, &StageSet) -> bool>;

/// Receives the raw indices of a tuple, in typeset order.
pub type NotifyFn = Box<dyn FnMut(&[RawIndex])>;

type TypedFn =
    Box<dyn FnMut(ReactorId, &mut CommandQueue, &Stores, &[ComponentRef]) -> Result<(), JoinError>>;

type RawFn = Box<dyn FnMut(&mut CommandQueue, &[RawIndex])>;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A parameter of an action: either a Rust type resolved through the
/// world's component registry, or an explicit component type id.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Param {
    Rust { id: TypeId, name: &'static str },
    Id(ComponentType),
}

impl Param {
    fn of<T: 'static>() -> Self {
        Param::Rust {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn resolve(self, stores: &Stores) -> Result<ComponentType, JoinError> {
        match self {
            Param::Rust { id, name } => stores.type_of_id(id, name),
            Param::Id(ty) => Ok(ty),
        }
    }
}

enum Body {
    Typed(TypedFn),
    Raw(RawFn),
    Idle,
}

/// What a reactor does with each of its tuples.
///
/// Typed actions are built per arity from a closure over `&mut` components;
/// their parameter list becomes the reactor's typeset.
pub struct Action {
    pub(crate) params: Vec<Param>,
    body: Body,
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.body {
            Body::Typed(_) => "typed",
            Body::Raw(_) => "raw",
            Body::Idle => "idle",
        };
        f.debug_struct("Action")
            .field("kind", &kind)
            .field("arity", &self.params.len())
            .finish()
    }
}

impl Action {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Can `types` carry this action? Lengths must agree and every typed
    /// parameter must resolve to the type at its position.
    pub(crate) fn check_binding(
        &self,
        reactor: ReactorId,
        stores: &Stores,
        types: &[ComponentType],
    ) -> Result<(), JoinError> {
        if self.arity() != types.len() {
            return Err(JoinError::ArityMismatch {
                reactor,
                expected: self.arity(),
                actual: types.len(),
            });
        }
        for (&param, &ty) in self.params.iter().zip(types) {
            if let Param::Rust { name, .. } = param {
                if param.resolve(stores)? != ty {
                    return Err(JoinError::TypeMismatch { ty, expected: name });
                }
            }
        }
        Ok(())
    }

    pub fn unary<A, F>(mut f: F) -> Self
    where
        A: 'static,
        F: FnMut(&mut CommandQueue, &mut A) + 'static,
    {
        Self {
            params: vec![Param::of::<A>()],
            body: typed(move |reactor, commands, stores, members| {
                let &[ra] = members else {
                    return Err(shape(reactor, 1, members));
                };
                let mut pa = stores.pool_mut::<A>(ra.ty)?;
                if let Some(a) = pa.get_mut(ra.index) {
                    f(commands, a);
                }
                Ok(())
            }),
        }
    }

    pub fn binary<A, B, F>(mut f: F) -> Self
    where
        A: 'static,
        B: 'static,
        F: FnMut(&mut CommandQueue, &mut A, &mut B) + 'static,
    {
        Self {
            params: vec![Param::of::<A>(), Param::of::<B>()],
            body: typed(move |reactor, commands, stores, members| {
                let &[ra, rb] = members else {
                    return Err(shape(reactor, 2, members));
                };
                let mut pa = stores.pool_mut::<A>(ra.ty)?;
                let mut pb = stores.pool_mut::<B>(rb.ty)?;
                if let (Some(a), Some(b)) = (pa.get_mut(ra.index), pb.get_mut(rb.index)) {
                    f(commands, a, b);
                }
                Ok(())
            }),
        }
    }

    pub fn ternary<A, B, C, F>(mut f: F) -> Self
    where
        A: 'static,
        B: 'static,
        C: 'static,
        F: FnMut(&mut CommandQueue, &mut A, &mut B, &mut C) + 'static,
    {
        Self {
            params: vec![Param::of::<A>(), Param::of::<B>(), Param::of::<C>()],
            body: typed(move |reactor, commands, stores, members| {
                let &[ra, rb, rc] = members else {
                    return Err(shape(reactor, 3, members));
                };
                let mut pa = stores.pool_mut::<A>(ra.ty)?;
                let mut pb = stores.pool_mut::<B>(rb.ty)?;
                let mut pc = stores.pool_mut::<C>(rc.ty)?;
                if let (Some(a), Some(b), Some(c)) = (
                    pa.get_mut(ra.index),
                    pb.get_mut(rb.index),
                    pc.get_mut(rc.index),
                ) {
                    f(commands, a, b, c);
                }
                Ok(())
            }),
        }
    }

    /// An action over any typeset that sees raw indices only.
    pub fn raw<F>(types: &[ComponentType], f: F) -> Self
    where
        F: FnMut(&mut CommandQueue, &[RawIndex]) + 'static,
    {
        Self {
            params: types.iter().copied().map(Param::Id).collect(),
            body: Body::Raw(Box::new(f)),
        }
    }

    /// No per-step work; the reactor exists for its notifications.
    pub fn idle(types: &[ComponentType]) -> Self {
        Self {
            params: types.iter().copied().map(Param::Id).collect(),
            body: Body::Idle,
        }
    }

    fn run(
        &mut self,
        reactor: ReactorId,
        commands: &mut CommandQueue,
        stores: &Stores,
        tuple: &NovelTuple,
    ) -> Result<(), JoinError> {
        match &mut self.body {
            Body::Typed(f) => f(reactor, commands, stores, tuple.members()),
            Body::Raw(f) => {
                f(commands, &tuple.raw_indices());
                Ok(())
            }
            Body::Idle => Ok(()),
        }
    }
}

fn typed<F>(f: F) -> Body
where
    F: FnMut(ReactorId, &mut CommandQueue, &Stores, &[ComponentRef]) -> Result<(), JoinError>
        + 'static,
{
    Body::Typed(Box::new(f))
}

fn shape(reactor: ReactorId, expected: usize, members: &[ComponentRef]) -> JoinError {
    JoinError::ArityMismatch {
        reactor,
        expected,
        actual: members.len(),
    }
}

// ---------------------------------------------------------------------------
// Reactor
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Reactor {
    pub(crate) name: String,
    pub(crate) compatible: Option<CompatibilityFn>,
    pub(crate) reuse: HashMap<ComponentType, ReuseFn>,
    pub(crate) emerge: Option<NotifyFn>,
    pub(crate) breakup: Option<NotifyFn>,
    pub(crate) action: Option<Action>,
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut reused: Vec<_> = self.reuse.keys().copied().collect();
        reused.sort();
        f.debug_struct("Reactor")
            .field("name", &self.name)
            .field("compatible", &self.compatible.is_some())
            .field("reuse", &reused)
            .field("emerge", &self.emerge.is_some())
            .field("breakup", &self.breakup.is_some())
            .field("action", &self.action)
            .finish()
    }
}

impl Reactor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }
}

// ---------------------------------------------------------------------------
// ReactorTable
// ---------------------------------------------------------------------------

/// Every reactor of a world, by id.
///
/// Configuring an id that was never defined creates its entry on demand.
#[derive(Debug, Default)]
pub struct ReactorTable {
    reactors: BTreeMap<ReactorId, Reactor>,
    next_id: u32,
}

impl ReactorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue an unused id and create a named entry for it.
    pub fn allocate(&mut self, name: &str) -> ReactorId {
        let id = self.next_id();
        self.next_id = id.0 + 1;
        self.entry(id).name = name.to_string();
        id
    }

    /// The id the next [`allocate`](Self::allocate) will issue.
    pub fn next_id(&self) -> ReactorId {
        let mut next = self.next_id;
        while self.reactors.contains_key(&ReactorId(next)) {
            next += 1;
        }
        ReactorId(next)
    }

    pub(crate) fn entry(&mut self, id: ReactorId) -> &mut Reactor {
        self.reactors.entry(id).or_insert_with(|| Reactor {
            name: format!("reactor#{}", id.0),
            ..Reactor::default()
        })
    }

    pub fn get(&self, id: ReactorId) -> Option<&Reactor> {
        self.reactors.get(&id)
    }

    pub fn name(&self, id: ReactorId) -> &str {
        self.get(id).map(Reactor::name).unwrap_or("<unregistered>")
    }

    pub fn ids(&self) -> impl Iterator<Item = ReactorId> + '_ {
        self.reactors.keys().copied()
    }

    pub fn set_compatibility(&mut self, id: ReactorId, predicate: CompatibilityFn) {
        self.entry(id).compatible = Some(predicate);
    }

    pub fn set_reuse(&mut self, id: ReactorId, ty: ComponentType, predicate: ReuseFn) {
        self.entry(id).reuse.insert(ty, predicate);
    }

    pub fn set_emerge(&mut self, id: ReactorId, notify: NotifyFn) {
        self.entry(id).emerge = Some(notify);
    }

    pub fn set_breakup(&mut self, id: ReactorId, notify: NotifyFn) {
        self.entry(id).breakup = Some(notify);
    }

    pub(crate) fn set_action(&mut self, id: ReactorId, action: Action) {
        self.entry(id).action = Some(action);
    }

    /// Unknown reactors and reactors without a predicate accept everything.
    pub fn is_compatible(&self, id: ReactorId, ty: ComponentType, stages: &StageSet) -> bool {
        match self.get(id).and_then(|r| r.compatible.as_ref()) {
            Some(predicate) => predicate(ty, stages),
            None => true,
        }
    }

    /// Are instances of `ty` partial statics for this reactor?
    pub fn reuses(&self, id: ReactorId, ty: ComponentType) -> bool {
        self.get(id).is_some_and(|r| r.reuse.contains_key(&ty))
    }

    pub fn reuse_accepts(
        &self,
        id: ReactorId,
        new_stages: &StageSet,
        candidate_ty: ComponentType,
        candidate_stages: &StageSet,
    ) -> bool {
        self.get(id)
            .and_then(|r| r.reuse.get(&candidate_ty))
            .is_some_and(|predicate| predicate(new_stages, candidate_ty, candidate_stages))
    }

    pub fn emerges(&self, id: ReactorId) -> bool {
        self.get(id).is_some_and(|r| r.emerge.is_some())
    }

    pub fn breaks_up(&self, id: ReactorId) -> bool {
        self.get(id).is_some_and(|r| r.breakup.is_some())
    }

    pub(crate) fn notify_emerge(&mut self, id: ReactorId, indices: &[RawIndex]) {
        if let Some(notify) = self.reactors.get_mut(&id).and_then(|r| r.emerge.as_mut()) {
            notify(indices);
        }
    }

    pub(crate) fn notify_breakup(&mut self, id: ReactorId, indices: &[RawIndex]) {
        if let Some(notify) = self.reactors.get_mut(&id).and_then(|r| r.breakup.as_mut()) {
            notify(indices);
        }
    }

    /// Run the reactor's action once per tuple. Returns how many ran.
    pub(crate) fn run(
        &mut self,
        id: ReactorId,
        commands: &mut CommandQueue,
        stores: &Stores,
        tuples: &[NovelTuple],
    ) -> Result<usize, JoinError> {
        let Some(action) = self.reactors.get_mut(&id).and_then(|r| r.action.as_mut()) else {
            return Ok(0);
        };
        for tuple in tuples {
            action.run(id, commands, stores, tuple)?;
        }
        Ok(tuples.len())
    }

    /// Drop predicates and subscriptions; names and actions stay.
    pub fn reset_config(&mut self) {
        for reactor in self.reactors.values_mut() {
            reactor.compatible = None;
            reactor.reuse.clear();
            reactor.emerge = None;
            reactor.breakup = None;
        }
    }
}
