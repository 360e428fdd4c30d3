//! Typesets and the registry that indexes them.
//!
//! A [`Typeset`] is the ordered list of component types a reactor consumes.
//! Order is the calling convention for the reactor's action, so two typesets
//! with the same members in a different order are different typesets.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::JoinError;
use crate::id::{ComponentType, ReactorId};

/// Ordered sequence of distinct component types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Typeset(Vec<ComponentType>);

impl Typeset {
    /// Build a typeset, rejecting repeated types.
    pub fn new(reactor: ReactorId, types: &[ComponentType]) -> Result<Self, JoinError> {
        let mut seen = BTreeSet::new();
        for &ty in types {
            if !seen.insert(ty) {
                return Err(JoinError::DuplicateType { reactor, ty });
            }
        }
        Ok(Self(types.to_vec()))
    }

    /// Position of `ty` in the typeset.
    pub fn position_of(&self, ty: ComponentType) -> Option<usize> {
        self.0.iter().position(|&t| t == ty)
    }

    pub fn contains(&self, ty: ComponentType) -> bool {
        self.0.contains(&ty)
    }

    pub fn types(&self) -> &[ComponentType] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Maps reactors to typesets and component types to the typesets that
/// mention them, so "which reactors care about type T" is a direct lookup.
#[derive(Debug, Default)]
pub struct TypesetRegistry {
    by_reactor: HashMap<ReactorId, Typeset>,
    reactors_by_typeset: BTreeMap<Typeset, Vec<ReactorId>>,
    typesets_by_type: HashMap<ComponentType, BTreeSet<Typeset>>,
}

impl TypesetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `reactor` to `typeset`. A reactor already bound to another
    /// typeset is moved; no other guard is applied.
    pub fn consider(&mut self, reactor: ReactorId, typeset: Typeset) {
        if let Some(previous) = self.by_reactor.insert(reactor, typeset.clone()) {
            self.unbind(reactor, &previous);
        }
        let reactors = self.reactors_by_typeset.entry(typeset.clone()).or_default();
        if !reactors.contains(&reactor) {
            reactors.push(reactor);
        }
        for &ty in typeset.types() {
            self.typesets_by_type
                .entry(ty)
                .or_default()
                .insert(typeset.clone());
        }
    }

    fn unbind(&mut self, reactor: ReactorId, typeset: &Typeset) {
        let Some(reactors) = self.reactors_by_typeset.get_mut(typeset) else {
            return;
        };
        reactors.retain(|&r| r != reactor);
        if !reactors.is_empty() {
            return;
        }
        self.reactors_by_typeset.remove(typeset);
        for ty in typeset.types() {
            if let Some(typesets) = self.typesets_by_type.get_mut(ty) {
                typesets.remove(typeset);
                if typesets.is_empty() {
                    self.typesets_by_type.remove(ty);
                }
            }
        }
    }

    pub fn typeset_of(&self, reactor: ReactorId) -> Option<&Typeset> {
        self.by_reactor.get(&reactor)
    }

    /// Typesets containing `ty`, in a stable order.
    pub fn typesets_with(&self, ty: ComponentType) -> impl Iterator<Item = &Typeset> + '_ {
        self.typesets_by_type.get(&ty).into_iter().flatten()
    }

    /// Reactors bound to `typeset`, in binding order.
    pub fn reactors_of(&self, typeset: &Typeset) -> &[ReactorId] {
        self.reactors_by_typeset
            .get(typeset)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every `(typeset, reactor)` pair whose typeset contains `ty`.
    pub fn interested_in(&self, ty: ComponentType) -> Vec<(Typeset, ReactorId)> {
        self.typesets_with(ty)
            .flat_map(|typeset| {
                self.reactors_of(typeset)
                    .iter()
                    .map(move |&reactor| (typeset.clone(), reactor))
            })
            .collect()
    }
}
