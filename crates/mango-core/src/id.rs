use serde::{Deserialize, Serialize};

/// Index of a component instance inside its type's pool. Stable from
/// allocation until the matching free, then eligible for reuse.
pub type RawIndex = usize;

/// Identifies a registered component type. Issued densely, in registration
/// order, by [`crate::store::Stores::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentType(pub u32);

impl ComponentType {
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

/// Identifies a reactor (a registered computation bound to one typeset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReactorId(pub u32);

/// A small enumerable category of stages (e.g. an update phase or a zone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Group(pub u16);

/// A slot number, unique within its [`Group`] at any point in time.
pub type Instance = u16;

/// A component instance: its type plus its raw index in that type's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentRef {
    pub ty: ComponentType,
    pub index: RawIndex,
}

impl ComponentRef {
    pub fn new(ty: ComponentType, index: RawIndex) -> Self {
        Self { ty, index }
    }
}
