//! Component storage.
//!
//! Each component type lives in its own [`DensePool`], reached through the
//! type-erased [`ComponentStore`] capability record (allocate, free, iterate).
//! [`Stores`] assigns [`ComponentType`] ids at registration and keeps every
//! pool behind a `RefCell`, so the distinct types of one tuple can be
//! borrowed mutably together while reactors run.

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;

use crate::error::JoinError;
use crate::id::{ComponentRef, ComponentType, RawIndex};

// ---------------------------------------------------------------------------
// ComponentStore trait
// ---------------------------------------------------------------------------

/// Per-type operations the join engine needs from component storage.
pub trait ComponentStore: std::fmt::Debug {
    /// Human-readable name of the stored type, for logs and errors.
    fn type_name(&self) -> &'static str;

    /// Allocate a slot holding `value`. Fails if `value` is not the stored type.
    fn allocate_boxed(&mut self, value: Box<dyn Any>) -> Result<RawIndex, Box<dyn Any>>;

    /// Release a slot. Its index may be handed out again by the next allocation.
    fn free(&mut self, index: RawIndex);

    /// Is `index` currently allocated?
    fn is_live(&self, index: RawIndex) -> bool;

    /// All allocated indices in ascending order.
    fn live_indices(&self) -> Vec<RawIndex>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free every slot.
    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ---------------------------------------------------------------------------
// DensePool
// ---------------------------------------------------------------------------

/// Dense slot storage with free-list reuse. Allocation and free are O(1);
/// the most recently freed index is reused first.
#[derive(Debug)]
pub struct DensePool<T> {
    slots: Vec<Option<T>>,
    free: Vec<RawIndex>,
    len: usize,
}

impl<T> Default for DensePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DensePool<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn allocate(&mut self, value: T) -> RawIndex {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() - 1
            }
        }
    }

    /// Remove and return the value at `index`, if allocated.
    pub fn take(&mut self, index: RawIndex) -> Option<T> {
        let value = self.slots.get_mut(index)?.take()?;
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, index: RawIndex) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: RawIndex) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Iterate over `(index, value)` of every allocated slot.
    pub fn iter(&self) -> impl Iterator<Item = (RawIndex, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index, value)))
    }
}

impl<T: std::fmt::Debug + 'static> ComponentStore for DensePool<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn allocate_boxed(&mut self, value: Box<dyn Any>) -> Result<RawIndex, Box<dyn Any>> {
        let value = value.downcast::<T>()?;
        Ok(self.allocate(*value))
    }

    fn free(&mut self, index: RawIndex) {
        let freed = self.take(index);
        debug_assert!(freed.is_some(), "double free of index {index}");
    }

    fn is_live(&self, index: RawIndex) -> bool {
        self.get(index).is_some()
    }

    fn live_indices(&self) -> Vec<RawIndex> {
        self.iter().map(|(index, _)| index).collect()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// All component pools of a world, indexed by [`ComponentType`].
#[derive(Debug, Default)]
pub struct Stores {
    pools: Vec<RefCell<Box<dyn ComponentStore>>>,
    by_type_id: HashMap<TypeId, ComponentType>,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` as a component type. Registering the same type twice
    /// returns the original id.
    pub fn register<T: std::fmt::Debug + 'static>(&mut self) -> ComponentType {
        if let Some(&ty) = self.by_type_id.get(&TypeId::of::<T>()) {
            return ty;
        }
        let ty = ComponentType(self.pools.len() as u32);
        self.pools.push(RefCell::new(Box::new(DensePool::<T>::new())));
        self.by_type_id.insert(TypeId::of::<T>(), ty);
        ty
    }

    /// The id registered for `T`.
    pub fn type_of<T: 'static>(&self) -> Result<ComponentType, JoinError> {
        self.type_of_id(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    pub(crate) fn type_of_id(
        &self,
        type_id: TypeId,
        name: &'static str,
    ) -> Result<ComponentType, JoinError> {
        self.by_type_id
            .get(&type_id)
            .copied()
            .ok_or(JoinError::UnregisteredComponent(name))
    }

    /// Every registered type, in registration order.
    pub fn types(&self) -> impl Iterator<Item = ComponentType> + '_ {
        (0..self.pools.len() as u32).map(ComponentType)
    }

    pub fn type_count(&self) -> usize {
        self.pools.len()
    }

    pub fn contains(&self, ty: ComponentType) -> bool {
        ty.slot() < self.pools.len()
    }

    fn cell(&self, ty: ComponentType) -> Result<&RefCell<Box<dyn ComponentStore>>, JoinError> {
        self.pools
            .get(ty.slot())
            .ok_or(JoinError::UnknownComponentType(ty))
    }

    pub fn type_name(&self, ty: ComponentType) -> &'static str {
        self.cell(ty)
            .map(|cell| cell.borrow().type_name())
            .unwrap_or("<unknown>")
    }

    /// Allocate a type-erased value in the pool of `ty`.
    pub fn allocate_boxed(
        &mut self,
        ty: ComponentType,
        value: Box<dyn Any>,
    ) -> Result<ComponentRef, JoinError> {
        let cell = self
            .pools
            .get_mut(ty.slot())
            .ok_or(JoinError::UnknownComponentType(ty))?;
        let index = cell
            .get_mut()
            .allocate_boxed(value)
            .map_err(|_| JoinError::ValueTypeMismatch { ty })?;
        Ok(ComponentRef::new(ty, index))
    }

    pub fn free(&mut self, component: ComponentRef) -> Result<(), JoinError> {
        let cell = self
            .pools
            .get_mut(component.ty.slot())
            .ok_or(JoinError::UnknownComponentType(component.ty))?;
        cell.get_mut().free(component.index);
        Ok(())
    }

    pub fn is_live(&self, component: ComponentRef) -> bool {
        self.cell(component.ty)
            .is_ok_and(|cell| cell.borrow().is_live(component.index))
    }

    pub fn live_indices(&self, ty: ComponentType) -> Result<Vec<RawIndex>, JoinError> {
        Ok(self.cell(ty)?.borrow().live_indices())
    }

    pub fn clear(&mut self) {
        for cell in &mut self.pools {
            cell.get_mut().clear();
        }
    }

    /// Borrow the typed pool of `ty`.
    pub fn pool<T: 'static>(&self, ty: ComponentType) -> Result<Ref<'_, DensePool<T>>, JoinError> {
        let pool = self.cell(ty)?.borrow();
        Ref::filter_map(pool, |store| store.as_any().downcast_ref::<DensePool<T>>()).map_err(
            |_| JoinError::TypeMismatch {
                ty,
                expected: std::any::type_name::<T>(),
            },
        )
    }

    /// Mutably borrow the typed pool of `ty`.
    ///
    /// # Panics
    ///
    /// Panics if the same pool is already borrowed.
    pub fn pool_mut<T: 'static>(
        &self,
        ty: ComponentType,
    ) -> Result<RefMut<'_, DensePool<T>>, JoinError> {
        let pool = self.cell(ty)?.borrow_mut();
        RefMut::filter_map(pool, |store| {
            store.as_any_mut().downcast_mut::<DensePool<T>>()
        })
        .map_err(|_| JoinError::TypeMismatch {
            ty,
            expected: std::any::type_name::<T>(),
        })
    }
}
