//! Deferred commands issued while reactors run.
//!
//! Reactor actions cannot touch the join index directly: it is being iterated.
//! Instead they push commands here. After the execution phase the world
//! applies them: spawned components are allocated and queued for the next
//! step's creation flush, removal predicates are marked for this step's
//! removal flush.

use std::any::{Any, TypeId};

use crate::stage::StageSet;

/// Predicate over a component's stage set, used to select components for
/// removal.
pub type RemovalPredicate = Box<dyn Fn(&StageSet) -> bool>;

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

pub enum Command {
    /// Create a component of the Rust type identified by `type_id`.
    Spawn {
        type_id: TypeId,
        type_name: &'static str,
        value: Box<dyn Any>,
        stages: StageSet,
    },
    /// Remove every tracked component whose stages match.
    RemoveWhere(RemovalPredicate),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Spawn {
                type_name, stages, ..
            } => f
                .debug_struct("Spawn")
                .field("type_name", type_name)
                .field("stages", stages)
                .finish_non_exhaustive(),
            Command::RemoveWhere(_) => f.write_str("RemoveWhere(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting to be applied at the end of the execution phase.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    /// Queue creation of a component of type `T` carrying `stages`.
    pub fn spawn<T: 'static>(&mut self, value: T, stages: StageSet) {
        self.push(Command::Spawn {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
            stages,
        });
    }

    /// Queue removal of every component whose stages satisfy `predicate`.
    pub fn remove_where(&mut self, predicate: impl Fn(&StageSet) -> bool + 'static) {
        self.push(Command::RemoveWhere(Box::new(predicate)));
    }

    /// Drain all pending commands in submission order.
    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
