//! Profiling and diagnostic instrumentation for the join engine.
//!
//! - [`StepProfile`] captures per-phase timing from the most recent step.
//!   Only available when the `profiling` feature is enabled.
//! - [`ReactorDiagnostic`] summarizes why a reactor has the tuples it has.
//!   Always available (not feature-gated).

use std::time::Duration;

use crate::id::{ComponentType, ReactorId};
use crate::world::World;

/// Per-phase timing from the most recent step.
/// Only available when the `profiling` feature is enabled.
#[derive(Debug, Clone, Default)]
pub struct StepProfile {
    pub creations: Duration,
    pub execution: Duration,
    pub removals: Duration,
    pub total: Duration,
    pub tick: u64,
}

impl StepProfile {
    /// Returns the name and duration of the slowest phase.
    pub fn bottleneck_phase(&self) -> (&'static str, Duration) {
        [
            ("execution", self.execution),
            ("removals", self.removals),
        ]
        .into_iter()
        .fold(("creations", self.creations), |slowest, phase| {
            if phase.1 > slowest.1 { phase } else { slowest }
        })
    }
}

/// Per-type staging state of one reactor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDiagnostic {
    pub ty: ComponentType,
    pub staged: usize,
    pub partial_statics: usize,
    pub reused: bool,
}

/// Snapshot of a reactor's join state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactorDiagnostic {
    pub reactor: ReactorId,
    pub name: String,
    pub tuples: usize,
    /// One entry per typeset type, in typeset order.
    pub types: Vec<TypeDiagnostic>,
    pub scheduled: bool,
}

impl ReactorDiagnostic {
    /// Typeset types with neither staged entries nor partial statics: the
    /// types the next tuple is waiting on.
    pub fn missing(&self) -> Vec<ComponentType> {
        self.types
            .iter()
            .filter(|t| t.staged == 0 && t.partial_statics == 0)
            .map(|t| t.ty)
            .collect()
    }
}

impl World {
    pub fn diagnose(&self, reactor: ReactorId) -> ReactorDiagnostic {
        let types = self
            .typesets
            .typeset_of(reactor)
            .map(|typeset| typeset.types())
            .unwrap_or(&[])
            .iter()
            .map(|&ty| TypeDiagnostic {
                ty,
                staged: self.staging.queue(reactor, ty).len(),
                partial_statics: self.statics.of(reactor, ty).len(),
                reused: self.reactors.reuses(reactor, ty),
            })
            .collect();
        ReactorDiagnostic {
            reactor,
            name: self.reactors.name(reactor).to_string(),
            tuples: self.tuples.count(reactor),
            types,
            scheduled: self.scheduler.order().contains(&reactor),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
