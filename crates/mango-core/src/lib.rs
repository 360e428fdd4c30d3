//! Mango Core -- an incremental join engine for entity/component runtimes.
//!
//! Reactors declare the component types they consume (their typeset). As
//! components are created and removed, the engine forms and dissolves
//! tuples, one component per typeset type, without rescanning the whole
//! component population.
//!
//! # Three-Phase Step
//!
//! Each call to [`world::World::step`] runs:
//!
//! 1. **Creation flush** -- queued components get their stages and go
//!    through tuple formation.
//! 2. **Execution** -- scheduled reactors run once per tuple, in
//!    specificity order.
//! 3. **Removal flush** -- marked components break up their tuples, the
//!    survivors are restaged, storage is freed.
//!
//! # Deferred Mutation Pattern
//!
//! Creation and removal take effect at flush boundaries, never mid-phase:
//!
//! ```rust,ignore
//! let a = world.create_component(Ore(3), StageSet::new())?;
//! world.remove_where(|stages| in_group(stages, Group(2)));
//! let report = world.step()?;
//! ```
//!
//! # Key Types
//!
//! - [`world::World`] -- owns every index structure and runs the step.
//! - [`reactor::Action`] -- typed per-tuple closures; their parameter list
//!   becomes the reactor's typeset.
//! - [`stage::StageIndex`] -- stage sets per component, with per-group
//!   instance pools.
//! - [`staging::StagingTables`] / [`staging::PartialStatics`] -- components
//!   waiting for partners, and components reused across tuples.
//! - [`tuple::TupleStore`] -- formed tuples per reactor.
//! - [`schedule::Scheduler`] -- stable execution order by [`schedule::Specificity`].
//! - [`config::WorldConfig`] -- partner order and audit settings.

pub mod breakup;
pub mod command_queue;
pub mod config;
pub mod error;
pub mod id;
pub mod join;
pub mod profiling;
pub mod reactor;
pub mod schedule;
pub mod stage;
pub mod staging;
pub mod store;
pub mod tuple;
pub mod typeset;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
