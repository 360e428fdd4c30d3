//! Pair-and-counter example: two reactors over a handful of components.
//!
//! `pair` joins one `Ore` with one `Furnace`; `count` joins every `Tick` with
//! a singleton `Ledger`. The run creates components over a few steps,
//! removes one, and prints the tuples after each step.
//!
//! Run with: `RUST_LOG=debug cargo run -p mango-core --example pair_and_counter`

use mango_core::command_queue::CommandQueue;
use mango_core::error::JoinError;
use mango_core::id::Group;
use mango_core::reactor::Action;
use mango_core::schedule::Specificity;
use mango_core::stage::{StageSet, in_group};
use mango_core::world::World;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Ore(u32);

#[derive(Debug)]
struct Furnace {
    smelted: u32,
}

#[derive(Debug)]
struct Tick;

#[derive(Debug)]
struct Ledger(u64);

const SITE: Group = Group(1);

fn main() -> Result<(), JoinError> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init();

    let mut world = World::new();
    world.register_component::<Ore>();
    world.register_component::<Furnace>();
    world.register_component::<Tick>();
    let ledger = world.register_component::<Ledger>();

    // --- Reactors ---

    let pair = world.define_reactor(
        "pair",
        Action::binary(|_: &mut CommandQueue, ore: &mut Ore, furnace: &mut Furnace| {
            if ore.0 > 0 {
                ore.0 -= 1;
                furnace.smelted += 1;
            }
        }),
    )?;
    world.subscribe_emerge(pair, |indices| println!("  pair emerged: {indices:?}"));
    world.subscribe_breakup(pair, |indices| println!("  pair broke up: {indices:?}"));

    let count = world.define_reactor(
        "count",
        Action::binary(|_: &mut CommandQueue, _: &mut Tick, ledger: &mut Ledger| {
            ledger.0 += 1;
        }),
    )?;
    world.mark_as_singleton(count, ledger);

    world.schedule(count, Specificity::top(1));
    world.schedule(pair, Specificity::top(2));

    // --- Components ---

    let site = world.next_stage(SITE)?;
    let furnace = world.create_component(Furnace { smelted: 0 }, [site].into_iter().collect())?;
    let ledger1 = world.create_component(Ledger(0), StageSet::new())?;

    for step in 0..5 {
        match step {
            1 => {
                world.create_component(Ore(3), StageSet::new())?;
                world.create_component(Tick, StageSet::new())?;
            }
            2 => {
                world.create_component(Tick, StageSet::new())?;
            }
            3 => {
                world.remove_where(|stages| in_group(stages, SITE));
            }
            _ => {}
        }

        let report = world.step()?;
        println!("step {}: {report:?}", report.tick);
        for reactor in [pair, count] {
            world.for_each_tuple(reactor, |tuple| {
                println!("  {} -> {:?}", world.reactor_name(reactor), tuple.raw_indices());
            });
        }
    }

    let ledger_total = world.get::<Ledger>(ledger1).map(|l| l.0);
    let furnace_alive = world.get::<Furnace>(furnace).is_some();
    println!("ledger = {ledger_total:?}, furnace alive = {furnace_alive}");
    Ok(())
}
