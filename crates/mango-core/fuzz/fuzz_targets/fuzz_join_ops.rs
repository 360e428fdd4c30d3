#![no_main]
use arbitrary::Arbitrary;
use mango_core::config::{PartnerOrder, WorldConfig};
use mango_core::id::Group;
use mango_core::stage::{Stage, StageSet, in_group};
use mango_core::test_utils::*;
use mango_core::world::World;
use libfuzzer_sys::fuzz_target;

/// A structured join operation for fuzzing.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    CreateA { group: u8 },
    CreateB { group: u8 },
    RemoveGroup { group: u8 },
    SingletonA,
    RequireGroup { group: u8 },
    Step,
}

/// Top-level fuzz input: partner order plus a sequence of operations.
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    fifo: bool,
    ops: Vec<FuzzOp>,
}

fuzz_target!(|input: FuzzInput| {
    let config = WorldConfig {
        partner_order: if input.fifo { PartnerOrder::Fifo } else { PartnerOrder::Lifo },
        audit_removals: true,
    };
    let PairWorld { mut world, pair, a, .. } = pair_world_with(World::with_config(config));

    // Limit operations to prevent timeouts.
    let max_ops = input.ops.len().min(200);

    for op in &input.ops[..max_ops] {
        match *op {
            FuzzOp::CreateA { group } => {
                let Ok(stage) = world.next_stage(Group(u16::from(group % 8))) else {
                    continue;
                };
                let _ = world.create_component(A(0), [stage].into_iter().collect::<StageSet>());
            }
            FuzzOp::CreateB { group } => {
                let stage = Stage::new(Group(u16::from(group % 8)), 0);
                let _ = world.create_component(B(0), [stage].into_iter().collect::<StageSet>());
            }
            FuzzOp::RemoveGroup { group } => {
                let group = Group(u16::from(group % 8));
                world.remove_where(move |stages| in_group(stages, group));
            }
            FuzzOp::SingletonA => world.mark_as_singleton(pair, a),
            FuzzOp::RequireGroup { group } => {
                world.require_group(pair, a, Group(u16::from(group % 8)));
            }
            FuzzOp::Step => {
                let _ = world.step();
            }
        }
    }

    // Invariant: nothing references a freed component.
    let _ = world.step();
    assert!(world.audit().is_empty());
});
