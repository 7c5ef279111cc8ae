// Player-visible narrative events emitted by the simulation.
//
// Each `SimState::step()` returns the events produced during that tick.
// They are the sim's entire observable output: the UI renders them as an
// event log, and tests assert on them instead of poking at private state.
// Failure conditions (a search that found nothing, a delivery attempted
// empty-handed) surface here too — the sim itself recovers silently by
// re-queueing the task.
//
// See also: `sim.rs` for the tick loop that emits these, `command.rs` for
// the input half of the `(state, commands) -> (new_state, events)` contract.
//
// **Critical constraint: determinism.** Event order within a tick follows
// pawn/entity iteration order, which is `BTreeMap` order — identical on
// every run.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// A narrative event emitted by the simulation for the UI / event log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    pub kind: SimEventKind,
}

/// Types of narrative events visible to the player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SimEventKind {
    /// A new pawn has arrived (spawn).
    PawnSpawned { pawn_id: PawnId, name: String },
    /// An item stack appeared in the world (spawn command or harvest yield).
    ItemSpawned {
        item_id: ItemId,
        name: String,
        count: u32,
        position: TileCoord,
    },
    /// A construction site was designated and its deliveries queued.
    ConstructionDesignated {
        construction_id: ConstructionId,
        name: String,
        position: TileCoord,
    },
    /// A pawn claimed a task from the queue.
    TaskClaimed { pawn_id: PawnId, task_name: String },
    /// A pawn picked up part or all of a world item stack.
    ItemPickedUp {
        pawn_id: PawnId,
        item_id: ItemId,
        name: String,
        amount: u32,
    },
    /// A pawn dropped material onto a construction site.
    ItemDelivered {
        pawn_id: PawnId,
        construction_id: ConstructionId,
        name: String,
        amount: u32,
    },
    /// A construction finished building and became solid.
    ConstructionCompleted {
        construction_id: ConstructionId,
        name: String,
    },
    /// A harvest completed and its yield was placed in the world.
    HarvestCompleted {
        pawn_id: PawnId,
        item_id: ItemId,
        yield_item: String,
        amount: u32,
    },
    /// A harvested plant regrew and is harvestable again.
    PlantRegrown { item_id: ItemId },
    /// A pawn finished eating (hand emptied or hunger full).
    FinishedEating { pawn_id: PawnId },

    // Failure conditions. The task involved goes back to the queue.
    /// A FindItem search matched nothing in the world.
    ItemSearchFailed { pawn_id: PawnId, task_name: String },
    /// A pawn arrived to pick up an item that no longer matches its search
    /// (consumed or replaced since the search resolved).
    PickupMismatch { pawn_id: PawnId, task_name: String },
    /// A pawn reached a delivery site with nothing in hand.
    DeliveryWithoutCargo { pawn_id: PawnId, task_name: String },
}
