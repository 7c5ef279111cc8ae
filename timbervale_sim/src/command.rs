// Commands that mutate simulation state.
//
// All external mutations to the simulation go through `SimCommand`. This is
// the only way outside code can change sim state — the sim is a pure function
// `(state, commands) -> (new_state, events)`, and commands are the input.
//
// A `SimCommand` carries a `player_id`, a `tick` (when to apply), and a
// `SimAction` enum. Current actions:
// - `SpawnPawn` — place a new pawn at a tile.
// - `SpawnItem` — place an item stack from the catalog at a tile (spiraling
//   to the nearest empty tile if occupied).
// - `DesignateConstruction` — create a build site from the catalog and queue
//   its material deliveries.
// - `IssueOrder` — apply a player order (harvest, etc.) to every eligible
//   item in a tile rectangle.
//
// Invalid commands (uncataloged names, out-of-bounds tiles) are silently
// ignored — a malformed command must not diverge or halt the sim.
//
// See also: `sim.rs` for `process_command()` which dispatches these,
// `task.rs` for `Orders`, `types.rs` for the ID types used here.
//
// **Critical constraint: determinism.** Commands are the sole external input
// to the sim; everything else follows from state and the tick count.

use crate::task::Orders;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// A player-issued command targeting a specific simulation tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimCommand {
    pub player_id: PlayerId,
    pub tick: u64,
    pub action: SimAction,
}

/// The specific action a command performs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SimAction {
    /// Spawn a pawn at the given tile.
    SpawnPawn { name: String, position: TileCoord },
    /// Spawn `count` units of a cataloged item kind at (or near) the given
    /// tile.
    SpawnItem {
        name: String,
        count: u32,
        position: TileCoord,
    },
    /// Designate a cataloged construction at the given tile and queue one
    /// delivery task per material requirement.
    DesignateConstruction { name: String, position: TileCoord },
    /// Apply an order to every eligible item in the inclusive tile rectangle
    /// spanned by `from` and `to` (any two opposite corners).
    IssueOrder {
        order: Orders,
        from: TileCoord,
        to: TileCoord,
    },
}
