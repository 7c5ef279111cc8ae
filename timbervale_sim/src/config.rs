// Data-driven game configuration.
//
// All tunable simulation parameters live here in `GameConfig`. The sim never
// uses magic numbers — it reads from the config. Item and construction kinds
// are data tables keyed by name (`ItemDef` / `ConstructionDef`), consumed by
// single entity types at runtime rather than per-kind code branching.
//
// The default catalog mirrors the playable baseline: Wood (resource),
// Berries (food), BerryBush (harvestable plant yielding Berries), and the
// Wall construction requiring 20 Wood.
//
// See also: `sim.rs` which owns the `GameConfig` as part of `SimState`,
// `item.rs` for `ItemDef`, `construction.rs` for `ConstructionDef`.
//
// **Critical constraint: determinism.** Config values feed directly into
// simulation logic; identical configs are required for identical runs.

use crate::construction::{ConstructionDef, Requirement};
use crate::item::{HarvestDef, ItemCategory, ItemDef};
use crate::types::PlacementLayer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete simulation configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// Tile grid extents.
    pub world_width: u32,
    pub world_height: u32,

    /// Simulated milliseconds per tick. All per-second rates are scaled by
    /// `tick_ms / 1000` each tick; sim time is `tick * tick_ms`.
    pub tick_ms: u64,

    /// Minimum sim-milliseconds between attempts at the same task. A task
    /// returned unfinished is not reissued before this elapses.
    pub task_cooldown_ms: u64,

    /// Nutrition consumed (and hunger restored) per second while eating.
    pub eat_rate_per_sec: f32,

    /// Hunger lost per second. Hunger ranges 0 (starving) to 1 (full).
    pub hunger_decay_per_sec: f32,

    /// Below this hunger level an idle pawn seeks food instead of work.
    pub hunger_food_threshold: f32,

    /// Skill values assigned to newly spawned pawns.
    pub default_harvest_skill: f32,
    pub default_build_skill: f32,

    /// Item catalog, keyed by item name.
    pub items: BTreeMap<String, ItemDef>,

    /// Construction catalog, keyed by construction name.
    pub constructions: BTreeMap<String, ConstructionDef>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let mut items = BTreeMap::new();
        items.insert(
            "Wood".to_owned(),
            ItemDef {
                category: ItemCategory::Resource,
                layer: PlacementLayer::Ground,
                nutrition: 0.0,
                harvest: None,
            },
        );
        items.insert(
            "Berries".to_owned(),
            ItemDef {
                category: ItemCategory::Food,
                layer: PlacementLayer::Ground,
                nutrition: 1.0,
                harvest: None,
            },
        );
        items.insert(
            "BerryBush".to_owned(),
            ItemDef {
                category: ItemCategory::Plant,
                layer: PlacementLayer::Flora,
                nutrition: 0.0,
                harvest: Some(HarvestDef {
                    yield_item: "Berries".to_owned(),
                    yield_min: 5,
                    yield_max: 15,
                    difficulty: 4.0,
                    regrow_ms: 60_000,
                }),
            },
        );

        let mut constructions = BTreeMap::new();
        constructions.insert(
            "Wall".to_owned(),
            ConstructionDef {
                requirements: vec![Requirement {
                    name: "Wood".to_owned(),
                    amount: 20,
                }],
                build_difficulty: 1.0,
            },
        );

        Self {
            world_width: 64,
            world_height: 64,
            tick_ms: 100,
            task_cooldown_ms: 2000,
            eat_rate_per_sec: 0.5,
            hunger_decay_per_sec: 0.005,
            hunger_food_threshold: 0.5,
            default_harvest_skill: 1.0,
            default_build_skill: 1.0,
            items,
            constructions,
        }
    }
}
