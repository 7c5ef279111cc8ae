// Item entities — resources, food, and plants lying in the world.
//
// An `Item` is a stack of one named thing at one tile. All per-kind data
// (layer, nutrition, harvest behavior) lives in the `ItemDef` catalog on
// `GameConfig` — the sim uses a single `Item` type and reads kind-specific
// values from the catalog at runtime, the same data-driven shape the config
// uses for constructions.
//
// `Stack` is the in-hand counterpart: what a pawn is carrying after a Pickup
// subtask. `ItemQuery` is the search term used by FindItem subtasks — either
// an exact item name or the food category.
//
// See also: `config.rs` for the catalog, `terrain.rs` for placement and
// nearest-item search, `sim.rs` for pickup/eat/harvest execution.

use crate::types::{ItemId, PlacementLayer, TileCoord};
use serde::{Deserialize, Serialize};

/// Broad classification of an item kind. Drives category searches (food)
/// and which interactions make sense (plants are harvested, not picked up).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemCategory {
    Resource,
    Food,
    Plant,
}

/// Harvest behavior for plant-like items.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarvestDef {
    /// Name of the item placed in the world when harvesting completes.
    pub yield_item: String,
    /// Inclusive yield range, rolled from the sim PRNG on completion.
    pub yield_min: u32,
    pub yield_max: u32,
    /// Work units required for one full harvest. Progress per tick is
    /// `skill * delta / difficulty`.
    pub difficulty: f32,
    /// Sim-milliseconds after a harvest before the plant bears again.
    pub regrow_ms: u64,
}

/// Data-driven definition of an item kind, keyed by name in `GameConfig`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemDef {
    pub category: ItemCategory,
    /// Terrain layer this kind occupies. Explicit tag — placement and
    /// removal never inspect the concrete kind.
    pub layer: PlacementLayer,
    /// Nutrition per unit when eaten. 0 for inedible kinds.
    pub nutrition: f32,
    /// Present for harvestable kinds.
    pub harvest: Option<HarvestDef>,
}

impl ItemDef {
    pub fn is_food(&self) -> bool {
        self.category == ItemCategory::Food
    }
}

/// A search term for FindItem subtasks and nearest-item queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemQuery {
    /// Match items with exactly this name.
    Named(String),
    /// Match any item whose definition is in the food category.
    Food,
}

impl ItemQuery {
    pub fn matches(&self, name: &str, def: &ItemDef) -> bool {
        match self {
            ItemQuery::Named(wanted) => wanted == name,
            ItemQuery::Food => def.is_food(),
        }
    }
}

/// An item entity — a stack of `count` units of one kind at one tile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Catalog key into `GameConfig::items`.
    pub name: String,
    pub position: TileCoord,
    pub count: u32,
    /// Progress toward the current harvest, 0.0 to 1.0.
    pub harvest_progress: f32,
    /// Whether the item currently offers a harvest. Reset on completion,
    /// restored by regrowth.
    pub harvestable: bool,
    /// Sim-time of the last completed harvest, for regrowth.
    pub last_harvest_ms: u64,
}

impl Item {
    pub fn new(id: ItemId, name: &str, position: TileCoord, count: u32, def: &ItemDef) -> Self {
        Self {
            id,
            name: name.to_owned(),
            position,
            count,
            harvest_progress: 0.0,
            harvestable: def.harvest.is_some(),
            last_harvest_ms: 0,
        }
    }

    /// Apply one tick's worth of harvest work. Returns `true` when the
    /// harvest completes; the caller places the yield and stamps
    /// `last_harvest_ms`.
    pub fn apply_harvest(&mut self, work: f32, difficulty: f32) -> bool {
        self.harvest_progress += work / difficulty;
        if self.harvest_progress >= 1.0 {
            self.harvest_progress = 0.0;
            self.harvestable = false;
            true
        } else {
            false
        }
    }
}

/// What a pawn carries in hand: a stack of one item kind, with the remaining
/// nutrition tracked for eating.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stack {
    pub name: String,
    pub count: u32,
    pub nutrition: f32,
}
