// Layered 2D tile occupancy grid.
//
// The terrain tracks which entity occupies which tile, per placement layer
// (ground items, flora, structures). A tile is *empty* only when no layer
// occupies it, so placement never stacks a wall on a bush or a log on a
// berry pile. Dropped items that land on an occupied tile are placed on the
// nearest empty tile instead, found by an outward spiral scan with a fixed
// candidate budget.
//
// Entity data itself (counts, progress, positions) lives in `SimState`'s
// entity maps; the terrain stores only typed references and is rebuilt from
// those maps on load, so it skips serialization (`#[serde(skip)]` on
// `SimState.terrain`).
//
// See also: `sim.rs` which owns the `Terrain` and keeps it in sync with the
// entity maps, `types.rs` for `PlacementLayer` and `TargetRef`.
//
// **Critical constraint: determinism.** Occupancy is stored in `BTreeMap`s
// so every scan (nearest-item search included) visits tiles in the same
// order on every run. Distance ties resolve to the first tile in that order.

use crate::types::{PlacementLayer, TargetRef, TileCoord};
use std::collections::BTreeMap;

/// How many tiles the placement spiral examines before giving up.
const SPIRAL_BUDGET: usize = 25;

/// Per-layer tile occupancy.
#[derive(Clone, Debug, Default)]
pub struct Terrain {
    pub width: u32,
    pub height: u32,
    occupancy: BTreeMap<PlacementLayer, BTreeMap<TileCoord, TargetRef>>,
}

impl Terrain {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            occupancy: BTreeMap::new(),
        }
    }

    pub fn in_bounds(&self, coord: TileCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as u32) < self.width
            && (coord.y as u32) < self.height
    }

    /// The occupant of any layer at a tile, lowest layer first.
    pub fn any_occupant_at(&self, coord: TileCoord) -> Option<TargetRef> {
        self.occupancy
            .values()
            .find_map(|tiles| tiles.get(&coord).copied())
    }

    /// A tile is empty only when no layer occupies it.
    pub fn is_position_empty(&self, coord: TileCoord) -> bool {
        self.any_occupant_at(coord).is_none()
    }

    /// Occupy a tile. Fails (returns `false`, no change) when the tile is out
    /// of bounds or any layer already occupies it.
    pub fn place_at(&mut self, layer: PlacementLayer, coord: TileCoord, occupant: TargetRef) -> bool {
        if !self.in_bounds(coord) || !self.is_position_empty(coord) {
            return false;
        }
        self.occupancy.entry(layer).or_default().insert(coord, occupant);
        true
    }

    /// Occupy the preferred tile, or the nearest empty tile along an outward
    /// spiral. Returns the tile actually used, or `None` when every candidate
    /// within the budget is occupied or out of bounds.
    pub fn place_near(
        &mut self,
        layer: PlacementLayer,
        preferred: TileCoord,
        occupant: TargetRef,
    ) -> Option<TileCoord> {
        for candidate in spiral_positions(preferred, SPIRAL_BUDGET) {
            if self.place_at(layer, candidate, occupant) {
                return Some(candidate);
            }
        }
        None
    }

    /// Vacate a tile on one layer, returning the previous occupant.
    pub fn remove(&mut self, layer: PlacementLayer, coord: TileCoord) -> Option<TargetRef> {
        self.occupancy.get_mut(&layer)?.remove(&coord)
    }

    /// The occupied tile nearest to `from` (Manhattan distance) whose
    /// occupant satisfies `filter`. Ties resolve to the first tile in
    /// scan order. Structures are never candidates — only item layers
    /// are searched.
    pub fn nearest_matching(
        &self,
        from: TileCoord,
        mut filter: impl FnMut(TargetRef) -> bool,
    ) -> Option<(TileCoord, TargetRef)> {
        let mut nearest: Option<(TileCoord, TargetRef)> = None;
        let mut nearest_distance = u32::MAX;
        for layer in [PlacementLayer::Ground, PlacementLayer::Flora] {
            let Some(tiles) = self.occupancy.get(&layer) else {
                continue;
            };
            for (&coord, &occupant) in tiles {
                if !filter(occupant) {
                    continue;
                }
                let distance = from.manhattan_distance(coord);
                if nearest.is_none() || distance < nearest_distance {
                    nearest = Some((coord, occupant));
                    nearest_distance = distance;
                }
            }
        }
        nearest
    }
}

/// Outward square spiral starting at `origin`. The first position is the
/// origin itself; positions may be out of bounds (callers filter).
pub fn spiral_positions(origin: TileCoord, count: usize) -> impl Iterator<Item = TileCoord> {
    let mut x = 0i32;
    let mut y = 0i32;
    (0..count).map(move |_| {
        let position = TileCoord::new(origin.x + x, origin.y + y);
        if x.abs() <= y.abs() && (x != y || x >= 0) {
            x += if y >= 0 { 1 } else { -1 };
        } else {
            y += if x >= 0 { -1 } else { 1 };
        }
        position
    })
}
