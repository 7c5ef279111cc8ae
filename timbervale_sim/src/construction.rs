// Construction entities and the requirement-tracking capability.
//
// A `Construction` is a designated build site (e.g. a wall) that exposes the
// Target capability consumed by the task queue: a list of material
// requirements plus per-requirement "ready" (delivered) and "on the way"
// (reserved by a pending or in-flight delivery task) counters.
//
// ## Lifecycle
//
// 1. A `DesignateConstruction` command (see `command.rs`) creates the site
//    and the queue emits one delivery task per unmet requirement
//    (`TaskQueue::add_build_order`), reserving the amounts as on-the-way.
// 2. Pawns deliver material into the ready pool (`deliver_requirement`).
// 3. Once every requirement is ready, the queue emits a Build task and pawns
//    apply `try_build` progress until `is_built()`.
//
// `ready + on_the_way <= required` is the intended steady state. Transient
// overshoot is tolerated: reservations are only released by delivery, since
// an abandoned delivery task returns to the queue rather than being
// destroyed, and will still deliver eventually.
//
// See also: `queue.rs` for `add_build_order` / `report_item_delivered_to`,
// `sim.rs` for delivery and build execution, `config.rs` for
// `ConstructionDef` defaults.

use crate::types::{ConstructionId, TileCoord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One material requirement of a construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub amount: u32,
}

/// Data-driven definition of a construction kind, keyed by name in
/// `GameConfig`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstructionDef {
    pub requirements: Vec<Requirement>,
    /// Work units required to build. Progress per tick is
    /// `skill * delta / difficulty`.
    pub build_difficulty: f32,
}

/// A construction site — the requirement-bearing build target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Construction {
    pub id: ConstructionId,
    /// Catalog key into `GameConfig::constructions`.
    pub name: String,
    pub position: TileCoord,
    requirements: Vec<Requirement>,
    ready: BTreeMap<String, u32>,
    on_the_way: BTreeMap<String, u32>,
    build_progress: f32,
    pub build_difficulty: f32,
}

impl Construction {
    pub fn new(id: ConstructionId, name: &str, position: TileCoord, def: &ConstructionDef) -> Self {
        Self {
            id,
            name: name.to_owned(),
            position,
            requirements: def.requirements.clone(),
            ready: BTreeMap::new(),
            on_the_way: BTreeMap::new(),
            build_progress: 0.0,
            build_difficulty: def.build_difficulty,
        }
    }

    /// Zero the delivery bookkeeping for every requirement. Called once when
    /// the build order is registered with the queue.
    pub fn init_requirements(&mut self) {
        for requirement in &self.requirements {
            self.ready.insert(requirement.name.clone(), 0);
            self.on_the_way.insert(requirement.name.clone(), 0);
        }
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// How much of a requirement still needs a delivery task: the required
    /// amount minus what is already delivered or reserved in-flight.
    pub fn requirement_remaining(&self, name: &str) -> u32 {
        let Some(requirement) = self.requirements.iter().find(|r| r.name == name) else {
            return 0;
        };
        let ready = self.ready.get(name).copied().unwrap_or(0);
        let on_the_way = self.on_the_way.get(name).copied().unwrap_or(0);
        requirement.amount.saturating_sub(ready + on_the_way)
    }

    pub fn does_need(&self, name: &str) -> bool {
        self.requirement_remaining(name) > 0
    }

    /// True once every requirement has been fully delivered (ready pool only;
    /// reservations don't count — material on the way cannot be built with).
    pub fn has_all_requirements(&self) -> bool {
        self.requirements
            .iter()
            .all(|r| self.ready.get(&r.name).copied().unwrap_or(0) >= r.amount)
    }

    /// Reserve an amount as in-flight: a delivery task for it now exists.
    pub fn report_on_the_way(&mut self, name: &str, amount: u32) {
        *self.on_the_way.entry(name.to_owned()).or_insert(0) += amount;
    }

    /// Move delivered material into the ready pool, releasing the matching
    /// reservation. Names that are not requirements are ignored.
    pub fn deliver_requirement(&mut self, name: &str, amount: u32) {
        if !self.requirements.iter().any(|r| r.name == name) {
            return;
        }
        *self.ready.entry(name.to_owned()).or_insert(0) += amount;
        if let Some(reserved) = self.on_the_way.get_mut(name) {
            *reserved = reserved.saturating_sub(amount);
        }
    }

    /// Apply one tick's worth of build work. Returns `true` once built.
    pub fn try_build(&mut self, work: f32) -> bool {
        self.build_progress += work / self.build_difficulty;
        self.is_built()
    }

    pub fn is_built(&self) -> bool {
        self.build_progress >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::GameRng;

    fn wall_def() -> ConstructionDef {
        ConstructionDef {
            requirements: vec![Requirement {
                name: "Wood".to_owned(),
                amount: 20,
            }],
            build_difficulty: 1.0,
        }
    }

    fn wall() -> Construction {
        let mut rng = GameRng::new(42);
        let mut c = Construction::new(
            ConstructionId::new(&mut rng),
            "Wall",
            TileCoord::new(5, 5),
            &wall_def(),
        );
        c.init_requirements();
        c
    }

    #[test]
    fn remaining_accounts_for_ready_and_reserved() {
        let mut c = wall();
        assert_eq!(c.requirement_remaining("Wood"), 20);
        assert!(c.does_need("Wood"));

        c.report_on_the_way("Wood", 12);
        assert_eq!(c.requirement_remaining("Wood"), 8);

        c.deliver_requirement("Wood", 12);
        assert_eq!(c.requirement_remaining("Wood"), 8);
        assert!(!c.has_all_requirements());

        c.report_on_the_way("Wood", 8);
        assert_eq!(c.requirement_remaining("Wood"), 0);
        assert!(!c.does_need("Wood"));

        c.deliver_requirement("Wood", 8);
        assert!(c.has_all_requirements());
    }

    #[test]
    fn unknown_requirement_is_zero_and_ignored() {
        let mut c = wall();
        assert_eq!(c.requirement_remaining("Stone"), 0);
        assert!(!c.does_need("Stone"));
        // Delivering an unlisted material never counts toward completion.
        c.deliver_requirement("Stone", 50);
        assert!(!c.has_all_requirements());
    }

    #[test]
    fn reservations_alone_do_not_satisfy() {
        let mut c = wall();
        c.report_on_the_way("Wood", 20);
        assert_eq!(c.requirement_remaining("Wood"), 0);
        // Everything is reserved but nothing delivered.
        assert!(!c.has_all_requirements());
    }

    #[test]
    fn overshoot_delivery_is_tolerated() {
        let mut c = wall();
        c.deliver_requirement("Wood", 25);
        assert!(c.has_all_requirements());
        assert_eq!(c.requirement_remaining("Wood"), 0);
    }

    #[test]
    fn build_progress_scaled_by_difficulty() {
        let mut rng = GameRng::new(1);
        let def = ConstructionDef {
            requirements: Vec::new(),
            build_difficulty: 2.0,
        };
        let mut c = Construction::new(
            ConstructionId::new(&mut rng),
            "Wall",
            TileCoord::new(0, 0),
            &def,
        );
        assert!(!c.try_build(1.0));
        assert!(!c.is_built());
        assert!(c.try_build(1.0));
        assert!(c.is_built());
    }

    #[test]
    fn serialization_roundtrip() {
        let c = wall();
        let json = serde_json::to_string(&c).unwrap();
        let restored: Construction = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, c.id);
        assert_eq!(restored.requirement_remaining("Wood"), 20);
    }
}
