// Pawn entities — the autonomous agents that execute tasks.
//
// A pawn is data plus a tiny amount of local behavior: grid locomotion (one
// king-move step per tick toward a move target), a single in-hand item stack,
// and a hunger meter. The decision logic that drives all of this — claiming
// tasks, interpreting subtasks, starting walks — lives in the executor in
// `sim.rs`; the pawn itself never touches the queue or the terrain.
//
// `action` is the two-state execution mode: `Idle` means the current subtask
// (if any) still needs to be started, `DoingSubTask` means a duration subtask
// (walking, eating, harvesting, building) is in progress and is polled each
// tick until it completes.
//
// Hunger ranges 0 (starving) to 1 (full) and decays every tick. An idle pawn
// below the food threshold seeks food instead of claiming work.
//
// See also: `sim.rs` for the executor, `task.rs` for what a pawn executes,
// `item.rs` for the `Stack` carried in hand.

use crate::config::GameConfig;
use crate::item::Stack;
use crate::task::Task;
use crate::types::{PawnId, TileCoord};
use serde::{Deserialize, Serialize};

/// Execution mode of the current subtask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PawnAction {
    /// No duration subtask in progress; the next subtask needs starting.
    Idle,
    /// A duration subtask is in progress and polled each tick.
    DoingSubTask,
}

/// Where a pawn is walking, and how close counts as arrival.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTarget {
    pub destination: TileCoord,
    /// Arrive next to the destination (Chebyshev distance 1) instead of on
    /// it. Used for tiles the pawn cannot stand on, like build sites.
    pub adjacent: bool,
}

/// An autonomous agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pawn {
    pub id: PawnId,
    pub name: String,
    pub position: TileCoord,
    pub move_target: Option<MoveTarget>,
    /// 0 = starving, 1 = full.
    pub hunger: f32,
    pub harvest_skill: f32,
    pub build_skill: f32,
    /// The single item stack carried in hand, if any.
    pub in_hand: Option<Stack>,
    pub action: PawnAction,
    pub current_task: Option<Task>,
}

impl Pawn {
    pub fn new(id: PawnId, name: &str, position: TileCoord, config: &GameConfig) -> Self {
        Self {
            id,
            name: name.to_owned(),
            position,
            move_target: None,
            hunger: 1.0,
            harvest_skill: config.default_harvest_skill,
            build_skill: config.default_build_skill,
            in_hand: None,
            action: PawnAction::Idle,
            current_task: None,
        }
    }

    pub fn set_move_target(&mut self, destination: TileCoord, adjacent: bool) {
        self.move_target = Some(MoveTarget {
            destination,
            adjacent,
        });
    }

    /// Whether the current move target (if any) counts as reached.
    pub fn has_reached_destination(&self) -> bool {
        match self.move_target {
            None => true,
            Some(target) => {
                let distance = self.position.chebyshev_distance(target.destination);
                if target.adjacent { distance <= 1 } else { distance == 0 }
            }
        }
    }

    /// Advance one king-move step toward the move target. Clears the target
    /// on arrival. Call once per tick while a walk subtask is in progress.
    pub fn step_movement(&mut self) {
        let Some(target) = self.move_target else {
            return;
        };
        if !self.has_reached_destination() {
            self.position = self.position.step_toward(target.destination);
        }
        if self.has_reached_destination() {
            self.move_target = None;
        }
    }

    /// Apply one tick of hunger decay, clamped at starving.
    pub fn apply_hunger_decay(&mut self, rate_per_sec: f32, delta_secs: f32) {
        self.hunger = (self.hunger - rate_per_sec * delta_secs).max(0.0);
    }

    pub fn has_in_hand(&self, item_name: &str) -> bool {
        self.in_hand.as_ref().is_some_and(|stack| stack.name == item_name)
    }

    /// Merge a picked-up stack into the hand. Returns `false` (nothing
    /// changes) when the hand already holds a different item kind.
    pub fn add_to_hand(&mut self, stack: Stack) -> bool {
        match &mut self.in_hand {
            None => {
                self.in_hand = Some(stack);
                true
            }
            Some(held) if held.name == stack.name => {
                held.count += stack.count;
                held.nutrition += stack.nutrition;
                true
            }
            Some(_) => false,
        }
    }

    /// Remove up to `amount` units from the hand, emptying it when the count
    /// reaches zero. Returns how many units actually came out.
    pub fn take_from_hand(&mut self, amount: u32) -> u32 {
        let Some(held) = &mut self.in_hand else {
            return 0;
        };
        let taken = amount.min(held.count);
        held.count -= taken;
        if held.count == 0 {
            self.in_hand = None;
        }
        taken
    }
}
