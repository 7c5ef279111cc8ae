// Core simulation state and tick loop.
//
// `SimState` is the single source of truth for the entire game world. It owns
// all entity data, the terrain occupancy grid, the task queue, the PRNG, and
// the game config. The sim is a pure function:
// `(state, commands) -> (new_state, events)`.
//
// ## Tick loop
//
// The sim advances in fixed timesteps of `config.tick_ms` simulated
// milliseconds (100 by default). Each tick applies due commands, then runs
// one executor pass per pawn (in `BTreeMap` order), then advances plant
// regrowth. There is no scheduled-event queue: every agent is polled every
// tick, and duration work (walking, eating, harvesting, building) progresses
// by one tick's worth of delta per pass.
//
// ## Pawn executor
//
// Each pawn runs a two-state machine (`PawnAction`):
//
//   1. No current task → claim one: a pawn below the hunger threshold builds
//      an ad-hoc food task; otherwise it polls the task queue. Claiming
//      consumes the whole pass; execution starts next tick.
//   2. `Idle` with a task → *start* the current subtask. Instant subtasks
//      (FindItem, Pickup, RequirementDelivery) resolve entirely here and
//      advance the cursor; duration subtasks flip to `DoingSubTask`.
//   3. `DoingSubTask` → *poll* the subtask: step the walk, apply one tick of
//      eat/harvest/build work, and advance the cursor on completion.
//
// A pass that cannot proceed (search found nothing, pickup target vanished,
// nothing in hand at the delivery site) emits a failure event and returns
// the task to the queue, where the cooldown keeps it from being retried
// immediately. Ad-hoc food tasks are dropped instead of re-queued — hunger
// re-creates them for free. A task whose target entity no longer exists is
// dropped outright: there is nothing left to retry against.
//
// When a grouped delivery task finishes, the pawn continues with the next
// task in the group (it is already carrying the material for it).
//
// ## Save/load
//
// `SimState` derives `Serialize`/`Deserialize` via serde. The terrain grid is
// `#[serde(skip)]` and rebuilt from the entity maps after deserialization via
// `rebuild_transient_state()`; `to_json()`/`from_json()` handle the full
// cycle.
//
// See also: `command.rs` for `SimCommand`, `event.rs` for `SimEvent`,
// `queue.rs` for the task queue, `task.rs` for the subtask model, `pawn.rs`
// for pawn locomotion and carrying, `terrain.rs` for tile occupancy.
//
// **Critical constraint: determinism.** All state mutations flow through
// `SimCommand` or the tick loop. No external input (system time, thread
// state, etc.) may influence the simulation.

use crate::command::{SimAction, SimCommand};
use crate::config::GameConfig;
use crate::construction::Construction;
use crate::event::{SimEvent, SimEventKind};
use crate::item::{Item, ItemQuery, Stack};
use crate::pawn::{Pawn, PawnAction};
use crate::prng::GameRng;
use crate::queue::TaskQueue;
use crate::task::{BaseTaskType, Orders, SubTaskKind, Task};
use crate::terrain::Terrain;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level simulation state. This is the entire game world.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimState {
    /// Current simulation tick.
    pub tick: u64,

    /// The simulation's deterministic PRNG.
    pub rng: GameRng,

    /// Game configuration (immutable after initialization).
    pub config: GameConfig,

    /// All pawn entities, keyed by ID. BTreeMap for deterministic iteration.
    pub pawns: BTreeMap<PawnId, Pawn>,

    /// All item entities in the world, keyed by ID.
    pub items: BTreeMap<ItemId, Item>,

    /// All construction sites (designated or built), keyed by ID.
    pub constructions: BTreeMap<ConstructionId, Construction>,

    /// The central queue of pending tasks.
    pub task_queue: TaskQueue,

    /// The player's ID.
    pub player_id: PlayerId,

    /// Tile occupancy grid. Rebuilt from the entity maps, not serialized.
    #[serde(skip)]
    pub terrain: Terrain,
}

/// The result of processing commands and advancing the simulation.
pub struct StepResult {
    /// Narrative events emitted during this step, for the UI / event log.
    pub events: Vec<SimEvent>,
}

/// What became of the task after one executor pass.
enum SubTaskOutcome {
    /// The task stays with the pawn.
    Continue,
    /// The task goes back to the queue (or is dropped, for ad-hoc food
    /// tasks). The pawn returns to claiming.
    Requeue,
    /// The task is dropped entirely — its target no longer exists.
    Abandon,
}

impl SimState {
    /// Create a new simulation with default config and the given seed.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, GameConfig::default())
    }

    /// Create a new simulation with the given seed and config.
    pub fn with_config(seed: u64, config: GameConfig) -> Self {
        let mut rng = GameRng::new(seed);
        let player_id = PlayerId::new(&mut rng);
        let terrain = Terrain::new(config.world_width, config.world_height);
        let task_queue = TaskQueue::new(config.task_cooldown_ms);

        Self {
            tick: 0,
            rng,
            config,
            pawns: BTreeMap::new(),
            items: BTreeMap::new(),
            constructions: BTreeMap::new(),
            task_queue,
            player_id,
            terrain,
        }
    }

    /// Simulated milliseconds elapsed since tick 0.
    pub fn now_ms(&self) -> u64 {
        self.tick * self.config.tick_ms
    }

    /// Seconds of simulated time covered by one tick.
    fn delta_secs(&self) -> f32 {
        self.config.tick_ms as f32 / 1000.0
    }

    /// Apply a batch of commands and advance the sim to the target tick.
    ///
    /// Commands must be sorted by tick. Commands with tick > `target_tick`
    /// are ignored (caller error).
    pub fn step(&mut self, commands: &[SimCommand], target_tick: u64) -> StepResult {
        let mut events = Vec::new();
        let mut cmd_idx = 0;

        while self.tick < target_tick {
            while cmd_idx < commands.len() && commands[cmd_idx].tick <= self.tick {
                self.apply_command(&commands[cmd_idx], &mut events);
                cmd_idx += 1;
            }

            self.tick += 1;
            self.tick_pawns(&mut events);
            self.tick_plants(&mut events);
        }

        // Commands landing exactly on the target tick.
        while cmd_idx < commands.len() && commands[cmd_idx].tick <= self.tick {
            self.apply_command(&commands[cmd_idx], &mut events);
            cmd_idx += 1;
        }

        StepResult { events }
    }

    // -------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------

    /// Apply a single command. Invalid commands (uncataloged names,
    /// out-of-bounds or occupied tiles) are silent no-ops.
    fn apply_command(&mut self, cmd: &SimCommand, events: &mut Vec<SimEvent>) {
        match &cmd.action {
            SimAction::SpawnPawn { name, position } => {
                if !self.terrain.in_bounds(*position) {
                    return;
                }
                let id = PawnId::new(&mut self.rng);
                let pawn = Pawn::new(id, name, *position, &self.config);
                self.pawns.insert(id, pawn);
                events.push(SimEvent {
                    tick: self.tick,
                    kind: SimEventKind::PawnSpawned {
                        pawn_id: id,
                        name: name.clone(),
                    },
                });
            }
            SimAction::SpawnItem {
                name,
                count,
                position,
            } => {
                if *count > 0 {
                    self.spawn_item(name, *count, *position, events);
                }
            }
            SimAction::DesignateConstruction { name, position } => {
                self.designate_construction(name, *position, events);
            }
            SimAction::IssueOrder { order, from, to } => {
                self.issue_order(*order, *from, *to);
            }
        }
    }

    /// Place a new item stack at (or spiraling out from) the preferred tile.
    /// Returns `None` when the kind is uncataloged or no empty tile exists
    /// within the placement budget.
    fn spawn_item(
        &mut self,
        name: &str,
        count: u32,
        preferred: TileCoord,
        events: &mut Vec<SimEvent>,
    ) -> Option<ItemId> {
        let def = self.config.items.get(name)?.clone();
        let id = ItemId::new(&mut self.rng);
        let tile = self.terrain.place_near(def.layer, preferred, TargetRef::Item(id))?;
        self.items.insert(id, Item::new(id, name, tile, count, &def));
        events.push(SimEvent {
            tick: self.tick,
            kind: SimEventKind::ItemSpawned {
                item_id: id,
                name: name.to_owned(),
                count,
                position: tile,
            },
        });
        Some(id)
    }

    /// Create a build site and queue one delivery task per requirement.
    fn designate_construction(
        &mut self,
        name: &str,
        position: TileCoord,
        events: &mut Vec<SimEvent>,
    ) {
        let Some(def) = self.config.constructions.get(name).cloned() else {
            return;
        };
        let id = ConstructionId::new(&mut self.rng);
        if !self
            .terrain
            .place_at(PlacementLayer::Structure, position, TargetRef::Construction(id))
        {
            return;
        }
        let mut construction = Construction::new(id, name, position, &def);
        self.task_queue.add_build_order(id, &mut construction);
        self.constructions.insert(id, construction);
        events.push(SimEvent {
            tick: self.tick,
            kind: SimEventKind::ConstructionDesignated {
                construction_id: id,
                name: name.to_owned(),
                position,
            },
        });
    }

    /// Apply a player order to every eligible item in the tile rectangle.
    fn issue_order(&mut self, order: Orders, from: TileCoord, to: TileCoord) {
        let (min_x, max_x) = (from.x.min(to.x), from.x.max(to.x));
        let (min_y, max_y) = (from.y.min(to.y), from.y.max(to.y));

        let eligible: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| {
                item.position.x >= min_x
                    && item.position.x <= max_x
                    && item.position.y >= min_y
                    && item.position.y <= max_y
            })
            .filter(|item| match order {
                Orders::Harvest => item.harvestable,
                // No other order selects anything today.
                _ => false,
            })
            .map(|item| item.id)
            .collect();

        for id in eligible {
            self.task_queue.add_order(order, TargetRef::Item(id));
        }
    }

    // -------------------------------------------------------------------
    // Tick passes
    // -------------------------------------------------------------------

    /// One executor pass per pawn, in deterministic ID order. Each pawn is
    /// taken out of the map for its pass so the executor can freely touch
    /// the rest of the state.
    fn tick_pawns(&mut self, events: &mut Vec<SimEvent>) {
        let ids: Vec<PawnId> = self.pawns.keys().copied().collect();
        for id in ids {
            let Some(mut pawn) = self.pawns.remove(&id) else {
                continue;
            };
            self.tick_pawn(&mut pawn, events);
            self.pawns.insert(id, pawn);
        }
    }

    /// Regrow harvested plants whose regrowth interval has elapsed.
    fn tick_plants(&mut self, events: &mut Vec<SimEvent>) {
        let now_ms = self.now_ms();
        for item in self.items.values_mut() {
            let Some(def) = self.config.items.get(&item.name) else {
                continue;
            };
            let Some(harvest) = &def.harvest else {
                continue;
            };
            if !item.harvestable && now_ms.saturating_sub(item.last_harvest_ms) >= harvest.regrow_ms
            {
                item.harvestable = true;
                events.push(SimEvent {
                    tick: self.tick,
                    kind: SimEventKind::PlantRegrown { item_id: item.id },
                });
            }
        }
    }

    // -------------------------------------------------------------------
    // Pawn executor
    // -------------------------------------------------------------------

    fn tick_pawn(&mut self, pawn: &mut Pawn, events: &mut Vec<SimEvent>) {
        pawn.apply_hunger_decay(self.config.hunger_decay_per_sec, self.delta_secs());

        let Some(mut task) = pawn.current_task.take() else {
            self.claim_task(pawn, events);
            return;
        };

        let outcome = match pawn.action {
            PawnAction::Idle => self.start_subtask(pawn, &mut task, events),
            PawnAction::DoingSubTask => self.poll_subtask(pawn, &mut task, events),
        };

        match outcome {
            SubTaskOutcome::Continue => {
                if task.is_finished() {
                    pawn.action = PawnAction::Idle;
                    // A grouped delivery continues with the next sibling —
                    // the pawn already carries its material.
                    pawn.current_task = task.into_next_in_group();
                } else {
                    pawn.current_task = Some(task);
                }
            }
            SubTaskOutcome::Requeue => {
                pawn.action = PawnAction::Idle;
                if task.base_type != BaseTaskType::General {
                    self.task_queue.return_task_unfinished(task, self.now_ms());
                }
            }
            SubTaskOutcome::Abandon => {
                pawn.action = PawnAction::Idle;
            }
        }
    }

    /// Pick what this pawn works on next. Hunger below the threshold takes
    /// priority over queued work. Claiming consumes the pass; execution
    /// starts next tick.
    fn claim_task(&mut self, pawn: &mut Pawn, events: &mut Vec<SimEvent>) {
        let task = if pawn.hunger < self.config.hunger_food_threshold {
            Some(self.task_queue.request_find_and_eat_food_task())
        } else {
            self.task_queue.request_task(self.now_ms())
        };
        if let Some(task) = task {
            events.push(SimEvent {
                tick: self.tick,
                kind: SimEventKind::TaskClaimed {
                    pawn_id: pawn.id,
                    task_name: task.name.clone(),
                },
            });
            pawn.current_task = Some(task);
        }
    }

    /// Start the current subtask. Instant subtasks resolve here; duration
    /// subtasks set up their state and flip the pawn to `DoingSubTask`.
    fn start_subtask(
        &mut self,
        pawn: &mut Pawn,
        task: &mut Task,
        events: &mut Vec<SimEvent>,
    ) -> SubTaskOutcome {
        match task.current_subtask().kind {
            SubTaskKind::FindItem => self.start_find_item(pawn, task, events),

            SubTaskKind::WalkTo | SubTaskKind::WalkNextTo => {
                let adjacent = task.current_subtask().kind == SubTaskKind::WalkNextTo;
                let Some(target) = task.current_subtask().target else {
                    return SubTaskOutcome::Abandon;
                };
                match self.target_position(target) {
                    Some(destination) => {
                        pawn.set_move_target(destination, adjacent);
                        pawn.action = PawnAction::DoingSubTask;
                        SubTaskOutcome::Continue
                    }
                    // The target vanished mid-task (e.g. another pawn took
                    // the item). Search again if the task knows how.
                    None if task.rewind_to(SubTaskKind::FindItem) => SubTaskOutcome::Continue,
                    None => SubTaskOutcome::Abandon,
                }
            }

            SubTaskKind::Pickup => self.start_pickup(pawn, task, events),

            SubTaskKind::RequirementDelivery => self.start_delivery(pawn, task, events),

            SubTaskKind::Eat | SubTaskKind::Harvest | SubTaskKind::Build => {
                pawn.action = PawnAction::DoingSubTask;
                SubTaskOutcome::Continue
            }

            // Reserved kinds with no behavior yet: pass through.
            SubTaskKind::Manipulate | SubTaskKind::Haul => {
                task.on_finish_subtask();
                SubTaskOutcome::Continue
            }
        }
    }

    fn start_find_item(
        &mut self,
        pawn: &mut Pawn,
        task: &mut Task,
        events: &mut Vec<SimEvent>,
    ) -> SubTaskOutcome {
        let Some(query) = task.current_subtask().query.clone() else {
            return SubTaskOutcome::Abandon;
        };

        // Already carrying the wanted item: skip straight to the handoff.
        if let ItemQuery::Named(name) = &query {
            if pawn.has_in_hand(name) {
                task.skip_ahead_to(SubTaskKind::WalkNextTo);
                return SubTaskOutcome::Continue;
            }
        }

        match self.find_nearest_item(pawn.position, &query) {
            Some(id) => {
                task.on_found_item(TargetRef::Item(id));
                SubTaskOutcome::Continue
            }
            None => {
                events.push(SimEvent {
                    tick: self.tick,
                    kind: SimEventKind::ItemSearchFailed {
                        pawn_id: pawn.id,
                        task_name: task.name.clone(),
                    },
                });
                SubTaskOutcome::Requeue
            }
        }
    }

    fn start_pickup(
        &mut self,
        pawn: &mut Pawn,
        task: &mut Task,
        events: &mut Vec<SimEvent>,
    ) -> SubTaskOutcome {
        let wanted = task.current_subtask().amount;
        let Some(TargetRef::Item(item_id)) = task.current_subtask().target else {
            return SubTaskOutcome::Abandon;
        };

        // The item may have been consumed or replaced since the search
        // resolved; picking up the wrong thing corrupts the delivery.
        let mismatch = match self.items.get(&item_id) {
            None => true,
            Some(item) => task
                .target_item_name()
                .is_some_and(|name| name != item.name),
        };
        if mismatch {
            events.push(SimEvent {
                tick: self.tick,
                kind: SimEventKind::PickupMismatch {
                    pawn_id: pawn.id,
                    task_name: task.name.clone(),
                },
            });
            return SubTaskOutcome::Requeue;
        }

        let Some(item) = self.items.get_mut(&item_id) else {
            return SubTaskOutcome::Abandon;
        };
        let name = item.name.clone();
        let Some(def) = self.config.items.get(&name) else {
            return SubTaskOutcome::Abandon;
        };

        let taken = wanted.min(item.count);
        if !pawn.add_to_hand(Stack {
            name: name.clone(),
            count: taken,
            nutrition: def.nutrition * taken as f32,
        }) {
            // Hands already full with a different kind.
            events.push(SimEvent {
                tick: self.tick,
                kind: SimEventKind::PickupMismatch {
                    pawn_id: pawn.id,
                    task_name: task.name.clone(),
                },
            });
            return SubTaskOutcome::Requeue;
        }

        item.count -= taken;
        let position = item.position;
        let layer = def.layer;
        if item.count == 0 {
            self.items.remove(&item_id);
            self.terrain.remove(layer, position);
        }
        events.push(SimEvent {
            tick: self.tick,
            kind: SimEventKind::ItemPickedUp {
                pawn_id: pawn.id,
                item_id,
                name: name.clone(),
                amount: taken,
            },
        });

        // Short stack: keep collecting from the next nearest match, or settle
        // for what we have.
        let held = pawn.in_hand.as_ref().map_or(0, |stack| stack.count);
        if held < wanted {
            let query = ItemQuery::Named(name);
            if let Some(next_id) = self.find_nearest_item(pawn.position, &query) {
                if task.rewind_to(SubTaskKind::FindItem) {
                    task.on_found_item(TargetRef::Item(next_id));
                    return SubTaskOutcome::Continue;
                }
            }
        }
        task.on_finish_subtask();
        SubTaskOutcome::Continue
    }

    fn start_delivery(
        &mut self,
        pawn: &mut Pawn,
        task: &mut Task,
        events: &mut Vec<SimEvent>,
    ) -> SubTaskOutcome {
        if pawn.in_hand.is_none() {
            events.push(SimEvent {
                tick: self.tick,
                kind: SimEventKind::DeliveryWithoutCargo {
                    pawn_id: pawn.id,
                    task_name: task.name.clone(),
                },
            });
            return SubTaskOutcome::Requeue;
        }
        let Some(TargetRef::Construction(construction_id)) = task.current_subtask().target else {
            return SubTaskOutcome::Abandon;
        };
        let Some(construction) = self.constructions.get_mut(&construction_id) else {
            // Site is gone; nothing to deliver to.
            return SubTaskOutcome::Abandon;
        };

        let name = pawn
            .in_hand
            .as_ref()
            .map(|stack| stack.name.clone())
            .unwrap_or_default();
        let dropped = pawn.take_from_hand(task.delivery_amount());
        construction.deliver_requirement(&name, dropped);
        self.task_queue
            .report_item_delivered_to(construction_id, construction, &name);
        events.push(SimEvent {
            tick: self.tick,
            kind: SimEventKind::ItemDelivered {
                pawn_id: pawn.id,
                construction_id,
                name,
                amount: dropped,
            },
        });

        task.on_finish_subtask();
        SubTaskOutcome::Continue
    }

    /// Poll a duration subtask: one tick of walking, eating, harvesting, or
    /// building.
    fn poll_subtask(
        &mut self,
        pawn: &mut Pawn,
        task: &mut Task,
        events: &mut Vec<SimEvent>,
    ) -> SubTaskOutcome {
        let delta = self.delta_secs();
        match task.current_subtask().kind {
            SubTaskKind::WalkTo | SubTaskKind::WalkNextTo => {
                pawn.step_movement();
                if pawn.has_reached_destination() {
                    task.on_reached_destination();
                    pawn.action = PawnAction::Idle;
                }
                SubTaskOutcome::Continue
            }

            SubTaskKind::Eat => {
                let done = match &mut pawn.in_hand {
                    Some(stack) if stack.nutrition > 0.0 && pawn.hunger < 1.0 => {
                        let bite = self.config.eat_rate_per_sec * delta;
                        stack.nutrition -= bite;
                        pawn.hunger = (pawn.hunger + bite).min(1.0);
                        false
                    }
                    _ => true,
                };
                if done {
                    pawn.in_hand = None;
                    events.push(SimEvent {
                        tick: self.tick,
                        kind: SimEventKind::FinishedEating { pawn_id: pawn.id },
                    });
                    task.on_finish_subtask();
                    pawn.action = PawnAction::Idle;
                }
                SubTaskOutcome::Continue
            }

            SubTaskKind::Harvest => self.poll_harvest(pawn, task, events),

            SubTaskKind::Build => {
                let Some(TargetRef::Construction(construction_id)) =
                    task.current_subtask().target
                else {
                    return SubTaskOutcome::Abandon;
                };
                let Some(construction) = self.constructions.get_mut(&construction_id) else {
                    return SubTaskOutcome::Abandon;
                };
                if construction.try_build(pawn.build_skill * delta) {
                    events.push(SimEvent {
                        tick: self.tick,
                        kind: SimEventKind::ConstructionCompleted {
                            construction_id,
                            name: construction.name.clone(),
                        },
                    });
                    task.on_finish_subtask();
                    pawn.action = PawnAction::Idle;
                }
                SubTaskOutcome::Continue
            }

            // Instant kinds are never polled.
            _ => {
                task.on_finish_subtask();
                pawn.action = PawnAction::Idle;
                SubTaskOutcome::Continue
            }
        }
    }

    fn poll_harvest(
        &mut self,
        pawn: &mut Pawn,
        task: &mut Task,
        events: &mut Vec<SimEvent>,
    ) -> SubTaskOutcome {
        let Some(TargetRef::Item(item_id)) = task.current_subtask().target else {
            return SubTaskOutcome::Abandon;
        };
        let Some(harvest) = self
            .items
            .get(&item_id)
            .and_then(|item| self.config.items.get(&item.name))
            .and_then(|def| def.harvest.clone())
        else {
            // Plant gone or not harvestable by definition.
            return SubTaskOutcome::Abandon;
        };
        let now_ms = self.now_ms();
        let delta = self.delta_secs();
        let Some(item) = self.items.get_mut(&item_id) else {
            return SubTaskOutcome::Abandon;
        };
        if !item.harvestable {
            // Harvested by someone else; retry after it regrows.
            return SubTaskOutcome::Requeue;
        }

        if item.apply_harvest(pawn.harvest_skill * delta, harvest.difficulty) {
            item.last_harvest_ms = now_ms;
            let position = item.position;
            let amount = self
                .rng
                .range_u32_inclusive(harvest.yield_min, harvest.yield_max);
            self.spawn_item(&harvest.yield_item, amount, position, events);
            events.push(SimEvent {
                tick: self.tick,
                kind: SimEventKind::HarvestCompleted {
                    pawn_id: pawn.id,
                    item_id,
                    yield_item: harvest.yield_item.clone(),
                    amount,
                },
            });
            task.on_finish_subtask();
            pawn.action = PawnAction::Idle;
        }
        SubTaskOutcome::Continue
    }

    // -------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------

    /// Resolve a target reference to the tile its entity occupies.
    fn target_position(&self, target: TargetRef) -> Option<TileCoord> {
        match target {
            TargetRef::Item(id) => self.items.get(&id).map(|item| item.position),
            TargetRef::Construction(id) => {
                self.constructions.get(&id).map(|c| c.position)
            }
        }
    }

    /// The item nearest to `from` matching the query.
    fn find_nearest_item(&self, from: TileCoord, query: &ItemQuery) -> Option<ItemId> {
        let found = self.terrain.nearest_matching(from, |occupant| {
            let TargetRef::Item(id) = occupant else {
                return false;
            };
            let Some(item) = self.items.get(&id) else {
                return false;
            };
            let Some(def) = self.config.items.get(&item.name) else {
                return false;
            };
            query.matches(&item.name, def)
        });
        match found {
            Some((_, TargetRef::Item(id))) => Some(id),
            _ => None,
        }
    }

    // -------------------------------------------------------------------
    // Save/load
    // -------------------------------------------------------------------

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut state: SimState = serde_json::from_str(json)?;
        state.rebuild_transient_state();
        Ok(state)
    }

    /// Rebuild the terrain occupancy grid from the entity maps after
    /// deserialization.
    pub fn rebuild_transient_state(&mut self) {
        self.terrain = Terrain::new(self.config.world_width, self.config.world_height);
        for item in self.items.values() {
            if let Some(def) = self.config.items.get(&item.name) {
                self.terrain
                    .place_at(def.layer, item.position, TargetRef::Item(item.id));
            }
        }
        for construction in self.constructions.values() {
            self.terrain.place_at(
                PlacementLayer::Structure,
                construction.position,
                TargetRef::Construction(construction.id),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(state: &SimState, tick: u64, action: SimAction) -> SimCommand {
        SimCommand {
            player_id: state.player_id,
            tick,
            action,
        }
    }

    fn count_events(events: &[SimEvent], mut pred: impl FnMut(&SimEventKind) -> bool) -> usize {
        events.iter().filter(|e| pred(&e.kind)).count()
    }

    #[test]
    fn wall_gets_built_from_a_single_wood_stack() {
        let mut sim = SimState::new(42);
        let commands = vec![
            cmd(&sim, 0, SimAction::SpawnPawn {
                name: "Alder".to_owned(),
                position: TileCoord::new(1, 1),
            }),
            cmd(&sim, 0, SimAction::SpawnItem {
                name: "Wood".to_owned(),
                count: 20,
                position: TileCoord::new(2, 2),
            }),
            cmd(&sim, 0, SimAction::DesignateConstruction {
                name: "Wall".to_owned(),
                position: TileCoord::new(5, 5),
            }),
        ];

        let result = sim.step(&commands, 200);

        assert_eq!(
            count_events(&result.events, |k| matches!(
                k,
                SimEventKind::ConstructionCompleted { .. }
            )),
            1
        );
        let wall = sim.constructions.values().next().unwrap();
        assert!(wall.is_built());
        // The wood stack was fully consumed.
        assert!(sim.items.is_empty());
        // Nothing left to do.
        assert!(sim.task_queue.is_empty());
    }

    #[test]
    fn wall_gets_built_from_scattered_stacks_via_pickup_rewind() {
        let mut sim = SimState::new(7);
        let commands = vec![
            cmd(&sim, 0, SimAction::SpawnPawn {
                name: "Rowan".to_owned(),
                position: TileCoord::new(1, 1),
            }),
            cmd(&sim, 0, SimAction::SpawnItem {
                name: "Wood".to_owned(),
                count: 12,
                position: TileCoord::new(2, 2),
            }),
            cmd(&sim, 0, SimAction::SpawnItem {
                name: "Wood".to_owned(),
                count: 8,
                position: TileCoord::new(6, 2),
            }),
            cmd(&sim, 0, SimAction::DesignateConstruction {
                name: "Wall".to_owned(),
                position: TileCoord::new(4, 6),
            }),
        ];

        let result = sim.step(&commands, 300);

        // Two separate pickups feed one delivery.
        assert_eq!(
            count_events(&result.events, |k| matches!(
                k,
                SimEventKind::ItemPickedUp { .. }
            )),
            2
        );
        assert_eq!(
            count_events(&result.events, |k| matches!(
                k,
                SimEventKind::ItemDelivered { amount: 20, .. }
            )),
            1
        );
        assert!(sim.constructions.values().next().unwrap().is_built());
    }

    #[test]
    fn failed_searches_respect_the_retry_cooldown() {
        let mut sim = SimState::new(3);
        let commands = vec![
            cmd(&sim, 0, SimAction::SpawnPawn {
                name: "Ash".to_owned(),
                position: TileCoord::new(1, 1),
            }),
            // A wall with no wood anywhere in the world.
            cmd(&sim, 0, SimAction::DesignateConstruction {
                name: "Wall".to_owned(),
                position: TileCoord::new(5, 5),
            }),
        ];

        // 100 ticks = 10 000 ms of sim time with a 2 000 ms cooldown.
        let result = sim.step(&commands, 100);

        let failure_ticks: Vec<u64> = result
            .events
            .iter()
            .filter(|e| matches!(e.kind, SimEventKind::ItemSearchFailed { .. }))
            .map(|e| e.tick)
            .collect();
        assert!(failure_ticks.len() >= 2, "expected repeated retries");

        // Consecutive attempts are at least one cooldown apart.
        let cooldown_ticks = sim.config.task_cooldown_ms / sim.config.tick_ms;
        for pair in failure_ticks.windows(2) {
            assert!(pair[1] - pair[0] >= cooldown_ticks);
        }

        assert!(!sim.constructions.values().next().unwrap().is_built());
    }

    #[test]
    fn hungry_pawn_finds_food_and_recovers() {
        let mut sim = SimState::new(11);
        let commands = vec![
            cmd(&sim, 0, SimAction::SpawnPawn {
                name: "Hazel".to_owned(),
                position: TileCoord::new(1, 1),
            }),
            cmd(&sim, 1, SimAction::SpawnItem {
                name: "Berries".to_owned(),
                count: 3,
                position: TileCoord::new(3, 3),
            }),
            // Queued work exists, but hunger takes priority over it.
            cmd(&sim, 1, SimAction::DesignateConstruction {
                name: "Wall".to_owned(),
                position: TileCoord::new(6, 6),
            }),
        ];
        sim.step(&commands, 1);

        // Starve the pawn below the food-seeking threshold.
        let id = *sim.pawns.keys().next().unwrap();
        sim.pawns.get_mut(&id).unwrap().hunger = 0.3;

        let result = sim.step(&[], 100);

        let first_claim = result
            .events
            .iter()
            .find_map(|e| match &e.kind {
                SimEventKind::TaskClaimed { task_name, .. } => Some(task_name.as_str()),
                _ => None,
            })
            .unwrap();
        assert_eq!(first_claim, "Find and eat some food");

        assert!(count_events(&result.events, |k| matches!(
            k,
            SimEventKind::FinishedEating { .. }
        )) >= 1);
        assert!(sim.pawns[&id].hunger > 0.3);
        assert!(sim.pawns[&id].in_hand.is_none());
    }

    #[test]
    fn harvest_order_yields_berries_and_the_bush_regrows() {
        let mut sim = SimState::new(5);
        let commands = vec![
            cmd(&sim, 0, SimAction::SpawnPawn {
                name: "Fern".to_owned(),
                position: TileCoord::new(1, 1),
            }),
            cmd(&sim, 0, SimAction::SpawnItem {
                name: "BerryBush".to_owned(),
                count: 1,
                position: TileCoord::new(4, 4),
            }),
            cmd(&sim, 0, SimAction::IssueOrder {
                order: Orders::Harvest,
                from: TileCoord::new(0, 0),
                to: TileCoord::new(10, 10),
            }),
        ];

        // 60 000 ms regrowth = 600 ticks; run past it.
        let result = sim.step(&commands, 700);

        let yield_amounts: Vec<u32> = result
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                SimEventKind::HarvestCompleted { amount, .. } => Some(*amount),
                _ => None,
            })
            .collect();
        assert_eq!(yield_amounts.len(), 1);
        assert!((5..=15).contains(&yield_amounts[0]));

        // The yield landed in the world as Berries.
        let berries = sim.items.values().find(|i| i.name == "Berries").unwrap();
        assert_eq!(berries.count, yield_amounts[0]);

        // The bush regrew after its interval.
        assert_eq!(
            count_events(&result.events, |k| matches!(
                k,
                SimEventKind::PlantRegrown { .. }
            )),
            1
        );
        let bush = sim.items.values().find(|i| i.name == "BerryBush").unwrap();
        assert!(bush.harvestable);
    }

    #[test]
    fn non_harvest_orders_are_accepted_without_effect() {
        let mut sim = SimState::new(5);
        let commands = vec![
            cmd(&sim, 0, SimAction::SpawnItem {
                name: "BerryBush".to_owned(),
                count: 1,
                position: TileCoord::new(4, 4),
            }),
            cmd(&sim, 0, SimAction::IssueOrder {
                order: Orders::Chop,
                from: TileCoord::new(0, 0),
                to: TileCoord::new(10, 10),
            }),
        ];
        sim.step(&commands, 2);
        assert!(sim.task_queue.is_empty());
    }

    #[test]
    fn invalid_commands_are_silent_noops() {
        let mut sim = SimState::new(9);
        let commands = vec![
            cmd(&sim, 0, SimAction::SpawnItem {
                name: "Mithril".to_owned(),
                count: 5,
                position: TileCoord::new(1, 1),
            }),
            cmd(&sim, 0, SimAction::SpawnPawn {
                name: "Nowhere".to_owned(),
                position: TileCoord::new(-3, 0),
            }),
            cmd(&sim, 0, SimAction::DesignateConstruction {
                name: "Castle".to_owned(),
                position: TileCoord::new(2, 2),
            }),
        ];
        let result = sim.step(&commands, 2);
        assert!(result.events.is_empty());
        assert!(sim.items.is_empty());
        assert!(sim.pawns.is_empty());
        assert!(sim.constructions.is_empty());
    }

    #[test]
    fn identical_seeds_and_commands_produce_identical_state() {
        let commands_for = |sim: &SimState| {
            vec![
                cmd(sim, 0, SimAction::SpawnPawn {
                    name: "Alder".to_owned(),
                    position: TileCoord::new(1, 1),
                }),
                cmd(sim, 0, SimAction::SpawnItem {
                    name: "Wood".to_owned(),
                    count: 20,
                    position: TileCoord::new(2, 2),
                }),
                cmd(sim, 5, SimAction::DesignateConstruction {
                    name: "Wall".to_owned(),
                    position: TileCoord::new(5, 5),
                }),
            ]
        };

        let mut a = SimState::new(1234);
        let mut b = SimState::new(1234);
        a.step(&commands_for(&a), 150);
        b.step(&commands_for(&b), 150);

        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn save_load_roundtrip_continues_identically() {
        let mut sim = SimState::new(77);
        let commands = vec![
            cmd(&sim, 0, SimAction::SpawnPawn {
                name: "Alder".to_owned(),
                position: TileCoord::new(1, 1),
            }),
            cmd(&sim, 0, SimAction::SpawnItem {
                name: "Wood".to_owned(),
                count: 20,
                position: TileCoord::new(3, 3),
            }),
            cmd(&sim, 0, SimAction::DesignateConstruction {
                name: "Wall".to_owned(),
                position: TileCoord::new(6, 6),
            }),
        ];
        // Stop mid-delivery so in-flight task state crosses the save.
        sim.step(&commands, 8);

        let mut restored = SimState::from_json(&sim.to_json().unwrap()).unwrap();

        sim.step(&[], 200);
        restored.step(&[], 200);
        assert_eq!(sim.to_json().unwrap(), restored.to_json().unwrap());
        assert!(restored.constructions.values().next().unwrap().is_built());
    }
}
