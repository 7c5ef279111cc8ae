// timbervale_sim — pure Rust colony simulation library.
//
// This crate contains all simulation logic for Timbervale: world state,
// entity management, the task scheduler, the pawn executor, the PRNG, and
// the command interface. It has zero engine dependencies and can be tested,
// benchmarked, and run headless.
//
// Module overview:
// - `sim.rs`:          Top-level SimState, tick loop, command processing, pawn executor.
// - `terrain.rs`:      Layered 2D tile occupancy grid (the world's spatial truth).
// - `queue.rs`:        The central task queue — issuance, cooldown, delivery grouping.
// - `task.rs`:         Task entities — ordered subtask sequences with a cursor.
// - `pawn.rs`:         Pawn entities — locomotion, carrying, hunger.
// - `item.rs`:         Item entities + the data-driven item catalog types.
// - `construction.rs`: Construction sites + requirement delivery bookkeeping.
// - `command.rs`:      SimCommand / SimAction — all sim mutations.
// - `event.rs`:        Narrative SimEvents — the sim's observable output.
// - `config.rs`:       GameConfig — all tunable parameters and catalogs.
// - `prng`:            Re-exported from `timbervale_prng` — xoshiro256++ PRNG with SplitMix64 seeding.
// - `types.rs`:        TileCoord, entity IDs, target references, placement layers.
//
// **Critical constraint: determinism.** The simulation is a pure function:
// `(state, commands) -> (new_state, events)`. All randomness comes from a
// seeded xoshiro256++ PRNG (re-exported from `timbervale_prng`). No `HashMap`,
// no system time, no OS entropy. Use `BTreeMap` for ordered collections.

pub mod command;
pub mod config;
pub mod construction;
pub mod event;
pub mod item;
pub mod pawn;
pub use timbervale_prng as prng;
pub mod queue;
pub mod sim;
pub mod task;
pub mod terrain;
pub mod types;
