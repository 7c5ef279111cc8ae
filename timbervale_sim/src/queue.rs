// The central task queue — issues, re-queues, and groups pending tasks.
//
// Pending tasks sit in a FIFO; idle pawns poll `request_task` each tick.
// Relative order of non-competing tasks is preserved — the only reordering
// causes are cooldown deferral (a recently attempted task moves to the tail)
// and grouping (same-requirement delivery siblings are pulled out of the
// queue and merged into the issued task).
//
// Invariant: a task lives in exactly one place — this queue or a single
// pawn's `current_task`. Issuance moves ownership out; `return_task_unfinished`
// moves it (and any detached group members) back.
//
// Food-seeking is deliberately not queued: `request_find_and_eat_food_task`
// always builds a fresh ad-hoc task, since hunger is agent-private and never
// competed for.
//
// See also: `task.rs` for the task model and factories, `construction.rs`
// for the requirement bookkeeping consumed by `add_build_order` and
// `report_item_delivered_to`, `sim.rs` for the pawns that poll this queue.

use crate::construction::Construction;
use crate::task::{BaseTaskType, Orders, Task};
use crate::types::{ConstructionId, TargetRef};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Process-scoped queue of pending tasks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskQueue {
    pending: VecDeque<Task>,
    /// Minimum sim-milliseconds between attempts at the same task.
    cooldown_ms: u64,
}

impl TaskQueue {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            pending: VecDeque::new(),
            cooldown_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.pending.iter()
    }

    /// Pop the oldest eligible task, or `None` this cycle (non-blocking poll;
    /// the caller retries on a later tick).
    ///
    /// A task still cooling down from a previous attempt is pushed to the
    /// tail instead of being issued. An eligible delivery task then absorbs
    /// every queued delivery sibling for the same item name (grouping). The
    /// cooldown check comes first so a deferred task never carries a group
    /// back into the queue — queued tasks are always ungrouped.
    pub fn request_task(&mut self, now_ms: u64) -> Option<Task> {
        let mut task = self.pending.pop_front()?;

        if let Some(last_attempt) = task.last_attempt_ms {
            if now_ms.saturating_sub(last_attempt) < self.cooldown_ms {
                self.pending.push_back(task);
                return None;
            }
        }

        if task.base_type == BaseTaskType::RequirementDelivery {
            let siblings = self.drain_deliveries_matching(&task);
            if !siblings.is_empty() {
                task.group_similar_deliveries(siblings);
            }
        }

        Some(task)
    }

    /// Remove every queued delivery task searching for the same item name.
    fn drain_deliveries_matching(&mut self, task: &Task) -> Vec<Task> {
        let Some(name) = task.target_item_name().map(str::to_owned) else {
            return Vec::new();
        };

        let mut siblings = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            let candidate = &self.pending[index];
            if candidate.base_type == BaseTaskType::RequirementDelivery
                && candidate.target_item_name() == Some(name.as_str())
            {
                // remove() is always Some here; the index was just checked.
                siblings.extend(self.pending.remove(index));
            } else {
                index += 1;
            }
        }
        siblings
    }

    /// Build a fresh ad-hoc food task. Never touches the queue.
    pub fn request_find_and_eat_food_task(&self) -> Task {
        Task::find_and_eat_food()
    }

    /// Put a task back after an agent could not proceed: restart it (and
    /// every grouped sibling, detached so each lives in the queue on its
    /// own) and reinsert all at the tail.
    pub fn return_task_unfinished(&mut self, mut task: Task, now_ms: u64) {
        let siblings = task.take_grouped();
        task.restart(now_ms);
        self.pending.push_back(task);
        for mut sibling in siblings {
            sibling.restart(now_ms);
            self.pending.push_back(sibling);
        }
    }

    /// Register a new build order: initialize the target's requirement
    /// bookkeeping and emit one delivery task per unmet requirement,
    /// reserving the amounts as on-the-way.
    pub fn add_build_order(&mut self, id: ConstructionId, construction: &mut Construction) {
        construction.init_requirements();
        let names: Vec<String> = construction
            .requirements()
            .iter()
            .map(|r| r.name.clone())
            .collect();
        for name in names {
            let remaining = construction.requirement_remaining(&name);
            if remaining > 0 {
                construction.report_on_the_way(&name, remaining);
                self.pending.push_back(Task::delivery(id, &name, remaining));
            }
        }
    }

    /// A delivery just landed on `construction`. If everything is now ready,
    /// emit a Build task; otherwise, if the delivered item is still short
    /// (e.g. the pawn dropped less than requested), emit a follow-up
    /// delivery for the remainder.
    pub fn report_item_delivered_to(
        &mut self,
        id: ConstructionId,
        construction: &mut Construction,
        item_name: &str,
    ) {
        if construction.has_all_requirements() {
            self.add_task(BaseTaskType::Build, TargetRef::Construction(id));
        } else if construction.does_need(item_name) {
            let remaining = construction.requirement_remaining(item_name);
            construction.report_on_the_way(item_name, remaining);
            self.pending
                .push_back(Task::delivery(id, item_name, remaining));
        }
    }

    /// Dispatch a player order. Only Harvest is wired today; the other kinds
    /// are accepted and ignored.
    pub fn add_order(&mut self, order: Orders, target: TargetRef) {
        match order {
            Orders::Cancel => {}
            Orders::Deconstruct => {}
            Orders::Mine => {}
            Orders::Chop => {}
            Orders::Harvest => self.add_task(BaseTaskType::Harvest, target),
        }
    }

    /// Enqueue a task of the given classification against a target. Silent
    /// no-op when the target's type doesn't fit the task kind.
    pub fn add_task(&mut self, base_type: BaseTaskType, target: TargetRef) {
        match (base_type, target) {
            (BaseTaskType::Harvest, TargetRef::Item(item)) => {
                self.pending.push_back(Task::harvest_plant(item));
            }
            (BaseTaskType::Build, TargetRef::Construction(construction)) => {
                self.pending.push_back(Task::build(construction));
            }
            _ => {}
        }
    }
}
