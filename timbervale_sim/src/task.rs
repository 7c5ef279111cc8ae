// The task model — units of work decomposed into ordered subtask sequences.
//
// A `Task` owns an ordered sequence of `SubTask` records plus a cursor. The
// pawn executor (see `sim.rs`) interprets one subtask at a time, advancing
// the cursor on completion; a task is finished when the cursor reaches the
// end of the sequence. `SubTask` is a deliberately lightweight record: its
// kind is immutable, and only the resolved target / amount fields are filled
// in as earlier subtasks discover them (FindItem resolves the entity that the
// following WalkTo will move toward).
//
// Delivery tasks for the same requirement can be *grouped*: the queue merges
// pending same-named deliveries into one task whose Pickup amount covers the
// whole group, and the siblings ride along in `grouped`, consumed one at a
// time after the lead task finishes (`into_next_in_group`).
//
// Cursor invariants: monotonically non-decreasing except for the explicit
// `rewind_to`, and never exceeding the sequence length. Advancing past the
// end panics — that is a malformed task definition, not a runtime condition.
//
// See also: `queue.rs` for issuance/grouping/cooldown, `sim.rs` for the
// executor state machine that drives the cursor.

use crate::item::ItemQuery;
use crate::types::{ConstructionId, ItemId, TargetRef};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

/// Classification of a whole task. The queue uses this to find delivery
/// tasks eligible for grouping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseTaskType {
    General,
    RequirementDelivery,
    Harvest,
    Build,
}

/// The kind of one atomic step. `Manipulate` and `Haul` are reserved for
/// future order types and never constructed by the current factories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubTaskKind {
    FindItem,
    WalkTo,
    WalkNextTo,
    Pickup,
    Eat,
    Manipulate,
    Harvest,
    Build,
    Haul,
    RequirementDelivery,
}

/// Player-issued order kinds. Only `Harvest` is wired to a task today;
/// the rest are accepted and ignored (reserved extension points).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orders {
    Cancel,
    Deconstruct,
    Mine,
    Chop,
    Harvest,
}

/// One atomic step of a task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubTask {
    pub kind: SubTaskKind,
    /// Search term, populated for FindItem.
    pub query: Option<ItemQuery>,
    /// Resolved target entity, populated at construction or by an earlier
    /// subtask's resolution.
    pub target: Option<TargetRef>,
    /// Amount for Pickup / RequirementDelivery.
    pub amount: u32,
}

impl SubTask {
    fn new(kind: SubTaskKind) -> Self {
        Self {
            kind,
            query: None,
            target: None,
            amount: 1,
        }
    }

    fn with_target(kind: SubTaskKind, target: TargetRef) -> Self {
        Self {
            target: Some(target),
            ..Self::new(kind)
        }
    }
}

/// A unit of work: an ordered subtask sequence with a cursor, plus optional
/// grouped sibling tasks sharing the same delivery requirement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// Informational, for event logs and debugging.
    pub name: String,
    pub base_type: BaseTaskType,
    /// Sim-time of the last attempt, stamped by `restart`. `None` until the
    /// task has been returned unfinished at least once, so fresh tasks are
    /// never held back by the cooldown.
    pub last_attempt_ms: Option<u64>,
    subtasks: SmallVec<[SubTask; 5]>,
    cursor: usize,
    grouped: Vec<Task>,
}

impl Task {
    fn new(name: &str, base_type: BaseTaskType, subtasks: SmallVec<[SubTask; 5]>) -> Self {
        Self {
            name: name.to_owned(),
            base_type,
            last_attempt_ms: None,
            subtasks,
            cursor: 0,
            grouped: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Factories — the canonical subtask sequences per task kind.
    // -----------------------------------------------------------------------

    /// FindItem(name) → WalkTo → Pickup(amount) → WalkNextTo(target) →
    /// RequirementDelivery(target, amount).
    pub fn delivery(target: ConstructionId, item_name: &str, amount: u32) -> Self {
        let find = SubTask {
            query: Some(ItemQuery::Named(item_name.to_owned())),
            ..SubTask::new(SubTaskKind::FindItem)
        };
        let pickup = SubTask {
            amount,
            ..SubTask::new(SubTaskKind::Pickup)
        };
        let deliver = SubTask {
            amount,
            ..SubTask::with_target(
                SubTaskKind::RequirementDelivery,
                TargetRef::Construction(target),
            )
        };
        Self::new(
            &format!("Deliver {amount} {item_name}"),
            BaseTaskType::RequirementDelivery,
            smallvec![
                find,
                SubTask::new(SubTaskKind::WalkTo),
                pickup,
                SubTask::with_target(SubTaskKind::WalkNextTo, TargetRef::Construction(target)),
                deliver,
            ],
        )
    }

    /// WalkTo(target) → Harvest(target).
    pub fn harvest_plant(target: ItemId) -> Self {
        Self::new(
            "Harvest",
            BaseTaskType::Harvest,
            smallvec![
                SubTask::with_target(SubTaskKind::WalkTo, TargetRef::Item(target)),
                SubTask::with_target(SubTaskKind::Harvest, TargetRef::Item(target)),
            ],
        )
    }

    /// WalkNextTo(target) → Build(target).
    pub fn build(target: ConstructionId) -> Self {
        Self::new(
            "Build",
            BaseTaskType::Build,
            smallvec![
                SubTask::with_target(SubTaskKind::WalkNextTo, TargetRef::Construction(target)),
                SubTask::with_target(SubTaskKind::Build, TargetRef::Construction(target)),
            ],
        )
    }

    /// FindItem(food) → WalkTo → Pickup → Eat.
    pub fn find_and_eat_food() -> Self {
        let find = SubTask {
            query: Some(ItemQuery::Food),
            ..SubTask::new(SubTaskKind::FindItem)
        };
        Self::new(
            "Find and eat some food",
            BaseTaskType::General,
            smallvec![
                find,
                SubTask::new(SubTaskKind::WalkTo),
                SubTask::new(SubTaskKind::Pickup),
                SubTask::new(SubTaskKind::Eat),
            ],
        )
    }

    // -----------------------------------------------------------------------
    // Cursor
    // -----------------------------------------------------------------------

    pub fn is_finished(&self) -> bool {
        self.cursor == self.subtasks.len()
    }

    /// Force-complete: jump the cursor to the end.
    pub fn finish(&mut self) {
        self.cursor = self.subtasks.len();
    }

    /// Reset the cursor and stamp the attempt time; used when the task is
    /// returned to the queue unfinished.
    pub fn restart(&mut self, now_ms: u64) {
        self.cursor = 0;
        self.last_attempt_ms = Some(now_ms);
    }

    pub fn current_subtask(&self) -> &SubTask {
        assert!(
            !self.is_finished(),
            "no current subtask: task '{}' is finished",
            self.name
        );
        &self.subtasks[self.cursor]
    }

    pub fn current_subtask_mut(&mut self) -> &mut SubTask {
        assert!(
            !self.is_finished(),
            "no current subtask: task '{}' is finished",
            self.name
        );
        &mut self.subtasks[self.cursor]
    }

    /// Advance the cursor by one. Panics past the end — advancing a finished
    /// task means the task definition or executor logic is malformed.
    pub fn on_finish_subtask(&mut self) {
        assert!(
            !self.is_finished(),
            "advanced past the end of task '{}'",
            self.name
        );
        self.cursor += 1;
    }

    /// Rewind the cursor to the nearest preceding subtask of `kind`.
    /// Returns `false` (cursor untouched) when no such subtask precedes the
    /// current position; callers decide whether that is recoverable.
    pub fn rewind_to(&mut self, kind: SubTaskKind) -> bool {
        let upper = self.cursor.min(self.subtasks.len());
        match self.subtasks[..upper].iter().rposition(|s| s.kind == kind) {
            Some(index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }

    /// Advance the cursor until a subtask of `kind` is current, or the task
    /// finishes. Used when the pawn already holds the item a search would
    /// have found.
    pub fn skip_ahead_to(&mut self, kind: SubTaskKind) {
        while !self.is_finished() {
            self.on_finish_subtask();
            if !self.is_finished() && self.current_subtask().kind == kind {
                break;
            }
        }
    }

    /// A found entity resolves the search: advance, then attach the entity
    /// to the now-current subtask (the walk toward it).
    pub fn on_found_item(&mut self, target: TargetRef) {
        self.on_finish_subtask();
        if !self.is_finished() {
            self.current_subtask_mut().target = Some(target);
        }
    }

    /// Arrival resolves the walk: advance, then propagate the walk's target
    /// into the now-current subtask.
    pub fn on_reached_destination(&mut self) {
        let target = self.current_subtask().target;
        self.on_finish_subtask();
        if !self.is_finished() {
            self.current_subtask_mut().target = target;
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn subtask_of_kind(&self, kind: SubTaskKind) -> Option<&SubTask> {
        self.subtasks.iter().find(|s| s.kind == kind)
    }

    pub fn subtask_of_kind_mut(&mut self, kind: SubTaskKind) -> Option<&mut SubTask> {
        self.subtasks.iter_mut().find(|s| s.kind == kind)
    }

    /// The item name this task searches for, if its FindItem subtask names
    /// one. Category searches (food) have no name and never group.
    pub fn target_item_name(&self) -> Option<&str> {
        match self.subtask_of_kind(SubTaskKind::FindItem)?.query.as_ref()? {
            ItemQuery::Named(name) => Some(name),
            ItemQuery::Food => None,
        }
    }

    /// The amount this task's RequirementDelivery subtask drops off.
    pub fn delivery_amount(&self) -> u32 {
        self.subtask_of_kind(SubTaskKind::RequirementDelivery)
            .map_or(0, |s| s.amount)
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    // -----------------------------------------------------------------------
    // Grouping
    // -----------------------------------------------------------------------

    /// Merge sibling delivery tasks for the same requirement into this task:
    /// their pickup amounts are added to this task's Pickup subtask so one
    /// acquisition trip covers the whole group, and the siblings ride along
    /// to be served one at a time. Calling again appends — siblings already
    /// attached keep their place and their accounted amounts.
    ///
    /// Only valid for RequirementDelivery tasks (both self and siblings).
    pub fn group_similar_deliveries(&mut self, siblings: Vec<Task>) {
        debug_assert_eq!(self.base_type, BaseTaskType::RequirementDelivery);
        let extra: u32 = siblings
            .iter()
            .map(|t| t.subtask_of_kind(SubTaskKind::Pickup).map_or(0, |s| s.amount))
            .sum();
        let pickup = self
            .subtask_of_kind_mut(SubTaskKind::Pickup)
            .expect("delivery task without a Pickup subtask");
        pickup.amount += extra;
        self.grouped.extend(siblings);
    }

    pub fn is_grouped(&self) -> bool {
        !self.grouped.is_empty()
    }

    /// Detach the grouped siblings, e.g. to re-enqueue them separately.
    pub fn take_grouped(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.grouped)
    }

    /// Consume this (finished) task and pull the next sibling from the
    /// group; the remaining group re-attaches to the popped sibling. `None`
    /// when ungrouped.
    pub fn into_next_in_group(mut self) -> Option<Task> {
        if self.grouped.is_empty() {
            return None;
        }
        let mut next = self.grouped.remove(0);
        next.grouped = std::mem::take(&mut self.grouped);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::GameRng;

    fn ids() -> (ConstructionId, ItemId) {
        let mut rng = GameRng::new(42);
        (ConstructionId::new(&mut rng), ItemId::new(&mut rng))
    }

    #[test]
    fn factory_sequences_match_the_canonical_table() {
        let (wall, bush) = ids();

        let kinds = |t: &Task| -> Vec<SubTaskKind> { t.subtasks.iter().map(|s| s.kind).collect() };

        let delivery = Task::delivery(wall, "Wood", 20);
        assert_eq!(
            kinds(&delivery),
            vec![
                SubTaskKind::FindItem,
                SubTaskKind::WalkTo,
                SubTaskKind::Pickup,
                SubTaskKind::WalkNextTo,
                SubTaskKind::RequirementDelivery,
            ]
        );
        assert_eq!(delivery.base_type, BaseTaskType::RequirementDelivery);
        assert_eq!(delivery.target_item_name(), Some("Wood"));
        assert_eq!(delivery.delivery_amount(), 20);

        let harvest = Task::harvest_plant(bush);
        assert_eq!(kinds(&harvest), vec![SubTaskKind::WalkTo, SubTaskKind::Harvest]);

        let build = Task::build(wall);
        assert_eq!(kinds(&build), vec![SubTaskKind::WalkNextTo, SubTaskKind::Build]);

        let food = Task::find_and_eat_food();
        assert_eq!(
            kinds(&food),
            vec![
                SubTaskKind::FindItem,
                SubTaskKind::WalkTo,
                SubTaskKind::Pickup,
                SubTaskKind::Eat,
            ]
        );
        // Category search has no groupable name.
        assert_eq!(food.target_item_name(), None);
    }

    #[test]
    fn finished_after_exactly_subtask_count_advances() {
        let (wall, _) = ids();
        let mut task = Task::build(wall);

        assert!(!task.is_finished());
        task.on_finish_subtask();
        assert!(!task.is_finished());
        task.on_finish_subtask();
        assert!(task.is_finished());
    }

    #[test]
    #[should_panic(expected = "advanced past the end")]
    fn advancing_a_finished_task_panics() {
        let (wall, _) = ids();
        let mut task = Task::build(wall);
        task.finish();
        task.on_finish_subtask();
    }

    #[test]
    fn rewind_then_skip_lands_on_the_right_subtasks() {
        let (wall, _) = ids();
        let mut task = Task::delivery(wall, "Wood", 20);

        // Advance to the Pickup step (index 2).
        task.on_finish_subtask();
        task.on_finish_subtask();
        assert_eq!(task.current_subtask().kind, SubTaskKind::Pickup);

        assert!(task.rewind_to(SubTaskKind::FindItem));
        assert_eq!(task.cursor(), 0);
        assert_eq!(task.current_subtask().kind, SubTaskKind::FindItem);

        task.skip_ahead_to(SubTaskKind::WalkNextTo);
        assert_eq!(task.cursor(), 3);
        assert_eq!(task.current_subtask().kind, SubTaskKind::WalkNextTo);
    }

    #[test]
    fn rewind_without_a_matching_predecessor_is_rejected() {
        let (wall, _) = ids();
        let mut task = Task::build(wall);
        task.on_finish_subtask();
        // No FindItem subtask exists anywhere in a build task.
        assert!(!task.rewind_to(SubTaskKind::FindItem));
        // Cursor untouched.
        assert_eq!(task.cursor(), 1);
    }

    #[test]
    fn skip_ahead_runs_to_the_end_when_kind_is_absent() {
        let (wall, _) = ids();
        let mut task = Task::build(wall);
        task.skip_ahead_to(SubTaskKind::Eat);
        assert!(task.is_finished());
    }

    #[test]
    fn found_item_resolves_the_following_walk() {
        let (wall, log) = ids();
        let mut task = Task::delivery(wall, "Wood", 5);

        task.on_found_item(TargetRef::Item(log));
        assert_eq!(task.current_subtask().kind, SubTaskKind::WalkTo);
        assert_eq!(task.current_subtask().target, Some(TargetRef::Item(log)));

        // Arrival propagates the walk's target into the Pickup step.
        task.on_reached_destination();
        assert_eq!(task.current_subtask().kind, SubTaskKind::Pickup);
        assert_eq!(task.current_subtask().target, Some(TargetRef::Item(log)));
    }

    #[test]
    fn restart_resets_cursor_and_stamps_attempt_time() {
        let (wall, _) = ids();
        let mut task = Task::build(wall);
        task.on_finish_subtask();
        assert_eq!(task.last_attempt_ms, None);

        task.restart(12_345);
        assert_eq!(task.cursor(), 0);
        assert_eq!(task.last_attempt_ms, Some(12_345));
    }

    #[test]
    fn grouping_sums_pickup_amounts_and_attaches_siblings() {
        let (wall, _) = ids();
        let mut lead = Task::delivery(wall, "Wood", 20);
        let siblings = vec![
            Task::delivery(wall, "Wood", 10),
            Task::delivery(wall, "Wood", 5),
        ];

        lead.group_similar_deliveries(siblings);

        assert_eq!(
            lead.subtask_of_kind(SubTaskKind::Pickup).unwrap().amount,
            35
        );
        // The per-target delivery amount is untouched.
        assert_eq!(lead.delivery_amount(), 20);
        assert!(lead.is_grouped());
    }

    #[test]
    fn grouping_again_appends_instead_of_replacing() {
        let (wall, _) = ids();
        let mut lead = Task::delivery(wall, "Wood", 20);
        lead.group_similar_deliveries(vec![Task::delivery(wall, "Wood", 10)]);
        lead.group_similar_deliveries(vec![Task::delivery(wall, "Wood", 5)]);

        assert_eq!(
            lead.subtask_of_kind(SubTaskKind::Pickup).unwrap().amount,
            35
        );
        assert_eq!(lead.take_grouped().len(), 2);
    }

    #[test]
    fn group_members_are_consumed_one_at_a_time() {
        let (wall, _) = ids();
        let mut lead = Task::delivery(wall, "Wood", 20);
        lead.group_similar_deliveries(vec![
            Task::delivery(wall, "Wood", 10),
            Task::delivery(wall, "Wood", 5),
        ]);

        let second = lead.into_next_in_group().unwrap();
        assert_eq!(second.delivery_amount(), 10);
        assert!(second.is_grouped());

        let third = second.into_next_in_group().unwrap();
        assert_eq!(third.delivery_amount(), 5);
        assert!(!third.is_grouped());
        assert!(third.into_next_in_group().is_none());
    }

    #[test]
    fn serialization_roundtrip() {
        let (wall, _) = ids();
        let mut task = Task::delivery(wall, "Wood", 20);
        task.on_finish_subtask();

        let json = serde_json::to_string(&task).unwrap();
        let restored: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.name, task.name);
        assert_eq!(restored.cursor(), 1);
        assert_eq!(restored.delivery_amount(), 20);
    }
}
