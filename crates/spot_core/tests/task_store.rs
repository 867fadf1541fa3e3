use spot_core::{
    AxisValue, KvRepository, MemoryKvRepository, NewTask, Priority, ReorderOutcome, StoreError,
    Survey, Task, TaskId, TaskPatch, TaskStatus, TaskStore,
};
use std::cell::RefCell;
use std::rc::Rc;

const KEY: &str = "spot-tasks";

fn names(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|task| task.name.clone()).collect()
}

fn empty_store() -> TaskStore<MemoryKvRepository> {
    TaskStore::new(MemoryKvRepository::new())
}

#[test]
fn add_then_move_to_other_survey_group_lands_at_requested_index() {
    let mut store = empty_store();
    store.add_task(NewTask::new("A", Survey::Primary));
    let b = store.add_task(NewTask::new("B", Survey::Primary));
    store.add_task(NewTask::new("C", Survey::Secondary));

    assert_eq!(names(&store.tasks_by_survey(Survey::Primary)), vec!["A", "B"]);

    let outcome = store
        .move_to_survey_and_reorder(&b.id, Survey::Secondary, 0)
        .unwrap();

    assert!(outcome.is_moved());
    assert_eq!(names(&store.tasks_by_survey(Survey::Secondary)), vec!["B", "C"]);
    assert_eq!(names(&store.tasks_by_survey(Survey::Primary)), vec!["A"]);
    assert_eq!(store.len(), 3);
}

#[test]
fn add_task_applies_defaults_and_fresh_ids() {
    let mut store = empty_store();
    let first = store.add_task(NewTask::new("one", Survey::Primary));
    let second = store.add_task(NewTask::new("two", Survey::Secondary));

    assert_ne!(first.id, second.id);
    assert_eq!(first.status, TaskStatus::Todo);
    assert_eq!(first.priority, None);
    assert!(first.updated_at >= first.created_at);
    assert_eq!(store.get_task(&second.id), Some(&second));
}

#[test]
fn update_task_merges_patch_and_keeps_position() {
    let mut store = empty_store();
    store.add_task(NewTask::new("first", Survey::Primary));
    let target = store.add_task(NewTask::new("second", Survey::Primary));
    store.add_task(NewTask::new("third", Survey::Primary));

    let updated = store
        .update_task(
            &target.id,
            TaskPatch {
                name: Some("renamed".to_string()),
                status: Some(TaskStatus::Doing),
                ..TaskPatch::default()
            },
        )
        .unwrap();

    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.status, TaskStatus::Doing);
    assert_eq!(updated.survey, Some(Survey::Primary));
    assert!(updated.updated_at >= target.updated_at);
    assert_eq!(names(store.tasks()), vec!["first", "renamed", "third"]);
}

#[test]
fn empty_patch_leaves_task_untouched_without_commit() {
    let mut store = empty_store();
    let task = store.add_task(NewTask::new("same", Survey::Primary));
    let writes_before = store.repository().write_count();
    let notified = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&notified);
    store.subscribe(move |_| *counter.borrow_mut() += 1);

    let unchanged = store.update_task(&task.id, TaskPatch::default()).unwrap();

    assert_eq!(unchanged, task);
    assert_eq!(store.repository().write_count(), writes_before);
    assert_eq!(*notified.borrow(), 0);
}

#[test]
fn patch_can_clear_optional_fields() {
    let mut store = empty_store();
    let mut fields = NewTask::new("t", Survey::Primary);
    fields.priority = Some(Priority::Lower);
    let task = store.add_task(fields);

    let updated = store
        .update_task(
            &task.id,
            TaskPatch {
                priority: Some(None),
                ..TaskPatch::default()
            },
        )
        .unwrap();

    assert_eq!(updated.priority, None);
}

#[test]
fn missing_ids_report_not_found_without_mutation() {
    let mut store = empty_store();
    store.add_task(NewTask::new("only", Survey::Primary));
    let writes_before = store.repository().write_count();
    let missing = TaskId::generate();

    assert!(matches!(
        store.update_task(&missing, TaskPatch::default()),
        Err(StoreError::NotFound(id)) if id == missing
    ));
    assert!(matches!(store.delete_task(&missing), Err(StoreError::NotFound(_))));
    assert!(matches!(
        store.move_and_reorder(&missing, AxisValue::Survey(Survey::Primary), 0),
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(store.move_task(&missing, "done"), Err(StoreError::NotFound(_))));

    assert_eq!(store.len(), 1);
    assert_eq!(store.repository().write_count(), writes_before);
}

#[test]
fn count_invariant_holds_across_mixed_operations() {
    let mut store = empty_store();
    let mut ids = Vec::new();
    for index in 0..6 {
        let survey = if index % 2 == 0 {
            Survey::Primary
        } else {
            Survey::Secondary
        };
        ids.push(store.add_task(NewTask::new(format!("t{index}"), survey)).id);
    }
    assert_eq!(store.len(), 6);

    store.delete_task(&ids[1]).unwrap();
    store
        .move_to_status_and_reorder(&ids[0], TaskStatus::Done, 0)
        .unwrap();
    store
        .move_to_survey_and_reorder(&ids[2], Survey::Secondary, 10)
        .unwrap();
    store
        .move_to_priority_and_reorder(&ids[3], Priority::Higher, 0)
        .unwrap();
    store.move_task(&ids[4], "legacy").unwrap();
    assert_eq!(store.len(), 5);

    let mut seen: Vec<&TaskId> = store.tasks().iter().map(|task| &task.id).collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5);

    assert_eq!(store.clear_all_tasks(), 5);
    assert!(store.is_empty());
}

#[test]
fn rejected_move_does_not_persist_or_notify() {
    let mut store = empty_store();
    let secondary = store.add_task(NewTask::new("s", Survey::Secondary));
    let writes_before = store.repository().write_count();
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    store.subscribe(move |_| *counter.borrow_mut() += 1);

    let outcome = store
        .move_to_priority_and_reorder(&secondary.id, Priority::Higher, 0)
        .unwrap();

    assert_eq!(outcome, ReorderOutcome::Rejected);
    assert_eq!(store.get_task(&secondary.id), Some(&secondary));
    assert_eq!(store.repository().write_count(), writes_before);
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn subscribers_run_in_registration_order_after_persist() {
    let mut store = empty_store();
    let log = Rc::new(RefCell::new(Vec::new()));

    let first_log = Rc::clone(&log);
    store.subscribe(move |tasks| first_log.borrow_mut().push(format!("first:{}", tasks.len())));
    let second_log = Rc::clone(&log);
    let second = store.subscribe(move |tasks| {
        second_log.borrow_mut().push(format!("second:{}", tasks.len()))
    });

    store.add_task(NewTask::new("a", Survey::Primary));
    assert_eq!(*log.borrow(), vec!["first:1", "second:1"]);
    assert_eq!(store.repository().write_count(), 1);

    assert!(store.unsubscribe(second));
    assert!(!store.unsubscribe(second));
    store.add_task(NewTask::new("b", Survey::Primary));
    assert_eq!(*log.borrow(), vec!["first:1", "second:1", "first:2"]);
}

#[test]
fn persistence_failure_is_swallowed_and_recorded() {
    let mut repo = MemoryKvRepository::new();
    repo.set_reject_writes(true);
    let mut store = TaskStore::new(repo);

    let task = store.add_task(NewTask::new("kept in memory", Survey::Primary));

    assert_eq!(store.get_task(&task.id).map(|t| t.name.as_str()), Some("kept in memory"));
    assert!(store.last_persist_error().is_some());
    assert_eq!(store.repository().get(KEY).unwrap(), None);

    store.repository_mut().set_reject_writes(false);
    store.add_task(NewTask::new("second", Survey::Primary));
    assert!(store.last_persist_error().is_none());
    assert!(store.repository().get(KEY).unwrap().is_some());
}

#[test]
fn store_reloads_persisted_sequence_in_order() {
    let mut store = empty_store();
    store.add_task(NewTask::new("x", Survey::Secondary));
    store.add_task(NewTask::new("y", Survey::Primary));
    let saved = store.repository().get(KEY).unwrap().unwrap();

    let reopened = TaskStore::new(MemoryKvRepository::with_entry(KEY, saved));

    assert_eq!(names(reopened.tasks()), vec!["x", "y"]);
    assert_eq!(reopened.all_tasks(), store.all_tasks());
}

#[test]
fn invalid_persisted_data_loads_as_empty_after_backup() {
    let mut store = TaskStore::new(MemoryKvRepository::with_entry(KEY, "{not json"));
    assert!(store.is_empty());
    assert_eq!(store.backup_key(), "spot-tasks.backup");
    assert_eq!(store.repository().write_count(), 1);

    let backup_key = store.backup_key();
    let backup = store.repository().get(&backup_key).unwrap();
    assert_eq!(backup.as_deref(), Some("{not json"));
    assert_eq!(store.repository().get(KEY).unwrap().as_deref(), Some("{not json"));

    store.add_task(NewTask::new("fresh", Survey::Primary));
    assert_eq!(store.repository().get(&backup_key).unwrap().as_deref(), Some("{not json"));
    assert!(store.repository().get(KEY).unwrap().unwrap().contains("fresh"));
}

#[test]
fn main_key_is_not_overwritten_until_backup_succeeds() {
    let mut repo = MemoryKvRepository::with_entry(KEY, "[1, 2");
    repo.set_reject_writes(true);
    let mut store = TaskStore::new(repo);
    assert!(store.last_persist_error().is_some());

    store.add_task(NewTask::new("blocked", Survey::Primary));
    assert_eq!(store.repository().get(KEY).unwrap().as_deref(), Some("[1, 2"));
    assert!(store.last_persist_error().is_some());

    store.repository_mut().set_reject_writes(false);
    store.add_task(NewTask::new("retried", Survey::Primary));
    let backup_key = store.backup_key();
    assert_eq!(store.repository().get(&backup_key).unwrap().as_deref(), Some("[1, 2"));
    let persisted = store.repository().get(KEY).unwrap().unwrap();
    assert!(persisted.contains("blocked") && persisted.contains("retried"));
    assert!(store.last_persist_error().is_none());
}

#[test]
fn demo_tasks_can_be_seeded_and_removed() {
    let mut store = empty_store();
    let own = store.add_task(NewTask::new("mine", Survey::Primary));

    assert_eq!(store.seed_demo_tasks(), 4);
    assert_eq!(store.len(), 5);
    assert!(store.tasks()[1..].iter().all(|task| task.demo));

    assert_eq!(store.remove_demo_tasks(), 4);
    assert_eq!(store.tasks(), &[own]);
}

#[test]
fn ensure_priority_defaults_fills_only_active_primary_tasks() {
    let mut store = empty_store();
    let primary = store.add_task(NewTask::new("p", Survey::Primary));
    let secondary = store.add_task(NewTask::new("s", Survey::Secondary));
    let mut done = NewTask::new("d", Survey::Primary);
    done.status = Some(TaskStatus::Done);
    let done = store.add_task(done);

    assert_eq!(store.ensure_priority_defaults(), 1);
    assert_eq!(store.ensure_priority_defaults(), 0);

    assert_eq!(store.get_task(&primary.id).unwrap().priority, Some(Priority::Higher));
    assert_eq!(store.get_task(&secondary.id).unwrap().priority, None);
    assert_eq!(store.get_task(&done.id).unwrap().priority, None);
}

#[test]
fn legacy_move_sets_group_without_reordering() {
    let mut store = empty_store();
    let first = store.add_task(NewTask::new("a", Survey::Primary));
    store.add_task(NewTask::new("b", Survey::Primary));

    store.move_task(&first.id, "later").unwrap();

    assert_eq!(store.tasks()[0].group.as_deref(), Some("later"));
    assert_eq!(names(store.tasks()), vec!["a", "b"]);
}
