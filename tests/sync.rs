//! End-to-end reconciliation scenarios (spec §8).

mod common;

use common::Harness;
use syncd::model::tracked_file::SyncStatus;

#[test]
fn store_only_change_propagates_to_target() {
    let h = Harness::new();
    let target = h.register_repo("notes");
    h.write_store(&target, "rules.md", "from the store\n");

    h.sync(&target);

    assert_eq!(h.read_target("rules.md"), "from the store\n");
    let file = h
        .engine
        .store()
        .get_tracked_file(target.id, "rules.md")
        .unwrap()
        .unwrap();
    assert_eq!(file.sync_status, SyncStatus::Synced);
}

#[test]
fn target_only_change_propagates_to_store() {
    let h = Harness::new();
    let target = h.register_repo("notes");
    h.write_target("rules.md", "from the machine\n");

    h.sync(&target);

    assert_eq!(h.read_store(&target, "rules.md"), "from the machine\n");
}

#[test]
fn non_overlapping_edits_auto_merge_on_both_sides() {
    let h = Harness::new();
    let target = h.register_repo("notes");
    h.write_store(&target, "rules.md", "line one\nline two\nline three\n");
    h.sync(&target);

    h.write_store(&target, "rules.md", "line one EDITED\nline two\nline three\n");
    h.write_target("rules.md", "line one\nline two\nline three EDITED\n");
    h.sync(&target);

    let expected = "line one EDITED\nline two\nline three EDITED\n";
    assert_eq!(h.read_store(&target, "rules.md"), expected);
    assert_eq!(h.read_target("rules.md"), expected);

    let file = h
        .engine
        .store()
        .get_tracked_file(target.id, "rules.md")
        .unwrap()
        .unwrap();
    assert_eq!(file.sync_status, SyncStatus::Synced);

    let log = h.engine.store().recent_log(target.id, 10).unwrap();
    assert!(log
        .iter()
        .any(|entry| entry.kind == syncd::model::log::LogKind::AutoMerged));
}

#[test]
fn overlapping_edits_open_a_conflict() {
    let h = Harness::new();
    let target = h.register_repo("notes");
    h.write_store(&target, "rules.md", "original\n");
    h.sync(&target);

    h.write_store(&target, "rules.md", "store version\n");
    h.write_target("rules.md", "target version\n");
    h.sync(&target);

    let conflicts = h.engine.store().list_pending_conflicts(target.id).unwrap();
    assert_eq!(conflicts.len(), 1);
    let conflict = &conflicts[0];
    assert_eq!(conflict.store_content.as_deref(), Some(b"store version\n".as_slice()));
    assert_eq!(conflict.target_content.as_deref(), Some(b"target version\n".as_slice()));

    let file = h
        .engine
        .store()
        .get_tracked_file(target.id, "rules.md")
        .unwrap()
        .unwrap();
    assert_eq!(file.sync_status, SyncStatus::Conflict);

    // Disk content is untouched while the conflict is pending.
    assert_eq!(h.read_store(&target, "rules.md"), "store version\n");
    assert_eq!(h.read_target("rules.md"), "target version\n");
}

#[test]
fn deleted_then_modified_opens_a_conflict_not_a_silent_delete() {
    let h = Harness::new();
    let target = h.register_repo("notes");
    h.write_store(&target, "rules.md", "original\n");
    h.sync(&target);

    h.remove_store(&target, "rules.md");
    h.write_target("rules.md", "still useful\n");
    h.sync(&target);

    let conflicts = h.engine.store().list_pending_conflicts(target.id).unwrap();
    assert_eq!(conflicts.len(), 1);

    let file = h
        .engine
        .store()
        .get_tracked_file(target.id, "rules.md")
        .unwrap()
        .unwrap();
    assert_eq!(file.sync_status, SyncStatus::MissingInStore);

    // Recreating the store side with different content should update the
    // still-pending conflict rather than open a second one.
    h.write_store(&target, "rules.md", "recreated\n");
    h.sync(&target);
    let conflicts = h.engine.store().list_pending_conflicts(target.id).unwrap();
    assert_eq!(conflicts.len(), 1);
}

#[test]
fn delete_modify_recreate_ends_in_a_single_conflict_with_all_three_contents() {
    let h = Harness::new();
    let target = h.register_repo("notes");
    h.write_store(&target, "rules.md", "original\n");
    h.sync(&target); // sync 0: adopt into target, commit "original"

    h.remove_store(&target, "rules.md");
    h.sync(&target); // sync 1: missing_in_store

    h.write_target("rules.md", "Modified in target");
    h.sync(&target); // sync 2: still missing_in_store, conflict content refreshed

    h.write_store(&target, "rules.md", "Brand new store content");
    h.sync(&target); // sync 3: store reappears -> conflict, not missing_in_store

    let file = h
        .engine
        .store()
        .get_tracked_file(target.id, "rules.md")
        .unwrap()
        .unwrap();
    assert_eq!(file.sync_status, SyncStatus::Conflict);

    let conflicts = h.engine.store().list_pending_conflicts(target.id).unwrap();
    assert_eq!(conflicts.len(), 1);
    let conflict = &conflicts[0];
    assert_eq!(conflict.base_content.as_deref(), Some(b"original\n".as_slice()));
    assert_eq!(
        conflict.store_content.as_deref(),
        Some(b"Brand new store content".as_slice())
    );
    assert_eq!(
        conflict.target_content.as_deref(),
        Some(b"Modified in target".as_slice())
    );
}

#[test]
fn identical_content_with_no_history_adopts_without_conflict() {
    let h = Harness::new();
    let target = h.register_repo("notes");
    h.write_store(&target, "rules.md", "same\n");
    h.write_target("rules.md", "same\n");

    h.sync(&target);

    let conflicts = h.engine.store().list_pending_conflicts(target.id).unwrap();
    assert!(conflicts.is_empty());
    let file = h
        .engine
        .store()
        .get_tracked_file(target.id, "rules.md")
        .unwrap()
        .unwrap();
    assert_eq!(file.sync_status, SyncStatus::Synced);
}

#[test]
fn resolving_a_conflict_keeps_target_and_clears_pending_state() {
    let h = Harness::new();
    let target = h.register_repo("notes");
    h.write_store(&target, "rules.md", "original\n");
    h.sync(&target);
    h.write_store(&target, "rules.md", "store version\n");
    h.write_target("rules.md", "target version\n");
    h.sync(&target);

    let conflict = h
        .engine
        .store()
        .list_pending_conflicts(target.id)
        .unwrap()
        .remove(0);

    let now = 1_700_000_000;
    h.engine
        .resolve_conflict(
            conflict.id,
            &syncd::model::conflict::ConflictResolution::KeepTarget,
            &target,
            now,
        )
        .unwrap();

    assert_eq!(h.read_store(&target, "rules.md"), "target version\n");
    assert!(h
        .engine
        .store()
        .list_pending_conflicts(target.id)
        .unwrap()
        .is_empty());
}

#[test]
fn second_sync_pass_is_idempotent() {
    let h = Harness::new();
    let target = h.register_repo("notes");
    h.write_store(&target, "rules.md", "stable\n");
    h.sync(&target);
    h.sync(&target);

    assert_eq!(h.read_store(&target, "rules.md"), "stable\n");
    assert_eq!(h.read_target("rules.md"), "stable\n");
    let files = h.engine.store().list_tracked_files(target.id).unwrap();
    assert_eq!(files.iter().filter(|f| f.relative_path == "rules.md").count(), 1);
}
