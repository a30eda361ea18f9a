//! Record with the capture recorder, rebuild, and replay what was typed.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use recap::capture::{CaptureError, Clock, Recorder};
use recap::config::RecapConfig;
use recap::oplog::{ChangeKind, EditKind, FileAction, OpKind, ResourceChange, TextEdit};
use recap::replay::{FocusChanged, Timeline, find_focal_index, reconstruct};
use recap::repository::{CancellationToken, NoProgress, Repository};

/// A clock that advances 10 ms per reading.
#[derive(Clone)]
struct SteppingClock(Arc<AtomicU64>);

impl SteppingClock {
    fn starting_at(ms: u64) -> Self {
        Self(Arc::new(AtomicU64::new(ms)))
    }
}

impl Clock for SteppingClock {
    fn now_millis(&self) -> u64 {
        self.0.fetch_add(10, Ordering::SeqCst)
    }
}

fn typed(offset: usize, inserted: &str, deleted: &str) -> OpKind {
    OpKind::TextEdit(TextEdit::new(offset, inserted, deleted))
}

#[test]
fn recorded_session_replays_every_step() {
    let root = common::setup_workspace();
    let config = RecapConfig::parse("[capture]\nauthor = \"alice\"\n").unwrap();
    let recorder =
        Recorder::from_config(root.path(), &config).with_clock(SteppingClock::starting_at(1_000));

    let path = "/Demo/src/org/demo/Main.java";
    recorder.file_opened(path, "abc").unwrap();
    recorder.record(Some(path), typed(1, "X", "b")).unwrap();
    recorder.record(Some(path), typed(3, "!", "")).unwrap();
    recorder.record(
        Some(path),
        OpKind::TextEdit(TextEdit::new(3, "", "!").with_subtype(EditKind::Undo)),
    ).unwrap();
    let flushed = recorder.file_saved(path, "aXc").unwrap().unwrap();
    assert!(flushed.starts_with(common::history(root.path())));
    assert_eq!(recorder.pending(), 0);

    let mut repo = Repository::from_config(root.path(), &config);
    repo.rebuild(&CancellationToken::new(), &mut NoProgress).unwrap();
    let index = repo.index();
    let id = index.find_file(path).unwrap();
    let ops = &index.file(id).unwrap().operations;
    assert_eq!(ops.len(), 5);
    assert!(ops.iter().all(|op| op.author == "alice"));

    let texts: Vec<String> = (0..ops.len()).map(|i| reconstruct(ops, i).unwrap()).collect();
    assert_eq!(texts, vec!["abc", "aXc", "aXc!", "aXc", "aXc"]);

    // Stamps are 1000, 1010, 1020, ...; 1015 is equidistant and goes back.
    assert_eq!(find_focal_index(ops, 1_015), Some(1));
    assert_eq!(find_focal_index(ops, 1_016), Some(2));
}

#[test]
fn timeline_notifies_each_focus_change() {
    let root = common::setup_workspace();
    let recorder = Recorder::new(common::history(root.path()), "bob")
        .with_clock(SteppingClock::starting_at(0));
    let path = "/P/src/A.java";
    recorder.file_opened(path, "").unwrap();
    for (i, ch) in "hey".chars().enumerate() {
        recorder.record(Some(path), typed(i, &ch.to_string(), "")).unwrap();
    }
    recorder.flush().unwrap();

    let (repo, _) = common::rebuild(&common::history(root.path()));
    let id = repo.index().find_file(path).unwrap();
    let mut timeline = Timeline::for_file(repo.index(), id).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    timeline.subscribe(move |e: &FocusChanged| sink.lock().unwrap().push(e.index));

    while timeline.step_forward().unwrap().is_some() {}
    assert_eq!(timeline.current_text(), Some("hey"));
    timeline.step_backward().unwrap();
    assert_eq!(timeline.current_text(), Some("he"));
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 2]);
}

#[test]
fn rename_across_two_flushes_keeps_lineage() {
    let root = common::setup_workspace();
    let recorder = Recorder::new(common::history(root.path()), "carol")
        .with_clock(SteppingClock::starting_at(5_000));

    recorder.file_opened("/P/src/Old.java", "x").unwrap();
    recorder.record(Some("/P/src/Old.java"), typed(1, "y", "")).unwrap();
    recorder.flush().unwrap();

    recorder.resource_changed(
        ResourceChange::moved_to(ChangeKind::Renamed, "/P/src/New.java"),
        "/P/src/Old.java",
    ).unwrap();
    recorder.resource_changed(
        ResourceChange::moved_from(ChangeKind::Renamed, "/P/src/Old.java"),
        "/P/src/New.java",
    ).unwrap();
    recorder.record(Some("/P/src/New.java"), typed(2, "z", "")).unwrap();
    recorder.flush().unwrap();

    let (repo, report) = common::rebuild(&common::history(root.path()));
    assert_eq!(report.files_scanned, 2);
    let index = repo.index();
    let new = index.find_file("/P/src/New.java").unwrap();
    let old = index.file(new).unwrap().moved_from.unwrap();
    assert_eq!(index.file(old).unwrap().operations.len(), 3);
    assert_eq!(index.file(new).unwrap().operations.len(), 2);

    let mut timeline = Timeline::with_lineage(index, new).unwrap();
    let last = timeline.operations().len() - 1;
    assert_eq!(timeline.go_to(last).unwrap(), "xyz");
}

#[test]
fn rejected_operation_does_not_spoil_the_flushed_log() {
    let root = common::setup_workspace();
    let recorder = Recorder::new(common::history(root.path()), "dave")
        .with_clock(SteppingClock::starting_at(100));
    let path = "/P/src/A.java";
    recorder.file_opened(path, "ab").unwrap();
    recorder.record(Some(path), typed(2, "c", "")).unwrap();
    let err = recorder
        .record(
            Some(path),
            OpKind::File {
                action: FileAction::Open,
                snapshot: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, CaptureError::Invalid { .. }));
    assert_eq!(recorder.pending(), 2);
    recorder.flush().unwrap().unwrap();

    let (repo, report) = common::rebuild(&common::history(root.path()));
    assert_eq!(report.skipped_count(), 0);
    assert_eq!(repo.index().operation_count(), 2);
    let id = repo.index().find_file(path).unwrap();
    let ops = &repo.index().file(id).unwrap().operations;
    assert_eq!(reconstruct(ops, 1).unwrap(), "abc");
}
