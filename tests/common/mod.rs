//! Shared test helpers for recap integration tests.
//!
//! All tests use temp directories, with no side effects on the real workspace.
//! Log files are written with the real codec so the aggregator sees exactly
//! what a recorder would flush.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use recap::oplog::{
    ChangeKind, FileAction, OpKind, Operation, OperationLog, ResourceChange, TextEdit, codec,
};
use recap::repository::{CancellationToken, NoProgress, RebuildReport, Repository};
use tempfile::TempDir;

pub const AUTHOR: &str = "alice";

/// A fresh workspace root with an empty `.recap/history/`.
pub fn setup_workspace() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::create_dir_all(history(dir.path())).expect("failed to create history dir");
    dir
}

/// The default history directory of a workspace root.
pub fn history(root: &Path) -> PathBuf {
    root.join(".recap/history")
}

/// Write `ops` as a log file named `name` under `dir`.
pub fn write_log(dir: &Path, name: &str, ops: Vec<Operation>) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create log dir");
    }
    let bytes = codec::to_bytes(&OperationLog::from(ops)).expect("failed to encode log");
    std::fs::write(&path, bytes).expect("failed to write log");
    path
}

pub fn open(path: &str, ts: u64, text: &str) -> Operation {
    Operation::file(ts, 0, path, AUTHOR, FileAction::Open, Some(text.to_owned()))
        .expect("open carries a snapshot")
}

pub fn save(path: &str, ts: u64, text: &str) -> Operation {
    Operation::file(ts, 0, path, AUTHOR, FileAction::Save, Some(text.to_owned()))
        .expect("save carries a snapshot")
}

pub fn edit(path: &str, ts: u64, offset: usize, inserted: &str, deleted: &str) -> Operation {
    Operation::new(
        ts,
        0,
        Some(path.to_owned()),
        AUTHOR,
        OpKind::TextEdit(TextEdit::new(offset, inserted, deleted)),
    )
}

/// Destination-side rename record: `to` was renamed from `from`.
pub fn renamed(to: &str, from: &str, ts: u64) -> Operation {
    Operation::new(
        ts,
        0,
        Some(to.to_owned()),
        AUTHOR,
        OpKind::Resource(ResourceChange::moved_from(ChangeKind::Renamed, from)),
    )
}

/// Rebuild a repository over `dir`, panicking on failure.
pub fn rebuild(dir: &Path) -> (Repository, RebuildReport) {
    let mut repo = Repository::new(dir);
    let report = repo
        .rebuild(&CancellationToken::new(), &mut NoProgress)
        .expect("rebuild failed");
    (repo, report)
}

/// Run recap with the given args in the given directory.
pub fn recap_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_recap"))
        .args(args)
        .current_dir(dir)
        .env_remove("RECAP_ROOT")
        .output()
        .expect("failed to execute recap")
}

/// Run recap and assert it succeeds. Returns stdout as string.
pub fn recap_ok(dir: &Path, args: &[&str]) -> String {
    let out = recap_in(dir, args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "recap {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.to_string()
}

/// Run recap and assert it fails. Returns stderr as string.
pub fn recap_fails(dir: &Path, args: &[&str]) -> String {
    let out = recap_in(dir, args);
    assert!(
        !out.status.success(),
        "Expected recap {} to fail, but it succeeded.\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}
