//! The hierarchical index: workspace → project → package → file.
//!
//! Nodes live in arenas owned by [`Index`] and refer to each other through
//! copyable handles ([`ProjectId`], [`PackageId`], [`FileId`]). The
//! `moved_from` / `moved_to` links between file nodes are handles too, so a
//! rename lineage can be walked without shared ownership or reference cycles.
//!
//! Lookup maps hold only *live* nodes. A removed, moved or renamed file is
//! evicted from the file map but stays in its arena slot and in its parent's
//! listing, keeping its operation history reachable through those paths and
//! through the rename links.
//!
//! Only the aggregator mutates an index (`pub(crate)` methods); everyone else
//! sees it through `&Index`.

use std::collections::{BTreeMap, HashSet};

use recap_oplog::Operation;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::path::FileKey;

// ---------------------------------------------------------------------------
// Handles and time ranges
// ---------------------------------------------------------------------------

/// Handle of a project node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProjectId(usize);

/// Handle of a package node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageId(usize);

/// Handle of a file node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileId(usize);

impl FileId {
    /// Position of the node in the file arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Inclusive span of operation timestamps, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    /// Timestamp of the earliest operation.
    pub first: u64,
    /// Timestamp of the latest operation.
    pub last: u64,
}

impl TimeRange {
    /// The range covered by `ops`, or `None` if empty.
    #[must_use]
    pub fn of(ops: &[Operation]) -> Option<Self> {
        let first = ops.iter().map(|op| op.timestamp).min()?;
        let last = ops.iter().map(|op| op.timestamp).max()?;
        Some(Self { first, last })
    }

    /// The smallest range covering both.
    #[must_use]
    pub fn union(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(Self {
                first: a.first.min(b.first),
                last: a.last.max(b.last),
            }),
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Return `true` if `time` lies within the range.
    #[must_use]
    pub const fn contains(&self, time: u64) -> bool {
        self.first <= time && time <= self.last
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// The root of the index: the scanned history directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkspaceNode {
    /// Display name (the scanned directory).
    pub name: String,
    /// Span of every operation in the index.
    pub range: Option<TimeRange>,
    /// Projects in creation order.
    pub projects: Vec<ProjectId>,
}

/// A project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectNode {
    /// Project name.
    pub name: String,
    /// Span of the project's file operations.
    pub range: Option<TimeRange>,
    /// Packages in creation order.
    pub packages: Vec<PackageId>,
    /// Every file of the project, across packages, in creation order.
    pub files: Vec<FileId>,
}

/// A package inside a project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageNode {
    /// Dot-separated package name.
    pub name: String,
    /// Owning project.
    pub project: ProjectId,
    /// Span of the package's file operations.
    pub range: Option<TimeRange>,
    /// Files in creation order, evicted ones included.
    pub files: Vec<FileId>,
}

/// A source file and its operation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileNode {
    /// File name.
    pub name: String,
    /// Full logical path of the first operation routed here.
    pub path: Option<String>,
    /// Lookup key the node was created under.
    pub key: FileKey,
    /// Owning project.
    pub project: ProjectId,
    /// Owning package.
    pub package: PackageId,
    /// Operations in chronological order.
    pub operations: Vec<Operation>,
    /// Span of `operations`.
    pub range: Option<TimeRange>,
    /// The node this file was moved or renamed from.
    pub moved_from: Option<FileId>,
    /// The node this file was moved or renamed to.
    pub moved_to: Option<FileId>,
    /// Whether the node was evicted from key lookup (removed, moved, renamed).
    pub evicted: bool,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// The hierarchical index of every recorded operation.
///
/// Serializes as its arenas; handles in the output are arena positions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Index {
    workspace: Option<WorkspaceNode>,
    projects: Vec<ProjectNode>,
    packages: Vec<PackageNode>,
    files: Vec<FileNode>,
    #[serde(skip)]
    project_ids: BTreeMap<String, ProjectId>,
    #[serde(skip)]
    package_ids: BTreeMap<(String, String), PackageId>,
    #[serde(skip)]
    file_ids: BTreeMap<FileKey, FileId>,
}

impl Index {
    /// An empty index rooted at a workspace called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            workspace: Some(WorkspaceNode {
                name: name.into(),
                range: None,
                projects: Vec::new(),
            }),
            ..Self::default()
        }
    }

    // -- queries ------------------------------------------------------------

    /// The workspace root, or `None` for a cleared index.
    #[must_use]
    pub const fn workspace(&self) -> Option<&WorkspaceNode> {
        self.workspace.as_ref()
    }

    /// Return `true` if the index holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Projects in creation order.
    #[must_use]
    pub fn list_projects(&self) -> Vec<(ProjectId, &ProjectNode)> {
        self.projects
            .iter()
            .enumerate()
            .map(|(i, node)| (ProjectId(i), node))
            .collect()
    }

    /// Packages of `project` in creation order.
    #[must_use]
    pub fn list_packages(&self, project: ProjectId) -> Vec<(PackageId, &PackageNode)> {
        self.project(project)
            .map(|node| {
                node.packages
                    .iter()
                    .filter_map(|&id| self.package(id).map(|p| (id, p)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Files of `package` in creation order, evicted files included.
    #[must_use]
    pub fn list_files(&self, package: PackageId) -> Vec<(FileId, &FileNode)> {
        self.package(package)
            .map(|node| {
                node.files
                    .iter()
                    .filter_map(|&id| self.file(id).map(|f| (id, f)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every file node in creation order.
    pub fn all_files(&self) -> impl Iterator<Item = (FileId, &FileNode)> {
        self.files.iter().enumerate().map(|(i, f)| (FileId(i), f))
    }

    /// The project behind a handle.
    #[must_use]
    pub fn project(&self, id: ProjectId) -> Option<&ProjectNode> {
        self.projects.get(id.0)
    }

    /// The package behind a handle.
    #[must_use]
    pub fn package(&self, id: PackageId) -> Option<&PackageNode> {
        self.packages.get(id.0)
    }

    /// The file behind a handle.
    #[must_use]
    pub fn file(&self, id: FileId) -> Option<&FileNode> {
        self.files.get(id.0)
    }

    /// Look up a live project by name.
    #[must_use]
    pub fn find_project(&self, name: &str) -> Option<ProjectId> {
        self.project_ids.get(name).copied()
    }

    /// Look up the live file at a logical path.
    #[must_use]
    pub fn find_file(&self, path: &str) -> Option<FileId> {
        self.find_file_by_key(&FileKey::from_path(Some(path)))
    }

    /// Look up a live file by key.
    #[must_use]
    pub fn find_file_by_key(&self, key: &FileKey) -> Option<FileId> {
        self.file_ids.get(key).copied()
    }

    /// The rename/move lineage ending at `file`, oldest first.
    #[must_use]
    pub fn lineage(&self, file: FileId) -> Vec<FileId> {
        let mut chain = vec![file];
        let mut current = file;
        while let Some(prev) = self.file(current).and_then(|f| f.moved_from) {
            if chain.contains(&prev) {
                break;
            }
            chain.push(prev);
            current = prev;
        }
        chain.reverse();
        chain
    }

    /// Total number of operations across all file nodes.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.files.iter().map(|f| f.operations.len()).sum()
    }

    /// Span of every operation in the index.
    #[must_use]
    pub fn time_range(&self) -> Option<TimeRange> {
        self.workspace.as_ref().and_then(|w| w.range)
    }

    /// SHA-256 over the index contents, hex encoded.
    ///
    /// Two indexes built from the same logs have the same fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for project in &self.projects {
            hasher.update(b"P");
            hasher.update(project.name.as_bytes());
            hasher.update([0]);
        }
        for package in &self.packages {
            hasher.update(b"K");
            hasher.update(package.project.0.to_le_bytes());
            hasher.update(package.name.as_bytes());
            hasher.update([0]);
        }
        for file in &self.files {
            hasher.update(b"F");
            hasher.update(file.key.to_string().as_bytes());
            hasher.update([0, u8::from(file.evicted)]);
            for link in [file.moved_from, file.moved_to] {
                match link {
                    Some(id) => hasher.update((id.0 as u64 + 1).to_le_bytes()),
                    None => hasher.update(0u64.to_le_bytes()),
                }
            }
            for op in &file.operations {
                if let Ok(bytes) = serde_json::to_vec(op) {
                    hasher.update(&bytes);
                }
                hasher.update([b'\n']);
            }
        }
        format!("{:x}", hasher.finalize())
    }

    // -- mutation (aggregator only) ------------------------------------------

    /// Create-if-absent the project, package and file for `key`.
    pub(crate) fn ensure_file(&mut self, key: &FileKey, path: Option<&str>) -> FileId {
        if let Some(id) = self.file_ids.get(key) {
            return *id;
        }
        let project = self.ensure_project(&key.project);
        let package = self.ensure_package(project, &key.project, &key.package);

        let id = FileId(self.files.len());
        self.files.push(FileNode {
            name: key.file.clone(),
            path: path.map(str::to_owned),
            key: key.clone(),
            project,
            package,
            operations: Vec::new(),
            range: None,
            moved_from: None,
            moved_to: None,
            evicted: false,
        });
        self.file_ids.insert(key.clone(), id);
        self.projects[project.0].files.push(id);
        self.packages[package.0].files.push(id);
        id
    }

    fn ensure_project(&mut self, name: &str) -> ProjectId {
        if let Some(id) = self.project_ids.get(name) {
            return *id;
        }
        let id = ProjectId(self.projects.len());
        self.projects.push(ProjectNode {
            name: name.to_owned(),
            range: None,
            packages: Vec::new(),
            files: Vec::new(),
        });
        self.project_ids.insert(name.to_owned(), id);
        if let Some(ws) = self.workspace.as_mut() {
            ws.projects.push(id);
        }
        id
    }

    fn ensure_package(&mut self, project: ProjectId, project_name: &str, name: &str) -> PackageId {
        let map_key = (project_name.to_owned(), name.to_owned());
        if let Some(id) = self.package_ids.get(&map_key) {
            return *id;
        }
        let id = PackageId(self.packages.len());
        self.packages.push(PackageNode {
            name: name.to_owned(),
            project,
            range: None,
            files: Vec::new(),
        });
        self.package_ids.insert(map_key, id);
        self.projects[project.0].packages.push(id);
        id
    }

    /// Append an operation to a file's history.
    pub(crate) fn push(&mut self, file: FileId, op: Operation) {
        if let Some(node) = self.files.get_mut(file.0) {
            node.operations.push(op);
        }
    }

    /// Remove the live file for `key` from lookup. Returns the evicted node.
    pub(crate) fn evict(&mut self, key: &FileKey) -> Option<FileId> {
        let id = self.file_ids.remove(key)?;
        if let Some(node) = self.files.get_mut(id.0) {
            node.evicted = true;
        }
        Some(id)
    }

    /// Record that `origin` continues as `destination`.
    pub(crate) fn link_move(&mut self, origin: FileId, destination: FileId) {
        if origin == destination {
            return;
        }
        if let Some(node) = self.files.get_mut(origin.0) {
            node.moved_to = Some(destination);
        }
        if let Some(node) = self.files.get_mut(destination.0) {
            node.moved_from = Some(origin);
        }
    }

    /// Repair per-file ordering and drop duplicate operations.
    ///
    /// A file whose history is not chronological is stably re-sorted by
    /// `(timestamp, sequence)`; operations sharing an identity key (the same
    /// action read from two overlapping logs) are kept once. Returns the
    /// number of repairs; zero means the index was already consistent.
    pub(crate) fn fix_mismatches(&mut self) -> usize {
        let mut repairs = 0;
        for file in &mut self.files {
            let sorted = file
                .operations
                .windows(2)
                .all(|w| w[0].order_key() <= w[1].order_key());
            if !sorted {
                file.operations.sort_by_key(Operation::order_key);
                repairs += 1;
            }

            let before = file.operations.len();
            let mut seen = HashSet::with_capacity(before);
            file.operations.retain(|op| seen.insert(op.key()));
            repairs += before - file.operations.len();
        }
        repairs
    }

    /// Compute every node's time range from its operations, bottom-up.
    pub(crate) fn set_time_ranges(&mut self) {
        for file in &mut self.files {
            file.range = TimeRange::of(&file.operations);
        }
        for package in &mut self.packages {
            package.range = package
                .files
                .iter()
                .fold(None, |acc, id| TimeRange::union(acc, self.files[id.0].range));
        }
        for project in &mut self.projects {
            project.range = project
                .files
                .iter()
                .fold(None, |acc, id| TimeRange::union(acc, self.files[id.0].range));
        }
        if let Some(ws) = self.workspace.as_mut() {
            ws.range = self
                .projects
                .iter()
                .fold(None, |acc, p| TimeRange::union(acc, p.range));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use recap_oplog::{OpKind, TextEdit};

    use super::*;

    fn op(path: &str, ts: u64, seq: u32) -> Operation {
        Operation::new(
            ts,
            seq,
            Some(path.to_owned()),
            "alice",
            OpKind::TextEdit(TextEdit::new(0, "x", "")),
        )
    }

    fn add(index: &mut Index, o: Operation) -> FileId {
        let key = FileKey::from_path(o.path.as_deref());
        let id = index.ensure_file(&key, o.path.as_deref());
        index.push(id, o);
        id
    }

    #[test]
    fn ensure_file_creates_hierarchy_once() {
        let mut index = Index::new("ws");
        let a = add(&mut index, op("/P/src/a/A.java", 1, 0));
        let a2 = add(&mut index, op("/P/src/a/A.java", 2, 0));
        let b = add(&mut index, op("/P/src/b/B.java", 3, 0));
        assert_eq!(a, a2);
        assert_ne!(a, b);

        let projects = index.list_projects();
        assert_eq!(projects.len(), 1);
        let packages = index.list_packages(projects[0].0);
        let names: Vec<_> = packages.iter().map(|(_, p)| p.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(index.list_files(packages[0].0).len(), 1);
        assert_eq!(index.operation_count(), 3);
    }

    #[test]
    fn evicted_file_stays_listed_but_not_found() {
        let mut index = Index::new("ws");
        let a = add(&mut index, op("/P/src/a/A.java", 1, 0));
        let key = FileKey::from_path(Some("/P/src/a/A.java"));
        assert_eq!(index.evict(&key), Some(a));
        assert_eq!(index.find_file("/P/src/a/A.java"), None);
        assert!(index.file(a).unwrap().evicted);
        let (pkg, _) = index.list_packages(index.list_projects()[0].0)[0];
        assert_eq!(index.list_files(pkg).len(), 1);
        assert_eq!(index.evict(&key), None);
    }

    #[test]
    fn same_name_in_other_package_is_a_different_file() {
        let mut index = Index::new("ws");
        let a = add(&mut index, op("/P/src/a/Main.java", 1, 0));
        let b = add(&mut index, op("/P/src/b/Main.java", 1, 0));
        assert_ne!(a, b);
        assert_eq!(index.find_file("/P/src/b/Main.java"), Some(b));
    }

    #[test]
    fn lineage_walks_moved_from_oldest_first() {
        let mut index = Index::new("ws");
        let a = add(&mut index, op("/P/src/A.java", 1, 0));
        let b = add(&mut index, op("/P/src/B.java", 2, 0));
        let c = add(&mut index, op("/P/src/C.java", 3, 0));
        index.link_move(a, b);
        index.link_move(b, c);
        assert_eq!(index.lineage(c), vec![a, b, c]);
        assert_eq!(index.lineage(a), vec![a]);
        assert_eq!(index.file(a).unwrap().moved_to, Some(b));
    }

    #[test]
    fn lineage_stops_on_cycles() {
        let mut index = Index::new("ws");
        let a = add(&mut index, op("/P/src/A.java", 1, 0));
        let b = add(&mut index, op("/P/src/B.java", 2, 0));
        index.link_move(a, b);
        index.link_move(b, a);
        assert_eq!(index.lineage(b).len(), 2);
    }

    #[test]
    fn fix_mismatches_sorts_and_dedups_once() {
        let mut index = Index::new("ws");
        let a = add(&mut index, op("/P/src/A.java", 5, 0));
        add(&mut index, op("/P/src/A.java", 2, 0));
        add(&mut index, op("/P/src/A.java", 5, 0));
        assert_eq!(index.fix_mismatches(), 2);
        let keys: Vec<_> = index
            .file(a)
            .unwrap()
            .operations
            .iter()
            .map(Operation::order_key)
            .collect();
        assert_eq!(keys, vec![(2, 0), (5, 0)]);
        let snapshot = index.clone();
        assert_eq!(index.fix_mismatches(), 0);
        assert_eq!(index, snapshot);
    }

    #[test]
    fn time_ranges_roll_up() {
        let mut index = Index::new("ws");
        add(&mut index, op("/P/src/a/A.java", 10, 0));
        add(&mut index, op("/P/src/a/A.java", 20, 0));
        add(&mut index, op("/Q/src/B.java", 5, 0));
        index.set_time_ranges();
        assert_eq!(
            index.time_range(),
            Some(TimeRange { first: 5, last: 20 })
        );
        let (p, node) = index.list_projects()[0];
        assert_eq!(node.range, Some(TimeRange { first: 10, last: 20 }));
        let (_, pkg) = index.list_packages(p)[0];
        assert_eq!(pkg.range, node.range);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let mut a = Index::new("ws");
        add(&mut a, op("/P/src/A.java", 1, 0));
        let mut b = Index::new("ws");
        add(&mut b, op("/P/src/A.java", 1, 0));
        assert_eq!(a.fingerprint(), b.fingerprint());
        add(&mut b, op("/P/src/A.java", 2, 0));
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn time_range_union_and_contains() {
        let r = TimeRange::union(
            Some(TimeRange { first: 3, last: 4 }),
            Some(TimeRange { first: 1, last: 2 }),
        )
        .unwrap();
        assert_eq!(r, TimeRange { first: 1, last: 4 });
        assert!(r.contains(4));
        assert!(!r.contains(5));
        assert_eq!(TimeRange::union(None, None), None);
        assert_eq!(TimeRange::of(&[]), None);
    }
}
