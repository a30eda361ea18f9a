//! Project / package / file keys derived from an operation's logical path.
//!
//! Paths look like `/<project>/<folders…>/src/<package dirs…>/<File>`:
//!
//! | Path | Project | Package | File |
//! |------|---------|---------|------|
//! | `/Demo/src/org/demo/Main.java` | `Demo` | `org.demo` | `Main.java` |
//! | `/Demo/src/Main.java` | `Demo` | `(default package)` | `Main.java` |
//! | `/Demo/lib/Util.java` | `Demo` | `Unknown` | `Util.java` |
//! | `Main.java` | `Unknown` | `Unknown` | `Main.java` |
//! | *(absent)* | `Unknown` | `Unknown` | `Unknown` |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name used when a project, package or file cannot be derived.
pub const UNKNOWN: &str = "Unknown";

/// Package name of files placed directly in the source directory.
pub const DEFAULT_PACKAGE: &str = "(default package)";

const SRC_DIR: &str = "/src/";

/// The lookup key of a file node: project, package and file name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileKey {
    /// Project name.
    pub project: String,
    /// Dot-separated package name.
    pub package: String,
    /// File name without directories.
    pub file: String,
}

impl FileKey {
    /// Derive the key of the file at `path`.
    #[must_use]
    pub fn from_path(path: Option<&str>) -> Self {
        Self {
            project: project_name(path),
            package: package_name(path),
            file: file_name(path),
        }
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.package, self.file)
    }
}

/// The first path segment after the leading `/`.
#[must_use]
pub fn project_name(path: Option<&str>) -> String {
    let Some(path) = path else {
        return UNKNOWN.to_owned();
    };
    let rest = path.get(1..).unwrap_or_default();
    match rest.find('/') {
        Some(end) => rest[..end].to_owned(),
        None => UNKNOWN.to_owned(),
    }
}

/// The directories between `/src/` and the file name, joined with `.`.
#[must_use]
pub fn package_name(path: Option<&str>) -> String {
    let Some(path) = path else {
        return UNKNOWN.to_owned();
    };
    let Some(src) = path.find(SRC_DIR) else {
        return UNKNOWN.to_owned();
    };
    let start = src + SRC_DIR.len();
    // `rfind` cannot fail: the `/src/` match itself ends in a slash.
    let last_slash = path.rfind('/').unwrap_or(start - 1);
    if last_slash < start {
        return DEFAULT_PACKAGE.to_owned();
    }
    path[start..last_slash].replace('/', ".")
}

/// The final path segment.
#[must_use]
pub fn file_name(path: Option<&str>) -> String {
    let Some(path) = path else {
        return UNKNOWN.to_owned();
    };
    path.rsplit('/').next().unwrap_or(path).to_owned()
}
