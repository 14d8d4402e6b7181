//! Lexical path helpers.
//!
//! Containment is always decided on path components, never on string
//! prefixes, so `/work` does not contain `/workshop/file`.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path.
///
/// Removes `.` components, resolves `..` against preceding normal components
/// and drops trailing separators. A `..` directly under the root is discarded.
/// Symlinks are not consulted.
#[must_use]
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(part) => out.push(part),
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Make `path` absolute against the current directory, then clean it.
///
/// # Errors
///
/// Returns an error if `path` is relative and the current directory cannot
/// be determined.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(clean(path))
    } else {
        Ok(clean(&std::env::current_dir()?.join(path)))
    }
}

/// Check whether `path` lies strictly inside `root`.
///
/// Both paths are cleaned first. A path never contains itself.
#[must_use]
pub fn contains(root: &Path, path: &Path) -> bool {
    let root = clean(root);
    let path = clean(path);
    path != root && path.starts_with(&root)
}

/// Check whether `path` equals `root` or lies inside it.
#[must_use]
pub fn is_within(root: &Path, path: &Path) -> bool {
    clean(path).starts_with(clean(root))
}
