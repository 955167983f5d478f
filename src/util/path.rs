//! Path normalization without filesystem access.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by resolving `.` and `..` components without filesystem access.
pub fn normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Place an absolute host path under `root`, which stands in for `/`.
///
/// `..` cannot climb above `root`.
pub fn rooted(root: &Path, host_path: impl AsRef<Path>) -> PathBuf {
    let normalized = normalize(&Path::new("/").join(host_path.as_ref()));
    let relative = normalized.strip_prefix("/").unwrap_or(&normalized);
    root.join(relative)
}
