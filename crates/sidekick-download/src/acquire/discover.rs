use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Find the first regular file named exactly `name` below `root`.
///
/// Depth-first over an explicit stack, at most `max_depth` directory levels
/// below `root`. Files of a directory are checked before descending into its
/// subdirectories, and subdirectories are visited in name order. Unreadable
/// directories are skipped.
pub(crate) fn find_binary(root: &Path, name: &str, max_depth: usize) -> Option<PathBuf> {
    let mut stack = vec![(root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            debug!(path = %dir.display(), "Skipping unreadable directory");
            continue;
        };

        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if file_type.is_file() && entry.file_name() == name {
                return Some(path);
            }
            if file_type.is_dir() && depth < max_depth {
                subdirs.push(path);
            }
        }

        subdirs.sort();
        stack.extend(subdirs.into_iter().rev().map(|d| (d, depth + 1)));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"bin").unwrap();
    }

    #[test]
    fn test_finds_nested_binary() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("llama-b1/build/bin/llama-server"));
        touch(&dir.path().join("llama-b1/build/bin/llama-cli"));

        let found = find_binary(dir.path(), "llama-server", 8).unwrap();
        assert!(found.ends_with("llama-b1/build/bin/llama-server"));
    }

    #[test]
    fn test_ignores_similar_names() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("llama-server.dSYM"));
        touch(&dir.path().join("bin/llama-server-old"));
        assert!(find_binary(dir.path(), "llama-server", 8).is_none());
    }

    #[test]
    fn test_directory_with_binary_name_is_not_a_match() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("llama-server/readme.txt"));
        touch(&dir.path().join("llama-server/llama-server"));

        let found = find_binary(dir.path(), "llama-server", 8).unwrap();
        assert!(found.is_file());
        assert!(found.ends_with("llama-server/llama-server"));
    }

    #[test]
    fn test_respects_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/b/c/llama-server"));

        assert!(find_binary(dir.path(), "llama-server", 2).is_none());
        assert!(find_binary(dir.path(), "llama-server", 3).is_some());
    }

    #[test]
    fn test_shallow_file_wins_over_deeper_sibling_tree() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("llama-server"));
        touch(&dir.path().join("a/llama-server"));

        let found = find_binary(dir.path(), "llama-server", 8).unwrap();
        assert_eq!(found, dir.path().join("llama-server"));
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_binary(&dir.path().join("nope"), "llama-server", 8).is_none());
    }
}
