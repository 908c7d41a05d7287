// Lexical path helpers shared by the loader and file stores

use std::path::{Component, Path, PathBuf};

/// Normalize a path without touching the filesystem.
///
/// Removes `.` segments and redundant separators, folds `name/..` pairs and
/// drops `..` directly under the root. An empty result becomes `.`.
pub fn clean(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            component => parts.push(component),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Resolve `target` against the directory of `including_file` unless it is
/// already absolute, then clean the result.
pub fn join_relative(including_file: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return clean(target);
    }
    let dir = including_file.parent().unwrap_or_else(|| Path::new(""));
    clean(&dir.join(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaned(path: &str) -> PathBuf {
        clean(Path::new(path))
    }

    #[test]
    fn test_clean() {
        assert_eq!(cleaned("/a/./b//c"), PathBuf::from("/a/b/c"));
        assert_eq!(cleaned("/a/b/../c"), PathBuf::from("/a/c"));
        assert_eq!(cleaned("a/../.."), PathBuf::from(".."));
        assert_eq!(cleaned("/../a"), PathBuf::from("/a"));
        assert_eq!(cleaned("./"), PathBuf::from("."));
        assert_eq!(cleaned(""), PathBuf::from("."));
    }

    #[test]
    fn test_join_relative_uses_including_directory() {
        assert_eq!(
            join_relative(Path::new("/entry"), "a/index2"),
            PathBuf::from("/a/index2")
        );
        assert_eq!(
            join_relative(Path::new("/a/index2"), "../x"),
            PathBuf::from("/x")
        );
        assert_eq!(
            join_relative(Path::new("/entry"), "./inc"),
            PathBuf::from("/inc")
        );
    }

    #[test]
    fn test_join_relative_keeps_absolute_target() {
        assert_eq!(
            join_relative(Path::new("/deep/dir/file"), "/top/./x"),
            PathBuf::from("/top/x")
        );
    }

    #[test]
    fn test_join_relative_without_directory() {
        assert_eq!(join_relative(Path::new("page"), "part"), PathBuf::from("part"));
    }
}
