use thiserror::Error;

/// ワークスペース相対パス関連のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelativePathError {
    #[error("Path must not be empty")]
    Empty,

    #[error("Path must be relative to the workspace root: {0}")]
    Absolute(String),

    #[error("Path must not escape the workspace root: {0}")]
    ParentTraversal(String),
}

/// ワークスペース相対パスを正規化する
///
/// 区切り文字は`/`に統一し、空要素と`.`を取り除く。
/// 絶対パスと`..`を含むパスは拒否する。空文字列は空のまま返す（マウントルート用）。
pub fn normalize(path: &str) -> Result<String, RelativePathError> {
    let trimmed = path.trim();
    if trimmed.starts_with('/') || trimmed.starts_with('\\') || has_drive_prefix(trimmed) {
        return Err(RelativePathError::Absolute(path.to_string()));
    }

    let mut parts = Vec::new();
    for part in trimmed.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return Err(RelativePathError::ParentTraversal(path.to_string())),
            other => parts.push(other),
        }
    }

    Ok(parts.join("/"))
}

/// 空でない正規化済みパスを要求する
pub fn normalize_non_empty(path: &str) -> Result<String, RelativePathError> {
    let normalized = normalize(path)?;
    if normalized.is_empty() {
        return Err(RelativePathError::Empty);
    }
    Ok(normalized)
}

/// マウントルートと相対パスを結合する
pub fn join(root: &str, path: &str) -> Result<String, RelativePathError> {
    let root = normalize(root)?;
    let path = normalize(path)?;
    Ok(match (root.is_empty(), path.is_empty()) {
        (true, _) => path,
        (false, true) => root,
        (false, false) => format!("{}/{}", root, path),
    })
}

/// `inner`が`outer`と同一、または`outer`の配下にあるか
pub fn contains(outer: &str, inner: &str) -> bool {
    inner == outer
        || (inner.len() > outer.len()
            && inner.starts_with(outer)
            && inner.as_bytes()[outer.len()] == b'/')
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_redundant_parts() {
        assert_eq!(normalize("./a//b/./c/").unwrap(), "a/b/c");
        assert_eq!(normalize("").unwrap(), "");
    }

    #[test]
    fn test_normalize_rejects_escapes() {
        assert_eq!(
            normalize("a/../../b"),
            Err(RelativePathError::ParentTraversal("a/../../b".to_string()))
        );
        assert!(matches!(normalize("/etc"), Err(RelativePathError::Absolute(_))));
        assert!(matches!(normalize("C:/x"), Err(RelativePathError::Absolute(_))));
    }

    #[test]
    fn test_join_with_mount_root() {
        assert_eq!(join("", "tools").unwrap(), "tools");
        assert_eq!(join("third_party", "zlib").unwrap(), "third_party/zlib");
        assert_eq!(join("third_party", "").unwrap(), "third_party");
    }

    #[test]
    fn test_contains_respects_component_boundaries() {
        assert!(contains("a", "a"));
        assert!(contains("a", "a/b"));
        assert!(!contains("a", "ab"));
        assert!(!contains("a/b", "a"));
    }

    #[test]
    fn test_normalize_non_empty() {
        assert_eq!(normalize_non_empty("./"), Err(RelativePathError::Empty));
    }
}
