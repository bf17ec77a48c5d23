//! Validation of the submap persistence root.

use std::path::PathBuf;

/// True if every byte is printable ASCII (`' '..='~'`).
pub fn has_only_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (b' '..=b'~').contains(&b))
}

/// Sanitize the configured submap root.
///
/// A single trailing `/` is stripped, except from the filesystem root. Relative paths and paths with bytes
/// outside printable ASCII are rejected with a logged error, which disables
/// persistence. An empty input means persistence was never requested.
pub fn validate_persistence_root(raw: &str) -> Option<PathBuf> {
    if raw.is_empty() {
        return None;
    }
    let path = match raw.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => raw,
    };

    if !path.starts_with('/') {
        log::error!(
            "Submap directory \"{}\" must be an absolute path. Submaps will not be written to disk.",
            raw
        );
        return None;
    }
    if !has_only_printable_ascii(path) {
        log::error!(
            "Submap directory {:?} must only contain printable ASCII characters. \
             Submaps will not be written to disk.",
            raw
        );
        return None;
    }
    Some(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_trailing_slash() {
        assert_eq!(
            validate_persistence_root("/data/submaps/"),
            Some(PathBuf::from("/data/submaps"))
        );
    }

    #[test]
    fn test_filesystem_root_is_kept() {
        assert_eq!(validate_persistence_root("/"), Some(PathBuf::from("/")));
    }

    #[test]
    fn test_rejects_relative_path() {
        assert_eq!(validate_persistence_root("data/submaps"), None);
        assert_eq!(validate_persistence_root("./submaps"), None);
    }

    #[test]
    fn test_rejects_non_ascii() {
        assert_eq!(validate_persistence_root("/data/karte_ü"), None);
        assert_eq!(validate_persistence_root("/data/tab\there"), None);
    }

    #[test]
    fn test_empty_is_disabled() {
        assert_eq!(validate_persistence_root(""), None);
    }

    #[test]
    fn test_printable_ascii() {
        assert!(has_only_printable_ascii("/a b/~c"));
        assert!(!has_only_printable_ascii("/a\x7f"));
    }
}
