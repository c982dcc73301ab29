// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Repository-relative path handling
//!
//! Paths inside a version are always absolute (`/dir/file`) and normalised.
//! Descriptors reference other files relative to their own directory.

/// Directory containing `path`, always ending without a slash (`/` for root)
#[must_use]
pub fn parent_dir(path: &str) -> String {
    let absolute = normalize(path);
    match absolute.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => absolute[..index].to_string(),
    }
}

/// Resolve `path` against `working_dir` into a normalised absolute path.
///
/// Absolute inputs ignore `working_dir`. `..` never climbs above the root.
#[must_use]
pub fn absolute_path(working_dir: &str, path: &str) -> String {
    if path.starts_with('/') {
        normalize(path)
    } else {
        normalize(&format!("{}/{}", working_dir.trim_end_matches('/'), path))
    }
}

/// Collapse `.`, `..` and repeated separators; result starts with `/`
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Whether an import target points at a remote URL
#[must_use]
pub fn is_url(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Strip a `file://` scheme from a local import
#[must_use]
pub fn strip_file_scheme(path: &str) -> &str {
    path.strip_prefix("file://").unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a/./b//c"), "/a/b/c");
        assert_eq!(normalize("/a/b/../c"), "/a/c");
        assert_eq!(normalize("/../../x"), "/x");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn test_absolute_path() {
        assert_eq!(absolute_path("/", "sub/helper.wdl"), "/sub/helper.wdl");
        assert_eq!(absolute_path("/wf", "../tools/t.cwl"), "/tools/t.cwl");
        assert_eq!(absolute_path("/wf", "/abs.wdl"), "/abs.wdl");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/Dockstore.wdl"), "/");
        assert_eq!(parent_dir("/wf/main.cwl"), "/wf");
        assert_eq!(parent_dir("wf/a/main.cwl"), "/wf/a");
    }

    #[test]
    fn test_url_detection() {
        assert!(is_url("https://example.com/x.wdl"));
        assert!(is_url("HTTP://example.com/x.wdl"));
        assert!(!is_url("file://sub/helper.wdl"));
        assert_eq!(strip_file_scheme("file://sub/helper.wdl"), "sub/helper.wdl");
    }
}
