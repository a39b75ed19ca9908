//! Prefix stripping for service prefixes and group sub-prefixes.

/// Strip a configured prefix from a request path.
///
/// The prefix is normalized to a leading slash with no trailing slash. An
/// empty (or `/`) prefix matches everything and returns the path unchanged.
/// A path equal to the prefix strips to `/`. Returns `None` when the path is
/// not under the prefix; the caller decides how to report that.
///
/// Stripping is applied once per layer (service, then group) and never
/// double-strips: the returned remainder always starts at the boundary slash.
pub fn strip_prefix(path: &str, prefix: &str) -> Option<String> {
    let normalized = normalize_prefix(prefix);
    if normalized.is_empty() {
        return Some(path.to_string());
    }
    if path == normalized {
        return Some("/".to_string());
    }
    path.strip_prefix(&format!("{normalized}/"))
        .map(|rest| format!("/{rest}"))
}

/// Ensure a leading `/` and drop any trailing `/`. Empty and `/` both
/// normalize to the empty prefix.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    if trimmed.is_empty() || trimmed == "/" {
        return String::new();
    }
    let with_lead = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    with_lead.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prefix_passes_path_through() {
        assert_eq!(strip_prefix("/users/1", ""), Some("/users/1".to_string()));
        assert_eq!(strip_prefix("/users/1", "/"), Some("/users/1".to_string()));
    }

    #[test]
    fn exact_prefix_strips_to_root() {
        assert_eq!(strip_prefix("/api", "/api"), Some("/".to_string()));
        assert_eq!(strip_prefix("/api", "api/"), Some("/".to_string()));
    }

    #[test]
    fn strips_prefix_at_segment_boundary() {
        assert_eq!(
            strip_prefix("/api/users/1", "/api"),
            Some("/users/1".to_string())
        );
        // Not a segment boundary: /apix is not under /api.
        assert_eq!(strip_prefix("/apix/users", "/api"), None);
    }

    #[test]
    fn mismatch_is_none() {
        assert_eq!(strip_prefix("/other/users", "/api"), None);
    }

    #[test]
    fn layered_stripping_never_double_strips() {
        // Service prefix then group sub-prefix, as the pipeline applies them.
        let rest = strip_prefix("/api/v1/users/1", "/api").unwrap();
        assert_eq!(rest, "/v1/users/1");
        let rest = strip_prefix(&rest, "/v1").unwrap();
        assert_eq!(rest, "/users/1");
        // The same segment is never consumed twice.
        assert_eq!(strip_prefix(&rest, "/v1"), None);
    }
}
