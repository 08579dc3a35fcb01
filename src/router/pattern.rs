//! Route pattern compilation and matching.

use std::collections::HashMap;

/// Strips a trailing slash from `path`, leaving the root `/` untouched.
///
/// Every key that enters the cache or the loader registry goes through this
/// function, so `/kyc-portal/` and `/kyc-portal` name the same route.
///
/// # Examples
///
/// ```
/// use navcache::router::normalize_path;
///
/// assert_eq!(normalize_path("/kyc-portal/"), "/kyc-portal");
/// assert_eq!(normalize_path("/"), "/");
/// ```
pub fn normalize_path(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

/// Named captures extracted from a matched route.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RouteParams {
    map: HashMap<String, String>,
}

impl RouteParams {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Get a captured value by name (`"id"` for `/admin/users/:id`, `"wildcard"`
    /// for the tail of a `/*` pattern).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pattern {
    // `/kyc-portal`
    Exact(String),
    // `/admin/users/:id`
    Parameterized { segments: Vec<Segment> },
    // `/dashboard/*`
    Wildcard(String),
}

impl Pattern {
    /// Compiles a pattern string.
    ///
    /// Classification, checked in order:
    ///
    /// 1. Ends with `/*` → wildcard prefix.
    /// 2. Contains `:` → parameterized.
    /// 3. Otherwise → exact.
    pub(crate) fn parse(pattern: &str) -> Self {
        let pattern = normalize_path(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_string());
        }

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_string()),
                    None => Segment::Static(s.to_string()),
                })
                .collect();

            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    pub(crate) fn matches(&self, path: &str) -> Option<RouteParams> {
        let path = normalize_path(path);

        match self {
            Pattern::Exact(p) => (p == path).then(RouteParams::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = RouteParams::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) if s != path_seg => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => {
                            params.insert(name.clone(), path_seg.to_string());
                        }
                    }
                }
                Some(params)
            }
            Pattern::Wildcard(prefix) => {
                let suffix = path.strip_prefix(prefix.as_str())?;
                // `/dashboard/*` must not match `/dashboards`
                if !suffix.is_empty() && !suffix.starts_with('/') {
                    return None;
                }
                let mut params = RouteParams::new();
                params.insert("wildcard".to_string(), suffix.to_string());
                Some(params)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── normalize_path ────────────────────────────────────────────────────────

    #[test]
    fn normalize_keeps_root() {
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn normalize_strips_one_trailing_slash() {
        assert_eq!(normalize_path("/auth/signin/"), "/auth/signin");
        assert_eq!(normalize_path("/auth/signin"), "/auth/signin");
    }

    // ── Pattern::parse ────────────────────────────────────────────────────────

    #[test]
    fn parse_exact() {
        assert_eq!(
            Pattern::parse("/kyc-portal/"),
            Pattern::Exact("/kyc-portal".into())
        );
    }

    #[test]
    fn parse_parameterized() {
        match Pattern::parse("/admin/users/:id") {
            Pattern::Parameterized { segments } => {
                assert_eq!(segments.len(), 3);
                assert_eq!(segments[2], Segment::Parameter("id".into()));
            }
            other => panic!("expected Parameterized, got {other:?}"),
        }
    }

    #[test]
    fn parse_wildcard() {
        assert_eq!(
            Pattern::parse("/dashboard/*"),
            Pattern::Wildcard("/dashboard".into())
        );
    }

    // ── Pattern::matches ──────────────────────────────────────────────────────

    #[test]
    fn exact_match_and_miss() {
        let pat = Pattern::parse("/payment");
        assert!(pat.matches("/payment/").is_some());
        assert!(pat.matches("/payments").is_none());
    }

    #[test]
    fn parameterized_extracts_values() {
        let pat = Pattern::parse("/admin/users/:id/documents/:doc");
        let params = pat.matches("/admin/users/7/documents/passport").unwrap();
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("doc"), Some("passport"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn parameterized_rejects_wrong_shape() {
        let pat = Pattern::parse("/admin/users/:id");
        assert!(pat.matches("/admin/users").is_none());
        assert!(pat.matches("/admin/users/7/extra").is_none());
        assert!(pat.matches("/admin/groups/7").is_none());
    }

    #[test]
    fn wildcard_captures_tail() {
        let pat = Pattern::parse("/dashboard/*");
        let params = pat.matches("/dashboard/investor/portfolio").unwrap();
        assert_eq!(params.get("wildcard"), Some("/investor/portfolio"));
    }

    #[test]
    fn wildcard_respects_segment_boundary() {
        let pat = Pattern::parse("/dashboard/*");
        assert!(pat.matches("/dashboard").is_some());
        assert!(pat.matches("/dashboards").is_none());
    }
}
