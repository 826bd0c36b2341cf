//! Path matching rules.
//!
//! # Responsibilities
//! - Match path prefixes (case-sensitive)
//! - Match static-file style paths (a segment containing a dot)
//! - Combine rules with OR semantics
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching
//! - Pure functions of the path; no request state is consulted

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Matches any path with a segment containing a literal dot (`/logo.png`,
/// `/.well-known/x`), which is treated as a static file request. The `.` and
/// `..` navigation segments are not file names and never match.
#[derive(Debug, Clone, Default)]
pub struct DottedSegmentMatcher;

impl Matcher for DottedSegmentMatcher {
    fn matches(&self, path: &str) -> bool {
        path.split('/')
            .any(|segment| segment.contains('.') && !is_dot_segment(segment))
    }
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

/// Whether the path contains a `.` or `..` segment, plain or percent-encoded.
/// Such paths are rejected before any other rule sees them.
pub fn has_dot_segments(path: &str) -> bool {
    path.split('/').any(is_dot_segment)
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug, Default)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// One prefix matcher per entry.
    pub fn prefixes<S: AsRef<str>>(prefixes: &[S]) -> Self {
        Self::new(
            prefixes
                .iter()
                .map(|p| Box::new(PathPrefixMatcher::new(p.as_ref())) as Box<dyn Matcher>)
                .collect(),
        )
    }

    pub fn push(&mut self, matcher: Box<dyn Matcher>) {
        self.matchers.push(matcher);
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}

/// The rule deciding which paths skip the pipeline entirely: static asset
/// prefixes, the framework's internal prefix, and dotted segments.
#[derive(Debug)]
pub struct PathExclusion {
    rule: AnyMatcher,
}

impl PathExclusion {
    pub fn new<S: AsRef<str>>(excluded_prefixes: &[S]) -> Self {
        let mut rule = AnyMatcher::prefixes(excluded_prefixes);
        rule.push(Box::new(DottedSegmentMatcher));
        Self { rule }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.rule.matches(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/checkout");
        assert!(matcher.matches("/checkout"));
        assert!(matcher.matches("/checkout/confirm"));
        assert!(!matcher.matches("/cart"));
        assert!(!matcher.matches("/Checkout"));
    }

    #[test]
    fn test_dotted_segment_matcher() {
        let matcher = DottedSegmentMatcher;
        assert!(matcher.matches("/logo.png"));
        assert!(matcher.matches("/images/hero.webp"));
        assert!(matcher.matches("/.well-known/security"));
        assert!(!matcher.matches("/products/shoes"));
        assert!(!matcher.matches("/"));
        assert!(!matcher.matches("/x/../../sites/victim"));
        assert!(!matcher.matches("/./account"));
    }

    #[test]
    fn test_dot_segments() {
        assert!(has_dot_segments("/x/../../sites/victim/account"));
        assert!(has_dot_segments("/./account"));
        assert!(has_dot_segments("/a/%2E%2e/b"));
        assert!(has_dot_segments("/a/.."));
        assert!(!has_dot_segments("/logo.png"));
        assert!(!has_dot_segments("/.well-known/x"));
        assert!(!has_dot_segments("/..."));
    }

    #[test]
    fn test_any_matcher() {
        let matcher = AnyMatcher::prefixes(&["/login", "/api/auth"]);
        assert!(matcher.matches("/login"));
        assert!(matcher.matches("/api/auth/callback"));
        assert!(!matcher.matches("/api/products"));
        assert!(!AnyMatcher::default().matches("/login"));
    }

    #[test]
    fn test_path_exclusion() {
        let exclusion = PathExclusion::new(&["/_next", "/static"]);
        assert!(exclusion.is_excluded("/_next/chunks/main"));
        assert!(exclusion.is_excluded("/static/banner"));
        assert!(exclusion.is_excluded("/favicon.ico"));
        assert!(!exclusion.is_excluded("/"));
        assert!(!exclusion.is_excluded("/admin/orders"));
        assert!(!exclusion.is_excluded("/api/auth/session"));
    }
}
