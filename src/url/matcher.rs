/// Checks if a domain matches an allow-list pattern
///
/// Two pattern forms are supported:
/// 1. Exact: "example.com" matches only "example.com"
/// 2. Wildcard: "*.example.com" matches "example.com" and any subdomain of it
///
/// # Examples
///
/// ```
/// use seedline::url::matches_domain_pattern;
///
/// assert!(matches_domain_pattern("example.com", "example.com"));
/// assert!(!matches_domain_pattern("example.com", "blog.example.com"));
/// assert!(matches_domain_pattern("*.example.com", "api.v2.example.com"));
/// assert!(!matches_domain_pattern("*.example.com", "notexample.com"));
/// ```
pub fn matches_domain_pattern(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || (candidate.len() > base.len()
                    && candidate.ends_with(base)
                    && candidate.as_bytes()[candidate.len() - base.len() - 1] == b'.')
        }
        None => candidate == pattern,
    }
}

/// Returns true if any pattern in the allow-list matches the domain
pub fn is_domain_allowed<S: AsRef<str>>(patterns: &[S], domain: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| matches_domain_pattern(pattern.as_ref(), domain))
}
