/// Tests a lowercase host against a domain pattern
///
/// Used to scope the crawl to the site's source domains and to pick which
/// hosts the response cache keeps forever. Two kinds of patterns are supported:
/// 1. Exact match: "www.open.edu" matches only "www.open.edu"
/// 2. Wildcard match: "*.tessafrica.net" matches the bare domain and any
///    subdomain of it, however deep
///
/// # Examples
///
/// ```
/// use tessa_harvest::url::matches_wildcard;
///
/// // Exact match
/// assert!(matches_wildcard("www.open.edu", "www.open.edu"));
/// assert!(!matches_wildcard("www.open.edu", "open.edu"));
///
/// // Wildcard match
/// assert!(matches_wildcard("*.tessafrica.net", "tessafrica.net"));
/// assert!(matches_wildcard("*.tessafrica.net", "www.tessafrica.net"));
/// assert!(!matches_wildcard("*.tessafrica.net", "tessafrica.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        // Whatever precedes the base must be empty or end on a label boundary
        Some(base) => candidate
            .strip_suffix(base)
            .map_or(false, |rest| rest.is_empty() || rest.ends_with('.')),
        None => candidate == pattern,
    }
}
