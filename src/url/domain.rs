use crate::url::matches_wildcard;
use url::Url;

/// Lowercase host of `url`, without the port
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tessa_harvest::url::extract_domain;
///
/// let url = Url::parse("http://WWW.OPEN.EDU/openlearncreate/").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.open.edu".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if the URL's host matches any of the given domain patterns
pub fn domain_matches_any(url: &Url, patterns: &[String]) -> bool {
    match extract_domain(url) {
        Some(domain) => patterns
            .iter()
            .any(|pattern| matches_wildcard(pattern, &domain)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        let url = Url::parse("http://www.open.edu/openlearncreate/mod/subpage/view.php?id=1").unwrap();
        assert_eq!(extract_domain(&url), Some("www.open.edu".to_string()));
    }

    #[test]
    fn test_port_is_not_part_of_host() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_domain_matches_any() {
        let patterns = vec!["www.open.edu".to_string(), "*.tessafrica.net".to_string()];

        let inside = Url::parse("http://www.tessafrica.net/home").unwrap();
        let outside = Url::parse("https://www.youtube.com/watch?v=1").unwrap();

        assert!(domain_matches_any(&inside, &patterns));
        assert!(!domain_matches_any(&outside, &patterns));
    }
}
