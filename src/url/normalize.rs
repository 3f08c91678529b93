use crate::{UrlError, UrlResult};
use url::Url;

/// Query parameters that never change which resource a Moodle URL points at
const NOISE_PARAMS: &[&str] = &["section", "printable", "notifyeditingon", "forcedownload"];

/// Canonicalizes a URL so that links differing only in noise map to one frontier key
///
/// Only HTTP(S) URLs with a host are accepted. The parser lowercases the
/// host; the path loses dot segments, doubled slashes and its trailing slash;
/// the fragment is dropped; `section`, `printable`, `notifyeditingon`,
/// `forcedownload` and `content=scxml` are removed from the query, the rest is
/// sorted by key, and an empty query disappears entirely.
///
/// Canonicalization is idempotent: feeding the output back in returns it unchanged.
///
/// # Examples
///
/// ```
/// use tessa_harvest::url::canonicalize_url;
///
/// let url = canonicalize_url(
///     "http://www.open.edu/openlearncreate/mod/oucontent/view.php?id=5&section=1.2#top",
/// ).unwrap();
/// assert_eq!(url.as_str(), "http://www.open.edu/openlearncreate/mod/oucontent/view.php?id=5");
/// ```
pub fn canonicalize_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(format!("expected http or https, got {}", other))),
    }
    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    let path = normalize_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    if url.query().is_some() {
        let pairs = retained_query_pairs(&url);
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    Ok(url)
}

/// Collapses dot segments, repeated slashes and the trailing slash
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." {
            segments.pop();
        } else {
            segments.push(segment);
        }
    }
    format!("/{}", segments.join("/"))
}

/// Query pairs that survive canonicalization, ordered by key
fn retained_query_pairs(url: &Url) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, value)| !is_noise_param(key, value))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    // Stable sort keeps repeated keys in document order
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

/// Print, edit and download flags plus section anchors
fn is_noise_param(key: &str, value: &str) -> bool {
    NOISE_PARAMS.contains(&key) || (key == "content" && value == "scxml")
}

/// Returns the Moodle page identifier (`id` query parameter) of a URL, if any
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tessa_harvest::url::page_id;
///
/// let url = Url::parse("http://www.open.edu/openlearncreate/mod/subpage/view.php?id=152400").unwrap();
/// assert_eq!(page_id(&url), Some("152400".to_string()));
/// ```
pub fn page_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = "http://www.open.edu/openlearncreate/mod/oucontent/view.php?id=53800";

    #[test]
    fn test_remove_fragment() {
        let result = canonicalize_url(&format!("{}#section-2", MODULE)).unwrap();
        assert_eq!(result.as_str(), MODULE);
    }

    #[test]
    fn test_remove_section_param() {
        let plain = canonicalize_url(&format!("{}&section=3", MODULE)).unwrap();
        let dotted = canonicalize_url(&format!("{}&section=3.1", MODULE)).unwrap();
        assert_eq!(plain.as_str(), MODULE);
        assert_eq!(dotted.as_str(), MODULE);
    }

    #[test]
    fn test_remove_print_and_edit_flags() {
        let result = canonicalize_url(&format!(
            "{}&printable=1&content=scxml&notifyeditingon=1",
            MODULE
        ))
        .unwrap();
        assert_eq!(result.as_str(), MODULE);
    }

    #[test]
    fn test_remove_forcedownload_first_or_later() {
        let first = canonicalize_url(
            "http://www.open.edu/openlearncreate/pluginfile.php/1/mod_resource/content/1/a.pdf?forcedownload=1",
        )
        .unwrap();
        assert_eq!(
            first.as_str(),
            "http://www.open.edu/openlearncreate/pluginfile.php/1/mod_resource/content/1/a.pdf"
        );

        let later = canonicalize_url(&format!("{}&forcedownload=1", MODULE)).unwrap();
        assert_eq!(later.as_str(), MODULE);
    }

    #[test]
    fn test_other_content_values_kept() {
        let result = canonicalize_url(&format!("{}&content=1", MODULE)).unwrap();
        assert_eq!(
            result.as_str(),
            "http://www.open.edu/openlearncreate/mod/oucontent/view.php?content=1&id=53800"
        );
    }

    #[test]
    fn test_sort_query_params() {
        let result = canonicalize_url("http://www.open.edu/view.php?id=2&b=1").unwrap();
        assert_eq!(result.as_str(), "http://www.open.edu/view.php?b=1&id=2");
    }

    #[test]
    fn test_noise_variants_share_canonical_form() {
        let variants = [
            format!("{}#top", MODULE),
            format!("{}&section=1", MODULE),
            format!("{}&printable=1", MODULE),
            format!("{}&section=2.4&printable=1#x", MODULE),
            MODULE.replace("?id=53800", "?printable=1&id=53800"),
        ];
        for variant in &variants {
            assert_eq!(canonicalize_url(variant).unwrap().as_str(), MODULE, "{}", variant);
        }
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "http://WWW.OPEN.EDU/a/../b//c/?q=hello%20world&section=1#frag",
            "https://www.open.edu/openlearncreate/course/view.php?id=2042",
            "http://www.open.edu/x?a=1&a=2&z=%26",
        ];
        for input in inputs {
            let once = canonicalize_url(input).unwrap();
            let twice = canonicalize_url(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_lowercase_host_and_trailing_slash() {
        let result = canonicalize_url("http://WWW.OPEN.EDU/openlearncreate/").unwrap();
        assert_eq!(result.as_str(), "http://www.open.edu/openlearncreate");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = canonicalize_url("mailto:someone@open.edu");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(canonicalize_url("not a url").is_err());
    }

    #[test]
    fn test_page_id() {
        let url = Url::parse(MODULE).unwrap();
        assert_eq!(page_id(&url), Some("53800".to_string()));

        let no_id = Url::parse("http://www.open.edu/openlearncreate/").unwrap();
        assert_eq!(page_id(&no_id), None);
    }
}
