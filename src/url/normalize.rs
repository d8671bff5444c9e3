use crate::url::domain::is_same_site;
use crate::UrlError;
use url::Url;

/// Query parameters that mark a link as pointing at a comment
const COMMENT_PARAMS: &[&str] = &["commentId", "commentid"];

/// Normalizes a raw link into an absolute URL on the source site
///
/// # Normalization Steps
///
/// 1. Trim the link and resolve it against the site base (handles `/posts/..`
///    and other site-relative forms)
/// 2. Reject non-HTTP(S) schemes and host-less URLs
/// 3. Reject links to any other site
/// 4. Reject comment permalinks (`?commentId=...`)
/// 5. Drop query and fragment
/// 6. Collapse dot segments, duplicate and trailing slashes
/// 7. Rewrite scheme, host and port to the base so `www.` variants agree
///
/// # Examples
///
/// ```
/// use postgraph::url::normalize_link;
/// use url::Url;
///
/// let base = Url::parse("https://www.lesswrong.com").unwrap();
/// let url = normalize_link("/posts/abc/title?x=1#intro", &base).unwrap();
/// assert_eq!(url.as_str(), "https://www.lesswrong.com/posts/abc/title");
/// ```
pub fn normalize_link(raw: &str, base: &Url) -> Result<Url, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Parse("empty link".to_string()));
    }

    let mut url = base
        .join(raw)
        .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    if !is_same_site(&url, base) {
        return Err(UrlError::ForeignDomain(url.to_string()));
    }

    if url
        .query_pairs()
        .any(|(key, _)| COMMENT_PARAMS.contains(&key.as_ref()))
    {
        return Err(UrlError::Excluded(url.to_string()));
    }

    url.set_query(None);
    url.set_fragment(None);

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    // Same site already checked, so these cannot fail on a valid base
    url.set_scheme(base.scheme())
        .map_err(|_| UrlError::InvalidScheme(base.scheme().to_string()))?;
    url.set_host(base.host_str())
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;
    url.set_port(base.port())
        .map_err(|_| UrlError::Parse("Failed to set port".to_string()))?;

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}
