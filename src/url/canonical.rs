use url::Url;

/// Builds the canonical URL of a post
///
/// # Examples
///
/// ```
/// use postgraph::url::document_url;
/// use url::Url;
///
/// let base = Url::parse("https://www.lesswrong.com").unwrap();
/// assert_eq!(
///     document_url(&base, "abc").as_str(),
///     "https://www.lesswrong.com/posts/abc"
/// );
/// ```
pub fn document_url(base: &Url, id: &str) -> Url {
    with_path(base, &format!("/posts/{}", id))
}

/// Builds the canonical URL of a sequence
pub fn collection_url(base: &Url, id: &str) -> Url {
    with_path(base, &format!("/s/{}", id))
}

fn with_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Strips the trailing human-readable title segment from a post URL
///
/// `/posts/{id}/{slug}` becomes `/posts/{id}`; URLs that carry no title
/// segment are returned unchanged.
pub fn strip_title_segment(url: &Url) -> Url {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["posts", id, _, ..] => with_path(url, &format!("/posts/{}", id)),
        _ => {
            let mut url = url.clone();
            url.set_query(None);
            url.set_fragment(None);
            url
        }
    }
}

/// Returns the last non-empty path segment of a URL
pub fn id_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|seg| !seg.is_empty())
        .last()
        .map(str::to_string)
}
