//! URL handling module for Postgraph
//!
//! This module turns raw `href` values into absolute on-site URLs and
//! classifies them by the path shapes the site uses for posts and sequences.

mod canonical;
mod domain;
mod normalize;

// Re-export main functions
pub use canonical::{collection_url, document_url, id_from_url, strip_title_segment};
pub use domain::{is_same_site, site_host};
pub use normalize::normalize_link;

use url::Url;

/// The shape of an on-site link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkShape {
    /// Canonical post URL (`/posts/{id}` with an optional title segment)
    Document { id: String },
    /// Canonical sequence URL (`/s/{id}`)
    Collection { id: String },
    /// Sequence chapter (`/s/{sid}/p/{pid}`) or legacy `/lw/...` link; the
    /// canonical identity has to be read from the page
    Pretty,
    /// Profiles, tags, comments, wiki and listing pages
    Excluded,
}

impl LinkShape {
    /// Returns true if the link can be resolved without fetching it
    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::Document { .. } | Self::Collection { .. })
    }
}

/// Classifies an already normalized on-site URL by its path segments
///
/// # Examples
///
/// ```
/// use postgraph::url::{classify_link, LinkShape};
/// use url::Url;
///
/// let url = Url::parse("https://www.lesswrong.com/posts/abc123/some-title").unwrap();
/// assert_eq!(classify_link(&url), LinkShape::Document { id: "abc123".to_string() });
///
/// let url = Url::parse("https://www.lesswrong.com/s/seq1").unwrap();
/// assert_eq!(classify_link(&url), LinkShape::Collection { id: "seq1".to_string() });
///
/// let url = Url::parse("https://www.lesswrong.com/s/seq1/p/abc123").unwrap();
/// assert_eq!(classify_link(&url), LinkShape::Pretty);
/// ```
pub fn classify_link(url: &Url) -> LinkShape {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if segments.contains(&"comment") {
        return LinkShape::Excluded;
    }

    match segments.as_slice() {
        ["posts", id, ..] => LinkShape::Document { id: id.to_string() },
        ["s", id] => LinkShape::Collection { id: id.to_string() },
        ["s", _, "p", _] => LinkShape::Pretty,
        ["lw", _, ..] => LinkShape::Pretty,
        _ => LinkShape::Excluded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://www.lesswrong.com{}", path)).unwrap()
    }

    #[test]
    fn test_classify_post_with_title_segment() {
        assert_eq!(
            classify_link(&url("/posts/p1/intro-to-things")),
            LinkShape::Document {
                id: "p1".to_string()
            }
        );
    }

    #[test]
    fn test_classify_bare_post() {
        assert_eq!(
            classify_link(&url("/posts/p2")),
            LinkShape::Document {
                id: "p2".to_string()
            }
        );
    }

    #[test]
    fn test_classify_sequence() {
        assert_eq!(
            classify_link(&url("/s/seq")),
            LinkShape::Collection {
                id: "seq".to_string()
            }
        );
    }

    #[test]
    fn test_classify_pretty_links() {
        assert_eq!(classify_link(&url("/s/seq/p/p1")), LinkShape::Pretty);
        assert_eq!(classify_link(&url("/lw/abc/old_title")), LinkShape::Pretty);
    }

    #[test]
    fn test_classify_site_pages_that_are_not_posts() {
        for path in [
            "/library",
            "/about",
            "/sequences",
            "/allPosts",
            "/w/some-concept",
            "/rationality/some-post",
            "/s/seq/p",
            "/s/seq/extra",
            "/lw",
        ] {
            assert_eq!(classify_link(&url(path)), LinkShape::Excluded, "{}", path);
        }
    }

    #[test]
    fn test_classify_excluded() {
        assert_eq!(classify_link(&url("/users/someone")), LinkShape::Excluded);
        assert_eq!(classify_link(&url("/tag/ai")), LinkShape::Excluded);
        assert_eq!(
            classify_link(&url("/posts/p1/title/comment/c1")),
            LinkShape::Excluded
        );
        assert_eq!(classify_link(&url("/")), LinkShape::Excluded);
        assert_eq!(classify_link(&url("/posts")), LinkShape::Excluded);
    }

    #[test]
    fn test_is_canonical() {
        assert!(LinkShape::Document { id: "a".into() }.is_canonical());
        assert!(LinkShape::Collection { id: "a".into() }.is_canonical());
        assert!(!LinkShape::Pretty.is_canonical());
        assert!(!LinkShape::Excluded.is_canonical());
    }
}
