use url::Url;

/// Returns the host of a URL, lowercased and without a leading `www.`
///
/// # Examples
///
/// ```
/// use url::Url;
/// use postgraph::url::site_host;
///
/// let url = Url::parse("https://WWW.LessWrong.com/posts/abc").unwrap();
/// assert_eq!(site_host(&url), Some("lesswrong.com".to_string()));
/// ```
pub fn site_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let host = h.to_lowercase();
        match host.strip_prefix("www.") {
            Some(bare) => bare.to_string(),
            None => host,
        }
    })
}

/// Checks whether two URLs belong to the same site
///
/// Hosts are compared through [`site_host`] and explicit ports must match;
/// the scheme is ignored so `http` and `https` links to the site are both
/// accepted.
pub fn is_same_site(url: &Url, base: &Url) -> bool {
    match (site_host(url), site_host(base)) {
        (Some(a), Some(b)) => a == b && url.port() == base.port(),
        _ => false,
    }
}
