//! Content extraction for post and sequence pages
//!
//! The crawl engine only consumes the [`ContentExtractor`] trait. The
//! [`HtmlExtractor`] implementation knows the page template of the site:
//! where the body links, pingbacks, titles and sequence navigation live.
//!
//! Every link handed out has already been normalized against the site base,
//! filtered down to posts and sequences, and deduplicated in page order.

use crate::url::{classify_link, normalize_link, LinkShape};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

const TITLE_LINK: &str = "a.PostsPageTitle-link";
const ALTERNATE_TITLE: &str = "h1";
const BODY_LINKS: &str = "div.InlineReactSelectionWrapper-root p a[href]";
const BODY: &str = "div.InlineReactSelectionWrapper-root";
const PINGBACK_LINKS: &str = "div.PingbacksList-list a[href]";
const CURATED_MARK: &str = ".PostsPageTitle-curated, .CuratedIcon";
const COLLECTION_NAV: &str = ".PostsTopSequencesNav-title a[href]";
const PREVIOUS_LINK: &str = "a.SequencesNavigationLink-prev[href]";
const NEXT_LINK: &str = "a.SequencesNavigationLink-next[href]";
const COLLECTION_CONTENT: &str = "div.SequencesPage-content";
const COLLECTION_TITLE: &str = "div.SequencesPage-content h1";
const CHAPTER_LINKS: &str =
    "div.ChaptersItem-posts span.PostsTitle-eaTitleDesktopEllipsis a[href]";

/// Errors from reading a fetched page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector '{0}'")]
    Selector(String),

    #[error("Expected element '{0}' not found")]
    MissingElement(&'static str),
}

/// What a post page says about itself and its neighbors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentExtraction {
    pub title: Option<String>,

    /// Links from the post body, in page order
    pub outgoing_links: Vec<String>,

    /// Links from the pingback list, in page order
    pub incoming_links: Vec<String>,

    pub curated: bool,

    /// Title of the sequence shown in the navigation header
    pub collection_nav_title: Option<String>,

    /// Link of the sequence shown in the navigation header
    pub collection_nav_url: Option<String>,

    /// Link to the previous post of the sequence
    pub predecessor_link: Option<String>,

    /// Link to the next post of the sequence
    pub successor_link: Option<String>,
}

/// The chapters listed on a sequence page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionExtraction {
    pub title: Option<String>,

    /// Chapter links in reading order
    pub chapter_links: Vec<String>,
}

/// Where a page keeps its own title
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleProbe {
    /// The canonical title link: `href` points at the post's own URL
    Canonical { href: String, title: String },
    /// Alternate layout with only a heading
    Alternate { title: String },
    /// Neither element is present
    Missing,
}

/// Reads structured data out of fetched page content
pub trait ContentExtractor: Send + Sync {
    /// Extracts a post page
    fn extract_document(&self, html: &str, base: &Url)
        -> Result<DocumentExtraction, ExtractError>;

    /// Finds the element a page uses for its own title
    fn probe_title(&self, html: &str) -> Result<TitleProbe, ExtractError>;

    /// Extracts a sequence page
    fn extract_collection(
        &self,
        html: &str,
        base: &Url,
    ) -> Result<CollectionExtraction, ExtractError>;
}

/// [`ContentExtractor`] for the site's HTML templates
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for HtmlExtractor {
    fn extract_document(
        &self,
        html: &str,
        base: &Url,
    ) -> Result<DocumentExtraction, ExtractError> {
        let document = Html::parse_document(html);

        let title = match first(&document, TITLE_LINK)? {
            Some(element) => element_text(element),
            None => first(&document, ALTERNATE_TITLE)?.and_then(element_text),
        };

        if title.is_none() && first(&document, BODY)?.is_none() {
            return Err(ExtractError::MissingElement(BODY));
        }

        let outgoing_links = collect_links(&document, BODY_LINKS, base)?;
        let incoming_links = collect_links(&document, PINGBACK_LINKS, base)?;
        let curated = first(&document, CURATED_MARK)?.is_some();

        let nav = first(&document, COLLECTION_NAV)?;
        let collection_nav_title = nav.and_then(element_text);
        let collection_nav_url = nav.and_then(|e| link_of(e, base));

        let predecessor_link = first(&document, PREVIOUS_LINK)?.and_then(|e| link_of(e, base));
        let successor_link = first(&document, NEXT_LINK)?.and_then(|e| link_of(e, base));

        Ok(DocumentExtraction {
            title,
            outgoing_links,
            incoming_links,
            curated,
            collection_nav_title,
            collection_nav_url,
            predecessor_link,
            successor_link,
        })
    }

    fn probe_title(&self, html: &str) -> Result<TitleProbe, ExtractError> {
        let document = Html::parse_document(html);

        if let Some(element) = first(&document, TITLE_LINK)? {
            if let Some(href) = element.value().attr("href") {
                return Ok(TitleProbe::Canonical {
                    href: href.trim().to_string(),
                    title: element_text(element).unwrap_or_default(),
                });
            }
        }

        match first(&document, ALTERNATE_TITLE)?.and_then(element_text) {
            Some(title) => Ok(TitleProbe::Alternate { title }),
            None => Ok(TitleProbe::Missing),
        }
    }

    fn extract_collection(
        &self,
        html: &str,
        base: &Url,
    ) -> Result<CollectionExtraction, ExtractError> {
        let document = Html::parse_document(html);

        if first(&document, COLLECTION_CONTENT)?.is_none() {
            return Err(ExtractError::MissingElement(COLLECTION_CONTENT));
        }

        let title = first(&document, COLLECTION_TITLE)?.and_then(element_text);
        let chapter_links = collect_links(&document, CHAPTER_LINKS, base)?;

        Ok(CollectionExtraction {
            title,
            chapter_links,
        })
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|_| ExtractError::Selector(css.to_string()))
}

fn first<'a>(document: &'a Html, css: &str) -> Result<Option<ElementRef<'a>>, ExtractError> {
    Ok(document.select(&selector(css)?).next())
}

/// Trimmed text content with runs of whitespace collapsed
fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// The element's `href` as an absolute post or sequence link
fn link_of(element: ElementRef<'_>, base: &Url) -> Option<String> {
    let href = element.value().attr("href")?;
    let url = normalize_link(href, base).ok()?;
    if classify_link(&url) == LinkShape::Excluded {
        return None;
    }
    Some(url.to_string())
}

fn collect_links(document: &Html, css: &str, base: &Url) -> Result<Vec<String>, ExtractError> {
    let mut links: Vec<String> = Vec::new();
    for element in document.select(&selector(css)?) {
        if let Some(link) = link_of(element, base) {
            if !links.contains(&link) {
                links.push(link);
            }
        }
    }
    Ok(links)
}
