use indexmap::IndexMap;
use serde::Serialize;
use url::Url;

use crate::analysis::Citation;

pub const NO_LINKS_FOUND_MESSAGE: &str =
    "No direct shopping links found via search grounding. Try checking the description for brands.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebLink {
    pub uri: String,
    pub title: String,
}

impl WebLink {
    /// Host of the link without a leading `www.`, or the raw URI when it
    /// does not parse.
    pub fn host_label(&self) -> String {
        Url::parse(&self.uri)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .map(|host| host.strip_prefix("www.").unwrap_or(host.as_str()).to_string())
            .unwrap_or_else(|| self.uri.clone())
    }
}

/// The "Found Online" list: either at least one link, or an explicit empty state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoundOnline {
    Links(Vec<WebLink>),
    NoneFound,
}

impl FoundOnline {
    pub fn links(&self) -> &[WebLink] {
        match self {
            FoundOnline::Links(links) => links.as_slice(),
            FoundOnline::NoneFound => &[],
        }
    }
}

/// Drops citations without a URI or title, then keeps the first citation seen
/// for each URI in first-seen order.
pub fn dedupe_citations(citations: &[Citation]) -> Vec<Citation> {
    let mut by_uri: IndexMap<&str, &Citation> = IndexMap::new();
    for citation in citations.iter().filter(|citation| citation.is_valid()) {
        if let Some(uri) = citation.uri() {
            by_uri.entry(uri).or_insert(citation);
        }
    }
    by_uri.into_values().cloned().collect()
}

pub fn found_online(citations: &[Citation]) -> FoundOnline {
    let links: Vec<WebLink> = dedupe_citations(citations)
        .iter()
        .filter_map(|citation| {
            Some(WebLink {
                uri: citation.uri()?.to_string(),
                title: citation.title()?.to_string(),
            })
        })
        .collect();
    if links.is_empty() {
        FoundOnline::NoneFound
    } else {
        FoundOnline::Links(links)
    }
}
