use std::cmp::Ordering;

use feed_rs::model;
use feed_rs::parser;

use crate::content::Entry;

/// Entries parsed from one feed document
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Most recent first, at most `limit` long
    pub entries: Vec<Entry>,
    /// Entries dropped for lacking a usable http(s) link
    pub skipped: usize,
}

/// Parse an RSS/Atom/JSON Feed document into raw entries.
///
/// Entries without a link are skipped. The rest are ordered most recent
/// first and truncated to `limit`. Undated entries follow the dated ones in
/// feed order, so they never push out a feed's newest dated items.
pub fn parse_feed(bytes: &[u8], limit: usize) -> Result<ParseResult, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let mut skipped = 0;
    let mut entries: Vec<Entry> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let converted = convert_entry(entry);
            if converted.is_none() {
                skipped += 1;
            }
            converted
        })
        .collect();

    entries.sort_by(newest_first);
    entries.truncate(limit);

    Ok(ParseResult { entries, skipped })
}

fn convert_entry(entry: model::Entry) -> Option<Entry> {
    let link = article_link(&entry.links)?;

    let title = entry
        .title
        .map(|t| t.content)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let summary = entry.summary.map(|s| s.content);
    let body = entry.content.and_then(|c| c.body);
    let published_at = entry.published.or(entry.updated);

    let mut media_candidates = Vec::new();
    for object in &entry.media {
        for content in &object.content {
            if let Some(url) = &content.url {
                media_candidates.push(url.to_string());
            }
        }
        for thumbnail in &object.thumbnails {
            media_candidates.push(thumbnail.image.uri.clone());
        }
    }
    for enclosure in entry
        .links
        .iter()
        .filter(|l| l.rel.as_deref() == Some("enclosure"))
    {
        media_candidates.push(enclosure.href.clone());
    }

    Some(Entry {
        title,
        summary,
        body,
        link,
        published_at,
        media_candidates,
    })
}

/// The article's own URL: first `alternate` (or rel-less) link, else any
/// non-enclosure link. Only http(s).
fn article_link(links: &[model::Link]) -> Option<String> {
    let usable = |l: &&model::Link| {
        let href = l.href.trim();
        href.starts_with("http://") || href.starts_with("https://")
    };

    links
        .iter()
        .filter(usable)
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| {
            links
                .iter()
                .filter(usable)
                .find(|l| l.rel.as_deref() != Some("enclosure"))
        })
        .map(|l| l.href.trim().to_string())
}

/// Dated entries newest first; undated ones after them in feed order
fn newest_first(a: &Entry, b: &Entry) -> Ordering {
    match (a.published_at, b.published_at) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => b.cmp(&a),
    }
}
