//! Sanitizer/extractor: turns a raw feed entry into clean text, an excerpt
//! and an optional representative image.
//!
//! Everything here is pure. No I/O, no logging.

mod image;
mod text;

use chrono::{DateTime, Utc};

pub use image::{extract_image, has_image_extension, IMAGE_EXTENSIONS};
pub use text::{collapse_whitespace, excerpt, html_to_text, EXCERPT_MAX_CHARS, SENTENCE_MIN_INDEX};

/// One raw item from a polled feed, prior to normalization.
///
/// Lives only for the duration of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub title: String,
    /// Feed-native summary or description (may contain markup)
    pub summary: Option<String>,
    /// Full content body (may contain markup)
    pub body: Option<String>,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Media/enclosure URLs declared by the feed, in feed order
    pub media_candidates: Vec<String>,
}

/// Normalized view of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: String,
    pub clean_text: String,
    pub excerpt: String,
    pub image_url: Option<String>,
}

/// Sanitize an entry.
///
/// Text falls back from summary to body to title, taking the first that is
/// non-empty after markup is stripped. Image candidates come from the media
/// list first, then from the summary and body markup.
pub fn sanitize(entry: &Entry) -> Extracted {
    let title = collapse_whitespace(&html_to_text(&entry.title)).into_owned();

    let clean_text = [entry.summary.as_deref(), entry.body.as_deref()]
        .into_iter()
        .flatten()
        .map(html_to_text)
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| title.clone());

    let html_sources: Vec<&str> = [entry.summary.as_deref(), entry.body.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let link = (!entry.link.is_empty()).then_some(entry.link.as_str());
    let image_url = extract_image(&entry.media_candidates, &html_sources, link);

    let excerpt = excerpt(&clean_text).into_owned();

    Extracted {
        title,
        clean_text,
        excerpt,
        image_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(summary: Option<&str>, body: Option<&str>) -> Entry {
        Entry {
            title: "Kernel &amp; <i>Rust</i>".into(),
            summary: summary.map(String::from),
            body: body.map(String::from),
            link: "https://blog.example/posts/kernel".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_preferred() {
        let extracted = sanitize(&entry(Some("<p>Summary text.</p>"), Some("<p>Body</p>")));
        assert_eq!(extracted.clean_text, "Summary text.");
        assert_eq!(extracted.excerpt, "Summary text.");
        assert_eq!(extracted.title, "Kernel & Rust");
    }

    #[test]
    fn test_empty_summary_falls_back_to_body() {
        let extracted = sanitize(&entry(Some("<p>  </p>"), Some("<div>Body text</div>")));
        assert_eq!(extracted.clean_text, "Body text");
    }

    #[test]
    fn test_falls_back_to_title() {
        let extracted = sanitize(&entry(None, Some("<img src=\"a.jpg\">")));
        assert_eq!(extracted.clean_text, "Kernel & Rust");
    }

    #[test]
    fn test_image_from_body_resolved_against_link() {
        let extracted = sanitize(&entry(Some("text"), Some(r#"<img src="/media/cover.png">"#)));
        assert_eq!(
            extracted.image_url.as_deref(),
            Some("https://blog.example/media/cover.png")
        );
    }

    #[test]
    fn test_no_image_is_not_an_error() {
        let extracted = sanitize(&entry(Some("text only"), None));
        assert_eq!(extracted.image_url, None);
    }
}
