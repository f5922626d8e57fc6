use select::document::Document;
use select::node::Node;
use select::predicate::Name;
use url::Url;

/// Accepted image file extensions, compared case-insensitively against the
/// URL path (query and fragment ignored)
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif"];

/// `src` substrings marking decorative or tracking images
const PLACEHOLDER_MARKERS: &[&str] = &[
    "logo", "favicon", "/icon", "-icon", "_icon", "sprite", "spacer", "blank.gif",
    "pixel.gif", "pixel.png", "tracking", "1x1", "gravatar", "feedburner", "emoji",
];

/// Meta tags carrying a page's representative image
const META_IMAGE_KEYS: &[&str] = &["og:image", "og:image:url", "og:image:secure_url", "twitter:image"];

/// Picks a representative image URL for an entry.
///
/// Candidates are tried in order and the first one with a recognized image
/// extension wins:
///
/// 1. feed media and enclosure URLs (`media`), in feed order
/// 2. the largest `<img>` by declared `width * height` in `html_sources`,
///    skipping placeholder-looking sources
/// 3. `og:image` / `twitter:image` meta tags
/// 4. the first `<img>` anywhere
///
/// Relative `src` values are resolved against `base` when it parses as a
/// URL. Only `http` and `https` results are returned.
pub fn extract_image(media: &[String], html_sources: &[&str], base: Option<&str>) -> Option<String> {
    let base = base.and_then(|b| Url::parse(b).ok());
    let resolve = |raw: &str| resolve_image_url(raw, base.as_ref());

    if let Some(url) = media.iter().find_map(|m| resolve(m.as_str())) {
        return Some(url);
    }

    let documents: Vec<Document> = html_sources
        .iter()
        .filter(|html| !html.trim().is_empty())
        .map(|html| Document::from(*html))
        .collect();

    // (2) largest declared area; ties keep the earlier tag
    let mut best: Option<(u64, String)> = None;
    for img in documents.iter().flat_map(|doc| doc.find(Name("img"))) {
        let Some(src) = img.attr("src") else { continue };
        if is_placeholder(src) {
            continue;
        }
        let area = declared_area(&img);
        if area == 0 {
            continue;
        }
        let Some(url) = resolve(src) else { continue };
        if best.as_ref().map_or(true, |(best_area, _)| area > *best_area) {
            best = Some((area, url));
        }
    }
    if let Some((_, url)) = best {
        return Some(url);
    }

    // (3) Open Graph / Twitter cards
    for meta in documents.iter().flat_map(|doc| doc.find(Name("meta"))) {
        let key = meta.attr("property").or_else(|| meta.attr("name"));
        if key.is_some_and(|k| META_IMAGE_KEYS.contains(&k.to_ascii_lowercase().as_str())) {
            if let Some(url) = meta.attr("content").and_then(|c| resolve(c)) {
                return Some(url);
            }
        }
    }

    // (4) first <img> anywhere
    documents
        .iter()
        .flat_map(|doc| doc.find(Name("img")))
        .find_map(|img| img.attr("src"))
        .and_then(|src| resolve(src))
}

/// True if the URL path ends with one of [`IMAGE_EXTENSIONS`]
pub fn has_image_extension(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn resolve_image_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(raw).ok()?,
        Err(_) => return None,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let url = url.to_string();
    has_image_extension(&url).then_some(url)
}

fn is_placeholder(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn declared_area(img: &Node) -> u64 {
    let dim = |name: &str| img.attr(name).and_then(parse_dimension).unwrap_or(0);
    dim("width") * dim("height")
}

/// Leading digits of a dimension attribute: `"600"`, `"600px"`
fn parse_dimension(value: &str) -> Option<u64> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .take(6)
        .collect();
    digits.parse().ok()
}
