//! Page metadata extraction.
//!
//! Resolves the canonical title, description, lead image, license link, and
//! image alt text from a fetched article page. Each field has a fixed
//! priority chain (Open Graph first, then Twitter card, then generic
//! fallbacks); discovered relative URLs are resolved against the page's own
//! URL. A page that yields nothing produces an empty [`PageMeta`] and the
//! entry proceeds on feed-supplied fields alone.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::trace;

/// Metadata pulled from one article page. All fields optional.
#[derive(Debug, Default, Clone)]
pub struct PageMeta {
    /// Absolute URL of the lead image.
    pub image: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absolute URL of the page's `rel="license"` link.
    pub license_url: Option<String>,
    pub image_alt: Option<String>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

/// Resolve a possibly-relative URL against the page URL. Returns the input
/// unchanged when the base itself does not parse.
fn absolutize(base_url: &str, candidate: &str) -> String {
    match url::Url::parse(base_url).and_then(|base| base.join(candidate)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => candidate.to_string(),
    }
}

/// First non-empty `content` attribute among the given meta selectors.
fn pick_meta(document: &Html, selectors: &[&str]) -> Option<String> {
    for css in selectors {
        let sel = selector(css);
        for element in document.select(&sel) {
            if let Some(content) = element.value().attr("content") {
                let content = content.trim();
                if !content.is_empty() {
                    return Some(content.to_string());
                }
            }
        }
    }
    None
}

/// First image inside any embedded JSON-LD script block: either a string
/// `image` field or the first string element of an `image` array.
fn json_ld_image(document: &Html) -> Option<String> {
    let sel = selector(r#"script[type="application/ld+json"]"#);
    for script in document.select(&sel) {
        let raw = script.text().collect::<String>();
        let Ok(data) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        match data.get("image") {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Array(items)) => {
                if let Some(Value::String(s)) = items.first() {
                    return Some(s.clone());
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract page metadata from a fetched article page.
pub fn page_meta(html: &str, base_url: &str) -> PageMeta {
    let document = Html::parse_document(html);

    let image = pick_meta(
        &document,
        &[
            r#"meta[property="og:image"]"#,
            r#"meta[name="twitter:image"]"#,
            r#"meta[property="og:image:url"]"#,
        ],
    )
    .or_else(|| json_ld_image(&document))
    .map(|u| absolutize(base_url, &u));

    let title = pick_meta(
        &document,
        &[
            r#"meta[property="og:title"]"#,
            r#"meta[name="twitter:title"]"#,
        ],
    )
    .or_else(|| {
        let sel = selector("title");
        document
            .select(&sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let description = pick_meta(
        &document,
        &[
            r#"meta[property="og:description"]"#,
            r#"meta[name="description"]"#,
        ],
    );

    let license_url = {
        let sel = selector(r#"link[rel~="license"]"#);
        document
            .select(&sel)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(|href| absolutize(base_url, href))
    };

    let image_alt = pick_meta(
        &document,
        &[
            r#"meta[property="og:image:alt"]"#,
            r#"meta[name="twitter:image:alt"]"#,
        ],
    );

    trace!(?image, ?title, "Extracted page metadata");
    PageMeta {
        image,
        title,
        description,
        license_url,
        image_alt,
    }
}
