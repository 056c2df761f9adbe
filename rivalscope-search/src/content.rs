//! Landing-page extraction: description, service phrases, links and text.
//!
//! Parses raw HTML once and pulls out the pieces the enrichment stage
//! needs. Boilerplate elements (scripts, styles, navigation, footers) are
//! skipped for the readable text but still scanned for link labels, since
//! contact and quote links usually live there.

use scraper::{ElementRef, Html, Node, Selector};

use crate::types::LandingPage;

/// Default maximum characters of readable text kept per page.
pub const DEFAULT_MAX_CHARS: usize = 20_000;

/// Maximum characters of the extracted description.
const MAX_DESCRIPTION_CHARS: usize = 300;

/// Shortest paragraph accepted as a description fallback.
const MIN_PARAGRAPH_CHARS: usize = 40;

const MAX_SERVICE_PHRASES: usize = 10;
const MAX_LINK_LABELS: usize = 200;

/// Elements whose text never counts as readable page content.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe", "template",
];

/// Heading words that introduce a services-style section.
const SERVICE_HEADING_MARKERS: &[&str] = &[
    "service",
    "what we do",
    "what we offer",
    "our offer",
    "solutions",
    "expertise",
    "capabilities",
    "how we help",
];

/// Extract a [`LandingPage`] summary from raw HTML.
///
/// Never fails: a page with no usable content yields empty fields.
pub fn extract_landing_page(html: &str, url: &str) -> LandingPage {
    extract_landing_page_with_limit(html, url, DEFAULT_MAX_CHARS)
}

/// Same as [`extract_landing_page`] with a custom readable-text limit.
pub fn extract_landing_page_with_limit(html: &str, url: &str, max_chars: usize) -> LandingPage {
    let document = Html::parse_document(html);

    let text = truncate_to_limit(&readable_text(&document), max_chars);
    let word_count = text.split_whitespace().count();

    LandingPage {
        url: url.to_owned(),
        title: first_text(&document, "title"),
        description: description(&document),
        service_phrases: service_phrases(&document),
        text,
        link_labels: link_labels(&document),
        og_type: meta_content(&document, "meta[property=\"og:type\"]")
            .map(|t| t.to_lowercase()),
        word_count,
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_text(document: &Html, css: &str) -> String {
    selector(css)
        .and_then(|sel| document.select(&sel).next().map(element_text))
        .unwrap_or_default()
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|c| !c.is_empty())
}

/// Meta description, then `og:description`, then the first substantial paragraph.
fn description(document: &Html) -> String {
    let found = meta_content(document, "meta[name=\"description\"]")
        .or_else(|| meta_content(document, "meta[property=\"og:description\"]"))
        .or_else(|| {
            let sel = selector("main p, article p, body p")?;
            document
                .select(&sel)
                .filter(|p| !inside_boilerplate(*p))
                .map(element_text)
                .find(|t| t.chars().count() >= MIN_PARAGRAPH_CHARS)
        })
        .unwrap_or_default();
    truncate_to_limit(&found, MAX_DESCRIPTION_CHARS)
}

/// Short phrases listed under a services-style heading.
///
/// For every heading whose text carries a service marker, list items and
/// sub-headings of its enclosing section are collected; when the section
/// holds nothing usable, the heading's following siblings are scanned.
fn service_phrases(document: &Html) -> Vec<String> {
    let (Some(headings), Some(items)) = (selector("h1, h2, h3, h4"), selector("li, h3, h4, h5")) else {
        return Vec::new();
    };

    let mut phrases: Vec<String> = Vec::new();
    let mut push = |phrase: String| {
        if is_short_phrase(&phrase)
            && !phrases.iter().any(|p| p.eq_ignore_ascii_case(&phrase))
            && phrases.len() < MAX_SERVICE_PHRASES
        {
            phrases.push(phrase);
        }
    };

    for heading in document.select(&headings) {
        let heading_text = element_text(heading).to_lowercase();
        if !SERVICE_HEADING_MARKERS.iter().any(|m| heading_text.contains(m)) {
            continue;
        }

        let section_items = section_item_count(heading, &items);
        if let Some(section) = heading.parent().and_then(ElementRef::wrap) {
            for item in section.select(&items) {
                if item.id() != heading.id() {
                    push(element_text(item));
                }
            }
        }
        if section_items == 0 {
            for sibling in heading.next_siblings().filter_map(ElementRef::wrap).take(5) {
                if matches!(sibling.value().name(), "h1" | "h2") {
                    break;
                }
                if sibling.value().name() == "p" {
                    push(element_text(sibling));
                }
                for item in sibling.select(&items) {
                    push(element_text(item));
                }
            }
        }
    }

    phrases
}

/// Number of candidate items in the heading's enclosing section.
fn section_item_count(heading: ElementRef<'_>, items: &Selector) -> usize {
    heading
        .parent()
        .and_then(ElementRef::wrap)
        .map(|section| section.select(items).filter(|i| i.id() != heading.id()).count())
        .unwrap_or(0)
}

fn is_short_phrase(text: &str) -> bool {
    let words = text.split_whitespace().count();
    (1..=8).contains(&words) && text.chars().count() <= 80
}

/// Lower-cased anchor texts, plus `mailto` / `tel` markers for such links.
fn link_labels(document: &Html) -> Vec<String> {
    let Some(sel) = selector("a") else {
        return Vec::new();
    };

    let mut labels: Vec<String> = Vec::new();
    for anchor in document.select(&sel) {
        let href = anchor.value().attr("href").unwrap_or_default().trim();
        let mut found = vec![element_text(anchor).to_lowercase()];
        if href.starts_with("mailto:") {
            found.push("mailto".to_owned());
        } else if href.starts_with("tel:") {
            found.push("tel".to_owned());
        } else if let Some(path) = href_path_label(href) {
            found.push(path);
        }

        for label in found {
            if !label.is_empty() && !labels.contains(&label) {
                labels.push(label);
            }
        }
        if labels.len() >= MAX_LINK_LABELS {
            break;
        }
    }
    labels
}

/// Last path segment of a link, e.g. `/en/contact-us/` becomes `contact us`.
fn href_path_label(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next()?.trim_end_matches('/');
    let segment = path.rsplit('/').next()?;
    if segment.is_empty() || segment.contains('.') || segment.contains(':') {
        return None;
    }
    Some(segment.replace(['-', '_'], " ").to_lowercase())
}

fn inside_boilerplate(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| BOILERPLATE_TAGS.contains(&a.value().name()))
}

/// Text of `<body>` (or the whole document) without boilerplate elements.
fn readable_text(document: &Html) -> String {
    let root = selector("body")
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut out = String::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| BOILERPLATE_TAGS.contains(&a.value().name()));
        if !skipped {
            out.push_str(text);
            out.push(' ');
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate text to the given character limit, breaking at a char boundary.
fn truncate_to_limit(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end().to_owned(),
        None => text.to_owned(),
    }
}
