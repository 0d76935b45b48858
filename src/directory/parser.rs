//! Markup extraction for directory and municipality pages.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use url::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::types::{DirectoryLink, RawEntry};
use crate::TARGET_WEB_REQUEST;

// Selector strings are constants, parse() cannot fail on them.
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".sf0:not(.c) > .mnu").unwrap());

static ENTRY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse(".bb:not(.c)").unwrap());

static SHIFT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse(".bb.c.ch").unwrap());

/// Collects the navigation links of a region or province page, resolved
/// against the page's own URL.
pub fn parse_directory_links(html: &str, page_url: &Url) -> Vec<DirectoryLink> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        match page_url.join(href) {
            Ok(link) => links.push(DirectoryLink {
                link: link.to_string(),
                name: stripped_strings(element).join(" "),
            }),
            Err(err) => {
                debug!(target: TARGET_WEB_REQUEST, "Skipping bad link {:?} on {}: {}", href, page_url, err)
            }
        }
    }

    links
}

/// Extracts the pharmacies listed on a municipality page.
///
/// Entry blocks and shift cells are paired by position, so a page where their
/// counts differ cannot be read reliably and is rejected.
pub fn parse_roster(html: &str) -> Result<Vec<RawEntry>> {
    let document = Html::parse_document(html);
    let blocks: Vec<ElementRef> = document.select(&ENTRY_SELECTOR).collect();
    let shifts: Vec<ElementRef> = document.select(&SHIFT_SELECTOR).collect();

    if blocks.len() != shifts.len() {
        return Err(anyhow!(
            "Found {} pharmacies but {} shift cells",
            blocks.len(),
            shifts.len()
        ));
    }

    blocks
        .into_iter()
        .zip(shifts)
        .enumerate()
        .map(|(i, (block, shift))| {
            let name = block
                .children()
                .filter_map(ElementRef::wrap)
                .find(|child| child.value().name() == "b")
                .map(|b| stripped_strings(b).join(" "))
                .filter(|name| !name.is_empty())
                .ok_or_else(|| anyhow!("Pharmacy block {} has no name", i))?;

            Ok(RawEntry {
                name,
                address_lines: stripped_strings_outside(block, "b"),
                shift_lines: stripped_strings(shift),
            })
        })
        .collect()
}

/// Trimmed, non-empty text nodes below `element`.
fn stripped_strings(element: ElementRef) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Like [`stripped_strings`], skipping text inside `tag` descendants.
fn stripped_strings_outside(element: ElementRef, tag: &str) -> Vec<String> {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .ancestors()
                .take_while(|ancestor| ancestor.id() != element.id())
                .any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .map_or(false, |e| e.name() == tag)
                });
            if hidden {
                return None;
            }
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .collect()
}
