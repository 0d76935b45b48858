//! Flattening the region → province → municipality tree into municipality codes.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::types::{DirectoryNode, MunicipalityCode};
use super::DirectorySource;
use crate::TARGET_WEB_REQUEST;

static MUNICIPALITY_PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/comune\.asp($|\?)").expect("municipality page pattern"));

static MUNICIPALITY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"cod=(\d+)(&|$)").expect("municipality code pattern"));

/// Classifies a directory link.
///
/// Links to a municipality page become [`DirectoryNode::Municipality`] and
/// everything else is a page to descend into. A municipality link without a
/// numeric code gives `None`.
pub fn classify(link: &str) -> Option<DirectoryNode> {
    if !MUNICIPALITY_PAGE.is_match(link) {
        return Some(DirectoryNode::Intermediate(link.to_string()));
    }
    MUNICIPALITY_CODE
        .captures(link)
        .map(|captures| DirectoryNode::Municipality(MunicipalityCode::new(&captures[1])))
}

/// Work items of the depth-first walk.
enum Step {
    Visit(DirectoryNode),
    /// All children of this page have been walked.
    Leave(String),
}

/// Walks the directory from `root_url` and returns every municipality code,
/// depth-first in page order.
///
/// Codes are not deduplicated: a municipality or a whole province page
/// reachable through two paths is walked and listed twice. Only a link back to
/// a page on the current path is skipped, which keeps a link cycle from
/// looping forever. Any page failure aborts the walk.
pub async fn enumerate_municipalities<S: DirectorySource>(
    source: &S,
    root_url: &str,
) -> Result<Vec<MunicipalityCode>> {
    let mut codes = Vec::new();
    let mut on_path = HashSet::new();
    let mut pending = vec![Step::Visit(DirectoryNode::Intermediate(root_url.to_string()))];

    while let Some(step) = pending.pop() {
        match step {
            Step::Leave(url) => {
                on_path.remove(&url);
            }
            Step::Visit(DirectoryNode::Municipality(code)) => codes.push(code),
            Step::Visit(DirectoryNode::Intermediate(url)) => {
                if on_path.contains(&url) {
                    warn!(target: TARGET_WEB_REQUEST, "Link cycle back to {}, skipping", url);
                    continue;
                }

                let links = source.node_links(&url).await?;
                debug!(target: TARGET_WEB_REQUEST, "{} links on {}", links.len(), url);

                let children: Vec<DirectoryNode> = links
                    .iter()
                    .filter_map(|link| {
                        let node = classify(&link.link);
                        if node.is_none() {
                            debug!(target: TARGET_WEB_REQUEST, "No code in municipality link {}", link.link);
                        }
                        node
                    })
                    .collect();

                on_path.insert(url.clone());
                pending.push(Step::Leave(url));
                // Reversed so the first link is popped first.
                pending.extend(children.into_iter().rev().map(Step::Visit));
            }
        }
    }

    info!(target: TARGET_WEB_REQUEST, "Found {} municipalities under {}", codes.len(), root_url);
    Ok(codes)
}
