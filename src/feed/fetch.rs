// SPDX-License-Identifier: MPL-2.0

use crate::backend::ContentSource;
use crate::model::{ContentItem, SourceType, normalize};
use futures::future::join_all;

/// Normalized batches from one round of fetches
#[derive(Debug, Default)]
pub struct FetchReport {
    /// One batch per source in [`SourceType::ALL`] order. Failed sources
    /// contribute an empty batch.
    pub batches: Vec<Vec<ContentItem>>,
    pub failed: Vec<SourceType>,
}

impl FetchReport {
    /// No source answered, so the batches say nothing about the real feed
    pub fn all_failed(&self) -> bool {
        self.failed.len() == SourceType::ALL.len()
    }
}

/// Fetch and normalize every source concurrently.
///
/// Batches come back in [`SourceType::ALL`] order regardless of which fetch
/// finished first. A failing source is logged and contributes nothing.
pub async fn fetch_all_sources(source: &dyn ContentSource) -> FetchReport {
    let fetches = SourceType::ALL.into_iter().map(|kind| async move {
        match source.fetch_all(kind).await {
            Ok(docs) => (kind, Some(normalize(kind, docs))),
            Err(e) => {
                tracing::warn!(source = %kind, error = %e, "source fetch failed, skipping");
                (kind, None)
            }
        }
    });

    let mut report = FetchReport::default();
    for (kind, batch) in join_all(fetches).await {
        match batch {
            Some(items) => report.batches.push(items),
            None => {
                report.failed.push(kind);
                report.batches.push(Vec::new());
            }
        }
    }
    report
}

/// Concatenate batches newest first. The sort is stable, so equal
/// timestamps keep batch order.
pub fn merge_sorted(batches: Vec<Vec<ContentItem>>) -> Vec<ContentItem> {
    let mut feed: Vec<ContentItem> = batches.into_iter().flatten().collect();
    feed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    feed
}
