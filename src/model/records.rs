// SPDX-License-Identifier: MPL-2.0

//! Per-collection record shapes and their mapping onto [`ContentItem`].
//!
//! Every collection stores its documents a little differently. Each one gets
//! its own strict record type, and each field of the common shape is picked
//! from an explicit, ordered list of candidate fields. Documents that fail to
//! deserialize, or that lack the media their type needs, are dropped here.

use crate::model::{ANONYMOUS_AUTHOR, ContentItem, Media, RawTimestamp, SourceType};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;

/// Fields every collection shares, under all the names they appear with.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Common {
    id: Option<String>,
    title: Option<String>,
    content: Option<String>,
    description: Option<String>,
    author: Option<String>,
    author_name: Option<String>,
    uploaded_by: Option<String>,
    author_id: Option<String>,
    user_id: Option<String>,
    uploader_id: Option<String>,
    created_at: Option<RawTimestamp>,
    likes: Option<i64>,
    like_count: Option<i64>,
    liked_by: Option<Vec<String>>,
    comment_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardRecord {
    #[serde(flatten)]
    common: Common,
    images: Option<Vec<String>>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GalleryRecord {
    #[serde(flatten)]
    common: Common,
    file_url: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoRecord {
    #[serde(flatten)]
    common: Common,
    video_url: Option<String>,
    url: Option<String>,
    alternate_urls: Option<Vec<String>>,
    fallback_urls: Option<Vec<String>>,
    thumbnail_url: Option<String>,
}

/// Cooking and health posts share one shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticleRecord {
    #[serde(flatten)]
    common: Common,
    images: Option<Vec<String>>,
    image_url: Option<String>,
    file_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketplaceRecord {
    #[serde(flatten)]
    common: Common,
    images: Option<Vec<String>>,
    image_url: Option<String>,
    file_url: Option<String>,
    thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhilosophyRecord {
    #[serde(flatten)]
    common: Common,
    image_url: Option<String>,
}

enum SourceRecord {
    Board(BoardRecord),
    Gallery(GalleryRecord),
    Video(VideoRecord),
    Cooking(ArticleRecord),
    Health(ArticleRecord),
    Marketplace(MarketplaceRecord),
    Philosophy(PhilosophyRecord),
}

impl SourceRecord {
    fn parse(source: SourceType, doc: Value) -> Result<Self, serde_json::Error> {
        Ok(match source {
            SourceType::Board => SourceRecord::Board(from_doc(doc)?),
            SourceType::Gallery => SourceRecord::Gallery(from_doc(doc)?),
            SourceType::Video => SourceRecord::Video(from_doc(doc)?),
            SourceType::Cooking => SourceRecord::Cooking(from_doc(doc)?),
            SourceType::Health => SourceRecord::Health(from_doc(doc)?),
            SourceType::Marketplace => SourceRecord::Marketplace(from_doc(doc)?),
            SourceType::Philosophy => SourceRecord::Philosophy(from_doc(doc)?),
        })
    }

    fn into_parts(self) -> (SourceType, Common, Option<Media>) {
        match self {
            SourceRecord::Board(r) => {
                let media = image(first_present([first(&r.images), r.image_url.as_deref()]));
                (SourceType::Board, r.common, media)
            }
            SourceRecord::Gallery(r) => {
                let media = image(first_present([r.file_url.as_deref(), r.image_url.as_deref()]));
                (SourceType::Gallery, r.common, media)
            }
            SourceRecord::Video(r) => {
                let media = first_present([r.video_url.as_deref(), r.url.as_deref()]).map(|url| {
                    let alternates = r
                        .alternate_urls
                        .or(r.fallback_urls)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|u| u.trim().to_string())
                        .filter(|u| !u.is_empty() && *u != url)
                        .collect();
                    Media::Video {
                        url,
                        alternates,
                        thumbnail: first_present([r.thumbnail_url.as_deref()]),
                    }
                });
                (SourceType::Video, r.common, media)
            }
            SourceRecord::Cooking(r) => {
                let media = article_image(&r);
                (SourceType::Cooking, r.common, media)
            }
            SourceRecord::Health(r) => {
                let media = article_image(&r);
                (SourceType::Health, r.common, media)
            }
            SourceRecord::Marketplace(r) => {
                let media = image(first_present([
                    first(&r.images),
                    r.image_url.as_deref(),
                    r.file_url.as_deref(),
                    r.thumbnail_url.as_deref(),
                ]));
                (SourceType::Marketplace, r.common, media)
            }
            SourceRecord::Philosophy(r) => {
                let media = image(first_present([r.image_url.as_deref()]));
                (SourceType::Philosophy, r.common, media)
            }
        }
    }

    fn into_item(self) -> Option<ContentItem> {
        let (source_type, common, media) = self.into_parts();
        let id = first_present([common.id.as_deref()])?;

        let item = ContentItem {
            id,
            source_type,
            title: first_present([common.title.as_deref()]).unwrap_or_default(),
            description: first_present([common.content.as_deref(), common.description.as_deref()]),
            author: first_present([
                common.author.as_deref(),
                common.author_name.as_deref(),
                common.uploaded_by.as_deref(),
            ])
            .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
            author_id: first_present([
                common.author_id.as_deref(),
                common.user_id.as_deref(),
                common.uploader_id.as_deref(),
            ]),
            created_at: RawTimestamp::normalize(common.created_at.as_ref()),
            media,
            like_count: clamp_count(common.likes.or(common.like_count)),
            liked_by: common
                .liked_by
                .unwrap_or_default()
                .into_iter()
                .filter(|u| !u.is_empty())
                .collect::<BTreeSet<_>>(),
            comment_count: clamp_count(common.comment_count),
        };

        item.has_required_media().then_some(item)
    }
}

fn from_doc<T: DeserializeOwned>(doc: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(doc)
}

fn first(values: &Option<Vec<String>>) -> Option<&str> {
    values.as_ref()?.first().map(String::as_str)
}

/// First candidate that is present and non-blank, in priority order.
fn first_present<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn image(url: Option<String>) -> Option<Media> {
    url.map(|url| Media::Image { url })
}

fn article_image(r: &ArticleRecord) -> Option<Media> {
    image(first_present([
        first(&r.images),
        r.image_url.as_deref(),
        r.file_url.as_deref(),
    ]))
}

fn clamp_count(raw: Option<i64>) -> u32 {
    raw.unwrap_or(0).clamp(0, u32::MAX as i64) as u32
}

/// Map raw documents of one collection onto feed items, dropping any that
/// cannot be shown.
pub fn normalize(source: SourceType, docs: Vec<Value>) -> Vec<ContentItem> {
    let total = docs.len();
    let items: Vec<ContentItem> = docs
        .into_iter()
        .filter_map(|doc| match SourceRecord::parse(source, doc) {
            Ok(record) => record.into_item(),
            Err(e) => {
                tracing::debug!(%source, error = %e, "dropping unreadable record");
                None
            }
        })
        .collect();

    if items.len() < total {
        tracing::debug!(
            %source,
            kept = items.len(),
            dropped = total - items.len(),
            "normalized source"
        );
    }
    items
}
