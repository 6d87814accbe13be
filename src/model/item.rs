// SPDX-License-Identifier: MPL-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

/// Display name used when a record carries no author.
pub const ANONYMOUS_AUTHOR: &str = "익명";

/// The collection a feed item was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Board,
    Gallery,
    Video,
    Cooking,
    Health,
    Marketplace,
    Philosophy,
}

impl SourceType {
    /// Enumeration order, which is also the tie-break order of the merged feed.
    pub const ALL: [SourceType; 7] = [
        SourceType::Board,
        SourceType::Gallery,
        SourceType::Video,
        SourceType::Cooking,
        SourceType::Health,
        SourceType::Marketplace,
        SourceType::Philosophy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Board => "board",
            SourceType::Gallery => "gallery",
            SourceType::Video => "video",
            SourceType::Cooking => "cooking",
            SourceType::Health => "health",
            SourceType::Marketplace => "marketplace",
            SourceType::Philosophy => "philosophy",
        }
    }

    /// Backend collection holding records of this type
    pub fn collection(self) -> &'static str {
        match self {
            SourceType::Board => "posts",
            SourceType::Gallery => "gallery",
            SourceType::Video => "videos",
            SourceType::Cooking => "cooking",
            SourceType::Health => "health",
            SourceType::Marketplace => "marketplace",
            SourceType::Philosophy => "philosophy",
        }
    }

    fn route_segment(self) -> &'static str {
        match self {
            SourceType::Video => "videos",
            other => other.as_str(),
        }
    }

    /// Items of these types are only shown when they carry an image.
    pub fn requires_image(self) -> bool {
        matches!(
            self,
            SourceType::Gallery | SourceType::Cooking | SourceType::Health | SourceType::Marketplace
        )
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseKeyError {
    #[error("unknown source type: {0}")]
    UnknownSource(String),
    #[error("malformed item key: {0}")]
    Malformed(String),
}

impl FromStr for SourceType {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseKeyError::UnknownSource(s.to_string()))
    }
}

/// Identifies an item across collections. Ids are only unique within
/// their own collection, so the source type is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub source: SourceType,
    pub id: String,
}

impl ItemKey {
    pub fn new(source: SourceType, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

impl FromStr for ItemKey {
    type Err = ParseKeyError;

    /// Parses the `"<source>:<id>"` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, id) = s
            .split_once(':')
            .ok_or_else(|| ParseKeyError::Malformed(s.to_string()))?;
        if id.is_empty() {
            return Err(ParseKeyError::Malformed(s.to_string()));
        }
        Ok(ItemKey::new(source.parse()?, id))
    }
}

/// Renderable media attached to an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Media {
    Image {
        url: String,
    },
    Video {
        url: String,
        /// Tried in order when the primary URL fails to play
        alternates: Vec<String>,
        thumbnail: Option<String>,
    },
}

impl Media {
    /// Playback candidates, primary first. Empty for images.
    pub fn video_sources(&self) -> Vec<&str> {
        match self {
            Media::Image { .. } => Vec::new(),
            Media::Video {
                url, alternates, ..
            } => std::iter::once(url.as_str())
                .chain(alternates.iter().map(String::as_str))
                .collect(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Media::Image { .. })
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Media::Video { .. })
    }
}

/// A normalized feed entry from any of the seven collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub source_type: SourceType,
    pub title: String,
    pub description: Option<String>,
    pub author: String,
    pub author_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub media: Option<Media>,
    pub like_count: u32,
    pub liked_by: BTreeSet<String>,
    /// Counter stored on the record; may lag behind the real number of comments.
    pub comment_count: u32,
}

impl ContentItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.source_type, self.id.clone())
    }

    pub fn has_key(&self, key: &ItemKey) -> bool {
        self.source_type == key.source && self.id == key.id
    }

    /// Detail page path for this item
    pub fn route(&self) -> String {
        format!("/{}/{}", self.source_type.route_segment(), self.id)
    }

    /// Whether the item carries the media its source type needs to be shown.
    pub fn has_required_media(&self) -> bool {
        match self.source_type {
            SourceType::Video => self.media.as_ref().is_some_and(Media::is_video),
            t if t.requires_image() => self.media.as_ref().is_some_and(Media::is_image),
            _ => true,
        }
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.liked_by.contains(user_id)
    }

    /// Copy of this item with the viewer's like set to `liked`.
    /// The count moves by one only when membership actually changes.
    pub fn with_viewer_like(&self, user_id: &str, liked: bool) -> ContentItem {
        let mut next = self.clone();
        if liked {
            if next.liked_by.insert(user_id.to_string()) {
                next.like_count = next.like_count.saturating_add(1);
            }
        } else if next.liked_by.remove(user_id) {
            next.like_count = next.like_count.saturating_sub(1);
        }
        next
    }

    /// Description shortened to at most `max` graphemes, with an ellipsis when cut.
    pub fn excerpt(&self, max: usize) -> Option<String> {
        let text = self.description.as_deref()?.trim();
        if text.is_empty() {
            return None;
        }
        let mut graphemes = text.graphemes(true);
        let head: String = graphemes.by_ref().take(max).collect();
        if graphemes.next().is_some() {
            Some(format!("{}…", head.trim_end()))
        } else {
            Some(head)
        }
    }
}
