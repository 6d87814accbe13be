// SPDX-License-Identifier: MPL-2.0

mod item;
mod records;
mod timestamp;

pub use item::{ANONYMOUS_AUTHOR, ContentItem, ItemKey, Media, ParseKeyError, SourceType};
pub use records::normalize;
pub use timestamp::RawTimestamp;
