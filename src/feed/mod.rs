// SPDX-License-Identifier: MPL-2.0

mod aggregator;
mod comments;
mod events;
mod fetch;
mod likes;
mod playback;

#[cfg(test)]
mod testing;

pub use aggregator::{FeedAggregator, FeedOptions, ItemState, RefreshOutcome};
pub use comments::CommentCount;
pub use events::FeedEvent;
pub use fetch::{FetchReport, fetch_all_sources, merge_sorted};

use crate::backend::BackendError;
use crate::model::{ItemKey, ParseKeyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("sign in to do that")]
    Unauthenticated,
    #[error("a like for {0} is already in progress")]
    InFlight(ItemKey),
    #[error("unsupported item type: {0}")]
    UnsupportedType(String),
    #[error("item {0} is not in the feed")]
    UnknownItem(ItemKey),
    #[error("malformed item key: {0}")]
    MalformedKey(String),
    #[error("the server did not answer in time")]
    TimedOut,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<ParseKeyError> for FeedError {
    fn from(err: ParseKeyError) -> Self {
        match err {
            ParseKeyError::UnknownSource(source) => FeedError::UnsupportedType(source),
            ParseKeyError::Malformed(raw) => FeedError::MalformedKey(raw),
        }
    }
}
