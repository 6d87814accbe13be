// SPDX-License-Identifier: MPL-2.0

use crate::model::{ContentItem, ItemKey};
use std::collections::HashMap;
use std::sync::Mutex;

/// Which video source each item is currently playing, as an index into
/// `[url, alternates...]`. Absent means the primary URL.
#[derive(Default)]
pub(crate) struct Playback {
    attempts: Mutex<HashMap<ItemKey, usize>>,
}

impl Playback {
    pub fn active_url(&self, item: &ContentItem) -> Option<String> {
        let sources = item.media.as_ref()?.video_sources();
        let index = self
            .attempts
            .lock()
            .unwrap()
            .get(&item.key())
            .copied()
            .unwrap_or(0);
        sources.get(index).map(|s| s.to_string())
    }

    /// Record that the active source failed and move to the next one.
    /// Returns `None` once every source has been tried.
    pub fn advance(&self, item: &ContentItem) -> Option<String> {
        let sources = item.media.as_ref()?.video_sources();
        let mut attempts = self.attempts.lock().unwrap();
        let index = attempts.entry(item.key()).or_insert(0);
        if *index < sources.len() {
            *index += 1;
        }
        sources.get(*index).map(|s| s.to_string())
    }

    pub fn clear(&self) {
        self.attempts.lock().unwrap().clear();
    }
}
