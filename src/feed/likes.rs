// SPDX-License-Identifier: MPL-2.0

use crate::model::{ContentItem, ItemKey};
use std::collections::HashSet;
use std::sync::Mutex;

/// The viewer's liked keys plus the per-key "toggle in progress" markers.
#[derive(Default)]
pub(crate) struct LikeState {
    liked: Mutex<LikedSet>,
    in_flight: Mutex<HashSet<ItemKey>>,
}

/// Liked keys and the viewer they were derived for
#[derive(Default)]
struct LikedSet {
    viewer: Option<String>,
    keys: HashSet<ItemKey>,
}

impl LikeState {
    /// Rebuild the liked set from each item's membership list.
    /// In-progress markers are left alone.
    pub fn rebuild(&self, items: &[ContentItem], viewer_id: Option<&str>) {
        let keys = match viewer_id {
            Some(id) => items
                .iter()
                .filter(|item| item.is_liked_by(id))
                .map(ContentItem::key)
                .collect(),
            None => HashSet::new(),
        };
        *self.liked.lock().unwrap() = LikedSet {
            viewer: viewer_id.map(str::to_string),
            keys,
        };
    }

    /// Whether the liked set was derived for `viewer_id`
    pub fn is_for(&self, viewer_id: Option<&str>) -> bool {
        self.liked.lock().unwrap().viewer.as_deref() == viewer_id
    }

    pub fn is_liked(&self, key: &ItemKey) -> bool {
        self.liked.lock().unwrap().keys.contains(key)
    }

    /// Record a confirmed toggle made on behalf of `viewer_id`. Ignored if
    /// the set now belongs to someone else.
    pub fn set_liked(&self, key: &ItemKey, viewer_id: &str, liked: bool) {
        let mut set = self.liked.lock().unwrap();
        if set.viewer.as_deref() != Some(viewer_id) {
            return;
        }
        if liked {
            set.keys.insert(key.clone());
        } else {
            set.keys.remove(key);
        }
    }

    pub fn is_toggling(&self, key: &ItemKey) -> bool {
        self.in_flight.lock().unwrap().contains(key)
    }

    /// Mark a toggle for `key` as started. Returns `None` when one is
    /// already running. The marker is cleared when the guard drops.
    pub fn begin(&self, key: &ItemKey) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            state: self,
            key: key.clone(),
        })
    }
}

pub(crate) struct InFlightGuard<'a> {
    state: &'a LikeState,
    key: ItemKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.lock().unwrap().remove(&self.key);
    }
}
