// SPDX-License-Identifier: MPL-2.0

//! Lazily computed comment counts.
//!
//! A computed count replaces the counter stored on the record for the rest
//! of the session. Concurrent requests for one key share a single query:
//! the first caller runs it and later callers wait on a watch channel.

use crate::backend::CommentCounter;
use crate::model::ItemKey;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// What the renderer should show for an item's comment count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentCount {
    /// Computed from the comment records this session
    Fresh(u32),
    /// The record's own counter, possibly stale
    Stored(u32),
    Loading,
}

impl CommentCount {
    pub fn value(self) -> Option<u32> {
        match self {
            CommentCount::Fresh(n) | CommentCount::Stored(n) => Some(n),
            CommentCount::Loading => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Settled {
    Fresh(u32),
    Failed,
}

enum Slot {
    Pending(watch::Receiver<Option<Settled>>),
    Ready(u32),
}

enum Role {
    Lead(watch::Sender<Option<Settled>>),
    Wait(watch::Receiver<Option<Settled>>),
}

/// Result of [`CommentCounts::ensure`]
pub(crate) struct Outcome {
    pub count: CommentCount,
    /// This call ran the backend query itself
    pub queried: bool,
}

#[derive(Default)]
pub(crate) struct CommentCounts {
    slots: Mutex<HashMap<ItemKey, Slot>>,
}

impl CommentCounts {
    pub fn peek(&self, key: &ItemKey, stored: u32) -> CommentCount {
        match self.slots.lock().unwrap().get(key) {
            Some(Slot::Ready(n)) => CommentCount::Fresh(*n),
            Some(Slot::Pending(_)) => CommentCount::Loading,
            None => CommentCount::Stored(stored),
        }
    }

    pub fn is_loading(&self, key: &ItemKey) -> bool {
        matches!(
            self.slots.lock().unwrap().get(key),
            Some(Slot::Pending(_))
        )
    }

    /// Drop computed counts so the next demand re-queries. Queries still
    /// in flight are kept and will land normally.
    pub fn forget_ready(&self) {
        self.slots
            .lock()
            .unwrap()
            .retain(|_, slot| matches!(slot, Slot::Pending(_)));
    }

    /// Return the computed count for `key`, querying the backend if needed.
    /// Failures fall back to `stored` and are not cached.
    pub async fn ensure(
        &self,
        key: &ItemKey,
        stored: u32,
        counter: &dyn CommentCounter,
        timeout: Duration,
    ) -> Outcome {
        let role = {
            let mut slots = self.slots.lock().unwrap();
            match slots.get(key) {
                Some(Slot::Ready(n)) => {
                    return Outcome {
                        count: CommentCount::Fresh(*n),
                        queried: false,
                    };
                }
                Some(Slot::Pending(rx)) => Role::Wait(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    slots.insert(key.clone(), Slot::Pending(rx));
                    Role::Lead(tx)
                }
            }
        };

        match role {
            Role::Wait(mut rx) => {
                let settled = match rx.wait_for(Option::is_some).await {
                    Ok(value) => *value,
                    // Leader was dropped before finishing
                    Err(_) => None,
                };
                let count = match settled {
                    Some(Settled::Fresh(n)) => CommentCount::Fresh(n),
                    _ => CommentCount::Stored(stored),
                };
                Outcome {
                    count,
                    queried: false,
                }
            }
            Role::Lead(tx) => {
                let mut pending = PendingSlot {
                    counts: self,
                    key,
                    armed: true,
                };
                let result = tokio::time::timeout(timeout, counter.count_comments(key)).await;
                pending.armed = false;

                let (count, settled) = {
                    let mut slots = self.slots.lock().unwrap();
                    match result {
                        Ok(Ok(n)) => {
                            slots.insert(key.clone(), Slot::Ready(n));
                            (CommentCount::Fresh(n), Settled::Fresh(n))
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(%key, error = %e, "comment count query failed");
                            slots.remove(key);
                            (CommentCount::Stored(stored), Settled::Failed)
                        }
                        Err(_) => {
                            tracing::warn!(%key, "comment count query timed out");
                            slots.remove(key);
                            (CommentCount::Stored(stored), Settled::Failed)
                        }
                    }
                };
                tx.send_replace(Some(settled));

                Outcome {
                    count,
                    queried: true,
                }
            }
        }
    }
}

/// Removes a pending slot if the leading query is cancelled mid-flight.
struct PendingSlot<'a> {
    counts: &'a CommentCounts,
    key: &'a ItemKey,
    armed: bool,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self.counts.slots.lock().unwrap();
        if matches!(slots.get(self.key), Some(Slot::Pending(_))) {
            slots.remove(self.key);
        }
    }
}
