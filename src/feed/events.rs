// SPDX-License-Identifier: MPL-2.0

use crate::model::ItemKey;

/// Change notifications for the rendering layer. Receivers decide when to
/// redraw; nothing is pushed per backend snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The whole feed was replaced
    Refreshed { len: usize },
    /// A like toggle on one item settled, whether or not it succeeded
    ItemUpdated(ItemKey),
    CommentCountReady(ItemKey, u32),
}
