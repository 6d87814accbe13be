// SPDX-License-Identifier: MPL-2.0

use crate::backend::Collaborators;
use crate::config::{
    DEFAULT_COUNT_TIMEOUT_SECS, DEFAULT_EAGER_COMMENT_PREFIX, DEFAULT_MUTATION_TIMEOUT_SECS,
};
use crate::feed::comments::{CommentCount, CommentCounts};
use crate::feed::likes::LikeState;
use crate::feed::playback::Playback;
use crate::feed::{FeedError, FeedEvent, fetch_all_sources, merge_sorted};
use crate::backend::Viewer;
use crate::model::{ContentItem, ItemKey, SourceType};
use crate::state::AppSettings;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Items at the top of the feed whose comment counts are computed on refresh
    pub eager_comment_prefix: usize,
    pub mutation_timeout: Duration,
    pub count_timeout: Duration,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            eager_comment_prefix: DEFAULT_EAGER_COMMENT_PREFIX,
            mutation_timeout: Duration::from_secs(DEFAULT_MUTATION_TIMEOUT_SECS),
            count_timeout: Duration::from_secs(DEFAULT_COUNT_TIMEOUT_SECS),
        }
    }
}

impl From<&AppSettings> for FeedOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            eager_comment_prefix: settings.eager_comment_prefix,
            mutation_timeout: Duration::from_secs(settings.mutation_timeout_secs.max(1)),
            ..Self::default()
        }
    }
}

/// What a call to [`FeedAggregator::refresh`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Items in the feed afterwards
    pub items: usize,
    pub failed: Vec<SourceType>,
    /// False when no source answered and the previous feed was kept
    pub replaced: bool,
}

/// Per-item interaction state. Like toggling and comment loading are
/// independent of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemState {
    pub liked: bool,
    pub like_toggling: bool,
    pub comment_count: CommentCount,
}

/// Merges the seven content collections into one feed and tracks the
/// viewer's interactions with it. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct FeedAggregator {
    inner: Arc<Inner>,
}

struct Inner {
    collaborators: Collaborators,
    options: FeedOptions,
    feed: RwLock<Arc<Vec<ContentItem>>>,
    likes: LikeState,
    comments: CommentCounts,
    playback: Playback,
    events: broadcast::Sender<FeedEvent>,
}

impl FeedAggregator {
    pub fn new(collaborators: Collaborators, options: FeedOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                collaborators,
                options,
                feed: RwLock::new(Arc::new(Vec::new())),
                likes: LikeState::default(),
                comments: CommentCounts::default(),
                playback: Playback::default(),
                events,
            }),
        }
    }

    /// Current feed, newest first
    pub fn feed(&self) -> Arc<Vec<ContentItem>> {
        self.inner.feed.read().unwrap().clone()
    }

    pub fn item(&self, key: &ItemKey) -> Option<ContentItem> {
        self.inner
            .feed
            .read()
            .unwrap()
            .iter()
            .find(|item| item.has_key(key))
            .cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: FeedEvent) {
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }

    /// Fetch every source and replace the feed wholesale. Source failures
    /// are logged and never escape. When every source fails the current
    /// feed is kept. Comment counts for the top of a new feed are
    /// backfilled on a background task.
    pub async fn refresh(&self) -> RefreshOutcome {
        let report = fetch_all_sources(self.inner.collaborators.source.as_ref()).await;
        if report.all_failed() {
            let items = self.feed().len();
            tracing::warn!(items, "no source answered, keeping the current feed");
            return RefreshOutcome {
                items,
                failed: report.failed,
                replaced: false,
            };
        }

        let feed = merge_sorted(report.batches);
        let items = feed.len();
        tracing::info!(items, failed = report.failed.len(), "feed refreshed");

        self.install(feed);
        self.spawn_backfill();
        RefreshOutcome {
            items,
            failed: report.failed,
            replaced: true,
        }
    }

    /// Show a previously stored feed without touching the backend.
    pub fn seed_from_snapshot(&self, items: Vec<ContentItem>) {
        let feed = merge_sorted(vec![items]);
        tracing::debug!(items = feed.len(), "feed seeded from snapshot");
        self.install(feed);
    }

    fn install(&self, feed: Vec<ContentItem>) {
        let viewer = self.inner.collaborators.viewer.current_viewer();
        self.inner
            .likes
            .rebuild(&feed, viewer.as_ref().map(|v| v.id.as_str()));
        self.inner.comments.forget_ready();
        self.inner.playback.clear();

        let len = feed.len();
        *self.inner.feed.write().unwrap() = Arc::new(feed);
        self.emit(FeedEvent::Refreshed { len });
    }

    fn spawn_backfill(&self) {
        if self.inner.options.eager_comment_prefix == 0 {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move { this.backfill_prefix().await });
    }

    /// Compute comment counts for the first `eager_comment_prefix` items.
    pub async fn backfill_prefix(&self) {
        let prefix: Vec<ItemKey> = self
            .feed()
            .iter()
            .take(self.inner.options.eager_comment_prefix)
            .map(ContentItem::key)
            .collect();

        futures::future::join_all(prefix.iter().map(|key| self.ensure_comment_count(key))).await;
    }

    pub fn is_liked(&self, key: &ItemKey) -> bool {
        self.current_viewer();
        self.inner.likes.is_liked(key)
    }

    /// The signed-in viewer. Re-derives the liked set first if the viewer
    /// changed since it was built.
    fn current_viewer(&self) -> Option<Viewer> {
        let viewer = self.inner.collaborators.viewer.current_viewer();
        let viewer_id = viewer.as_ref().map(|v| v.id.as_str());
        if !self.inner.likes.is_for(viewer_id) {
            tracing::debug!(
                viewer = viewer_id.unwrap_or("anonymous"),
                "viewer changed, rebuilding likes"
            );
            self.inner.likes.rebuild(&self.feed(), viewer_id);
        }
        viewer
    }

    /// Flip the viewer's like on `key` and return the new state.
    ///
    /// Local state only changes after the backend confirms, so a failure
    /// leaves everything as it was.
    pub async fn toggle_like(&self, key: &ItemKey) -> Result<bool, FeedError> {
        let viewer = self.current_viewer().ok_or(FeedError::Unauthenticated)?;

        let toggle = self
            .inner
            .collaborators
            .likes
            .get(key.source)
            .ok_or_else(|| FeedError::UnsupportedType(key.source.to_string()))?;

        if self.item(key).is_none() {
            return Err(FeedError::UnknownItem(key.clone()));
        }

        let outcome = {
            let Some(_in_flight) = self.inner.likes.begin(key) else {
                tracing::debug!(%key, "like already in progress, ignoring");
                return Err(FeedError::InFlight(key.clone()));
            };

            let call = toggle.toggle_like(key.source, &key.id, &viewer.id);
            match tokio::time::timeout(self.inner.options.mutation_timeout, call).await {
                Ok(Ok(liked)) => {
                    self.inner.likes.set_liked(key, &viewer.id, liked);
                    let updated =
                        self.replace_item(key, |item| item.with_viewer_like(&viewer.id, liked));
                    if !updated {
                        tracing::debug!(%key, "liked item left the feed mid-toggle");
                    }
                    Ok(liked)
                }
                Ok(Err(e)) => {
                    tracing::warn!(%key, error = %e, "like toggle failed");
                    Err(FeedError::Backend(e))
                }
                Err(_) => {
                    tracing::warn!(%key, "like toggle timed out");
                    Err(FeedError::TimedOut)
                }
            }
        };

        // Marker is released by now, so subscribers read settled state
        self.emit(FeedEvent::ItemUpdated(key.clone()));
        outcome
    }

    /// [`FeedAggregator::toggle_like`] for keys in their `"<source>:<id>"` form
    pub async fn toggle_like_str(&self, raw_key: &str) -> Result<bool, FeedError> {
        if self.current_viewer().is_none() {
            return Err(FeedError::Unauthenticated);
        }
        let key: ItemKey = raw_key.parse()?;
        self.toggle_like(&key).await
    }

    /// Swap the item under `key` for `f(item)`. Located by key so a refresh
    /// that reorders the feed in the meantime cannot misdirect the update.
    fn replace_item(&self, key: &ItemKey, f: impl FnOnce(&ContentItem) -> ContentItem) -> bool {
        let mut feed = self.inner.feed.write().unwrap();
        let Some(pos) = feed.iter().position(|item| item.has_key(key)) else {
            return false;
        };
        let mut next = Vec::clone(&feed);
        next[pos] = f(&feed[pos]);
        *feed = Arc::new(next);
        true
    }

    /// Count to display right now, without triggering a query
    pub fn comment_count_for(&self, key: &ItemKey) -> CommentCount {
        let stored = self.item(key).map(|item| item.comment_count).unwrap_or(0);
        self.inner.comments.peek(key, stored)
    }

    /// Compute (or reuse) the authoritative comment count for `key`.
    /// Never fails: a broken query degrades to the stored counter.
    pub async fn ensure_comment_count(&self, key: &ItemKey) -> CommentCount {
        let stored = self.item(key).map(|item| item.comment_count).unwrap_or(0);
        let outcome = self
            .inner
            .comments
            .ensure(
                key,
                stored,
                self.inner.collaborators.comments.as_ref(),
                self.inner.options.count_timeout,
            )
            .await;

        if outcome.queried
            && let CommentCount::Fresh(n) = outcome.count
        {
            self.emit(FeedEvent::CommentCountReady(key.clone(), n));
        }
        outcome.count
    }

    pub fn item_state(&self, key: &ItemKey) -> Option<ItemState> {
        self.item(key)?;
        Some(ItemState {
            liked: self.is_liked(key),
            like_toggling: self.inner.likes.is_toggling(key),
            comment_count: self.comment_count_for(key),
        })
    }

    /// Video URL the player should use for `key`
    pub fn active_video_url(&self, key: &ItemKey) -> Option<String> {
        self.inner.playback.active_url(&self.item(key)?)
    }

    /// Report that the active video URL failed to play. Returns the next
    /// fallback, or `None` once every source is exhausted.
    pub fn video_failed(&self, key: &ItemKey) -> Option<String> {
        let next = self.inner.playback.advance(&self.item(key)?);
        if next.is_none() {
            tracing::debug!(%key, "no playable video source left");
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LikeRegistry, Viewer, ViewerSlot};
    use crate::feed::testing::{FakeComments, FakeLikes, FakeSource, doc_at};
    use crate::model::SourceType;
    use serde_json::json;

    struct Harness {
        aggregator: FeedAggregator,
        source: Arc<FakeSource>,
        likes: Arc<FakeLikes>,
        comments: Arc<FakeComments>,
        viewer: Arc<ViewerSlot>,
    }

    fn viewer(id: &str) -> Option<Viewer> {
        Some(Viewer {
            id: id.to_string(),
            display_name: None,
        })
    }

    fn options() -> FeedOptions {
        FeedOptions {
            eager_comment_prefix: 0,
            mutation_timeout: Duration::from_secs(5),
            count_timeout: Duration::from_secs(5),
        }
    }

    fn harness(source: FakeSource, likes: FakeLikes, comments: FakeComments) -> Harness {
        harness_with(source, likes, comments, options(), |likes| {
            LikeRegistry::all(likes)
        })
    }

    fn harness_with(
        source: FakeSource,
        likes: FakeLikes,
        comments: FakeComments,
        options: FeedOptions,
        registry: impl FnOnce(Arc<FakeLikes>) -> LikeRegistry,
    ) -> Harness {
        let source = Arc::new(source);
        let likes = Arc::new(likes);
        let comments = Arc::new(comments);
        let viewer = Arc::new(ViewerSlot::new(viewer("u1")));
        let collaborators = Collaborators {
            source: source.clone(),
            likes: registry(likes.clone()),
            comments: comments.clone(),
            viewer: viewer.clone(),
        };
        Harness {
            aggregator: FeedAggregator::new(collaborators, options),
            source,
            likes,
            comments,
            viewer,
        }
    }

    fn board_source_docs() -> Vec<serde_json::Value> {
        vec![
            json!({
                "id": "p1",
                "title": "모임 공지",
                "likes": 2,
                "likedBy": ["u1", "u7"],
                "commentCount": 1,
                "createdAt": { "seconds": 100, "nanoseconds": 0 },
            }),
            doc_at("p2", 50),
        ]
    }

    fn board_source() -> FakeSource {
        FakeSource::new().with_docs(SourceType::Board, board_source_docs())
    }

    fn p1() -> ItemKey {
        ItemKey::new(SourceType::Board, "p1")
    }

    fn p2() -> ItemKey {
        ItemKey::new(SourceType::Board, "p2")
    }

    #[tokio::test]
    async fn test_refresh_builds_like_state_from_membership() {
        let h = harness(board_source(), FakeLikes::new(), FakeComments::new());
        let mut events = h.aggregator.subscribe();
        h.aggregator.refresh().await;

        assert_eq!(h.aggregator.feed().len(), 2);
        assert!(h.aggregator.is_liked(&p1()));
        assert!(!h.aggregator.is_liked(&p2()));
        assert_eq!(events.recv().await.unwrap(), FeedEvent::Refreshed { len: 2 });
    }

    #[tokio::test]
    async fn test_like_twice_restores_prior_state() {
        let h = harness(board_source(), FakeLikes::new(), FakeComments::new());
        h.aggregator.refresh().await;
        let mut events = h.aggregator.subscribe();

        assert!(h.aggregator.toggle_like(&p2()).await.unwrap());
        assert!(h.aggregator.is_liked(&p2()));
        assert_eq!(h.aggregator.item(&p2()).unwrap().like_count, 1);
        assert_eq!(events.try_recv().unwrap(), FeedEvent::ItemUpdated(p2()));
        assert!(events.try_recv().is_err());

        assert!(!h.aggregator.toggle_like(&p2()).await.unwrap());
        assert!(!h.aggregator.is_liked(&p2()));
        assert_eq!(h.aggregator.item(&p2()).unwrap().like_count, 0);
        assert_eq!(h.likes.calls(), 2);
    }

    #[tokio::test]
    async fn test_unlike_existing_like() {
        let likes = FakeLikes::new().already_liked(&p1(), "u1");
        let h = harness(board_source(), likes, FakeComments::new());
        h.aggregator.refresh().await;

        assert!(!h.aggregator.toggle_like(&p1()).await.unwrap());
        let item = h.aggregator.item(&p1()).unwrap();
        assert_eq!(item.like_count, 1);
        assert!(!item.is_liked_by("u1"));
        assert!(!h.aggregator.is_liked(&p1()));
    }

    #[tokio::test]
    async fn test_duplicate_toggle_is_rejected_while_in_flight() {
        let h = harness(board_source(), FakeLikes::new().gated(), FakeComments::new());
        h.aggregator.refresh().await;

        let first = {
            let aggregator = h.aggregator.clone();
            tokio::spawn(async move { aggregator.toggle_like(&p2()).await })
        };
        while !h.aggregator.item_state(&p2()).unwrap().like_toggling {
            tokio::task::yield_now().await;
        }

        let second = h.aggregator.toggle_like(&p2()).await;
        assert!(matches!(second, Err(FeedError::InFlight(_))));

        // Other items are not blocked
        h.likes.release();
        assert!(h.aggregator.toggle_like(&p1()).await.is_ok());

        assert!(first.await.unwrap().unwrap());
        assert_eq!(h.likes.calls(), 2);
        assert!(!h.aggregator.item_state(&p2()).unwrap().like_toggling);
        assert_eq!(h.aggregator.item(&p2()).unwrap().like_count, 1);
    }

    #[tokio::test]
    async fn test_unauthenticated_never_calls_backend() {
        let h = harness(board_source(), FakeLikes::new(), FakeComments::new());
        h.aggregator.refresh().await;
        h.viewer.set(None);

        let result = h.aggregator.toggle_like(&p1()).await;
        assert!(matches!(result, Err(FeedError::Unauthenticated)));
        let result = h.aggregator.toggle_like_str("unknown:p1").await;
        assert!(matches!(result, Err(FeedError::Unauthenticated)));
        assert_eq!(h.likes.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_source_type_is_unsupported() {
        let h = harness(board_source(), FakeLikes::new(), FakeComments::new());
        h.aggregator.refresh().await;
        let before = h.aggregator.feed();

        let result = h.aggregator.toggle_like_str("unknown:p1").await;
        assert!(matches!(result, Err(FeedError::UnsupportedType(t)) if t == "unknown"));
        assert_eq!(*h.aggregator.feed(), *before);
        assert_eq!(h.likes.calls(), 0);
    }

    #[tokio::test]
    async fn test_source_without_like_mutation_is_unsupported() {
        let source = board_source().with_docs(SourceType::Philosophy, vec![doc_at("ph1", 10)]);
        let h = harness_with(source, FakeLikes::new(), FakeComments::new(), options(), |likes| {
            LikeRegistry::new().with(SourceType::Board, likes)
        });
        h.aggregator.refresh().await;

        let key = ItemKey::new(SourceType::Philosophy, "ph1");
        let result = h.aggregator.toggle_like(&key).await;
        assert!(matches!(result, Err(FeedError::UnsupportedType(t)) if t == "philosophy"));
        assert!(h.aggregator.toggle_like(&p2()).await.is_ok());
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_state_unchanged() {
        let h = harness(board_source(), FakeLikes::new(), FakeComments::new());
        h.aggregator.refresh().await;
        h.likes.set_failing(true);

        let result = h.aggregator.toggle_like(&p2()).await;
        assert!(matches!(result, Err(FeedError::Backend(_))));
        assert!(!h.aggregator.is_liked(&p2()));
        assert_eq!(h.aggregator.item(&p2()).unwrap().like_count, 0);

        // Marker was cleared, so a retry goes through
        h.likes.set_failing(false);
        assert!(h.aggregator.toggle_like(&p2()).await.unwrap());
    }

    #[tokio::test]
    async fn test_hung_toggle_times_out_and_clears_marker() {
        let mut opts = options();
        opts.mutation_timeout = Duration::from_millis(20);
        let h = harness_with(
            board_source(),
            FakeLikes::new().gated(),
            FakeComments::new(),
            opts,
            |likes| LikeRegistry::all(likes),
        );
        h.aggregator.refresh().await;

        let result = h.aggregator.toggle_like(&p2()).await;
        assert!(matches!(result, Err(FeedError::TimedOut)));
        assert!(!h.aggregator.item_state(&p2()).unwrap().like_toggling);
    }

    #[tokio::test]
    async fn test_toggle_on_missing_item() {
        let h = harness(board_source(), FakeLikes::new(), FakeComments::new());
        let result = h.aggregator.toggle_like(&p1()).await;
        assert!(matches!(result, Err(FeedError::UnknownItem(_))));
    }

    #[tokio::test]
    async fn test_comment_count_override() {
        let comments = FakeComments::new().with_count(&p1(), 6);
        let h = harness(board_source(), FakeLikes::new(), comments);
        h.aggregator.refresh().await;
        let mut events = h.aggregator.subscribe();

        assert_eq!(h.aggregator.comment_count_for(&p1()), CommentCount::Stored(1));
        assert_eq!(
            h.aggregator.ensure_comment_count(&p1()).await,
            CommentCount::Fresh(6)
        );
        assert_eq!(h.aggregator.comment_count_for(&p1()), CommentCount::Fresh(6));
        assert_eq!(
            events.try_recv().unwrap(),
            FeedEvent::CommentCountReady(p1(), 6)
        );

        // Served from the cache, so nothing new to announce
        h.aggregator.ensure_comment_count(&p1()).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_comment_failure_degrades_to_stored() {
        let comments = FakeComments::new().failing();
        let h = harness(board_source(), FakeLikes::new(), comments);
        h.aggregator.refresh().await;

        assert_eq!(
            h.aggregator.ensure_comment_count(&p1()).await,
            CommentCount::Stored(1)
        );
        assert_eq!(
            h.aggregator.ensure_comment_count(&p2()).await,
            CommentCount::Stored(0)
        );
    }

    #[tokio::test]
    async fn test_backfill_only_covers_prefix() {
        let mut opts = options();
        opts.eager_comment_prefix = 1;
        let comments = FakeComments::new().with_count(&p1(), 3).with_count(&p2(), 4);
        let h = harness_with(board_source(), FakeLikes::new(), comments, opts, |likes| {
            LikeRegistry::all(likes)
        });
        h.aggregator.refresh().await;
        h.aggregator.backfill_prefix().await;

        assert_eq!(h.aggregator.comment_count_for(&p1()), CommentCount::Fresh(3));
        assert_eq!(h.aggregator.comment_count_for(&p2()), CommentCount::Stored(0));
        assert_eq!(h.comments.calls(), 1);
    }

    #[tokio::test]
    async fn test_like_and_comment_load_interleave() {
        let comments = FakeComments::new().with_count(&p1(), 2).gated();
        let likes = FakeLikes::new().already_liked(&p1(), "u1");
        let h = harness(board_source(), likes, comments);
        h.aggregator.refresh().await;

        let loading = {
            let aggregator = h.aggregator.clone();
            tokio::spawn(async move { aggregator.ensure_comment_count(&p1()).await })
        };
        while h.aggregator.comment_count_for(&p1()) != CommentCount::Loading {
            tokio::task::yield_now().await;
        }

        // Liking the same item is not blocked by the count query
        assert!(!h.aggregator.toggle_like(&p1()).await.unwrap());
        h.comments.release();
        assert_eq!(loading.await.unwrap(), CommentCount::Fresh(2));
    }

    #[tokio::test]
    async fn test_mixed_success_and_failure_refresh() {
        let source = FakeSource::new()
            .with_docs(SourceType::Board, vec![doc_at("p1", 10)])
            .with_failure(SourceType::Gallery)
            .with_docs(
                SourceType::Video,
                vec![json!({ "id": "v1", "videoUrl": "https://v1", "createdAt": 20_000 })],
            );
        let h = harness(source, FakeLikes::new(), FakeComments::new());
        h.aggregator.refresh().await;

        let keys: Vec<_> = h.aggregator.feed().iter().map(ContentItem::key).collect();
        assert_eq!(
            keys,
            vec![ItemKey::new(SourceType::Video, "v1"), ItemKey::new(SourceType::Board, "p1")]
        );
    }

    #[tokio::test]
    async fn test_video_fallbacks_reset_on_refresh() {
        let source = FakeSource::new().with_docs(
            SourceType::Video,
            vec![json!({
                "id": "v1",
                "videoUrl": "https://v1.mp4",
                "fallbackUrls": ["https://v1.webm"],
            })],
        );
        let h = harness(source, FakeLikes::new(), FakeComments::new());
        h.aggregator.refresh().await;
        let key = ItemKey::new(SourceType::Video, "v1");

        assert_eq!(h.aggregator.video_failed(&key).as_deref(), Some("https://v1.webm"));
        assert_eq!(h.aggregator.video_failed(&key), None);

        h.aggregator.refresh().await;
        assert_eq!(
            h.aggregator.active_video_url(&key).as_deref(),
            Some("https://v1.mp4")
        );
    }

    #[tokio::test]
    async fn test_seed_from_snapshot_sorts_and_derives_likes() {
        let h = harness(FakeSource::new(), FakeLikes::new(), FakeComments::new());
        let older = crate::model::normalize(SourceType::Board, vec![doc_at("old", 1)]);
        let mut newer = crate::model::normalize(SourceType::Board, vec![doc_at("new", 2)]);
        newer[0].liked_by.insert("u1".to_string());

        h.aggregator
            .seed_from_snapshot(older.into_iter().chain(newer).collect());
        let feed = h.aggregator.feed();
        assert_eq!(feed[0].id, "new");
        assert!(h.aggregator.is_liked(&ItemKey::new(SourceType::Board, "new")));
    }

    #[tokio::test]
    async fn test_like_lands_by_key_across_refresh() {
        let h = harness(board_source(), FakeLikes::new().gated(), FakeComments::new());
        h.aggregator.refresh().await;

        let toggle = {
            let aggregator = h.aggregator.clone();
            tokio::spawn(async move { aggregator.toggle_like(&p2()).await })
        };
        while !h.aggregator.item_state(&p2()).unwrap().like_toggling {
            tokio::task::yield_now().await;
        }

        // Newer posts arrive ahead of p2 while the toggle is pending
        let mut docs = vec![doc_at("p0", 200), doc_at("p00", 150)];
        docs.extend(board_source_docs());
        h.source.set_docs(SourceType::Board, docs);
        let outcome = h.aggregator.refresh().await;
        assert!(outcome.replaced);
        assert!(h.aggregator.item_state(&p2()).unwrap().like_toggling);

        h.likes.release();
        assert!(toggle.await.unwrap().unwrap());

        let feed = h.aggregator.feed();
        let ids: Vec<_> = feed.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p00", "p1", "p2"]);

        let target = h.aggregator.item(&p2()).unwrap();
        assert_eq!(target.like_count, 1);
        assert!(target.is_liked_by("u1"));
        assert!(h.aggregator.is_liked(&p2()));

        let p1_item = h.aggregator.item(&p1()).unwrap();
        assert_eq!(p1_item.like_count, 2);
        for id in ["p0", "p00"] {
            let key = ItemKey::new(SourceType::Board, id);
            assert_eq!(h.aggregator.item(&key).unwrap().like_count, 0);
            assert!(!h.aggregator.is_liked(&key));
        }
        assert!(h.aggregator.is_liked(&p1()));
    }

    #[tokio::test]
    async fn test_offline_refresh_keeps_seeded_feed() {
        let source = SourceType::ALL
            .into_iter()
            .fold(FakeSource::new(), FakeSource::with_failure);
        let h = harness(source, FakeLikes::new(), FakeComments::new());
        let cached = crate::model::normalize(SourceType::Board, vec![doc_at("cached", 5)]);
        h.aggregator.seed_from_snapshot(cached.clone());
        let mut events = h.aggregator.subscribe();

        let outcome = h.aggregator.refresh().await;
        assert!(!outcome.replaced);
        assert_eq!(outcome.items, 1);
        assert_eq!(outcome.failed.len(), SourceType::ALL.len());
        assert_eq!(*h.aggregator.feed(), cached);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_partial_refresh_replaces_feed() {
        let source = board_source().with_failure(SourceType::Video);
        let h = harness(source, FakeLikes::new(), FakeComments::new());
        h.aggregator
            .seed_from_snapshot(crate::model::normalize(SourceType::Board, vec![doc_at("cached", 5)]));

        let outcome = h.aggregator.refresh().await;
        assert!(outcome.replaced);
        assert_eq!(outcome.items, 2);
        assert_eq!(outcome.failed, vec![SourceType::Video]);
    }

    #[tokio::test]
    async fn test_viewer_change_rebuilds_likes() {
        let h = harness(board_source(), FakeLikes::new(), FakeComments::new());
        h.aggregator.refresh().await;
        assert!(h.aggregator.is_liked(&p1()));

        h.viewer.set(viewer("u9"));
        assert!(!h.aggregator.is_liked(&p1()));
        assert!(!h.aggregator.item_state(&p1()).unwrap().liked);

        h.viewer.set(viewer("u7"));
        assert!(h.aggregator.is_liked(&p1()));

        h.viewer.set(None);
        assert!(!h.aggregator.is_liked(&p1()));
    }

    #[tokio::test]
    async fn test_toggle_after_viewer_change_uses_new_viewer() {
        let h = harness(board_source(), FakeLikes::new(), FakeComments::new());
        h.aggregator.refresh().await;
        h.viewer.set(viewer("u9"));

        // p1 is liked by u1 and u7, not u9
        assert!(h.aggregator.toggle_like(&p1()).await.unwrap());
        let item = h.aggregator.item(&p1()).unwrap();
        assert_eq!(item.like_count, 3);
        assert!(item.is_liked_by("u9"));
        assert!(h.aggregator.is_liked(&p1()));
    }
}
