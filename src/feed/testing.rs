// SPDX-License-Identifier: MPL-2.0

// Fake collaborators for feed tests.

use crate::backend::{BackendError, CommentCounter, ContentSource, LikeToggle};
use crate::model::{ItemKey, SourceType};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Board-style document created `secs` seconds after the epoch
pub fn doc_at(id: &str, secs: i64) -> Value {
    json!({
        "id": id,
        "title": id,
        "createdAt": { "seconds": secs, "nanoseconds": 0 },
    })
}

/// Holds callers until released. Once released it stays open.
struct Gate {
    permits: Semaphore,
}

impl Gate {
    fn new() -> Self {
        Self {
            permits: Semaphore::new(0),
        }
    }

    async fn pass(&self) {
        let _ = self.permits.acquire().await;
    }

    fn open(&self) {
        self.permits.add_permits(1 << 20);
    }
}

pub struct FakeSource {
    docs: Mutex<HashMap<SourceType, Vec<Value>>>,
    failing: HashSet<SourceType>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_docs(self, source: SourceType, docs: Vec<Value>) -> Self {
        self.set_docs(source, docs);
        self
    }

    /// Replace what later fetches of `source` return
    pub fn set_docs(&self, source: SourceType, docs: Vec<Value>) {
        self.docs.lock().unwrap().insert(source, docs);
    }

    pub fn with_failure(mut self, source: SourceType) -> Self {
        self.failing.insert(source);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_all(&self, source: SourceType) -> Result<Vec<Value>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&source) {
            return Err(BackendError::Network(format!("{source} unavailable")));
        }
        Ok(self
            .docs
            .lock()
            .unwrap()
            .get(&source)
            .cloned()
            .unwrap_or_default())
    }
}

/// Like backend keeping its own membership lists
pub struct FakeLikes {
    liked: Mutex<HashSet<(SourceType, String, String)>>,
    calls: AtomicUsize,
    failing: AtomicBool,
    gate: Option<Gate>,
}

impl FakeLikes {
    pub fn new() -> Self {
        Self {
            liked: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            gate: None,
        }
    }

    /// Calls block until [`FakeLikes::release`]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Gate::new());
        self
    }

    pub fn already_liked(self, key: &ItemKey, user_id: &str) -> Self {
        self.liked
            .lock()
            .unwrap()
            .insert((key.source, key.id.clone(), user_id.to_string()));
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.open();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LikeToggle for FakeLikes {
    async fn toggle_like(
        &self,
        source: SourceType,
        item_id: &str,
        user_id: &str,
    ) -> Result<bool, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::PermissionDenied("rules rejected write".into()));
        }

        let entry = (source, item_id.to_string(), user_id.to_string());
        let mut liked = self.liked.lock().unwrap();
        if liked.remove(&entry) {
            Ok(false)
        } else {
            liked.insert(entry);
            Ok(true)
        }
    }
}

pub struct FakeComments {
    counts: HashMap<ItemKey, u32>,
    calls: AtomicUsize,
    failing: AtomicBool,
    gate: Option<Gate>,
}

impl FakeComments {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            gate: None,
        }
    }

    pub fn with_count(mut self, key: &ItemKey, count: u32) -> Self {
        self.counts.insert(key.clone(), count);
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Gate::new());
        self
    }

    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.open();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommentCounter for FakeComments {
    async fn count_comments(&self, key: &ItemKey) -> Result<u32, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Network("comments unavailable".into()));
        }
        Ok(self.counts.get(key).copied().unwrap_or(0))
    }
}
