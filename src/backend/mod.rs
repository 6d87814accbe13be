// SPDX-License-Identifier: MPL-2.0

//! Collaborator contracts consumed by the feed aggregator.
//!
//! The aggregator never reaches for a global client. Everything it talks to
//! is handed in through [`Collaborators`], so tests can swap in fakes.

mod firestore;
mod values;

pub use firestore::FirestoreClient;

use crate::model::{ItemKey, SourceType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// The acting user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: String,
    pub display_name: Option<String>,
}

/// Bulk reads of one collection. Each document is returned as plain JSON
/// with its id under `"id"`.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_all(&self, source: SourceType) -> Result<Vec<Value>, BackendError>;
}

/// Flips the user's like on an item and returns the resulting state
/// (`true` = now liked). Counter and membership updates happen backend side.
#[async_trait]
pub trait LikeToggle: Send + Sync {
    async fn toggle_like(
        &self,
        source: SourceType,
        item_id: &str,
        user_id: &str,
    ) -> Result<bool, BackendError>;
}

/// Authoritative number of comments referencing an item
#[async_trait]
pub trait CommentCounter: Send + Sync {
    async fn count_comments(&self, key: &ItemKey) -> Result<u32, BackendError>;
}

pub trait ViewerIdentity: Send + Sync {
    /// `None` means nobody is signed in.
    fn current_viewer(&self) -> Option<Viewer>;
}

/// Like mutations, registered per source type. A type with no entry
/// cannot be liked.
#[derive(Clone, Default)]
pub struct LikeRegistry {
    toggles: HashMap<SourceType, Arc<dyn LikeToggle>>,
}

impl LikeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry routing every source type to the same backend
    pub fn all(toggle: Arc<dyn LikeToggle>) -> Self {
        SourceType::ALL
            .into_iter()
            .fold(Self::new(), |registry, source| {
                registry.with(source, toggle.clone())
            })
    }

    pub fn with(mut self, source: SourceType, toggle: Arc<dyn LikeToggle>) -> Self {
        self.toggles.insert(source, toggle);
        self
    }

    pub fn get(&self, source: SourceType) -> Option<Arc<dyn LikeToggle>> {
        self.toggles.get(&source).cloned()
    }
}

/// Viewer identity backed by a swappable slot
#[derive(Debug, Default)]
pub struct ViewerSlot {
    viewer: RwLock<Option<Viewer>>,
}

impl ViewerSlot {
    pub fn new(viewer: Option<Viewer>) -> Self {
        Self {
            viewer: RwLock::new(viewer),
        }
    }

    pub fn set(&self, viewer: Option<Viewer>) {
        *self.viewer.write().expect("viewer lock poisoned") = viewer;
    }
}

impl ViewerIdentity for ViewerSlot {
    fn current_viewer(&self) -> Option<Viewer> {
        self.viewer.read().expect("viewer lock poisoned").clone()
    }
}

/// Everything the aggregator depends on
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn ContentSource>,
    pub likes: LikeRegistry,
    pub comments: Arc<dyn CommentCounter>,
    pub viewer: Arc<dyn ViewerIdentity>,
}

impl Collaborators {
    /// Wire every contract to one backend client
    pub fn from_client<C>(client: Arc<C>, viewer: Arc<dyn ViewerIdentity>) -> Self
    where
        C: ContentSource + LikeToggle + CommentCounter + 'static,
    {
        Self {
            source: client.clone(),
            likes: LikeRegistry::all(client.clone()),
            comments: client,
            viewer,
        }
    }
}
