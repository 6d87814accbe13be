// SPDX-License-Identifier: MPL-2.0

use crate::backend::Viewer;
use crate::config::APP_ID;
use secret_service::{EncryptionType, SecretService};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SECRET_LABEL: &str = "탑골톡 Session";

/// A signed-in viewer. Sign-in itself happens elsewhere; this is what it leaves behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Bearer token for Firestore requests
    pub id_token: String,
}

impl Session {
    pub fn viewer(&self) -> Viewer {
        Viewer {
            id: self.uid.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("secret service unavailable: {0}")]
    SecretService(String),
    #[error("session not found")]
    NotFound,
    #[error("invalid session data: {0}")]
    InvalidData(String),
}

/// Persists session credentials via libsecret.
pub struct SessionManager;

impl SessionManager {
    pub async fn store(session: &Session) -> Result<(), SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        let session_json =
            serde_json::to_string(session).map_err(|e| SessionError::InvalidData(e.to_string()))?;

        let attributes = vec![("application", APP_ID), ("uid", session.uid.as_str())];

        collection
            .create_item(
                SECRET_LABEL,
                attributes.into_iter().collect(),
                session_json.as_bytes(),
                true, // replace existing
                "text/plain",
            )
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        Ok(())
    }

    pub async fn load() -> Result<Session, SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        let attributes = vec![("application", APP_ID)];
        let items = collection
            .search_items(attributes.into_iter().collect())
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        let item = items.first().ok_or(SessionError::NotFound)?;

        let secret = item
            .get_secret()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        Self::decode(&secret)
    }

    pub async fn clear() -> Result<(), SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        let attributes = vec![("application", APP_ID)];
        let items = collection
            .search_items(attributes.into_iter().collect())
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        for item in items {
            item.delete()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        Ok(())
    }

    fn decode(secret: &[u8]) -> Result<Session, SessionError> {
        let session: Session =
            serde_json::from_slice(secret).map_err(|e| SessionError::InvalidData(e.to_string()))?;
        if session.uid.trim().is_empty() {
            return Err(SessionError::InvalidData("empty uid".to_string()));
        }
        Ok(session)
    }
}
