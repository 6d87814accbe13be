// SPDX-License-Identifier: MPL-2.0

use crate::backend::values::{decode_document, decode_value, integer_value, string_value};
use crate::backend::{BackendError, CommentCounter, ContentSource, LikeToggle};
use crate::config::{
    COMMENTS_COLLECTION, FIRESTORE_API, LIKE_COUNT_ALIAS_FIELD, LIKE_COUNT_FIELD, LIKED_BY_FIELD,
    LIST_PAGE_SIZE,
};
use crate::model::{ItemKey, SourceType};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value, json};
use std::sync::RwLock;
use std::time::Duration;
use url::Url;

/// Talks to the Firestore REST API so the rest of the crate only sees
/// plain JSON documents.
pub struct FirestoreClient {
    http: reqwest::Client,
    api_base: String,
    project_id: String,
    id_token: RwLock<Option<String>>,
}

impl FirestoreClient {
    pub fn new(project_id: &str) -> Result<Self, BackendError> {
        Self::with_api_base(project_id, FIRESTORE_API)
    }

    /// Point the client at another endpoint, e.g. the local emulator
    pub fn with_api_base(project_id: &str, api_base: &str) -> Result<Self, BackendError> {
        if project_id.trim().is_empty() {
            return Err(BackendError::Config("empty project id".to_string()));
        }
        Url::parse(api_base).map_err(|e| BackendError::Config(format!("{api_base}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            id_token: RwLock::new(None),
        })
    }

    /// Bearer token sent with every request; `None` reads as an anonymous user
    pub fn set_id_token(&self, token: Option<String>) {
        *self.id_token.write().expect("token lock poisoned") = token;
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/documents/{}/{}", self.database_path(), collection, id)
    }

    /// `suffix` is appended to `.../documents`, e.g. `"/posts"` or `":commit"`
    fn documents_url(&self, suffix: &str) -> Result<Url, BackendError> {
        let raw = format!("{}/{}/documents{}", self.api_base, self.database_path(), suffix);
        Url::parse(&raw).map_err(|e| BackendError::Config(format!("{raw}: {e}")))
    }

    async fn send_json(&self, request: reqwest::RequestBuilder) -> Result<Value, BackendError> {
        let token = self.id_token.read().expect("token lock poisoned").clone();
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED => BackendError::NotAuthenticated,
                StatusCode::FORBIDDEN => BackendError::PermissionDenied(body),
                _ => BackendError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    /// Every document in a collection, following page tokens
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<Value>, BackendError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.documents_url(&format!("/{collection}"))?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", &LIST_PAGE_SIZE.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let page = self.send_json(self.http.get(url)).await?;
            if let Some(docs) = page.get("documents").and_then(Value::as_array) {
                documents.extend(docs.iter().filter_map(decode_document));
            }

            match page.get("nextPageToken").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Value, BackendError> {
        let url = self.documents_url(&format!("/{collection}/{id}"))?;
        self.send_json(self.http.get(url)).await
    }
}

/// The counter field a document already uses. Reads prefer `likes`, so a
/// document carrying both keeps moving `likes`.
fn like_counter_field(fields: Option<&Value>) -> &'static str {
    let has = |name: &str| fields.and_then(|f| f.get(name)).is_some();
    if !has(LIKE_COUNT_FIELD) && has(LIKE_COUNT_ALIAS_FIELD) {
        LIKE_COUNT_ALIAS_FIELD
    } else {
        LIKE_COUNT_FIELD
    }
}

/// Commit body flipping `user_id`'s membership in the liked-by list and
/// moving `counter` with it. The write only applies if the document is
/// unchanged since `update_time`.
fn like_commit_body(
    document: &str,
    update_time: &str,
    counter: &str,
    user_id: &str,
    liked: bool,
) -> Value {
    let (op, delta) = if liked {
        ("removeAllFromArray", -1)
    } else {
        ("appendMissingElements", 1)
    };

    let mut membership = Map::new();
    membership.insert("fieldPath".to_string(), json!(LIKED_BY_FIELD));
    membership.insert(op.to_string(), json!({ "values": [string_value(user_id)] }));

    json!({
        "writes": [{
            "transform": {
                "document": document,
                "fieldTransforms": [
                    Value::Object(membership),
                    { "fieldPath": counter, "increment": integer_value(delta) }
                ]
            },
            "currentDocument": { "updateTime": update_time }
        }]
    })
}

fn comment_count_body(key: &ItemKey) -> Value {
    let equals = |field: &str, value: &str| {
        json!({
            "fieldFilter": {
                "field": { "fieldPath": field },
                "op": "EQUAL",
                "value": string_value(value)
            }
        })
    };

    json!({
        "structuredAggregationQuery": {
            "structuredQuery": {
                "from": [{ "collectionId": COMMENTS_COLLECTION }],
                "where": {
                    "compositeFilter": {
                        "op": "AND",
                        "filters": [
                            equals("postId", &key.id),
                            equals("postType", key.source.as_str())
                        ]
                    }
                }
            },
            "aggregations": [{ "alias": "total", "count": {} }]
        }
    })
}

fn parse_count(response: &Value) -> Result<u32, BackendError> {
    let total = response
        .as_array()
        .and_then(|rows| {
            rows.iter()
                .find_map(|row| row.get("result")?.get("aggregateFields")?.get("total"))
        })
        .map(decode_value)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| BackendError::InvalidResponse("aggregation result has no count".into()))?;

    Ok(u32::try_from(total).unwrap_or(u32::MAX))
}

#[async_trait]
impl ContentSource for FirestoreClient {
    async fn fetch_all(&self, source: SourceType) -> Result<Vec<Value>, BackendError> {
        self.list_documents(source.collection()).await
    }
}

#[async_trait]
impl LikeToggle for FirestoreClient {
    async fn toggle_like(
        &self,
        source: SourceType,
        item_id: &str,
        user_id: &str,
    ) -> Result<bool, BackendError> {
        let collection = source.collection();
        let doc = self.get_document(collection, item_id).await?;

        let update_time = doc
            .get("updateTime")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::InvalidResponse("document has no updateTime".into()))?;

        let fields = doc.get("fields");
        let liked = fields
            .and_then(|fields| fields.get(LIKED_BY_FIELD))
            .map(decode_value)
            .and_then(|v| v.as_array().cloned())
            .is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(user_id)));

        let body = like_commit_body(
            &self.document_name(collection, item_id),
            update_time,
            like_counter_field(fields),
            user_id,
            liked,
        );
        let url = self.documents_url(":commit")?;
        self.send_json(self.http.post(url).json(&body)).await?;

        Ok(!liked)
    }
}

#[async_trait]
impl CommentCounter for FirestoreClient {
    async fn count_comments(&self, key: &ItemKey) -> Result<u32, BackendError> {
        let url = self.documents_url(":runAggregationQuery")?;
        let response = self
            .send_json(self.http.post(url).json(&comment_count_body(key)))
            .await?;
        parse_count(&response)
    }
}
