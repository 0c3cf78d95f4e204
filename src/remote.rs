// src/remote.rs
//! Optional remote mirror (document store) reached through two operations:
//! `persist(document)` and `fetch(key)`.
//!
//! The local store is the source of truth; the mirror is best-effort and is
//! always written *after* the local copy (see [`crate::sync`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{CustomPillar, CustomQuestion};
use crate::config::RemoteConfig;
use crate::journal::DayResponses;

pub const COLLECTION_ENTRIES: &str = "wellness-entries";
pub const COLLECTION_SETTINGS: &str = "user-settings";

/// Address of one document in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocKey {
    pub collection: &'static str,
    pub id: String,
}

impl DocKey {
    /// `wellness-entries/{user}_{date}`
    pub fn entry(user_id: &str, date: &str) -> Self {
        Self {
            collection: COLLECTION_ENTRIES,
            id: format!("{user_id}_{date}"),
        }
    }

    /// `user-settings/{user}`
    pub fn settings(user_id: &str) -> Self {
        Self {
            collection: COLLECTION_SETTINGS,
            id: user_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub key: DocKey,
    pub body: serde_json::Value,
}

/// One day mirrored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessEntry {
    pub user_id: String,
    pub date: String,
    pub data: DayResponses,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Coefficients and custom content mirrored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub user_id: String,
    #[serde(default)]
    pub coefficients: std::collections::BTreeMap<String, f64>,
    #[serde(default)]
    pub custom_questions: Vec<CustomQuestion>,
    #[serde(default)]
    pub custom_pillars: Vec<CustomPillar>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait RemoteMirror: Send + Sync {
    async fn persist(&self, doc: RemoteDocument) -> Result<()>;
    async fn fetch(&self, key: &DocKey) -> Result<Option<serde_json::Value>>;
    /// Provider name for logs.
    fn name(&self) -> &'static str;
    /// `false` for the disabled mirror; callers skip the remote phase.
    fn is_enabled(&self) -> bool {
        true
    }
}

pub type DynMirror = Arc<dyn RemoteMirror>;

/// Build the mirror described by config. No base URL or user → disabled.
pub fn build_mirror(cfg: &RemoteConfig) -> Result<DynMirror> {
    match (&cfg.base_url, &cfg.user_id) {
        (Some(url), Some(_)) if !url.trim().is_empty() => {
            let mirror = HttpMirror::new(url, cfg.api_token.clone())?
                .with_timeout(Duration::from_millis(cfg.timeout_ms));
            Ok(Arc::new(mirror))
        }
        _ => Ok(Arc::new(DisabledMirror)),
    }
}

/// Mirror used when the user is not signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledMirror;

#[async_trait::async_trait]
impl RemoteMirror for DisabledMirror {
    async fn persist(&self, _doc: RemoteDocument) -> Result<()> {
        tracing::debug!("remote mirror disabled; persist skipped");
        Ok(())
    }

    async fn fetch(&self, _key: &DocKey) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// JSON-over-HTTP document store: `PUT`/`GET {base}/{collection}/{id}`.
pub struct HttpMirror {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpMirror {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("building HTTP client for remote mirror")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
            timeout: Duration::from_secs(5),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, key: &DocKey) -> String {
        format!("{}/{}/{}", self.base_url, key.collection, key.id)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }
}

#[async_trait::async_trait]
impl RemoteMirror for HttpMirror {
    async fn persist(&self, doc: RemoteDocument) -> Result<()> {
        let req = self
            .client
            .put(self.url(&doc.key))
            .timeout(self.timeout)
            .json(&doc.body);
        self.authorize(req)
            .send()
            .await
            .context("remote persist")?
            .error_for_status()
            .context("remote persist non-2xx")?;
        Ok(())
    }

    async fn fetch(&self, key: &DocKey) -> Result<Option<serde_json::Value>> {
        let req = self.client.get(self.url(key)).timeout(self.timeout);
        let resp = self.authorize(req).send().await.context("remote fetch")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp
            .error_for_status()
            .context("remote fetch non-2xx")?
            .json::<serde_json::Value>()
            .await
            .context("remote fetch body")?;
        Ok(Some(body))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

// --- Test helper ---
/// Records every persisted document and serves them back on fetch.
/// `set_failing(true)` makes both operations error.
#[derive(Default)]
pub struct MockMirror {
    pub calls: Mutex<Vec<RemoteDocument>>,
    docs: Mutex<HashMap<DocKey, serde_json::Value>>,
    failing: AtomicBool,
}

impl MockMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    pub fn persisted(&self) -> Vec<RemoteDocument> {
        self.calls.lock().unwrap().clone()
    }

    pub fn insert(&self, key: DocKey, body: serde_json::Value) {
        self.docs.lock().unwrap().insert(key, body);
    }
}

#[async_trait::async_trait]
impl RemoteMirror for MockMirror {
    async fn persist(&self, doc: RemoteDocument) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("mock mirror unreachable"));
        }
        self.docs
            .lock()
            .unwrap()
            .insert(doc.key.clone(), doc.body.clone());
        self.calls.lock().unwrap().push(doc);
        Ok(())
    }

    async fn fetch(&self, key: &DocKey) -> Result<Option<serde_json::Value>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("mock mirror unreachable"));
        }
        Ok(self.docs.lock().unwrap().get(key).cloned())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
