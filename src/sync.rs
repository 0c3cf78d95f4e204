// src/sync.rs
//! Two-phase persistence: local store first, remote mirror second.
//!
//! A failed local write is an error. A failed remote write is not: the day is
//! already safe locally, so the caller gets [`SaveOutcome::RemoteFailed`].

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::counter;
use serde::Serialize;

use crate::catalog::CatalogLayers;
use crate::coefficients::QuestionCoefficients;
use crate::journal::DayResponses;
use crate::metrics::{
    ensure_metrics_described, REMOTE_FAILURES_TOTAL, REMOTE_FALLBACKS_TOTAL, SAVES_TOTAL,
};
use crate::remote::{DocKey, DynMirror, RemoteDocument, UserSettings, WellnessEntry};
use crate::storage::{StoragePort, WellnessStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// No signed-in user or mirror disabled.
    LocalOnly,
    Synced,
    /// Saved locally; cloud sync failed.
    RemoteFailed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub days: usize,
    pub failed_days: Vec<String>,
    pub settings: bool,
}

pub struct SyncService<S> {
    store: WellnessStore<S>,
    mirror: DynMirror,
    user_id: Option<String>,
}

impl<S: StoragePort> SyncService<S> {
    pub fn new(store: WellnessStore<S>, mirror: DynMirror, user_id: Option<String>) -> Self {
        ensure_metrics_described();
        Self {
            store,
            mirror,
            user_id,
        }
    }

    pub fn store(&self) -> &WellnessStore<S> {
        &self.store
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn remote_user(&self) -> Option<&str> {
        if self.mirror.is_enabled() {
            self.user_id.as_deref()
        } else {
            None
        }
    }

    async fn push(&self, doc: RemoteDocument) -> SaveOutcome {
        let id = doc.key.id.clone();
        match self.mirror.persist(doc).await {
            Ok(()) => {
                counter!(SAVES_TOTAL, "target" => "remote").increment(1);
                SaveOutcome::Synced
            }
            Err(e) => {
                tracing::warn!(error = ?e, doc = %id, mirror = self.mirror.name(), "saved locally; cloud sync failed");
                counter!(REMOTE_FAILURES_TOTAL).increment(1);
                SaveOutcome::RemoteFailed(format!("{e:#}"))
            }
        }
    }

    pub async fn save_day(&self, date: &str, day: &DayResponses) -> Result<SaveOutcome> {
        self.store
            .save_day(date, day)
            .with_context(|| format!("saving {date} locally"))?;
        counter!(SAVES_TOTAL, "target" => "local").increment(1);

        let Some(user) = self.remote_user() else {
            return Ok(SaveOutcome::LocalOnly);
        };
        let now = Utc::now();
        let entry = WellnessEntry {
            user_id: user.to_string(),
            date: date.to_string(),
            data: day.clone(),
            created_at: now,
            updated_at: now,
        };
        let body = serde_json::to_value(&entry).context("encoding wellness entry")?;
        Ok(self
            .push(RemoteDocument {
                key: DocKey::entry(user, date),
                body,
            })
            .await)
    }

    /// Persist question coefficients plus custom content, then mirror them as
    /// one settings document.
    pub async fn save_settings(
        &self,
        layers: &CatalogLayers,
        coefficients: &QuestionCoefficients,
    ) -> Result<SaveOutcome> {
        self.store
            .save_catalog_layers(layers)
            .context("saving catalog layers locally")?;
        self.store
            .save_question_coefficients(coefficients)
            .context("saving question coefficients locally")?;
        counter!(SAVES_TOTAL, "target" => "local").increment(1);

        let Some(user) = self.remote_user() else {
            return Ok(SaveOutcome::LocalOnly);
        };
        let body = serde_json::to_value(self.settings_document(user, layers, coefficients))
            .context("encoding user settings")?;
        Ok(self
            .push(RemoteDocument {
                key: DocKey::settings(user),
                body,
            })
            .await)
    }

    fn settings_document(
        &self,
        user: &str,
        layers: &CatalogLayers,
        coefficients: &QuestionCoefficients,
    ) -> UserSettings {
        let now = Utc::now();
        UserSettings {
            user_id: user.to_string(),
            coefficients: coefficients.as_map().clone(),
            custom_questions: layers.custom.custom_questions.clone(),
            custom_pillars: layers.custom.custom_pillars.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Remote copy when the mirror has a non-empty one, else the local copy.
    /// Mirror errors fall back to local.
    pub async fn load_day(&self, date: &str) -> Result<Option<DayResponses>> {
        if let Some(user) = self.remote_user() {
            match self.mirror.fetch(&DocKey::entry(user, date)).await {
                Ok(Some(body)) => match serde_json::from_value::<WellnessEntry>(body) {
                    Ok(entry) if !entry.data.is_empty() => return Ok(Some(entry.data)),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, date, "remote entry undecodable; using local");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = ?e, date, "remote fetch failed; using local");
                    counter!(REMOTE_FALLBACKS_TOTAL).increment(1);
                }
            }
        }
        Ok(self.store.journal()?.day(date).cloned())
    }

    /// Push every local day and the settings to the mirror. Local data is
    /// left as is; per-day failures are reported, not fatal.
    pub async fn migrate_local_to_remote(&self) -> Result<MigrationReport> {
        let Some(user) = self.remote_user() else {
            tracing::info!("no signed-in user; nothing to migrate");
            return Ok(MigrationReport::default());
        };

        let journal = self.store.journal()?;
        let mut report = MigrationReport::default();
        for (date, day) in journal.iter() {
            let now = Utc::now();
            let entry = WellnessEntry {
                user_id: user.to_string(),
                date: date.clone(),
                data: day.clone(),
                created_at: now,
                updated_at: now,
            };
            let body = serde_json::to_value(&entry).context("encoding wellness entry")?;
            match self
                .push(RemoteDocument {
                    key: DocKey::entry(user, date),
                    body,
                })
                .await
            {
                SaveOutcome::Synced => report.days += 1,
                _ => report.failed_days.push(date.clone()),
            }
        }

        let layers = self.store.catalog_layers()?;
        let coefficients = self.store.question_coefficients()?;
        let body = serde_json::to_value(self.settings_document(user, &layers, &coefficients))
            .context("encoding user settings")?;
        report.settings = matches!(
            self.push(RemoteDocument {
                key: DocKey::settings(user),
                body,
            })
            .await,
            SaveOutcome::Synced
        );

        tracing::info!(
            days = report.days,
            failed = report.failed_days.len(),
            settings = report.settings,
            "local data migrated to remote"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{DisabledMirror, MockMirror};
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn day(v: f64) -> DayResponses {
        let mut d = DayResponses::default();
        d.insert("sport", vec![v]);
        d
    }

    #[tokio::test]
    async fn disabled_mirror_is_local_only() {
        let svc = SyncService::new(
            WellnessStore::new(MemoryStore::new()),
            Arc::new(DisabledMirror),
            Some("u".into()),
        );
        let out = svc.save_day("2025-01-01", &day(70.0)).await.unwrap();
        assert_eq!(out, SaveOutcome::LocalOnly);
        assert_eq!(svc.load_day("2025-01-01").await.unwrap(), Some(day(70.0)));
    }

    #[tokio::test]
    async fn signed_out_user_skips_remote() {
        let mock = Arc::new(MockMirror::new());
        let svc = SyncService::new(WellnessStore::new(MemoryStore::new()), mock.clone(), None);
        let out = svc.save_day("2025-01-01", &day(70.0)).await.unwrap();
        assert_eq!(out, SaveOutcome::LocalOnly);
        assert!(mock.persisted().is_empty());
    }

    #[tokio::test]
    async fn remote_copy_wins_when_present() {
        let mock = Arc::new(MockMirror::new());
        let svc = SyncService::new(
            WellnessStore::new(MemoryStore::new()),
            mock.clone(),
            Some("u".into()),
        );
        svc.store().save_day("2025-01-01", &day(10.0)).unwrap();
        mock.insert(
            DocKey::entry("u", "2025-01-01"),
            serde_json::json!({
                "userId": "u",
                "date": "2025-01-01",
                "data": {"sport": [90]},
                "createdAt": "2025-01-01T10:00:00Z",
                "updatedAt": "2025-01-01T10:00:00Z"
            }),
        );
        assert_eq!(svc.load_day("2025-01-01").await.unwrap(), Some(day(90.0)));
    }
}
