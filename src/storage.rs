// src/storage.rs
//! Local key-value persistence behind a small port, plus the typed view of
//! the shapes stored under each key.
//!
//! The core never touches a store directly; everything goes through
//! [`StoragePort`], so tests run against [`MemoryStore`].

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

use crate::catalog::{CatalogLayers, CustomContent, QuestionOverrides};
use crate::coefficients::{PillarCoefficients, QuestionCoefficients};
use crate::journal::{DayResponses, Journal};

pub const KEY_WELLNESS_DATA: &str = "wellness-data";
pub const KEY_CUSTOM_QUESTIONS: &str = "custom-questions";
pub const KEY_QUESTION_COEFFICIENTS: &str = "question-coefficients";
pub const KEY_PILLAR_COEFFICIENTS: &str = "pillar-coefficients";
pub const KEY_DEFAULT_OVERRIDES: &str = "modified-default-questions";

/// String key-value port.
pub trait StoragePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: StoragePort + ?Sized> StoragePort for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoragePort for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.inner.lock().expect("memory store mutex poisoned");
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.inner.lock().expect("memory store mutex poisoned");
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside `dir`. Writes go to a temp file first
/// and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating data dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl StoragePort for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(value.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

/// Typed access to everything the app persists locally.
///
/// Reads never fail on bad data: a missing key or undecodable JSON yields the
/// empty shape (the latter with a warning). I/O errors are propagated.
#[derive(Debug)]
pub struct WellnessStore<S> {
    port: S,
}

impl<S: StoragePort> WellnessStore<S> {
    pub fn new(port: S) -> Self {
        Self { port }
    }

    pub fn port(&self) -> &S {
        &self.port
    }

    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let Some(raw) = self.port.get(key)? else {
            return Ok(T::default());
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Ok(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value is not valid; using empty default");
                Ok(T::default())
            }
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).with_context(|| format!("encoding {key}"))?;
        self.port.set(key, &json)
    }

    pub fn journal(&self) -> Result<Journal> {
        self.load(KEY_WELLNESS_DATA)
    }

    pub fn save_journal(&self, journal: &Journal) -> Result<()> {
        self.save(KEY_WELLNESS_DATA, journal)
    }

    /// Read-modify-write of one day inside the journal.
    pub fn save_day(&self, date: &str, day: &DayResponses) -> Result<()> {
        let mut journal = self.journal()?;
        journal.record(date, day.clone());
        self.save_journal(&journal)
    }

    pub fn custom_content(&self) -> Result<CustomContent> {
        self.load(KEY_CUSTOM_QUESTIONS)
    }

    pub fn save_custom_content(&self, content: &CustomContent) -> Result<()> {
        self.save(KEY_CUSTOM_QUESTIONS, content)
    }

    pub fn overrides(&self) -> Result<QuestionOverrides> {
        self.load(KEY_DEFAULT_OVERRIDES)
    }

    pub fn save_overrides(&self, overrides: &QuestionOverrides) -> Result<()> {
        self.save(KEY_DEFAULT_OVERRIDES, overrides)
    }

    pub fn catalog_layers(&self) -> Result<CatalogLayers> {
        Ok(CatalogLayers {
            overrides: self.overrides()?,
            custom: self.custom_content()?,
        })
    }

    pub fn save_catalog_layers(&self, layers: &CatalogLayers) -> Result<()> {
        self.save_overrides(&layers.overrides)?;
        self.save_custom_content(&layers.custom)
    }

    pub fn question_coefficients(&self) -> Result<QuestionCoefficients> {
        self.load(KEY_QUESTION_COEFFICIENTS)
    }

    pub fn save_question_coefficients(&self, c: &QuestionCoefficients) -> Result<()> {
        self.save(KEY_QUESTION_COEFFICIENTS, c)
    }

    pub fn pillar_coefficients(&self) -> Result<PillarCoefficients> {
        self.load(KEY_PILLAR_COEFFICIENTS)
    }

    pub fn save_pillar_coefficients(&self, c: &PillarCoefficients) -> Result<()> {
        self.save(KEY_PILLAR_COEFFICIENTS, c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_corrupt_keys_read_as_empty() {
        let store = WellnessStore::new(MemoryStore::new());
        assert!(store.journal().unwrap().is_empty());
        store.port().set(KEY_QUESTION_COEFFICIENTS, "{not json").unwrap();
        assert_eq!(store.question_coefficients().unwrap(), QuestionCoefficients::default());
    }

    #[test]
    fn custom_content_uses_camel_case_and_emoji_fields() {
        let store = WellnessStore::new(MemoryStore::new());
        let mut layers = CatalogLayers::default();
        layers.add_custom_pillar("Lecture", "📚", 42).unwrap();
        store.save_catalog_layers(&layers).unwrap();

        let raw = store.port().get(KEY_CUSTOM_QUESTIONS).unwrap().unwrap();
        assert!(raw.contains("\"customPillars\""));
        assert!(raw.contains("\"emoji\":\"📚\""));
        assert_eq!(store.catalog_layers().unwrap(), layers);
    }

    #[test]
    fn save_day_keeps_other_days() {
        let store = WellnessStore::new(MemoryStore::new());
        let mut a = DayResponses::default();
        a.insert("sport", vec![10.0]);
        store.save_day("2025-01-01", &a).unwrap();
        store.save_day("2025-01-02", &a).unwrap();
        assert_eq!(store.journal().unwrap().len(), 2);
    }
}
