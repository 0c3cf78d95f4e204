//! # Question Catalog
//!
//! Merges three layers of question definitions into one canonical, ordered
//! catalog:
//!
//! 1. built-in defaults ([`crate::pillars::BUILTIN_PILLARS`]),
//! 2. user overrides of a built-in pillar's question list (replace, never merge),
//! 3. user-added custom pillars and custom questions.
//!
//! Ordering: built-in pillars in declared order, then custom pillars in
//! creation order, then pillars only referenced by a custom question (first
//! seen). Within a pillar, default/override questions come first, followed by
//! custom questions in creation order.
//!
//! Questions are identified by their *position* in the resolved list. Both the
//! coefficient map (`{pillar}_{index}`) and the daily response arrays key off
//! that position, so editing an override list in the middle silently remaps
//! everything after the edit point. This is existing behaviour and is kept as is.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::pillars::{self, BUILTIN_PILLARS};

/// Built-in pillar id → full replacement question list.
/// Presence of a key means the override is active, even for an empty list.
pub type QuestionOverrides = BTreeMap<String, Vec<String>>;

/// A question appended by the user to an existing (or custom) pillar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomQuestion {
    pub id: String,
    pub pillar: String,
    pub question: String,
}

/// A user-created pillar. The glyph is persisted under `emoji`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPillar {
    pub id: String,
    pub name: String,
    #[serde(rename = "emoji", default)]
    pub glyph: String,
}

impl CustomPillar {
    pub fn display_name(&self) -> String {
        let glyph = self.glyph.trim();
        if glyph.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, glyph)
        }
    }
}

/// Shape stored under the `custom-questions` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomContent {
    #[serde(default)]
    pub custom_questions: Vec<CustomQuestion>,
    #[serde(default)]
    pub custom_pillars: Vec<CustomPillar>,
}

/// One resolved pillar with its ordered questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub pillar: String,
    pub questions: Vec<String>,
}

/// The canonical catalog. Derived, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, pillar: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.pillar == pillar)
    }

    pub fn pillar_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.pillar.as_str())
    }

    /// Number of questions for `pillar`, `None` when the pillar is unknown.
    pub fn question_count(&self, pillar: &str) -> Option<usize> {
        self.get(pillar).map(|e| e.questions.len())
    }

    pub fn total_questions(&self) -> usize {
        self.entries.iter().map(|e| e.questions.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The user-editable layers the catalog is resolved from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogLayers {
    pub overrides: QuestionOverrides,
    pub custom: CustomContent,
}

/// Resolve the canonical catalog. Pure: same layers, same output.
pub fn resolve_catalog(layers: &CatalogLayers) -> Catalog {
    let mut entries: Vec<CatalogEntry> = BUILTIN_PILLARS
        .iter()
        .map(|p| CatalogEntry {
            pillar: p.id.to_string(),
            questions: layers
                .overrides
                .get(p.id)
                .cloned()
                .unwrap_or_else(|| p.default_questions()),
        })
        .collect();

    for cp in &layers.custom.custom_pillars {
        if !entries.iter().any(|e| e.pillar == cp.id) {
            entries.push(CatalogEntry {
                pillar: cp.id.clone(),
                questions: Vec::new(),
            });
        }
    }

    // A question pointing at an unknown pillar still gets an entry; data is never dropped.
    for q in &layers.custom.custom_questions {
        match entries.iter_mut().find(|e| e.pillar == q.pillar) {
            Some(entry) => entry.questions.push(q.question.clone()),
            None => entries.push(CatalogEntry {
                pillar: q.pillar.clone(),
                questions: vec![q.question.clone()],
            }),
        }
    }

    Catalog { entries }
}

/// Pillar id → display label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PillarNames {
    names: BTreeMap<String, String>,
}

impl PillarNames {
    /// Label for `id`; unknown ids fall back to the raw id with no glyph.
    pub fn display_name_for(&self, id: &str) -> String {
        self.names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.names.iter()
    }
}

/// Built-in ids map through the fixed table; custom pillars use their stored name and glyph.
pub fn resolve_pillar_display_names(custom_pillars: &[CustomPillar]) -> PillarNames {
    let mut names = BTreeMap::new();
    for cp in custom_pillars {
        names.insert(cp.id.clone(), cp.display_name());
    }
    for p in BUILTIN_PILLARS.iter() {
        names.insert(p.id.to_string(), p.display_name());
    }
    PillarNames { names }
}

/// `custom_<millis>`, bumped until it does not collide with `taken`.
fn generate_id(now_ms: i64, taken: impl Fn(&str) -> bool) -> String {
    let mut stamp = now_ms;
    loop {
        let id = format!("custom_{stamp}");
        if !taken(&id) {
            return id;
        }
        stamp += 1;
    }
}

impl CatalogLayers {
    pub fn resolve(&self) -> Catalog {
        resolve_catalog(self)
    }

    pub fn display_names(&self) -> PillarNames {
        resolve_pillar_display_names(&self.custom.custom_pillars)
    }

    fn pillar_exists(&self, id: &str) -> bool {
        pillars::is_builtin(id) || self.custom.custom_pillars.iter().any(|p| p.id == id)
    }

    /// Create a custom pillar and return its generated id.
    pub fn add_custom_pillar(&mut self, name: &str, glyph: &str, now_ms: i64) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            bail!("pillar name must not be empty");
        }
        let wanted = name.to_lowercase();
        let clash = BUILTIN_PILLARS
            .iter()
            .map(|p| p.name.to_lowercase())
            .chain(self.custom.custom_pillars.iter().map(|p| p.name.to_lowercase()))
            .any(|n| n == wanted);
        if clash {
            bail!("a pillar named '{name}' already exists");
        }

        let id = generate_id(now_ms, |id| self.pillar_exists(id));
        self.custom.custom_pillars.push(CustomPillar {
            id: id.clone(),
            name: name.to_string(),
            glyph: glyph.trim().to_string(),
        });
        Ok(id)
    }

    pub fn rename_custom_pillar(&mut self, id: &str, name: &str, glyph: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            bail!("pillar name must not be empty");
        }
        let pillar = self
            .custom
            .custom_pillars
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow!("unknown custom pillar '{id}'"))?;
        pillar.name = name.to_string();
        pillar.glyph = glyph.trim().to_string();
        Ok(())
    }

    /// Delete a custom pillar and every custom question attached to it.
    /// Returns how many questions were removed with it.
    pub fn delete_custom_pillar(&mut self, id: &str) -> Result<usize> {
        if pillars::is_builtin(id) {
            bail!("built-in pillar '{id}' cannot be deleted");
        }
        let before = self.custom.custom_pillars.len();
        self.custom.custom_pillars.retain(|p| p.id != id);
        if self.custom.custom_pillars.len() == before {
            bail!("unknown custom pillar '{id}'");
        }
        let questions_before = self.custom.custom_questions.len();
        self.custom.custom_questions.retain(|q| q.pillar != id);
        Ok(questions_before - self.custom.custom_questions.len())
    }

    /// Append a custom question to `pillar` and return its generated id.
    pub fn add_custom_question(&mut self, pillar: &str, text: &str, now_ms: i64) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            bail!("question text must not be empty");
        }
        if !self.pillar_exists(pillar) {
            bail!("unknown pillar '{pillar}'");
        }
        let id = generate_id(now_ms, |id| {
            self.custom.custom_questions.iter().any(|q| q.id == id)
        });
        self.custom.custom_questions.push(CustomQuestion {
            id: id.clone(),
            pillar: pillar.to_string(),
            question: text.to_string(),
        });
        Ok(id)
    }

    pub fn edit_custom_question(&mut self, id: &str, pillar: &str, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            bail!("question text must not be empty");
        }
        if !self.pillar_exists(pillar) {
            bail!("unknown pillar '{pillar}'");
        }
        let q = self
            .custom
            .custom_questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| anyhow!("unknown custom question '{id}'"))?;
        q.pillar = pillar.to_string();
        q.question = text.to_string();
        Ok(())
    }

    pub fn delete_custom_question(&mut self, id: &str) -> Result<()> {
        let before = self.custom.custom_questions.len();
        self.custom.custom_questions.retain(|q| q.id != id);
        if self.custom.custom_questions.len() == before {
            bail!("unknown custom question '{id}'");
        }
        Ok(())
    }

    /// Replace a built-in pillar's question list. A list identical to the
    /// shipped default removes the override instead.
    pub fn set_default_override(&mut self, pillar: &str, questions: Vec<String>) -> Result<()> {
        let builtin =
            pillars::builtin(pillar).ok_or_else(|| anyhow!("'{pillar}' is not a built-in pillar"))?;
        if questions.iter().map(String::as_str).eq(builtin.questions.iter().copied()) {
            self.overrides.remove(pillar);
        } else {
            self.overrides.insert(pillar.to_string(), questions);
        }
        Ok(())
    }

    /// Returns whether an override was active.
    pub fn clear_default_override(&mut self, pillar: &str) -> bool {
        self.overrides.remove(pillar).is_some()
    }

    /// Drop every custom pillar and question. Overrides are kept.
    pub fn reset_custom(&mut self) {
        self.custom = CustomContent::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions_of<'a>(c: &'a Catalog, id: &str) -> Vec<&'a str> {
        c.get(id)
            .map(|e| e.questions.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn defaults_only() {
        let c = resolve_catalog(&CatalogLayers::default());
        assert_eq!(c.len(), 6);
        assert_eq!(c.total_questions(), 13);
        assert_eq!(c.question_count("sport"), Some(1));
    }

    #[test]
    fn empty_override_is_distinct_from_no_override() {
        let mut layers = CatalogLayers::default();
        layers.overrides.insert("social".into(), vec![]);
        let c = resolve_catalog(&layers);
        assert_eq!(c.question_count("social"), Some(0));
        assert_eq!(resolve_catalog(&CatalogLayers::default()).question_count("social"), Some(3));
    }

    #[test]
    fn override_replaces_then_custom_appends() {
        let mut layers = CatalogLayers::default();
        layers
            .set_default_override("stress", vec!["Pause ?".into()])
            .unwrap();
        layers.add_custom_question("stress", "Respiration ?", 10).unwrap();
        let c = layers.resolve();
        assert_eq!(questions_of(&c, "stress"), ["Pause ?", "Respiration ?"]);
    }

    #[test]
    fn unknown_pillar_question_gets_implicit_entry() {
        let mut layers = CatalogLayers::default();
        layers.custom.custom_questions.push(CustomQuestion {
            id: "custom_1".into(),
            pillar: "ghost".into(),
            question: "Still here?".into(),
        });
        let c = layers.resolve();
        assert_eq!(c.entries().last().map(|e| e.pillar.as_str()), Some("ghost"));
        assert_eq!(questions_of(&c, "ghost"), ["Still here?"]);
    }

    #[test]
    fn custom_pillars_follow_builtins_in_creation_order() {
        let mut layers = CatalogLayers::default();
        let a = layers.add_custom_pillar("Lecture", "📚", 100).unwrap();
        let b = layers.add_custom_pillar("Finances", "💰", 100).unwrap();
        assert_ne!(a, b, "colliding timestamps must still yield unique ids");
        let ids: Vec<_> = layers.resolve().pillar_ids().map(str::to_string).collect();
        assert_eq!(&ids[6..], [a, b]);
    }

    #[test]
    fn override_equal_to_default_is_dropped() {
        let mut layers = CatalogLayers::default();
        let sport = pillars::builtin("sport").unwrap().default_questions();
        layers.set_default_override("sport", sport).unwrap();
        assert!(layers.overrides.is_empty());
        assert!(layers.set_default_override("custom_1", vec![]).is_err());
    }

    #[test]
    fn duplicate_or_empty_pillar_names_rejected() {
        let mut layers = CatalogLayers::default();
        assert!(layers.add_custom_pillar("  ", "x", 1).is_err());
        assert!(layers.add_custom_pillar("sport", "x", 1).is_err());
        layers.add_custom_pillar("Lecture", "📚", 1).unwrap();
        assert!(layers.add_custom_pillar("LECTURE", "📚", 2).is_err());
    }

    #[test]
    fn display_names_fall_back_to_raw_id() {
        let mut layers = CatalogLayers::default();
        let id = layers.add_custom_pillar("Lecture", "📚", 5).unwrap();
        let names = layers.display_names();
        assert_eq!(names.display_name_for("sport"), "Sport 💪");
        assert_eq!(names.display_name_for(&id), "Lecture 📚");
        assert_eq!(names.display_name_for("mystery"), "mystery");
    }

    #[test]
    fn builtins_cannot_be_deleted() {
        let mut layers = CatalogLayers::default();
        assert!(layers.delete_custom_pillar("sport").is_err());
        assert!(layers.delete_custom_pillar("custom_404").is_err());
    }
}
