//! # Coefficients
//!
//! Importance weights applied when averaging responses.
//!
//! - Question coefficients are keyed `"{pillar}_{index}"`, where `index` is the
//!   position in the *resolved* catalog list for that pillar.
//! - Pillar coefficients (legacy, coarser) are keyed by pillar id.
//! - Any absent key weighs [`DEFAULT_COEFFICIENT`].
//!
//! The valid range is `[0.1, 2.0]`. Clamping happens at the input boundary
//! (HTTP handlers); the scorer uses whatever value it is given.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;

pub const MIN_COEFFICIENT: f64 = 0.1;
pub const MAX_COEFFICIENT: f64 = 2.0;
pub const DEFAULT_COEFFICIENT: f64 = 1.0;

/// Synthetic key used by the question coefficient map.
pub fn question_key(pillar: &str, index: usize) -> String {
    format!("{pillar}_{index}")
}

/// Clamp into `[MIN_COEFFICIENT, MAX_COEFFICIENT]`; non-finite input becomes the default.
pub fn clamp_coefficient(x: f64) -> f64 {
    if !x.is_finite() {
        return DEFAULT_COEFFICIENT;
    }
    x.clamp(MIN_COEFFICIENT, MAX_COEFFICIENT)
}

/// Question-level coefficients, persisted under `question-coefficients`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionCoefficients {
    map: BTreeMap<String, f64>,
}

impl QuestionCoefficients {
    pub fn from_map(map: BTreeMap<String, f64>) -> Self {
        Self { map }
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.map
    }

    pub fn get(&self, pillar: &str, index: usize) -> f64 {
        self.get_key(&question_key(pillar, index))
    }

    pub fn get_key(&self, key: &str) -> f64 {
        self.map.get(key).copied().unwrap_or(DEFAULT_COEFFICIENT)
    }

    pub fn set(&mut self, pillar: &str, index: usize, value: f64) {
        self.map.insert(question_key(pillar, index), value);
    }

    /// Merge explicit edits on top of the current map.
    pub fn merge(&mut self, edits: BTreeMap<String, f64>) {
        self.map.extend(edits);
    }

    /// Clear the whole map; every question falls back to the default.
    pub fn reset_all(&mut self) {
        self.map.clear();
    }

    /// Bulk-set every question of `pillar` to `value`. Later per-question edits override it.
    pub fn set_pillar(&mut self, catalog: &Catalog, pillar: &str, value: f64) {
        let count = catalog.question_count(pillar).unwrap_or(0);
        for i in 0..count {
            self.set(pillar, i, value);
        }
    }

    /// Reset every catalog question to the default, then apply the preset per pillar.
    /// Preset pillars absent from the catalog are ignored.
    pub fn apply_preset(&mut self, catalog: &Catalog, preset: &QuestionPreset) {
        for entry in catalog.entries() {
            self.set_pillar(catalog, &entry.pillar, DEFAULT_COEFFICIENT);
        }
        for (pillar, value) in preset.coefficients {
            self.set_pillar(catalog, pillar, *value);
        }
    }

    /// Mean coefficient across a pillar's questions (1.0 for unknown or empty pillars).
    pub fn pillar_importance(&self, catalog: &Catalog, pillar: &str) -> f64 {
        let count = catalog.question_count(pillar).unwrap_or(0);
        if count == 0 {
            return DEFAULT_COEFFICIENT;
        }
        let sum: f64 = (0..count).map(|i| self.get(pillar, i)).sum();
        sum / count as f64
    }

    /// How many stored keys differ from the default.
    pub fn modified_count(&self) -> usize {
        self.map
            .values()
            .filter(|v| (**v - DEFAULT_COEFFICIENT).abs() > f64::EPSILON)
            .count()
    }
}

/// Legacy pillar-level coefficients, persisted under `pillar-coefficients`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PillarCoefficients {
    map: BTreeMap<String, f64>,
}

impl PillarCoefficients {
    pub fn from_map(map: BTreeMap<String, f64>) -> Self {
        Self { map }
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.map
    }

    pub fn get(&self, pillar: &str) -> f64 {
        self.map.get(pillar).copied().unwrap_or(DEFAULT_COEFFICIENT)
    }

    pub fn set(&mut self, pillar: &str, value: f64) {
        self.map.insert(pillar.to_string(), value);
    }

    pub fn merge(&mut self, edits: BTreeMap<String, f64>) {
        self.map.extend(edits);
    }

    pub fn reset_all(&mut self) {
        self.map.clear();
    }

    /// Replace the map with the preset's values.
    pub fn apply_preset(&mut self, preset: &PillarPreset) {
        self.map = preset
            .coefficients
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
    }
}

/// Per-pillar preset applied to every question of each listed pillar.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QuestionPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub coefficients: &'static [(&'static str, f64)],
}

pub const QUESTION_PRESETS: [QuestionPreset; 4] = [
    QuestionPreset {
        id: "balanced",
        name: "Équilibré",
        description: "Tous les aspects ont la même importance",
        coefficients: &[],
    },
    QuestionPreset {
        id: "health",
        name: "Santé Physique",
        description: "Focus sur alimentation, sport et sommeil",
        coefficients: &[
            ("alimentation", 1.5),
            ("sport", 1.5),
            ("sommeil", 1.5),
            ("stress", 1.2),
            ("spiritualite", 0.8),
            ("social", 0.8),
        ],
    },
    QuestionPreset {
        id: "wellness",
        name: "Bien-être Mental",
        description: "Focus sur équilibre et spiritualité",
        coefficients: &[
            ("stress", 1.5),
            ("spiritualite", 1.5),
            ("social", 1.3),
            ("sommeil", 1.2),
            ("alimentation", 1.0),
            ("sport", 1.0),
        ],
    },
    QuestionPreset {
        id: "social",
        name: "Vie Sociale",
        description: "Focus sur relations et spiritualité",
        coefficients: &[
            ("social", 1.5),
            ("spiritualite", 1.3),
            ("stress", 1.2),
            ("alimentation", 1.0),
            ("sport", 1.0),
            ("sommeil", 1.0),
        ],
    },
];

pub fn question_preset(id: &str) -> Option<&'static QuestionPreset> {
    QUESTION_PRESETS.iter().find(|p| p.id == id)
}

/// Preset for the legacy pillar coefficient map.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PillarPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub coefficients: &'static [(&'static str, f64)],
}

pub const PILLAR_PRESETS: [PillarPreset; 5] = [
    PillarPreset {
        id: "default",
        name: "Équilibré",
        description: "Tous les piliers ont la même importance",
        coefficients: &[
            ("alimentation", 1.0),
            ("sport", 1.0),
            ("sommeil", 1.0),
            ("stress", 1.0),
            ("spiritualite", 1.0),
            ("social", 1.0),
        ],
    },
    PillarPreset {
        id: "wellness",
        name: "Bien-être physique",
        description: "Focus sur la santé physique",
        coefficients: &[
            ("alimentation", 1.3),
            ("sport", 1.4),
            ("sommeil", 1.3),
            ("stress", 1.1),
            ("spiritualite", 0.8),
            ("social", 0.9),
        ],
    },
    PillarPreset {
        id: "spiritual",
        name: "Développement spirituel",
        description: "Focus sur la spiritualité et l'équilibre mental",
        coefficients: &[
            ("alimentation", 1.0),
            ("sport", 0.9),
            ("sommeil", 1.1),
            ("stress", 1.2),
            ("spiritualite", 1.5),
            ("social", 1.1),
        ],
    },
    PillarPreset {
        id: "productivity",
        name: "Productivité",
        description: "Focus sur la performance et l'efficacité",
        coefficients: &[
            ("alimentation", 1.1),
            ("sport", 1.0),
            ("sommeil", 1.4),
            ("stress", 1.3),
            ("spiritualite", 0.8),
            ("social", 0.7),
        ],
    },
    PillarPreset {
        id: "social",
        name: "Vie sociale",
        description: "Focus sur les relations et le bien-être social",
        coefficients: &[
            ("alimentation", 1.0),
            ("sport", 0.9),
            ("sommeil", 1.0),
            ("stress", 1.0),
            ("spiritualite", 1.0),
            ("social", 1.4),
        ],
    },
];

pub fn pillar_preset(id: &str) -> Option<&'static PillarPreset> {
    PILLAR_PRESETS.iter().find(|p| p.id == id)
}

/// Coarse importance bucket shown next to a coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Critical,
    VeryImportant,
    Important,
    Normal,
    Secondary,
    Minimal,
}

pub fn importance_label(c: f64) -> Importance {
    if c >= 1.7 {
        Importance::Critical
    } else if c >= 1.4 {
        Importance::VeryImportant
    } else if c >= 1.1 {
        Importance::Important
    } else if c >= 0.9 {
        Importance::Normal
    } else if c >= 0.6 {
        Importance::Secondary
    } else {
        Importance::Minimal
    }
}
