//! # Built-in Pillars
//!
//! The closed set of six pillars shipped with the app, in their declared
//! order, together with display names, glyphs and default question lists.
//!
//! Built-in pillars are never deleted. Their question lists can be replaced
//! wholesale by a user override (see [`crate::catalog`]).

/// A built-in pillar and its shipped question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinPillar {
    pub id: &'static str,
    pub name: &'static str,
    pub glyph: &'static str,
    pub questions: &'static [&'static str],
}

impl BuiltinPillar {
    /// `"{name} {glyph}"`, the label used everywhere a pillar is shown.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.glyph)
    }

    pub fn default_questions(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.to_string()).collect()
    }
}

pub const BUILTIN_PILLARS: [BuiltinPillar; 6] = [
    BuiltinPillar {
        id: "alimentation",
        name: "Alimentation",
        glyph: "🥗",
        questions: &[
            "Ai-je évité le sucre, le pain blanc et les aliments transformés ?",
            "Ai-je consommé suffisamment de légumes, fruits et de l'eau ?",
            "Ai-je consommé assez de protéines aujourd'hui ?",
        ],
    },
    BuiltinPillar {
        id: "sport",
        name: "Sport",
        glyph: "💪",
        questions: &["Ai-je fait une séance de sport aujourd'hui ?"],
    },
    BuiltinPillar {
        id: "sommeil",
        name: "Sommeil",
        glyph: "😴",
        questions: &["Ai-je bien dormi (quantité et qualité) ?"],
    },
    BuiltinPillar {
        id: "stress",
        name: "Stress / Équilibre",
        glyph: "🧘",
        questions: &[
            "Ai-je bien géré mon temps d'écran ?",
            "Ai-je protégé mes 5 sens (langue, yeux, pensées, etc.) ?",
        ],
    },
    BuiltinPillar {
        id: "spiritualite",
        name: "Spiritualité",
        glyph: "🕌",
        questions: &[
            "Ai-je accompli mes 5 prières à l'heure, dont 3 en groupe ?",
            "Ai-je respecté mon programme de Coran (lecture, mémorisation) ?",
            "Ai-je récité les doâs du matin et du soir ?",
        ],
    },
    BuiltinPillar {
        id: "social",
        name: "Social",
        glyph: "❤️",
        questions: &[
            "Ai-je été utile à ma famille ou mon entourage ?",
            "Ai-je aidé quelqu'un aujourd'hui (même petit geste) ?",
            "Ai-je été bienveillant dans mes interactions ?",
        ],
    },
];

/// Look up a built-in pillar by id (exact match).
pub fn builtin(id: &str) -> Option<&'static BuiltinPillar> {
    BUILTIN_PILLARS.iter().find(|p| p.id == id)
}

pub fn is_builtin(id: &str) -> bool {
    builtin(id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_order_is_stable() {
        let ids: Vec<_> = BUILTIN_PILLARS.iter().map(|p| p.id).collect();
        assert_eq!(
            ids,
            ["alimentation", "sport", "sommeil", "stress", "spiritualite", "social"]
        );
    }

    #[test]
    fn question_counts_match_shipped_lists() {
        let counts: Vec<_> = BUILTIN_PILLARS.iter().map(|p| p.questions.len()).collect();
        assert_eq!(counts, [3, 1, 1, 2, 3, 3]);
    }

    #[test]
    fn lookup_is_exact() {
        assert!(is_builtin("sport"));
        assert!(!is_builtin("Sport"));
        assert_eq!(builtin("sommeil").map(|p| p.display_name()).as_deref(), Some("Sommeil 😴"));
    }
}
