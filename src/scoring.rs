//! # Weighted score aggregation
//!
//! Two strategies coexist and must not be merged:
//!
//! - [`ScoreStrategy::PillarWeighted`] (legacy): pillar score is the plain mean
//!   of its ratings; the global score is the pillar-coefficient weighted mean
//!   of the *unrounded* pillar means, over every catalog pillar. Missing
//!   pillars count as 0 and pull the global score down.
//! - [`ScoreStrategy::QuestionWeighted`] (preferred): every rating carries its
//!   own coefficient `"{pillar}_{index}"`; pillar score is the weighted mean of
//!   the pillar's ratings; the global score is one flat weighted mean across
//!   every rating of every pillar (not a mean of pillar scores).
//!
//! Every function here is total: absent days, absent pillars, empty arrays and
//! zero coefficient sums all yield 0. Rounding is half-up, applied once per
//! exposed value.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::coefficients::{PillarCoefficients, QuestionCoefficients};
use crate::journal::DayResponses;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStrategy {
    PillarWeighted,
    #[default]
    QuestionWeighted,
}

impl ScoreStrategy {
    /// Accepts `pillar`/`pillar_weighted` and `question`/`question_weighted`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pillar" | "pillar_weighted" | "a" => Some(Self::PillarWeighted),
            "question" | "question_weighted" | "b" => Some(Self::QuestionWeighted),
            _ => None,
        }
    }
}

/// Everything the scorer reads. Borrowed; scoring never mutates.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub catalog: &'a Catalog,
    pub question_coefficients: &'a QuestionCoefficients,
    pub pillar_coefficients: &'a PillarCoefficients,
}

/// Scores of one day under one strategy, pillars in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayScores {
    pub strategy: ScoreStrategy,
    pub global: i32,
    pub pillars: Vec<PillarScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarScore {
    pub pillar: String,
    pub score: i32,
}

impl DayScores {
    pub fn pillar(&self, pillar: &str) -> Option<i32> {
        self.pillars
            .iter()
            .find(|p| p.pillar == pillar)
            .map(|p| p.score)
    }
}

/// Half-up rounding to an integer score; non-finite input becomes 0.
pub fn round_score(x: f64) -> i32 {
    if !x.is_finite() {
        return 0;
    }
    (x + 0.5).floor() as i32
}

/// `num / den`, or 0 when the denominator is zero or the result is not finite.
fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        return 0.0;
    }
    let q = num / den;
    if q.is_finite() {
        q
    } else {
        0.0
    }
}

fn sanitize(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

impl<'a> ScoreContext<'a> {
    pub fn new(
        catalog: &'a Catalog,
        question_coefficients: &'a QuestionCoefficients,
        pillar_coefficients: &'a PillarCoefficients,
    ) -> Self {
        Self {
            catalog,
            question_coefficients,
            pillar_coefficients,
        }
    }

    /// Ratings of `pillar` that map onto a current catalog position.
    /// Pillars the catalog does not know keep their whole array.
    fn present<'d>(&self, day: Option<&'d DayResponses>, pillar: &str) -> &'d [f64] {
        let Some(ratings) = day.and_then(|d| d.pillar(pillar)) else {
            return &[];
        };
        match self.catalog.question_count(pillar) {
            Some(n) => &ratings[..ratings.len().min(n)],
            None => ratings,
        }
    }

    // ---- Mode A: pillar-level weighting ----

    /// Unrounded mean of the pillar's present ratings (0 when none).
    pub fn pillar_average(&self, day: Option<&DayResponses>, pillar: &str) -> f64 {
        let ratings = self.present(day, pillar);
        let sum: f64 = ratings.iter().copied().map(sanitize).sum();
        safe_div(sum, ratings.len() as f64)
    }

    pub fn pillar_score_plain(&self, day: Option<&DayResponses>, pillar: &str) -> i32 {
        round_score(self.pillar_average(day, pillar))
    }

    /// Σ(avg_p · c_p) / Σ(c_p) over every catalog pillar, rounded once.
    pub fn global_score_pillar_weighted(&self, day: Option<&DayResponses>) -> i32 {
        let (num, den) = self
            .catalog
            .pillar_ids()
            .fold((0.0, 0.0), |(num, den), pillar| {
                let c = sanitize(self.pillar_coefficients.get(pillar));
                (num + self.pillar_average(day, pillar) * c, den + c)
            });
        round_score(safe_div(num, den))
    }

    // ---- Mode B: question-level weighting ----

    /// (Σ r·c, Σ c) over the pillar's present ratings.
    fn weighted_sums(&self, day: Option<&DayResponses>, pillar: &str) -> (f64, f64) {
        self.present(day, pillar)
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (i, r)| {
                let c = sanitize(self.question_coefficients.get(pillar, i));
                (num + sanitize(*r) * c, den + c)
            })
    }

    pub fn pillar_score_question_weighted(&self, day: Option<&DayResponses>, pillar: &str) -> i32 {
        let (num, den) = self.weighted_sums(day, pillar);
        round_score(safe_div(num, den))
    }

    /// Grand weighted mean of every rating of every catalog pillar.
    pub fn global_score_question_weighted(&self, day: Option<&DayResponses>) -> i32 {
        let (num, den) = self
            .catalog
            .pillar_ids()
            .map(|pillar| self.weighted_sums(day, pillar))
            .fold((0.0, 0.0), |(n, d), (pn, pd)| (n + pn, d + pd));
        round_score(safe_div(num, den))
    }

    // ---- Strategy dispatch ----

    pub fn pillar_score(
        &self,
        strategy: ScoreStrategy,
        day: Option<&DayResponses>,
        pillar: &str,
    ) -> i32 {
        match strategy {
            ScoreStrategy::PillarWeighted => self.pillar_score_plain(day, pillar),
            ScoreStrategy::QuestionWeighted => self.pillar_score_question_weighted(day, pillar),
        }
    }

    pub fn global_score(&self, strategy: ScoreStrategy, day: Option<&DayResponses>) -> i32 {
        match strategy {
            ScoreStrategy::PillarWeighted => self.global_score_pillar_weighted(day),
            ScoreStrategy::QuestionWeighted => self.global_score_question_weighted(day),
        }
    }

    /// Pillar scores in catalog order plus the global score.
    pub fn score_day(&self, strategy: ScoreStrategy, day: Option<&DayResponses>) -> DayScores {
        let pillars = self
            .catalog
            .pillar_ids()
            .map(|pillar| PillarScore {
                pillar: pillar.to_string(),
                score: self.pillar_score(strategy, day, pillar),
            })
            .collect();
        DayScores {
            strategy,
            global: self.global_score(strategy, day),
            pillars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogLayers;

    fn sample_day() -> DayResponses {
        let mut d = DayResponses::default();
        d.insert("alimentation", vec![80.0, 60.0, 100.0]);
        d.insert("sport", vec![50.0]);
        d
    }

    #[test]
    fn mode_a_scenario() {
        let catalog = CatalogLayers::default().resolve();
        let (q, p) = (QuestionCoefficients::default(), PillarCoefficients::default());
        let ctx = ScoreContext::new(&catalog, &q, &p);
        let day = sample_day();

        let s = ctx.score_day(ScoreStrategy::PillarWeighted, Some(&day));
        assert_eq!(s.pillar("alimentation"), Some(80));
        assert_eq!(s.pillar("sport"), Some(50));
        assert_eq!(s.pillar("sommeil"), Some(0));
        assert_eq!(s.global, 22);
    }

    #[test]
    fn mode_b_scenario() {
        let catalog = CatalogLayers::default().resolve();
        let mut q = QuestionCoefficients::default();
        q.set("alimentation", 0, 2.0);
        q.set("alimentation", 1, 1.0);
        q.set("alimentation", 2, 1.0);
        let p = PillarCoefficients::default();
        let ctx = ScoreContext::new(&catalog, &q, &p);
        let day = sample_day();

        // (80*2 + 60 + 100) / 4
        assert_eq!(ctx.pillar_score_question_weighted(Some(&day), "alimentation"), 80);
        // (320 + 50) / (4 + 1)
        assert_eq!(ctx.global_score_question_weighted(Some(&day)), 74);
    }

    #[test]
    fn absent_everything_is_zero() {
        let catalog = CatalogLayers::default().resolve();
        let (q, p) = (QuestionCoefficients::default(), PillarCoefficients::default());
        let ctx = ScoreContext::new(&catalog, &q, &p);
        for strategy in [ScoreStrategy::PillarWeighted, ScoreStrategy::QuestionWeighted] {
            let s = ctx.score_day(strategy, None);
            assert_eq!(s.global, 0);
            assert!(s.pillars.iter().all(|p| p.score == 0));
        }
    }

    #[test]
    fn zero_coefficients_do_not_divide_by_zero() {
        let catalog = CatalogLayers::default().resolve();
        let mut q = QuestionCoefficients::default();
        q.set("sport", 0, 0.0);
        let p = PillarCoefficients::default();
        let ctx = ScoreContext::new(&catalog, &q, &p);
        let mut day = DayResponses::default();
        day.insert("sport", vec![90.0]);
        assert_eq!(ctx.pillar_score_question_weighted(Some(&day), "sport"), 0);
        assert_eq!(ctx.global_score_question_weighted(Some(&day)), 0);
    }

    #[test]
    fn positions_beyond_catalog_are_absent() {
        let catalog = CatalogLayers::default().resolve();
        let (q, p) = (QuestionCoefficients::default(), PillarCoefficients::default());
        let ctx = ScoreContext::new(&catalog, &q, &p);
        let mut day = DayResponses::default();
        // sport has one question; the trailing 0 was recorded under an older catalog.
        day.insert("sport", vec![80.0, 0.0]);
        assert_eq!(ctx.pillar_score_plain(Some(&day), "sport"), 80);
        assert_eq!(ctx.pillar_score_question_weighted(Some(&day), "sport"), 80);
    }

    #[test]
    fn half_up_rounding() {
        assert_eq!(round_score(74.5), 75);
        assert_eq!(round_score(74.49), 74);
        assert_eq!(round_score(f64::NAN), 0);
    }

    #[test]
    fn strategy_parse() {
        assert_eq!(ScoreStrategy::parse("Pillar"), Some(ScoreStrategy::PillarWeighted));
        assert_eq!(ScoreStrategy::parse("question_weighted"), Some(ScoreStrategy::QuestionWeighted));
        assert_eq!(ScoreStrategy::parse("median"), None);
    }
}
