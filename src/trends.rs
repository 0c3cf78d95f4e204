//! # Trends
//! Per-day score series for the evolution chart, plus the derived summaries
//! shown next to it (average, trend, best day, insights) and the coefficient
//! advice helpers.
//!
//! Days without data score 0 and are excluded from averages/trends, which only
//! look at days with a non-zero global score.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::coefficients::PillarCoefficients;
use crate::journal::{date_key, DayResponses, Journal};
use crate::scoring::{ScoreContext, ScoreStrategy};

/// `days` consecutive date keys ending at (and including) `end`, oldest first.
pub fn date_range(end: NaiveDate, days: u32) -> Vec<String> {
    (0..days)
        .rev()
        .map(|back| date_key(end - Duration::days(i64::from(back))))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: String,
    pub global: i32,
    pub pillars: BTreeMap<String, i32>,
}

/// Scores for each day of the range; missing days are all zeros.
pub fn score_series(
    journal: &Journal,
    ctx: &ScoreContext<'_>,
    end: NaiveDate,
    days: u32,
    strategy: ScoreStrategy,
) -> Vec<SeriesPoint> {
    date_range(end, days)
        .into_iter()
        .map(|date| {
            let day = journal.day(&date);
            let scores = ctx.score_day(strategy, day);
            SeriesPoint {
                date,
                global: scores.global,
                pillars: scores
                    .pillars
                    .into_iter()
                    .map(|p| (p.pillar, p.score))
                    .collect(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestDay {
    pub date: String,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Rounded mean of non-zero global scores (0 if none).
    pub average: i32,
    /// Last minus first non-zero global score (0 with fewer than two).
    pub trend: i32,
    pub best_day: Option<BestDay>,
}

pub fn summarize(series: &[SeriesPoint]) -> TrendSummary {
    let valid: Vec<&SeriesPoint> = series.iter().filter(|p| p.global > 0).collect();

    let average = if valid.is_empty() {
        0
    } else {
        let sum: f64 = valid.iter().map(|p| f64::from(p.global)).sum();
        crate::scoring::round_score(sum / valid.len() as f64)
    };

    let trend = match (valid.first(), valid.last()) {
        (Some(first), Some(last)) if valid.len() >= 2 => last.global - first.global,
        _ => 0,
    };

    // First maximum wins on ties.
    let best_day = valid
        .iter()
        .copied()
        .fold(None::<&SeriesPoint>, |best, p| match best {
            Some(b) if b.global >= p.global => Some(b),
            _ => Some(p),
        })
        .map(|p| BestDay {
            date: p.date.clone(),
            score: p.global,
        });

    TrendSummary {
        average,
        trend,
        best_day,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Improvement,
    Decline,
    Achievement,
    Suggestion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pillar: Option<String>,
    pub value: f64,
}

const GLOBAL_SWING: i32 = 5;
const PILLAR_GAIN: i32 = 10;
const ACHIEVEMENT_SCORE: i32 = 80;
const LOW_PILLAR_AVG: f64 = 40.0;

/// Insights over a series. Each check needs at least two non-zero points.
pub fn insights(series: &[SeriesPoint]) -> Vec<Insight> {
    let mut out = Vec::new();
    let globals: Vec<i32> = series.iter().map(|p| p.global).filter(|g| *g > 0).collect();
    if globals.len() < 2 {
        return out;
    }

    let change = globals[globals.len() - 1] - globals[0];
    if change > GLOBAL_SWING {
        out.push(Insight {
            kind: InsightKind::Improvement,
            pillar: None,
            value: f64::from(change),
        });
    } else if change < -GLOBAL_SWING {
        out.push(Insight {
            kind: InsightKind::Decline,
            pillar: None,
            value: f64::from(change),
        });
    }

    let max = globals.iter().copied().max().unwrap_or(0);
    if max >= ACHIEVEMENT_SCORE {
        out.push(Insight {
            kind: InsightKind::Achievement,
            pillar: None,
            value: f64::from(max),
        });
    }

    let pillars: Vec<&String> = series
        .first()
        .map(|p| p.pillars.keys().collect())
        .unwrap_or_default();
    for pillar in pillars {
        let scores: Vec<i32> = series
            .iter()
            .filter_map(|p| p.pillars.get(pillar).copied())
            .filter(|s| *s > 0)
            .collect();
        if scores.len() < 2 {
            continue;
        }
        let gain = scores[scores.len() - 1] - scores[0];
        let avg = scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64;
        if gain > PILLAR_GAIN {
            out.push(Insight {
                kind: InsightKind::Improvement,
                pillar: Some(pillar.clone()),
                value: f64::from(gain),
            });
        } else if avg < LOW_PILLAR_AVG {
            out.push(Insight {
                kind: InsightKind::Suggestion,
                pillar: Some(pillar.clone()),
                value: avg,
            });
        }
    }

    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub pillar: String,
    pub score: i32,
    pub suggested_coefficient: f64,
}

/// Suggest raising the weight of weak pillars and lowering it for excellent ones
/// (plain pillar scores).
pub fn recommendations(day: Option<&DayResponses>, ctx: &ScoreContext<'_>) -> Vec<Recommendation> {
    if day.is_none() {
        return Vec::new();
    }
    ctx.catalog
        .pillar_ids()
        .filter_map(|pillar| {
            let score = ctx.pillar_score_plain(day, pillar);
            let suggested = if score < 40 {
                1.4
            } else if score > 90 {
                0.8
            } else {
                return None;
            };
            Some(Recommendation {
                pillar: pillar.to_string(),
                score,
                suggested_coefficient: suggested,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impact {
    pub before: i32,
    pub after: i32,
    pub difference: i32,
}

/// Pillar-weighted global score before and after merging `edits` into the
/// pillar coefficients. Works on a copy; stored coefficients are untouched.
pub fn simulate_impact(
    day: Option<&DayResponses>,
    ctx: &ScoreContext<'_>,
    edits: &BTreeMap<String, f64>,
) -> Impact {
    if day.is_none() {
        return Impact {
            before: 0,
            after: 0,
            difference: 0,
        };
    }
    let before = ctx.global_score_pillar_weighted(day);

    let mut trial: PillarCoefficients = ctx.pillar_coefficients.clone();
    trial.merge(edits.clone());
    let trial_ctx = ScoreContext::new(ctx.catalog, ctx.question_coefficients, &trial);
    let after = trial_ctx.global_score_pillar_weighted(day);

    Impact {
        before,
        after,
        difference: after - before,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogLayers;
    use crate::coefficients::QuestionCoefficients;

    fn point(date: &str, global: i32, sport: i32) -> SeriesPoint {
        SeriesPoint {
            date: date.into(),
            global,
            pillars: BTreeMap::from([("sport".to_string(), sport)]),
        }
    }

    #[test]
    fn range_is_oldest_first_and_inclusive() {
        let end = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(date_range(end, 3), ["2025-02-27", "2025-02-28", "2025-03-01"]);
        assert!(date_range(end, 0).is_empty());
    }

    #[test]
    fn summary_ignores_empty_days() {
        let s = vec![point("a", 0, 0), point("b", 60, 0), point("c", 0, 0), point("d", 71, 0)];
        let sum = summarize(&s);
        assert_eq!(sum.average, 66);
        assert_eq!(sum.trend, 11);
        assert_eq!(sum.best_day, Some(BestDay { date: "d".into(), score: 71 }));
    }

    #[test]
    fn insights_need_two_points() {
        assert!(insights(&[point("a", 90, 90)]).is_empty());
        let out = insights(&[point("a", 50, 20), point("b", 85, 45)]);
        let kinds: Vec<_> = out.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            [InsightKind::Improvement, InsightKind::Achievement, InsightKind::Improvement]
        );
        assert_eq!(out[2].pillar.as_deref(), Some("sport"));
    }

    #[test]
    fn low_pillar_gets_suggestion() {
        let out = insights(&[point("a", 30, 30), point("b", 31, 32)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, InsightKind::Suggestion);
    }

    #[test]
    fn simulation_leaves_context_untouched() {
        let catalog = CatalogLayers::default().resolve();
        let q = QuestionCoefficients::default();
        let p = PillarCoefficients::default();
        let ctx = ScoreContext::new(&catalog, &q, &p);
        let mut day = DayResponses::default();
        day.insert("sport", vec![100.0]);

        let edits = BTreeMap::from([("sport".to_string(), 2.0)]);
        let impact = simulate_impact(Some(&day), &ctx, &edits);
        // 100/6 → 17, then 200/7 → 29
        assert_eq!(impact, Impact { before: 17, after: 29, difference: 12 });
        assert!((p.get("sport") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn recommendations_flag_extremes() {
        let catalog = CatalogLayers::default().resolve();
        let q = QuestionCoefficients::default();
        let p = PillarCoefficients::default();
        let ctx = ScoreContext::new(&catalog, &q, &p);
        let mut day = DayResponses::default();
        day.insert("sport", vec![95.0]);
        day.insert("sommeil", vec![60.0]);
        let recs = recommendations(Some(&day), &ctx);
        let sport = recs.iter().find(|r| r.pillar == "sport").unwrap();
        assert!((sport.suggested_coefficient - 0.8).abs() < 1e-12);
        assert!(recs.iter().all(|r| r.pillar != "sommeil"));
        // untouched pillars score 0 and ask for more weight
        assert!(recs.iter().any(|r| r.pillar == "social" && r.score == 0));
        assert!(recommendations(None, &ctx).is_empty());
    }
}
