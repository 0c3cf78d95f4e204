//! # Daily journal
//!
//! A day's responses map pillar id → ordered ratings in `[0, 100]`, positionally
//! aligned with the pillar's resolved questions *at the time of entry*. Arrays
//! may be shorter or longer than the current catalog; consumers treat missing
//! positions as absent.
//!
//! Decoding is lenient: a non-array pillar field is dropped, a non-numeric
//! element reads as 0 and a finite element outside `[0, 100]` is clamped, so
//! stored or submitted data can never break scoring.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::Catalog;

/// Neutral slider value used for unanswered questions.
pub const NEUTRAL_RESPONSE: f64 = 50.0;
pub const MIN_RESPONSE: f64 = 0.0;
pub const MAX_RESPONSE: f64 = 100.0;

/// `YYYY-MM-DD` for the local wall-clock date, read fresh on every call.
pub fn today_key() -> String {
    date_key(Local::now().date_naive())
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

/// One day of responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DayResponses {
    pillars: BTreeMap<String, Vec<f64>>,
}

impl<'de> Deserialize<'de> for DayResponses {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(Self::from_raw(raw))
    }
}

impl DayResponses {
    pub fn from_raw(raw: BTreeMap<String, serde_json::Value>) -> Self {
        let pillars = raw
            .into_iter()
            .filter_map(|(pillar, value)| {
                let arr = value.as_array()?;
                let ratings = arr
                    .iter()
                    .map(|v| {
                        v.as_f64()
                            .filter(|x| x.is_finite())
                            .map_or(0.0, |x| x.clamp(MIN_RESPONSE, MAX_RESPONSE))
                    })
                    .collect();
                Some((pillar, ratings))
            })
            .collect();
        Self { pillars }
    }

    pub fn from_map(pillars: BTreeMap<String, Vec<f64>>) -> Self {
        Self { pillars }
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.pillars
    }

    /// Ratings recorded for `pillar`, if any.
    pub fn pillar(&self, pillar: &str) -> Option<&[f64]> {
        self.pillars.get(pillar).map(Vec::as_slice)
    }

    pub fn insert(&mut self, pillar: impl Into<String>, ratings: Vec<f64>) {
        self.pillars.insert(pillar.into(), ratings);
    }

    pub fn is_empty(&self) -> bool {
        self.pillars.is_empty()
    }

    /// Set one rating, clamped to `[0, 100]`. `index` must address one of the
    /// pillar's catalog questions; the array is padded with the neutral value
    /// up to the catalog length first. Nothing changes on error.
    pub fn set_response(
        &mut self,
        catalog: &Catalog,
        pillar: &str,
        index: usize,
        value: f64,
    ) -> Result<()> {
        let Some(count) = catalog.question_count(pillar) else {
            bail!("unknown pillar '{pillar}'");
        };
        if index >= count {
            bail!("question index {index} out of range for '{pillar}' ({count} questions)");
        }
        let value = if value.is_finite() {
            value.clamp(MIN_RESPONSE, MAX_RESPONSE)
        } else {
            NEUTRAL_RESPONSE
        };
        let ratings = self.pillars.entry(pillar.to_string()).or_default();
        if ratings.len() < count {
            ratings.resize(count, NEUTRAL_RESPONSE);
        }
        ratings[index] = value;
        Ok(())
    }
}

/// A fresh day with every catalog question at the neutral value.
pub fn blank_day(catalog: &Catalog) -> DayResponses {
    let pillars = catalog
        .entries()
        .iter()
        .map(|e| (e.pillar.clone(), vec![NEUTRAL_RESPONSE; e.questions.len()]))
        .collect();
    DayResponses { pillars }
}

/// All recorded days, keyed by `YYYY-MM-DD`. Persisted under `wellness-data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Journal {
    days: BTreeMap<String, DayResponses>,
}

impl<'de> Deserialize<'de> for Journal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        // A day that is not an object is treated as absent.
        let days = raw
            .into_iter()
            .filter_map(|(date, value)| match value {
                serde_json::Value::Object(obj) => {
                    Some((date, DayResponses::from_raw(obj.into_iter().collect())))
                }
                _ => None,
            })
            .collect();
        Ok(Self { days })
    }
}

impl Journal {
    pub fn day(&self, date: &str) -> Option<&DayResponses> {
        self.days.get(date)
    }

    /// Store `day` under `date`, replacing whatever was there (last writer wins).
    pub fn record(&mut self, date: impl Into<String>, day: DayResponses) {
        self.days.insert(date.into(), day);
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.days.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DayResponses)> {
        self.days.iter()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogLayers;

    #[test]
    fn lenient_decode_drops_non_arrays_and_zeroes_junk() {
        let day: DayResponses =
            serde_json::from_str(r#"{"sport":[80,"x",null,500,-40],"sommeil":"bad","social":[]}"#)
                .unwrap();
        assert_eq!(day.pillar("sport"), Some(&[80.0, 0.0, 0.0, 100.0, 0.0][..]));
        assert_eq!(day.pillar("sommeil"), None);
        assert_eq!(day.pillar("social"), Some(&[][..]));
    }

    #[test]
    fn journal_skips_days_that_are_not_objects() {
        let j: Journal =
            serde_json::from_str(r#"{"2025-01-01":{"sport":[10]},"2025-01-02":42}"#).unwrap();
        assert_eq!(j.len(), 1);
        assert!(j.day("2025-01-02").is_none());
    }

    #[test]
    fn blank_day_uses_neutral_value() {
        let catalog = CatalogLayers::default().resolve();
        let day = blank_day(&catalog);
        assert_eq!(day.pillar("alimentation"), Some(&[50.0, 50.0, 50.0][..]));
    }

    #[test]
    fn set_response_pads_and_clamps() {
        let catalog = CatalogLayers::default().resolve();
        let mut day = DayResponses::default();
        day.set_response(&catalog, "stress", 1, 140.0).unwrap();
        assert_eq!(day.pillar("stress"), Some(&[50.0, 100.0][..]));
        day.set_response(&catalog, "stress", 0, -3.0).unwrap();
        assert_eq!(day.pillar("stress"), Some(&[0.0, 100.0][..]));
    }

    #[test]
    fn set_response_rejects_positions_outside_the_catalog() {
        let catalog = CatalogLayers::default().resolve();
        let mut day = DayResponses::default();
        day.insert("sport", vec![70.0]);
        assert!(day.set_response(&catalog, "sport", 1, 90.0).is_err());
        assert!(day.set_response(&catalog, "sport", usize::MAX, 90.0).is_err());
        assert!(day.set_response(&catalog, "ghost", 0, 90.0).is_err());
        assert_eq!(day.pillar("sport"), Some(&[70.0][..]));
        assert_eq!(day.pillar("ghost"), None);
    }

    #[test]
    fn set_response_pads_a_short_array_to_the_catalog() {
        let catalog = CatalogLayers::default().resolve();
        let mut day = DayResponses::default();
        day.insert("alimentation", vec![20.0]);
        day.set_response(&catalog, "alimentation", 2, 80.0).unwrap();
        assert_eq!(day.pillar("alimentation"), Some(&[20.0, 50.0, 80.0][..]));
    }

    #[test]
    fn date_keys_round_trip() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(date_key(d), "2025-03-07");
        assert_eq!(parse_date_key("2025-03-07"), Some(d));
        assert_eq!(parse_date_key("07/03/2025"), None);
        assert_eq!(today_key().len(), 10);
    }
}
