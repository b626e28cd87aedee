//! Total ordering of filtered results.
//!
//! Every sort is stable and returns a new sequence; the input is untouched.
//! Records that compare equal under the selected key keep their input order,
//! which for the session is the city, state, other concatenation.

use std::{cmp::Ordering, fmt, str::FromStr};

use carefinder_data::HospitalRecord;
use tracing::instrument;

use crate::{
    classify::casefold,
    filter::{FilterError, FilterField},
};

/// Key the results are ordered by.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    /// Records with data first, then by score in the session's polarity
    #[default]
    Score,
    Name,
    /// Nearest first; records without a distance last
    Distance,
    /// Highest overall rating first; unrated counts as 0
    Rating,
}

impl SortKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::Name => "name",
            Self::Distance => "distance",
            Self::Rating => "rating",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "score" => Ok(Self::Score),
            "name" => Ok(Self::Name),
            "distance" => Ok(Self::Distance),
            "rating" => Ok(Self::Rating),
            _ => Err(FilterError::UnknownValue {
                field: FilterField::SortBy,
                value: s.to_string(),
            }),
        }
    }
}

/// Which direction of `score` counts as better.
///
/// Sources disagree (mortality-risk style scores are better when lower,
/// percentage scores when higher), so a session picks one and every score
/// comparison it makes goes through it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScorePolarity {
    #[default]
    LowerIsBetter,
    HigherIsBetter,
}

impl ScorePolarity {
    /// Order two scores best-first.
    #[must_use]
    pub fn compare(self, a: f64, b: f64) -> Ordering {
        match self {
            Self::LowerIsBetter => a.total_cmp(&b),
            Self::HigherIsBetter => b.total_cmp(&a),
        }
    }
}

fn by_score(a: &HospitalRecord, b: &HospitalRecord, polarity: ScorePolarity) -> Ordering {
    // Records without data trail regardless of score.
    b.has_data
        .cmp(&a.has_data)
        .then_with(|| polarity.compare(a.score, b.score))
}

fn by_name(a: &HospitalRecord, b: &HospitalRecord) -> Ordering {
    casefold(&a.name)
        .cmp(&casefold(&b.name))
        .then_with(|| a.name.cmp(&b.name))
}

fn by_rating(a: &HospitalRecord, b: &HospitalRecord) -> Ordering {
    b.overall_rating().total_cmp(&a.overall_rating())
}

fn by_distance(a: &HospitalRecord, b: &HospitalRecord) -> Ordering {
    let a = a.distance.unwrap_or(f64::INFINITY);
    let b = b.distance.unwrap_or(f64::INFINITY);
    a.total_cmp(&b)
}

/// Compare two records under `key`; `Equal` means "keep input order".
#[must_use]
pub fn compare(
    a: &HospitalRecord,
    b: &HospitalRecord,
    key: SortKey,
    polarity: ScorePolarity,
) -> Ordering {
    match key {
        SortKey::Score => by_score(a, b, polarity),
        SortKey::Name => by_name(a, b),
        SortKey::Rating => by_rating(a, b),
        SortKey::Distance => by_distance(a, b),
    }
}

/// Return a new, stably sorted copy of `records`.
#[instrument(name = "Sort", level = "debug", skip(records), fields(num_records = records.len()))]
pub fn sort_records(
    records: &[HospitalRecord],
    key: SortKey,
    polarity: ScorePolarity,
) -> Vec<HospitalRecord> {
    let mut sorted = records.to_vec();
    sort_in_place(&mut sorted, key, polarity);
    sorted
}

/// Stable in-place variant for callers that already own a fresh vector.
pub fn sort_in_place(records: &mut [HospitalRecord], key: SortKey, polarity: ScorePolarity) {
    if key == SortKey::Name {
        // Fold each name once rather than per comparison.
        records.sort_by_cached_key(|r| (casefold(&r.name), r.name.clone()));
    } else {
        records.sort_by(|a, b| compare(a, b, key, polarity));
    }
}
