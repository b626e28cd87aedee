//! The hospital record model shared by every pipeline stage.
//!
//! Records are built once per ingested result set and never mutated afterwards.
//! Optional structures (`ratings`, `statistics`, `distance`) stay optional here;
//! consumers substitute neutral defaults through the accessor methods instead of
//! unwrapping.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static regex should compile"));

/// Normalise a hospital name for identity purposes.
///
/// Lowercases, collapses every run of punctuation and whitespace into a single
/// space and trims the result, so `"St. Mary's  Hospital"` and
/// `"st marys hospital"` only differ by the apostrophe split.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    NON_ALNUM
        .replace_all(&name.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Quality label attached to a hospital by the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    #[default]
    Unknown,
}

impl PerformanceLevel {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::NeedsImprovement => "Needs Improvement",
            Self::Unknown => "Unknown",
        }
    }
}

impl FromStr for PerformanceLevel {
    type Err = std::convert::Infallible;

    /// Case-insensitive; anything unrecognised is `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match normalize_name(s).as_str() {
            "excellent" => Self::Excellent,
            "good" => Self::Good,
            "fair" => Self::Fair,
            "needs improvement" => Self::NeedsImprovement,
            _ => Self::Unknown,
        };
        Ok(level)
    }
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Postal address of a hospital.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub county: String,
}

/// Scale the upstream source used for rating values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RatingScale {
    /// 0 to 5 stars
    #[default]
    Stars,
    /// 0 to 100 percent
    Percent,
}

/// A named sub-measure such as `safety` or `readmission`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measure {
    pub name: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ratings {
    pub scale: RatingScale,
    pub overall: Option<f64>,
    pub measures: Vec<Measure>,
}

impl Ratings {
    /// Overall rating expressed on the 0-5 star scale regardless of source scale.
    #[must_use]
    pub fn overall_stars(&self) -> Option<f64> {
        self.overall.map(|value| match self.scale {
            RatingScale::Stars => value,
            RatingScale::Percent => value / 20.0,
        })
    }

    /// Look up a sub-measure by name (case-insensitive).
    #[must_use]
    pub fn measure(&self, name: &str) -> Option<f64> {
        self.measures
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .and_then(|m| m.value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeasurementPeriod {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Statistical context behind a hospital's score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    /// Number of cases the score was computed over (the measure denominator)
    pub sample_size: Option<u32>,
    /// Lower bound of the confidence interval
    pub lower_estimate: Option<f64>,
    /// Upper bound of the confidence interval
    pub upper_estimate: Option<f64>,
    /// Free-text comparison against the national rate
    pub national_comparison: Option<String>,
    pub measurement_period: Option<MeasurementPeriod>,
}

/// Identity of a record within one result set.
///
/// Upstream identifiers are not guaranteed unique across categories, so the
/// key combines the id with the normalised name and the zip code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordKey {
    id: String,
    name: String,
    zip: String,
}

impl RecordKey {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.id, self.name, self.zip)
    }
}

/// A single hospital returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalRecord {
    pub id: String,
    pub name: String,
    pub address: Address,
    /// Source metric; whether lower or higher is better is a session setting
    pub score: f64,
    pub has_data: bool,
    pub performance_level: PerformanceLevel,
    /// Distance from the searcher in miles, only when the source supplied one
    pub distance: Option<f64>,
    pub ratings: Option<Ratings>,
    pub statistics: Option<Statistics>,
    pub description: Option<String>,
    pub specialties: Vec<String>,
    /// Named outcome scores such as `mortality` or `readmission`
    pub measure_scores: Vec<Measure>,
}

impl HospitalRecord {
    /// Create a record with the given identity and neutral defaults everywhere else.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: Address::default(),
            score: 0.0,
            has_data: false,
            performance_level: PerformanceLevel::Unknown,
            distance: None,
            ratings: None,
            statistics: None,
            description: None,
            specialties: Vec::new(),
            measure_scores: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, city: impl Into<String>, state: impl Into<String>) -> Self {
        self.address.city = city.into();
        self.address.state = state.into();
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    /// Set the score and mark the record as carrying data.
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self.has_data = true;
        self
    }

    #[must_use]
    pub fn with_has_data(mut self, has_data: bool) -> Self {
        self.has_data = has_data;
        self
    }

    #[must_use]
    pub fn with_performance_level(mut self, level: PerformanceLevel) -> Self {
        self.performance_level = level;
        self
    }

    #[must_use]
    pub fn with_distance(mut self, miles: f64) -> Self {
        self.distance = Some(miles);
        self
    }

    /// Attach a star-scale overall rating.
    #[must_use]
    pub fn with_overall_rating(mut self, stars: f64) -> Self {
        let ratings = self.ratings.get_or_insert_with(Ratings::default);
        ratings.scale = RatingScale::Stars;
        ratings.overall = Some(stars);
        self
    }

    #[must_use]
    pub fn with_ratings(mut self, ratings: Ratings) -> Self {
        self.ratings = Some(ratings);
        self
    }

    #[must_use]
    pub fn with_statistics(mut self, statistics: Statistics) -> Self {
        self.statistics = Some(statistics);
        self
    }

    #[must_use]
    pub fn with_specialties<I, S>(mut self, specialties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.specialties = specialties.into_iter().map(Into::into).collect();
        self
    }

    /// Look up a named outcome score (case-insensitive).
    #[must_use]
    pub fn measure_score(&self, name: &str) -> Option<f64> {
        self.measure_scores
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .and_then(|m| m.value)
    }

    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey {
            id: self.id.clone(),
            name: normalize_name(&self.name),
            zip: self.address.zip.trim().to_string(),
        }
    }

    #[must_use]
    pub fn city(&self) -> &str {
        &self.address.city
    }

    #[must_use]
    pub fn state(&self) -> &str {
        &self.address.state
    }

    /// Overall rating on the star scale, `0.0` when the source gave none.
    #[must_use]
    pub fn overall_rating(&self) -> f64 {
        self.ratings
            .as_ref()
            .and_then(Ratings::overall_stars)
            .unwrap_or(0.0)
    }
}

impl fmt::Display for HospitalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HospitalRecord {{ id: {}, name: \"{}\", city: \"{}\", state: \"{}\" }}",
            self.id, self.name, self.address.city, self.address.state
        )
    }
}
