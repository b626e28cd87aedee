//! Wire types for hospital records as returned by the search API.
//!
//! The API is loose about types: identifiers arrive as numbers or strings,
//! statistics arrive as strings, and ratings are an open map of measures. These
//! types accept all of that and convert into [`HospitalRecord`] with neutral
//! defaults for anything absent or unreadable.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::record::{
    Address, HospitalRecord, Measure, MeasurementPeriod, PerformanceLevel, RatingScale, Ratings,
    Statistics,
};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Interpret a JSON value as a number, accepting numeric strings such as `"12.5"` or `"87%"`.
#[must_use]
pub fn number_from_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Parse a measurement date in ISO or US notation.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, found {other}"
        ))),
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    }))
}

/// A list of strings, a lone string, or null.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let strings = match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => vec![s],
        _ => Vec::new(),
    };
    Ok(strings
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn null_as_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeasurementPeriod {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatistics {
    #[serde(default)]
    pub national_comparison: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "sampleSize")]
    pub denominator: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lower_estimate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "upperEstimate")]
    pub higher_estimate: Option<f64>,
    #[serde(default)]
    pub measurement_period: Option<RawMeasurementPeriod>,
}

impl From<RawStatistics> for Statistics {
    fn from(raw: RawStatistics) -> Self {
        Self {
            sample_size: raw
                .denominator
                .filter(|n| *n >= 0.0 && *n <= f64::from(u32::MAX))
                .map(|n| n.round() as u32),
            lower_estimate: raw.lower_estimate,
            upper_estimate: raw.higher_estimate,
            national_comparison: non_blank(raw.national_comparison),
            measurement_period: raw.measurement_period.map(|p| MeasurementPeriod {
                start: p.start.as_deref().and_then(parse_date),
                end: p.end.as_deref().and_then(parse_date),
            }),
        }
    }
}

/// Hospital record exactly as the search API sends it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHospital {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default", alias = "zip")]
    pub zip_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub county: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_data: Option<bool>,
    #[serde(default)]
    pub performance_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub distance: Option<f64>,
    /// `overall` plus any number of named sub-measures
    #[serde(default)]
    pub ratings: Option<Map<String, Value>>,
    #[serde(default)]
    pub statistics: Option<RawStatistics>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub specialties: Vec<String>,
    /// Top-level comparison label some sources send instead of `statistics.nationalComparison`
    #[serde(default)]
    pub compared_to_national: Option<String>,
    #[serde(default)]
    pub measure_scores: Option<Map<String, Value>>,
    /// Bucket assigned by the server; ignored, relevance is always recomputed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_relevance: Option<String>,
}

fn measures_from_map(map: &Map<String, Value>) -> Vec<Measure> {
    map.iter()
        .map(|(name, value)| Measure {
            name: name.clone(),
            value: number_from_value(value),
        })
        .collect()
}

fn ratings_from_map(map: &Map<String, Value>) -> Ratings {
    let mut overall = None;
    let mut measures = Vec::with_capacity(map.len());
    for (name, value) in map {
        let value = number_from_value(value);
        if name.eq_ignore_ascii_case("overall") {
            overall = value;
        } else {
            measures.push(Measure {
                name: name.clone(),
                value,
            });
        }
    }
    let exceeds_stars = overall
        .into_iter()
        .chain(measures.iter().filter_map(|m| m.value))
        .any(|v| v > 5.0);
    Ratings {
        scale: if exceeds_stars {
            RatingScale::Percent
        } else {
            RatingScale::Stars
        },
        overall,
        measures,
    }
}

impl From<RawHospital> for HospitalRecord {
    fn from(raw: RawHospital) -> Self {
        // A source that omits the flag still tells us whether it had a score.
        let has_data = raw.has_data.unwrap_or(raw.score.is_some());
        let mut statistics = raw.statistics.map(Statistics::from);
        if let Some(comparison) = non_blank(raw.compared_to_national) {
            let statistics = statistics.get_or_insert_with(Statistics::default);
            statistics.national_comparison.get_or_insert(comparison);
        }
        Self {
            id: raw.id,
            name: raw.name,
            address: Address {
                street: raw.address,
                city: raw.city,
                state: raw.state,
                zip: raw.zip_code,
                county: raw.county,
            },
            score: raw.score.unwrap_or(0.0),
            has_data,
            performance_level: raw
                .performance_level
                .as_deref()
                .map_or(PerformanceLevel::Unknown, |s| {
                    s.parse().unwrap_or_default()
                }),
            distance: raw.distance.filter(|d| *d >= 0.0),
            ratings: raw.ratings.as_ref().map(ratings_from_map),
            statistics,
            description: non_blank(raw.description),
            specialties: raw.specialties,
            measure_scores: raw
                .measure_scores
                .as_ref()
                .map(measures_from_map)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_number_from_value_accepts_numeric_strings() {
        assert_eq!(number_from_value(&json!(3.5)), Some(3.5));
        assert_eq!(number_from_value(&json!(" 87% ")), Some(87.0));
        assert_eq!(number_from_value(&json!("1,204")), None);
        assert_eq!(number_from_value(&json!(null)), None);
        assert_eq!(number_from_value(&json!("NaN")), None);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2021-07-01"), NaiveDate::from_ymd_opt(2021, 7, 1));
        assert_eq!(parse_date("06/30/2023"), NaiveDate::from_ymd_opt(2023, 6, 30));
        assert_eq!(parse_date("last year"), None);
    }

    #[test]
    fn test_full_record_conversion() {
        let raw: RawHospital = serde_json::from_value(json!({
            "id": 220071,
            "name": "Massachusetts General Hospital",
            "address": "55 Fruit St",
            "city": "Boston",
            "state": "MA",
            "zipCode": "02114",
            "county": "Suffolk",
            "score": "12.4",
            "hasData": true,
            "performanceLevel": "Excellent",
            "distance": 1.2,
            "ratings": { "overall": 4.6, "safety": 4.0, "quality": null },
            "statistics": {
                "nationalComparison": "Better than national rate",
                "denominator": "1204",
                "lowerEstimate": "10.1",
                "higherEstimate": "14.9",
                "measurementPeriod": { "start": "07/01/2019", "end": "2022-06-30" }
            },
            "locationRelevance": "state",
            "description": "  Teaching hospital on the Charles  ",
            "specialties": ["Cardiology", " ", "Oncology"],
            "comparedToNational": "No different than national rate",
            "measureScores": { "mortality": 11.2, "readmission": "14.1", "safety": null }
        }))
        .unwrap();

        let record = HospitalRecord::from(raw);
        assert_eq!(record.id, "220071");
        assert_eq!(record.address.city, "Boston");
        assert_eq!(record.address.zip, "02114");
        assert!(record.has_data);
        assert!((record.score - 12.4).abs() < 1e-9);
        assert_eq!(record.performance_level, PerformanceLevel::Excellent);
        assert_eq!(record.distance, Some(1.2));

        let ratings = record.ratings.as_ref().unwrap();
        assert_eq!(ratings.scale, RatingScale::Stars);
        assert_eq!(ratings.overall, Some(4.6));
        assert_eq!(ratings.measure("safety"), Some(4.0));
        assert_eq!(ratings.measure("quality"), None);

        let stats = record.statistics.as_ref().unwrap();
        assert_eq!(stats.sample_size, Some(1204));
        assert_eq!(stats.upper_estimate, Some(14.9));
        let period = stats.measurement_period.unwrap();
        assert_eq!(period.start, NaiveDate::from_ymd_opt(2019, 7, 1));
        assert_eq!(period.end, NaiveDate::from_ymd_opt(2022, 6, 30));
        // The statistics block's own comparison wins over the top-level one.
        assert_eq!(
            stats.national_comparison.as_deref(),
            Some("Better than national rate")
        );

        assert_eq!(
            record.description.as_deref(),
            Some("Teaching hospital on the Charles")
        );
        assert_eq!(record.specialties, ["Cardiology", "Oncology"]);
        assert_eq!(record.measure_scores.len(), 3);
        assert_eq!(record.measure_score("Mortality"), Some(11.2));
        assert_eq!(record.measure_score("readmission"), Some(14.1));
        assert_eq!(record.measure_score("safety"), None);
    }

    #[test]
    fn test_compared_to_national_without_statistics() {
        let raw: RawHospital = serde_json::from_value(json!({
            "id": 2,
            "name": "B",
            "comparedToNational": "Worse than national rate",
            "specialties": "Pediatrics",
            "description": ""
        }))
        .unwrap();
        let record = HospitalRecord::from(raw);

        let stats = record.statistics.as_ref().unwrap();
        assert_eq!(
            stats.national_comparison.as_deref(),
            Some("Worse than national rate")
        );
        assert_eq!(stats.sample_size, None);
        assert_eq!(record.specialties, ["Pediatrics"]);
        assert!(record.description.is_none());
        assert!(record.measure_scores.is_empty());
    }

    #[test]
    fn test_sparse_record_uses_neutral_defaults() {
        let raw: RawHospital = serde_json::from_value(json!({
            "id": "x-1",
            "name": "Clinic",
            "city": null
        }))
        .unwrap();
        let record = HospitalRecord::from(raw);

        assert_eq!(record.address.city, "");
        assert!(!record.has_data);
        assert_eq!(record.score, 0.0);
        assert_eq!(record.performance_level, PerformanceLevel::Unknown);
        assert!(record.ratings.is_none());
        assert!(record.statistics.is_none());
        assert!(record.specialties.is_empty());
    }

    #[test]
    fn test_has_data_inferred_from_score_when_absent() {
        let raw: RawHospital =
            serde_json::from_value(json!({ "id": 1, "name": "A", "score": 3 })).unwrap();
        assert!(HospitalRecord::from(raw).has_data);

        let raw: RawHospital = serde_json::from_value(
            json!({ "id": 1, "name": "A", "score": 3, "hasData": "false" }),
        )
        .unwrap();
        assert!(!HospitalRecord::from(raw).has_data);
    }

    #[test]
    fn test_percentage_ratings_detected() {
        let raw: RawHospital = serde_json::from_value(json!({
            "id": 1,
            "name": "A",
            "ratings": { "overall": 72, "mortality": 88 }
        }))
        .unwrap();
        let record = HospitalRecord::from(raw);
        assert_eq!(record.ratings.as_ref().unwrap().scale, RatingScale::Percent);
        assert!((record.overall_rating() - 3.6).abs() < 1e-9);
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let result = serde_json::from_value::<RawHospital>(json!({ "name": "A" }));
        assert!(result.is_err());
        let result = serde_json::from_value::<RawHospital>(json!({ "id": [1], "name": "A" }));
        assert!(result.is_err());
    }
}
