use std::io::Write;

use serde_json::{Value, json};
use tempfile::NamedTempFile;
use tracing::info;

use super::{
    error::Result,
    ingest::{
        CITY_BUCKET_KEY, OTHER_BUCKET_KEY, PAGED_RECORDS_KEY, STATE_BUCKET_KEY, SourceShape,
    },
};

/// Configuration for synthetic result-set generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Total number of hospitals to generate
    pub hospitals: usize,
    /// City the generated search is centred on
    pub city: String,
    /// State code the search city lies in
    pub state: String,
    /// How many hospitals lie in the search city
    pub city_hospitals: usize,
    /// How many hospitals lie elsewhere in the search state
    pub state_hospitals: usize,
    /// How many hospitals carry data, spread evenly over the set
    pub with_data: usize,
    /// Shape of the generated payload
    pub shape: SourceShape,
    /// Page size used for `metadata.totalPages` in the paged shape
    pub upstream_page_size: usize,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self {
            hospitals: 40,
            city: "Boston".to_string(),
            state: "MA".to_string(),
            city_hospitals: 12,
            state_hospitals: 14,
            with_data: 30,
            shape: SourceShape::Flat,
            upstream_page_size: 10,
        }
    }
}

impl TestDataConfig {
    /// Minimal data for unit tests
    pub fn minimal() -> Self {
        Self {
            hospitals: 12,
            city_hospitals: 5,
            state_hospitals: 4,
            with_data: 8,
            ..Self::default()
        }
    }

    /// Sample data for integration tests
    pub fn sample() -> Self {
        Self {
            hospitals: 120,
            city_hospitals: 30,
            state_hospitals: 45,
            with_data: 90,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_shape(mut self, shape: SourceShape) -> Self {
        self.shape = shape;
        self
    }
}

const BASE_NAMES: [&str; 8] = [
    "General Hospital",
    "Medical Center",
    "Memorial Hospital",
    "Community Hospital",
    "Regional Medical Center",
    "University Hospital",
    "Children's Hospital",
    "St. Luke's Hospital",
];

const OTHER_STATE_CITIES: [(&str, &str); 4] = [
    ("Providence", "RI"),
    ("Hartford", "CT"),
    ("Portland", "ME"),
    ("Albany", "NY"),
];

const IN_STATE_CITIES: [&str; 3] = ["Cambridge", "Worcester", "Springfield"];

const PERFORMANCE_LEVELS: [&str; 5] = ["Excellent", "Good", "Fair", "Needs Improvement", "Unknown"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    City,
    State,
    Other,
}

fn placement(config: &TestDataConfig, idx: usize) -> Placement {
    if idx < config.city_hospitals {
        Placement::City
    } else if idx < config.city_hospitals + config.state_hospitals {
        Placement::State
    } else {
        Placement::Other
    }
}

/// Bresenham-style spread so exactly `with_data` of `total` indices are selected.
fn has_data(idx: usize, with_data: usize, total: usize) -> bool {
    let with_data = with_data.min(total);
    (idx + 1) * with_data / total > idx * with_data / total
}

fn hospital_json(config: &TestDataConfig, idx: usize) -> Value {
    let (city, state) = match placement(config, idx) {
        Placement::City => (config.city.clone(), config.state.clone()),
        Placement::State => (
            IN_STATE_CITIES[idx % IN_STATE_CITIES.len()].to_string(),
            config.state.clone(),
        ),
        Placement::Other => {
            let (city, state) = OTHER_STATE_CITIES[idx % OTHER_STATE_CITIES.len()];
            (city.to_string(), state.to_string())
        }
    };
    let data = has_data(idx, config.with_data, config.hospitals);
    let name = format!("{} {city} {}", BASE_NAMES[idx % BASE_NAMES.len()], idx + 1);
    let overall = 1.0 + (idx % 5) as f64 * 0.9;

    let mut hospital = json!({
        "id": format!("H{:04}", idx + 1),
        "name": name,
        "address": format!("{} Main St", 100 + idx),
        "city": city,
        "state": state,
        "zipCode": format!("{:05}", 2100 + idx),
        "county": "Test County",
        "hasData": data,
        "performanceLevel": PERFORMANCE_LEVELS[idx % PERFORMANCE_LEVELS.len()],
        "ratings": { "overall": overall, "safety": overall - 0.5 },
    });
    if data {
        hospital["score"] = json!(((idx * 37) % 100) as f64 / 10.0);
        hospital["statistics"] = json!({
            "nationalComparison": "No different than the national rate",
            "denominator": format!("{}", 100 + idx * 3),
            "lowerEstimate": "9.5",
            "higherEstimate": "14.2",
            "measurementPeriod": { "start": "07/01/2020", "end": "2023-06-30" }
        });
    }
    if idx % 4 != 3 {
        hospital["distance"] = json!(idx as f64 * 2.5);
    }
    hospital
}

/// Build a deterministic search payload in the configured shape.
pub fn generate_payload(config: &TestDataConfig) -> Value {
    let hospitals: Vec<Value> = (0..config.hospitals)
        .map(|idx| hospital_json(config, idx))
        .collect();

    match config.shape {
        SourceShape::Flat | SourceShape::Records => Value::Array(hospitals),
        SourceShape::Grouped => {
            let mut city = Vec::new();
            let mut state = Vec::new();
            let mut other = Vec::new();
            for (idx, hospital) in hospitals.into_iter().enumerate() {
                match placement(config, idx) {
                    Placement::City => city.push(hospital),
                    Placement::State => state.push(hospital),
                    Placement::Other => other.push(hospital),
                }
            }
            json!({
                CITY_BUCKET_KEY: city,
                STATE_BUCKET_KEY: state,
                OTHER_BUCKET_KEY: other,
            })
        }
        SourceShape::Paged => {
            let total_pages = config.hospitals.div_ceil(config.upstream_page_size.max(1));
            json!({
                PAGED_RECORDS_KEY: hospitals,
                "metadata": { "totalPages": total_pages },
            })
        }
    }
}

/// Create a test payload in a temporary file.
///
/// The file holds the JSON produced by [`generate_payload`] for `config`.
pub fn create_test_data(config: &TestDataConfig) -> Result<NamedTempFile> {
    info!("Creating test data with config: {:?}", config);

    let mut file = NamedTempFile::new()?;
    serde_json::to_writer_pretty(&mut file, &generate_payload(config))?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_value;

    #[test]
    fn test_has_data_spread_is_exact() {
        for (with_data, total) in [(8, 12), (0, 5), (5, 5), (90, 120), (7, 3)] {
            let count = (0..total).filter(|i| has_data(*i, with_data, total)).count();
            assert_eq!(count, with_data.min(total));
        }
    }

    #[test]
    fn test_minimal_payload_matches_config() {
        let config = TestDataConfig::minimal();
        let set = ingest_value(generate_payload(&config)).unwrap();

        assert_eq!(set.len(), 12);
        assert_eq!(set.records.iter().filter(|r| r.has_data).count(), 8);
        assert_eq!(
            set.records.iter().filter(|r| r.address.city == "Boston").count(),
            5
        );
        assert_eq!(set.duplicates_dropped, 0);
    }

    #[test]
    fn test_every_shape_ingests_to_same_records() {
        let base = TestDataConfig::minimal();
        let mut ids_per_shape = Vec::new();
        for shape in [SourceShape::Flat, SourceShape::Grouped, SourceShape::Paged] {
            let set = ingest_value(generate_payload(&base.clone().with_shape(shape))).unwrap();
            assert_eq!(set.shape, shape);
            ids_per_shape.push(set.records.into_iter().map(|r| r.id).collect::<Vec<_>>());
        }
        assert!(ids_per_shape.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_paged_payload_reports_total_pages() {
        let config = TestDataConfig::minimal().with_shape(SourceShape::Paged);
        let set = ingest_value(generate_payload(&config)).unwrap();
        assert_eq!(set.upstream_total_pages, Some(2));
    }

    #[test]
    fn test_create_test_data_writes_file() {
        let file = create_test_data(&TestDataConfig::minimal()).unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(contents.contains("\"H0001\""));
    }
}
