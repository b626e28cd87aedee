//! Normalisation of search API payloads into a single flat record list.
//!
//! The API has answered in three shapes over time: a bare array of hospitals,
//! an object grouped into `cityHospitals`/`stateHospitals`/`otherHospitals`,
//! and a paged envelope `{ hospitals, metadata: { totalPages } }`. All three are
//! accepted here and flattened; grouping is recomputed downstream, so upstream
//! bucket membership is discarded.
//!
//! Ingestion fails closed: a payload in an unknown shape, or containing any
//! record that cannot be read, yields an error and no records at all.

use std::io::Read;

use ahash::AHashSet;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{DataError, Result},
    raw::{RawHospital, number_from_value},
    record::HospitalRecord,
};

pub const CITY_BUCKET_KEY: &str = "cityHospitals";
pub const STATE_BUCKET_KEY: &str = "stateHospitals";
pub const OTHER_BUCKET_KEY: &str = "otherHospitals";
pub const PAGED_RECORDS_KEY: &str = "hospitals";
const BUCKET_KEYS: [&str; 3] = [CITY_BUCKET_KEY, STATE_BUCKET_KEY, OTHER_BUCKET_KEY];

/// Which of the accepted upstream shapes a payload arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceShape {
    Flat,
    Grouped,
    Paged,
    /// Records handed over already typed, not parsed from a payload
    Records,
}

/// A normalised, de-duplicated result set ready for classification.
#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    pub records: Vec<HospitalRecord>,
    pub shape: SourceShape,
    /// `metadata.totalPages` from a paged envelope; informational only
    pub upstream_total_pages: Option<u32>,
    /// Records dropped because their composite key was already seen
    pub duplicates_dropped: usize,
}

impl ResultSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a JSON payload in any accepted shape.
pub fn ingest_str(payload: &str) -> Result<ResultSet> {
    let value: Value = serde_json::from_str(payload)?;
    ingest_value(value)
}

/// Read and parse a JSON payload from `reader`.
pub fn ingest_reader<R: Read>(reader: R) -> Result<ResultSet> {
    let value: Value = serde_json::from_reader(reader)?;
    ingest_value(value)
}

/// Normalise an already-parsed JSON payload.
#[instrument(name = "Ingest Result Set", level = "debug", skip_all)]
pub fn ingest_value(payload: Value) -> Result<ResultSet> {
    let (shape, raw_records, upstream_total_pages) = match payload {
        Value::Array(items) => (SourceShape::Flat, items, None),
        Value::Object(mut object) => {
            if let Some(hospitals) = object.remove(PAGED_RECORDS_KEY) {
                let items = match hospitals {
                    Value::Array(items) => items,
                    other => {
                        return Err(malformed(format!(
                            "`{PAGED_RECORDS_KEY}` must be an array, found {}",
                            type_name(&other)
                        )));
                    }
                };
                let total_pages = object
                    .get("metadata")
                    .and_then(|m| m.get("totalPages"))
                    .and_then(number_from_value)
                    .filter(|n| *n >= 0.0)
                    .map(|n| n as u32);
                (SourceShape::Paged, items, total_pages)
            } else if BUCKET_KEYS.iter().any(|key| object.contains_key(*key)) {
                let mut items = Vec::new();
                for key in BUCKET_KEYS {
                    match object.remove(key) {
                        None | Some(Value::Null) => {}
                        Some(Value::Array(bucket)) => items.extend(bucket),
                        Some(other) => {
                            return Err(malformed(format!(
                                "`{key}` must be an array, found {}",
                                type_name(&other)
                            )));
                        }
                    }
                }
                (SourceShape::Grouped, items, None)
            } else {
                return Err(malformed(format!(
                    "object has none of the keys `{PAGED_RECORDS_KEY}`, `{CITY_BUCKET_KEY}`, `{STATE_BUCKET_KEY}`, `{OTHER_BUCKET_KEY}`"
                )));
            }
        }
        other => {
            return Err(malformed(format!(
                "expected an array or object, found {}",
                type_name(&other)
            )));
        }
    };

    let records = raw_records
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            serde_json::from_value::<RawHospital>(item)
                .map(HospitalRecord::from)
                .map_err(|e| malformed(format!("record {idx}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut result_set = ingest_records(records);
    result_set.shape = shape;
    result_set.upstream_total_pages = upstream_total_pages;
    info!(
        shape = ?shape,
        records = result_set.len(),
        duplicates_dropped = result_set.duplicates_dropped,
        upstream_total_pages = ?upstream_total_pages,
        "Ingested result set"
    );
    Ok(result_set)
}

/// De-duplicate typed records by composite key, keeping the first occurrence.
///
/// Identifiers that repeat under a different name or zip are kept, since they
/// denote different hospitals, but are reported.
pub fn ingest_records(records: Vec<HospitalRecord>) -> ResultSet {
    let mut seen_keys = AHashSet::with_capacity(records.len());
    let mut seen_ids = AHashSet::with_capacity(records.len());
    let mut duplicates_dropped = 0;
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        if !seen_keys.insert(record.key()) {
            debug!(key = %record.key(), "Dropping duplicate record");
            duplicates_dropped += 1;
            continue;
        }
        if !seen_ids.insert(record.id.clone()) {
            warn!(
                id = %record.id,
                name = %record.name,
                "Identifier repeats across distinct hospitals; relying on composite key"
            );
        }
        kept.push(record);
    }

    ResultSet {
        records: kept,
        shape: SourceShape::Records,
        upstream_total_pages: None,
        duplicates_dropped,
    }
}

fn malformed(message: String) -> DataError {
    warn!(%message, "Rejecting malformed result set");
    DataError::MalformedInput(message)
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn hospital(id: u32, name: &str, city: &str, zip: &str) -> Value {
        json!({ "id": id, "name": name, "city": city, "state": "MA", "zipCode": zip, "score": id })
    }

    #[test]
    fn test_flat_shape() {
        let set = ingest_value(json!([
            hospital(1, "A", "Boston", "02114"),
            hospital(2, "B", "Salem", "01970"),
        ]))
        .unwrap();
        assert_eq!(set.shape, SourceShape::Flat);
        assert_eq!(set.len(), 2);
        assert_eq!(set.upstream_total_pages, None);
    }

    #[test]
    fn test_grouped_shape_flattens_in_bucket_order() {
        let set = ingest_value(json!({
            "otherHospitals": [hospital(3, "C", "Austin", "73301")],
            "cityHospitals": [hospital(1, "A", "Boston", "02114")],
            "stateHospitals": null
        }))
        .unwrap();
        assert_eq!(set.shape, SourceShape::Grouped);
        let ids: Vec<_> = set.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
    }

    #[test]
    fn test_paged_shape_keeps_metadata() {
        let set = ingest_str(
            r#"{ "hospitals": [{ "id": "7", "name": "G" }], "metadata": { "totalPages": 4 } }"#,
        )
        .unwrap();
        assert_eq!(set.shape, SourceShape::Paged);
        assert_eq!(set.upstream_total_pages, Some(4));
        assert_eq!(set.records[0].id, "7");
    }

    #[test]
    fn test_empty_payload_is_not_an_error() {
        let set = ingest_value(json!([])).unwrap();
        assert!(set.is_empty());
        let set = ingest_value(json!({ "hospitals": [] })).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_unrecognised_shapes_fail_closed() {
        for payload in [
            json!({ "results": [] }),
            json!("hospitals"),
            json!(42),
            json!({ "hospitals": { "id": 1 } }),
            json!({ "cityHospitals": "none" }),
        ] {
            let err = ingest_value(payload).unwrap_err();
            assert!(err.is_malformed_input(), "unexpected error: {err}");
        }
    }

    #[test]
    fn test_one_bad_record_rejects_whole_set() {
        let err = ingest_value(json!([
            hospital(1, "A", "Boston", "02114"),
            { "name": "missing id" }
        ]))
        .unwrap_err();
        assert!(matches!(err, DataError::MalformedInput(ref m) if m.starts_with("record 1")));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = ingest_str("[{").unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_duplicates_across_buckets_are_dropped() {
        let set = ingest_value(json!({
            "cityHospitals": [hospital(1, "General Hospital", "Boston", "02114")],
            "stateHospitals": [hospital(1, "GENERAL hospital", "Boston", "02114")],
            "otherHospitals": [hospital(1, "General Hospital", "Boston", "99999")]
        }))
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.duplicates_dropped, 1);
        assert_eq!(set.records[1].address.zip, "99999");
    }

    #[test]
    fn test_reader_input() {
        let payload = br#"[{ "id": 1, "name": "A" }]"#;
        let set = ingest_reader(&payload[..]).unwrap();
        assert_eq!(set.len(), 1);
    }
}
