//! Hospital record model and result-set ingestion for the `carefinder` pipeline.
//!
//! This crate owns everything that happens before classification: the typed
//! [`HospitalRecord`], the lenient wire types the search API is decoded into,
//! normalisation of the accepted payload shapes into one flat [`ResultSet`],
//! and deterministic synthetic payloads for tests.

mod error;
pub mod ingest;
pub mod raw;
pub mod record;
pub mod test_data;

pub use error::{DataError, Result};
pub use ingest::{ResultSet, SourceShape, ingest_reader, ingest_records, ingest_str, ingest_value};
pub use record::{
    Address, HospitalRecord, Measure, MeasurementPeriod, PerformanceLevel, RatingScale, Ratings,
    RecordKey, Statistics, normalize_name,
};
pub use test_data::{TestDataConfig, create_test_data, generate_payload};
