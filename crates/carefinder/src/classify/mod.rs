//! Geographic relevance classification.
//!
//! Relevance is a property of a record *paired with* the active search
//! location, so it is never read from the source. A record is `City` when its
//! city equals the search location, `State` when its state does and its city
//! does not, and `Other` otherwise. Comparison is a trimmed, casefolded exact
//! match; nothing is geocoded.

use std::fmt;

use carefinder_data::HospitalRecord;
use itertools::Itertools;
use tracing::{debug, instrument};

/// Where a record sits relative to the search location.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocationRelevance {
    City,
    State,
    Other,
}

impl LocationRelevance {
    pub const ALL: [Self; 3] = [Self::City, Self::State, Self::Other];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::State => "state",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for LocationRelevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locale-invariant casefold used for every location comparison.
pub fn casefold(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Search location prepared once for comparing against many records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchLocation {
    folded: Option<String>,
}

impl SearchLocation {
    pub fn new(location: impl AsRef<str>) -> Self {
        let folded = casefold(location.as_ref());
        Self {
            folded: (!folded.is_empty()).then_some(folded),
        }
    }

    /// A search with no usable location: every record classifies as `Other`.
    #[must_use]
    pub const fn none() -> Self {
        Self { folded: None }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folded.is_none()
    }

    #[must_use]
    pub fn relevance_of(&self, record: &HospitalRecord) -> LocationRelevance {
        let Some(location) = self.folded.as_deref() else {
            return LocationRelevance::Other;
        };
        if casefold(record.city()) == location {
            LocationRelevance::City
        } else if casefold(record.state()) == location {
            LocationRelevance::State
        } else {
            LocationRelevance::Other
        }
    }
}

impl<S: AsRef<str>> From<Option<S>> for SearchLocation {
    fn from(location: Option<S>) -> Self {
        location.map_or_else(Self::none, Self::new)
    }
}

/// Classify a single record against a raw search location string.
#[must_use]
pub fn relevance_of(record: &HospitalRecord, search_location: &str) -> LocationRelevance {
    SearchLocation::new(search_location).relevance_of(record)
}

/// Number of records per relevance bucket.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub city: usize,
    pub state: usize,
    pub other: usize,
}

impl BucketCounts {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.city + self.state + self.other
    }
}

/// Records partitioned into mutually exclusive relevance buckets.
///
/// Each bucket keeps the input order of its records. A result classified
/// without a search location puts everything in `other` and remembers that,
/// so location facets can tell "nothing matched" from "nothing to match".
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedResult {
    pub city_hospitals: Vec<HospitalRecord>,
    pub state_hospitals: Vec<HospitalRecord>,
    pub other_hospitals: Vec<HospitalRecord>,
    location_known: bool,
}

impl GroupedResult {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the buckets were computed against a non-empty search location.
    #[must_use]
    pub const fn location_known(&self) -> bool {
        self.location_known
    }

    #[must_use]
    pub fn bucket(&self, relevance: LocationRelevance) -> &[HospitalRecord] {
        match relevance {
            LocationRelevance::City => &self.city_hospitals,
            LocationRelevance::State => &self.state_hospitals,
            LocationRelevance::Other => &self.other_hospitals,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.city_hospitals.len() + self.state_hospitals.len() + self.other_hospitals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            city: self.city_hospitals.len(),
            state: self.state_hospitals.len(),
            other: self.other_hospitals.len(),
        }
    }

    /// Iterate every record with its bucket, city first, then state, then other.
    pub fn iter(&self) -> impl Iterator<Item = (LocationRelevance, &HospitalRecord)> {
        LocationRelevance::ALL
            .into_iter()
            .flat_map(move |relevance| self.bucket(relevance).iter().map(move |r| (relevance, r)))
    }

    /// Concatenate the buckets (city, state, other) into one flat sequence.
    #[must_use]
    pub fn into_flat(self) -> Vec<HospitalRecord> {
        let mut flat = self.city_hospitals;
        flat.extend(self.state_hospitals);
        flat.extend(self.other_hospitals);
        flat
    }

    /// Build a grouped result by keeping only the records `keep` accepts.
    pub fn retain_by<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(LocationRelevance, &HospitalRecord) -> bool,
    {
        let mut select = |relevance| {
            self.bucket(relevance)
                .iter()
                .filter(|r| keep(relevance, r))
                .cloned()
                .collect::<Vec<_>>()
        };
        Self {
            city_hospitals: select(LocationRelevance::City),
            state_hospitals: select(LocationRelevance::State),
            other_hospitals: select(LocationRelevance::Other),
            location_known: self.location_known,
        }
    }
}

/// Partition `records` into city, state and other buckets for `search_location`.
#[instrument(name = "Classify", level = "debug", skip(records), fields(num_records = records.len()))]
pub fn classify(records: &[HospitalRecord], search_location: &SearchLocation) -> GroupedResult {
    let mut grouped = GroupedResult {
        location_known: !search_location.is_empty(),
        ..GroupedResult::empty()
    };
    for record in records {
        match search_location.relevance_of(record) {
            LocationRelevance::City => grouped.city_hospitals.push(record.clone()),
            LocationRelevance::State => grouped.state_hospitals.push(record.clone()),
            LocationRelevance::Other => grouped.other_hospitals.push(record.clone()),
        }
    }
    let counts = grouped.counts();
    debug!(
        city = counts.city,
        state = counts.state,
        other = counts.other,
        "Classified records"
    );
    grouped
}

/// Ids of every record grouped by bucket; handy for diagnostics and tests.
#[must_use]
pub fn bucket_ids(grouped: &GroupedResult) -> Vec<(LocationRelevance, Vec<&str>)> {
    grouped
        .iter()
        .chunk_by(|(relevance, _)| *relevance)
        .into_iter()
        .map(|(relevance, group)| (relevance, group.map(|(_, r)| r.id.as_str()).collect()))
        .collect()
}
