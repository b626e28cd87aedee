//! Facet filtering over classified results.
//!
//! The engine is shape-preserving: it takes a [`GroupedResult`] and returns
//! one with the same buckets, each holding the subset of its records that pass
//! every active facet. All predicates are total; missing optional data is read
//! as its neutral default (no rating is 0 stars, no distance is never too far).

pub use error::FilterError;
mod facets;

use carefinder_data::HospitalRecord;
pub use facets::{
    DEFAULT_MAX_DISTANCE, FilterChange, FilterField, FilterState, LocationFilter,
    PerformanceFilter, PerformanceTier,
};
use tracing::{instrument, trace};

use crate::classify::{GroupedResult, LocationRelevance, SearchLocation};

/// All facet predicates of one [`FilterState`], composed with logical AND.
///
/// Without a known search location every record is `other`, so the location
/// facet admits everything rather than emptying the result.
#[derive(Debug, Clone, Copy)]
pub struct FacetPredicate<'a> {
    state: &'a FilterState,
    location_known: bool,
}

impl<'a> FacetPredicate<'a> {
    #[must_use]
    pub const fn new(state: &'a FilterState, location_known: bool) -> Self {
        Self {
            state,
            location_known,
        }
    }

    #[must_use]
    pub fn matches(&self, relevance: LocationRelevance, record: &HospitalRecord) -> bool {
        (!self.location_known || self.state.location.admits(relevance))
            && self.state.performance.admits_stars(record.overall_rating())
            && (!self.state.only_with_data || record.has_data)
            && self.within_distance(record)
    }

    fn within_distance(&self, record: &HospitalRecord) -> bool {
        record
            .distance
            .is_none_or(|miles| miles <= self.state.max_distance)
    }
}

/// Filter every bucket of `grouped` by `state`.
#[instrument(name = "Filter Grouped", level = "debug", skip_all, fields(num_records = grouped.len()))]
pub fn filter_grouped(grouped: &GroupedResult, state: &FilterState) -> GroupedResult {
    let predicate = FacetPredicate::new(state, grouped.location_known());
    let filtered = grouped.retain_by(|relevance, record| predicate.matches(relevance, record));
    trace!(
        kept = filtered.len(),
        dropped = grouped.len() - filtered.len(),
        "Applied facet filters"
    );
    filtered
}

/// Filter a flat sequence, classifying each record against `search_location` on the fly.
#[must_use]
pub fn filter_records(
    records: &[HospitalRecord],
    search_location: &SearchLocation,
    state: &FilterState,
) -> Vec<HospitalRecord> {
    let predicate = FacetPredicate::new(state, !search_location.is_empty());
    records
        .iter()
        .filter(|record| predicate.matches(search_location.relevance_of(record), record))
        .cloned()
        .collect()
}

mod error {
    use thiserror::Error;

    use super::FilterField;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum FilterError {
        #[error("Unknown filter field `{0}`")]
        UnknownField(String),
        #[error("Unknown value `{value}` for filter `{field}`")]
        UnknownValue { field: FilterField, value: String },
    }
}

#[cfg(test)]
mod tests {
    use carefinder_data::HospitalRecord;

    use super::*;
    use crate::classify::classify;

    /// 12 records, 5 in Boston, 8 with data.
    fn records() -> Vec<HospitalRecord> {
        (0..12)
            .map(|i| {
                let (city, state) = match i {
                    0..5 => ("Boston", "MA"),
                    5..8 => ("Worcester", "MA"),
                    _ => ("Hartford", "CT"),
                };
                let record = HospitalRecord::new(format!("{i}"), format!("Hospital {i}"))
                    .with_location(city, state)
                    .with_overall_rating(f64::from(i % 5) + 0.6);
                let record = if i % 3 == 2 {
                    record
                } else {
                    record.with_score(f64::from(i))
                };
                if i % 4 == 0 {
                    record.with_distance(f64::from(i) * 10.0)
                } else {
                    record
                }
            })
            .collect()
    }

    fn grouped() -> GroupedResult {
        classify(&records(), &SearchLocation::new("Boston"))
    }

    #[test]
    fn test_default_state_keeps_records_within_distance() {
        let filtered = filter_grouped(&grouped(), &FilterState::default());
        // Record 8 is 80 miles away; everything else is either close or has no distance.
        assert_eq!(filtered.len(), 11);
        assert!(filtered.iter().all(|(_, r)| r.id != "8"));
    }

    #[test]
    fn test_only_with_data_and_city() {
        let state = FilterState {
            location: LocationFilter::City,
            only_with_data: true,
            ..FilterState::default()
        };
        let filtered = filter_grouped(&grouped(), &state);
        assert!(filtered.state_hospitals.is_empty());
        assert!(filtered.other_hospitals.is_empty());
        assert!(filtered.city_hospitals.len() <= 5);
        assert!(filtered.city_hospitals.iter().all(|r| r.has_data));
        let ids: Vec<_> = filtered.city_hospitals.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["0", "1", "3", "4"]);
    }

    #[test]
    fn test_outside_excludes_city_bucket() {
        let state = FilterState {
            location: LocationFilter::Outside,
            max_distance: f64::INFINITY,
            ..FilterState::default()
        };
        let filtered = filter_grouped(&grouped(), &state);
        assert!(filtered.city_hospitals.is_empty());
        // Searching by city name leaves the state bucket empty; the rest is other.
        assert!(filtered.state_hospitals.is_empty());
        assert_eq!(filtered.other_hospitals.len(), 7);

        let by_state = classify(&records(), &SearchLocation::new("MA"));
        let filtered = filter_grouped(&by_state, &state);
        assert_eq!(filtered.state_hospitals.len(), 8);
        assert_eq!(filtered.other_hospitals.len(), 4);
    }

    #[test]
    fn test_performance_tier() {
        let state = FilterState {
            performance: PerformanceFilter::Tier(PerformanceTier::Excellent),
            max_distance: f64::INFINITY,
            ..FilterState::default()
        };
        let filtered = filter_grouped(&grouped(), &state);
        // Ratings of i % 5 == 4 are 4.6 stars.
        let ids: Vec<_> = filtered.iter().map(|(_, r)| r.id.as_str()).collect();
        assert_eq!(ids, ["4", "9"]);
    }

    #[test]
    fn test_unrated_records_are_poor() {
        let unrated = vec![HospitalRecord::new("u", "Unrated")];
        let poor = FilterState {
            performance: PerformanceFilter::Tier(PerformanceTier::Poor),
            ..FilterState::default()
        };
        assert_eq!(filter_records(&unrated, &SearchLocation::none(), &poor).len(), 1);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let states = [
            FilterState::default(),
            FilterState {
                location: LocationFilter::City,
                only_with_data: true,
                ..FilterState::default()
            },
            FilterState {
                location: LocationFilter::State,
                performance: PerformanceFilter::Tier(PerformanceTier::Good),
                max_distance: 15.0,
                ..FilterState::default()
            },
        ];
        for state in states {
            let once = filter_grouped(&grouped(), &state);
            let twice = filter_grouped(&once, &state);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_unknown_location_admits_every_location_filter() {
        let grouped = classify(&records(), &SearchLocation::none());
        for location in [LocationFilter::City, LocationFilter::State, LocationFilter::Outside] {
            let state = FilterState {
                location,
                max_distance: f64::INFINITY,
                ..FilterState::default()
            };
            let filtered = filter_grouped(&grouped, &state);
            assert_eq!(filtered.other_hospitals.len(), 12, "location {location:?}");
            assert_eq!(filtered.location_known(), grouped.location_known());

            let flat = filter_records(&records(), &SearchLocation::new("  "), &state);
            assert_eq!(flat.len(), 12, "location {location:?}");
        }
    }

    #[test]
    fn test_flat_and_grouped_filters_agree() {
        let state = FilterState {
            location: LocationFilter::State,
            only_with_data: true,
            ..FilterState::default()
        };
        let location = SearchLocation::new("Boston");
        let flat = filter_records(&records(), &location, &state);
        let grouped = filter_grouped(&grouped(), &state).into_flat();
        assert_eq!(flat, grouped);
    }
}
