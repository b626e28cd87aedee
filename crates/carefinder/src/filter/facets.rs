//! Filter state and the facet values it is made of.

use std::{fmt, str::FromStr};

use crate::{classify::LocationRelevance, sort::SortKey};

use super::error::FilterError;

pub const DEFAULT_MAX_DISTANCE: f64 = 50.0;

/// Location facet.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LocationFilter {
    #[default]
    All,
    City,
    /// Anything not in the search city
    State,
    /// Same as `State`; both labels have shipped in the filter bar
    Outside,
}

impl LocationFilter {
    #[must_use]
    pub const fn admits(self, relevance: LocationRelevance) -> bool {
        match self {
            Self::All => true,
            Self::City => matches!(relevance, LocationRelevance::City),
            Self::State | Self::Outside => !matches!(relevance, LocationRelevance::City),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::City => "city",
            Self::State => "state",
            Self::Outside => "outside",
        }
    }
}

impl FromStr for LocationFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "city" => Ok(Self::City),
            "state" => Ok(Self::State),
            "outside" => Ok(Self::Outside),
            _ => Err(FilterError::UnknownValue {
                field: FilterField::Location,
                value: s.to_string(),
            }),
        }
    }
}

/// Star-rating tier of a hospital's overall rating.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformanceTier {
    /// 4.5 stars and above
    Excellent,
    /// 3.5 up to 4.5
    Good,
    /// 2.5 up to 3.5
    Average,
    /// 1.5 up to 2.5
    Below,
    /// under 1.5, including unrated
    Poor,
}

impl PerformanceTier {
    /// Bucket a 0-5 star rating into its tier.
    #[must_use]
    pub fn from_stars(stars: f64) -> Self {
        if stars >= 4.5 {
            Self::Excellent
        } else if stars >= 3.5 {
            Self::Good
        } else if stars >= 2.5 {
            Self::Average
        } else if stars >= 1.5 {
            Self::Below
        } else {
            Self::Poor
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Average => "average",
            Self::Below => "below",
            Self::Poor => "poor",
        }
    }
}

/// Performance facet: every tier, or exactly one.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PerformanceFilter {
    #[default]
    All,
    Tier(PerformanceTier),
}

impl PerformanceFilter {
    #[must_use]
    pub fn admits_stars(self, stars: f64) -> bool {
        match self {
            Self::All => true,
            Self::Tier(tier) => PerformanceTier::from_stars(stars) == tier,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Tier(tier) => tier.as_str(),
        }
    }
}

impl FromStr for PerformanceFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tier = match s.trim().to_ascii_lowercase().as_str() {
            "all" => return Ok(Self::All),
            "excellent" => PerformanceTier::Excellent,
            "good" => PerformanceTier::Good,
            "average" => PerformanceTier::Average,
            "below" => PerformanceTier::Below,
            "poor" => PerformanceTier::Poor,
            _ => {
                return Err(FilterError::UnknownValue {
                    field: FilterField::Performance,
                    value: s.to_string(),
                });
            }
        };
        Ok(Self::Tier(tier))
    }
}

/// Name of one field of [`FilterState`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterField {
    Location,
    SortBy,
    Performance,
    OnlyWithData,
    MaxDistance,
}

impl FilterField {
    pub const ALL: [Self; 5] = [
        Self::Location,
        Self::SortBy,
        Self::Performance,
        Self::OnlyWithData,
        Self::MaxDistance,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::SortBy => "sortBy",
            Self::Performance => "performance",
            Self::OnlyWithData => "onlyWithData",
            Self::MaxDistance => "maxDistance",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A new value for exactly one filter field.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterChange {
    Location(LocationFilter),
    SortBy(SortKey),
    Performance(PerformanceFilter),
    OnlyWithData(bool),
    MaxDistance(f64),
}

impl FilterChange {
    #[must_use]
    pub const fn field(&self) -> FilterField {
        match self {
            Self::Location(_) => FilterField::Location,
            Self::SortBy(_) => FilterField::SortBy,
            Self::Performance(_) => FilterField::Performance,
            Self::OnlyWithData(_) => FilterField::OnlyWithData,
            Self::MaxDistance(_) => FilterField::MaxDistance,
        }
    }

    /// Parse a field name and value as sent by a form control.
    pub fn parse(field: &str, value: &str) -> Result<Self, FilterError> {
        let change = match field {
            "location" => Self::Location(value.parse()?),
            "sortBy" | "sort_by" => Self::SortBy(value.parse()?),
            "performance" => Self::Performance(value.parse()?),
            "onlyWithData" | "only_with_data" => {
                Self::OnlyWithData(value.trim().parse().map_err(|_| FilterError::UnknownValue {
                    field: FilterField::OnlyWithData,
                    value: value.to_string(),
                })?)
            }
            "maxDistance" | "max_distance" => {
                Self::MaxDistance(value.trim().parse().map_err(|_| FilterError::UnknownValue {
                    field: FilterField::MaxDistance,
                    value: value.to_string(),
                })?)
            }
            _ => return Err(FilterError::UnknownField(field.to_string())),
        };
        Ok(change)
    }
}

/// The user's current facet selections and sort key.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterState {
    pub location: LocationFilter,
    pub sort_by: SortKey,
    pub performance: PerformanceFilter,
    pub only_with_data: bool,
    /// Miles; only records that carry a distance are held to it
    pub max_distance: f64,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            location: LocationFilter::All,
            sort_by: SortKey::Score,
            performance: PerformanceFilter::All,
            only_with_data: false,
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

impl FilterState {
    /// The documented default for `field`, as a change.
    #[must_use]
    pub fn default_for(field: FilterField) -> FilterChange {
        let defaults = Self::default();
        match field {
            FilterField::Location => FilterChange::Location(defaults.location),
            FilterField::SortBy => FilterChange::SortBy(defaults.sort_by),
            FilterField::Performance => FilterChange::Performance(defaults.performance),
            FilterField::OnlyWithData => FilterChange::OnlyWithData(defaults.only_with_data),
            FilterField::MaxDistance => FilterChange::MaxDistance(defaults.max_distance),
        }
    }

    /// Merge one field, leaving the rest untouched. Returns whether the state changed.
    ///
    /// A NaN distance is ignored and a negative one is clamped to zero.
    pub fn apply(&mut self, change: FilterChange) -> bool {
        match change {
            FilterChange::Location(value) => replace(&mut self.location, value),
            FilterChange::SortBy(value) => replace(&mut self.sort_by, value),
            FilterChange::Performance(value) => replace(&mut self.performance, value),
            FilterChange::OnlyWithData(value) => replace(&mut self.only_with_data, value),
            FilterChange::MaxDistance(value) => {
                if value.is_nan() {
                    return false;
                }
                let value = value.max(0.0);
                let changed = self.max_distance.total_cmp(&value).is_ne();
                self.max_distance = value;
                changed
            }
        }
    }

    /// Restore the default of a single field. Returns whether the state changed.
    pub fn reset_field(&mut self, field: FilterField) -> bool {
        self.apply(Self::default_for(field))
    }

    /// Fields whose value differs from the default, for rendering filter chips.
    #[must_use]
    pub fn active_fields(&self) -> Vec<FilterField> {
        let mut scratch = *self;
        FilterField::ALL
            .into_iter()
            .filter(|field| scratch.reset_field(*field))
            .collect()
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
