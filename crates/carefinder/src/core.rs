use std::time::Instant;

use carefinder_data::{HospitalRecord, ResultSet, SourceShape};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{
    classify::{BucketCounts, GroupedResult, SearchLocation, classify},
    config::PipelineConfig,
    error::{CarefinderError, Result},
    filter::{FilterChange, FilterField, FilterState, filter_grouped},
    sort::sort_in_place,
    store::{Clock, FilterStore, SystemClock},
    window::{LoadStatus, Window, WindowMode, WindowState},
};

/// What the presentation layer should show besides the records themselves.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResultsStatus {
    /// No result set has been ingested yet
    #[default]
    AwaitingResults,
    Ready,
    /// The result set was empty, or the filters exclude every record
    NoMatches,
    /// The last payload could not be read; the session holds no records
    Failed(String),
}

/// Where the current result set came from.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub shape: SourceShape,
    pub records: usize,
    pub upstream_total_pages: Option<u32>,
    pub duplicates_dropped: usize,
}

impl From<&ResultSet> for IngestSummary {
    fn from(set: &ResultSet) -> Self {
        Self {
            shape: set.shape,
            records: set.len(),
            upstream_total_pages: set.upstream_total_pages,
            duplicates_dropped: set.duplicates_dropped,
        }
    }
}

/// Permission to grow the incremental window, valid for one generation.
///
/// A ticket is consumed by [`ResultsSession::complete_load`]; if the result
/// set or the filters change in between, the completion is discarded.
#[derive(Debug, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of completing a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The window grew and more records remain
    Applied,
    /// The window grew to cover every record
    Exhausted,
    /// The ticket predates the current result set or filters; nothing changed
    Stale,
}

/// Everything needed to render the current results.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView<'a> {
    /// The visible slice of the sorted, filtered records
    pub records: &'a [HospitalRecord],
    pub window: WindowState,
    pub filters: FilterState,
    /// Fields that differ from their default, for filter chips
    pub active_filters: Vec<FilterField>,
    /// Per-bucket counts after filtering
    pub counts: BucketCounts,
    pub total_matches: usize,
    /// Another page or load exists beyond `records`
    pub has_more: bool,
    pub has_previous: bool,
    pub status: &'a ResultsStatus,
    pub source: Option<IngestSummary>,
}

/// One user's view over one search: owns the result set, the filters, and the window.
///
/// All mutation happens through `&mut self`, synchronously. Every change to
/// the result set or the committed filters re-runs filter, sort and window
/// reset in that order, and bumps the generation so that in-flight loads from
/// before the change are recognised as stale.
#[derive(Debug)]
pub struct ResultsSession {
    config: PipelineConfig,
    search_location: SearchLocation,
    /// Classified, unfiltered records of the current result set
    grouped: GroupedResult,
    store: FilterStore,
    filtered_counts: BucketCounts,
    sorted: Vec<HospitalRecord>,
    window: Window,
    generation: u64,
    status: ResultsStatus,
    source: Option<IngestSummary>,
}

impl Default for ResultsSession {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl ResultsSession {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// A session whose debounce deadlines are read from `clock`.
    pub fn with_clock(config: PipelineConfig, clock: impl Clock + 'static) -> Self {
        let mut window = Window::new(config.window_mode, config.page_size);
        window.reset(0);
        Self {
            config,
            search_location: SearchLocation::none(),
            grouped: GroupedResult::empty(),
            store: FilterStore::with_clock(config.debounce_interval, clock),
            filtered_counts: BucketCounts::default(),
            sorted: Vec::new(),
            window,
            generation: 0,
            status: ResultsStatus::AwaitingResults,
            source: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub const fn filters(&self) -> &FilterState {
        self.store.state()
    }

    #[must_use]
    pub const fn status(&self) -> &ResultsStatus {
        &self.status
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn search_location(&self) -> &SearchLocation {
        &self.search_location
    }

    /// The classified result set before any filter is applied.
    #[must_use]
    pub const fn grouped(&self) -> &GroupedResult {
        &self.grouped
    }

    /// Every record that passes the filters, in display order.
    #[must_use]
    pub fn sorted(&self) -> &[HospitalRecord] {
        &self.sorted
    }

    #[must_use]
    pub fn has_pending_updates(&self) -> bool {
        self.store.has_pending()
    }

    /// When the earliest pending filter update settles; call [`Self::tick`] then.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.store.next_deadline()
    }

    /// Replace the result set with a JSON payload in any accepted shape.
    ///
    /// An unreadable payload leaves the session empty with a `Failed` status
    /// and the error is returned.
    #[instrument(name = "Session Ingest", level = "info", skip_all, fields(generation = self.generation + 1))]
    pub fn ingest_value(&mut self, payload: Value, search_location: SearchLocation) -> Result<()> {
        match carefinder_data::ingest_value(payload) {
            Ok(set) => {
                self.load_result_set(&set, search_location);
                Ok(())
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Like [`ingest_value`](Self::ingest_value), from JSON text.
    pub fn ingest_str(&mut self, payload: &str, search_location: SearchLocation) -> Result<()> {
        match serde_json::from_str(payload) {
            Ok(value) => self.ingest_value(value, search_location),
            Err(err) => Err(self.fail(carefinder_data::DataError::from(err).into())),
        }
    }

    /// Replace the result set with already-typed records.
    #[instrument(name = "Session Ingest Records", level = "info", skip_all, fields(num_records = records.len()))]
    pub fn ingest_records(&mut self, records: Vec<HospitalRecord>, search_location: SearchLocation) {
        let set = carefinder_data::ingest_records(records);
        self.load_result_set(&set, search_location);
    }

    fn load_result_set(&mut self, set: &ResultSet, search_location: SearchLocation) {
        self.grouped = classify(&set.records, &search_location);
        self.search_location = search_location;
        self.source = Some(IngestSummary::from(set));
        self.status = ResultsStatus::Ready;
        info!(
            records = set.len(),
            shape = ?set.shape,
            duplicates_dropped = set.duplicates_dropped,
            "Loaded result set"
        );
        self.recompute();
    }

    fn fail(&mut self, err: CarefinderError) -> CarefinderError {
        warn!(error = %err, "Result set rejected; clearing results");
        self.grouped = GroupedResult::empty();
        self.source = None;
        self.status = ResultsStatus::Failed(err.to_string());
        self.recompute();
        err
    }

    /// Issue a filter update. Returns the fields that committed right away.
    pub fn update(&mut self, change: FilterChange) -> Vec<FilterField> {
        let changed = self.store.update(change);
        self.after_commit(changed)
    }

    /// Issue a filter update from a form control's field name and value.
    pub fn update_from_form(&mut self, field: &str, value: &str) -> Result<Vec<FilterField>> {
        let change = FilterChange::parse(field, value)?;
        Ok(self.update(change))
    }

    /// Commit the filter updates whose settle interval has passed.
    pub fn tick(&mut self) -> Vec<FilterField> {
        let changed = self.store.tick();
        self.after_commit(changed)
    }

    /// Commit every pending filter update now.
    pub fn flush_pending(&mut self) -> Vec<FilterField> {
        let changed = self.store.flush();
        self.after_commit(changed)
    }

    /// Return one field to its default. Returns the field if it changed.
    pub fn reset_field(&mut self, field: FilterField) -> Vec<FilterField> {
        let changed = if self.store.reset_field(field) {
            vec![field]
        } else {
            Vec::new()
        };
        self.after_commit(changed)
    }

    pub fn reset_all(&mut self) -> Vec<FilterField> {
        let changed = self.store.reset_all();
        self.after_commit(changed)
    }

    fn after_commit(&mut self, changed: Vec<FilterField>) -> Vec<FilterField> {
        if !changed.is_empty() {
            debug!(?changed, "Filters changed");
            self.recompute();
        }
        changed
    }

    #[instrument(name = "Recompute", level = "debug", skip_all, fields(generation = self.generation))]
    fn recompute(&mut self) {
        let filters = *self.store.state();
        let filtered = filter_grouped(&self.grouped, &filters);
        self.filtered_counts = filtered.counts();

        let mut sorted = filtered.into_flat();
        sort_in_place(&mut sorted, filters.sort_by, self.config.score_polarity);
        self.sorted = sorted;

        if matches!(self.status, ResultsStatus::Ready | ResultsStatus::NoMatches) {
            self.status = if self.sorted.is_empty() {
                ResultsStatus::NoMatches
            } else {
                ResultsStatus::Ready
            };
        }
        self.reset_window();
        debug!(
            matches = self.filtered_counts.total(),
            sort_by = %filters.sort_by,
            "Recomputed results"
        );
    }

    fn reset_window(&mut self) {
        self.generation += 1;
        self.window.reset(self.sorted.len());
    }

    /// The end-of-list sentinel scrolled into view: start a load if one may start.
    ///
    /// Returns `None` in paged mode, while a load is in flight, or once every
    /// record is loaded.
    pub fn on_sentinel_visible(&mut self) -> Option<LoadTicket> {
        let Window::Incremental(window) = &mut self.window else {
            return None;
        };
        window.begin_load().then_some(LoadTicket {
            generation: self.generation,
        })
    }

    /// Finish the load `ticket` was issued for.
    pub fn complete_load(&mut self, ticket: LoadTicket) -> LoadOutcome {
        if ticket.generation != self.generation {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding stale load"
            );
            return LoadOutcome::Stale;
        }
        let Window::Incremental(window) = &mut self.window else {
            return LoadOutcome::Stale;
        };
        match window.complete_load() {
            LoadStatus::Exhausted => LoadOutcome::Exhausted,
            _ => LoadOutcome::Applied,
        }
    }

    /// Start and immediately finish a load. Returns `None` if no load could start.
    pub fn load_more(&mut self) -> Option<LoadOutcome> {
        let ticket = self.on_sentinel_visible()?;
        Some(self.complete_load(ticket))
    }

    pub fn next_page(&mut self) -> bool {
        match &mut self.window {
            Window::Paged(window) => window.next_page(),
            Window::Incremental(_) => false,
        }
    }

    pub fn previous_page(&mut self) -> bool {
        match &mut self.window {
            Window::Paged(window) => window.previous_page(),
            Window::Incremental(_) => false,
        }
    }

    /// Jump to a 1-based page, clamped into range.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        match &mut self.window {
            Window::Paged(window) => window.go_to_page(page),
            Window::Incremental(_) => false,
        }
    }

    #[must_use]
    pub const fn window_mode(&self) -> WindowMode {
        self.window.mode()
    }

    #[must_use]
    pub fn view(&self) -> ResultsView<'_> {
        let filters = *self.store.state();
        ResultsView {
            records: &self.sorted[self.window.range()],
            window: self.window.state(),
            filters,
            active_filters: filters.active_fields(),
            counts: self.filtered_counts,
            total_matches: self.sorted.len(),
            has_more: self.window.has_more(),
            has_previous: self.window.has_previous(),
            status: &self.status,
            source: self.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::PipelineConfigBuilder,
        filter::LocationFilter,
        sort::SortKey,
        store::{DEFAULT_DEBOUNCE_INTERVAL, ManualClock},
    };

    fn records(n: usize) -> Vec<HospitalRecord> {
        (0..n)
            .map(|i| {
                let city = if i % 2 == 0 { "Boston" } else { "Salem" };
                HospitalRecord::new(format!("{i}"), format!("Hospital {i}"))
                    .with_location(city, "MA")
                    .with_score((n - i) as f64)
            })
            .collect()
    }

    fn session(n: usize) -> ResultsSession {
        let mut session = ResultsSession::new(PipelineConfigBuilder::new().without_debounce().build());
        session.ingest_records(records(n), SearchLocation::new("Boston"));
        session
    }

    #[test]
    fn test_new_session_awaits_results() {
        let session = ResultsSession::default();
        let view = session.view();
        assert_eq!(*view.status, ResultsStatus::AwaitingResults);
        assert!(view.records.is_empty());
        assert_eq!(view.total_matches, 0);
    }

    #[test]
    fn test_filter_change_resets_loaded_count() {
        let mut session = session(40);
        session.load_more();
        session.load_more();
        assert_eq!(
            session.view().window,
            WindowState::Incremental {
                loaded_count: 27,
                status: LoadStatus::Idle
            }
        );

        session.update(FilterChange::SortBy(SortKey::Name));
        assert_eq!(
            session.view().window,
            WindowState::Incremental {
                loaded_count: 9,
                status: LoadStatus::Idle
            }
        );
    }

    #[test]
    fn test_same_value_update_keeps_window() {
        let mut session = session(40);
        session.load_more();
        let generation = session.generation();
        assert!(session.update(FilterChange::SortBy(SortKey::Score)).is_empty());
        assert_eq!(session.generation(), generation);
        assert_eq!(session.view().records.len(), 18);
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let mut session = session(40);
        let ticket = session.on_sentinel_visible().unwrap();
        session.update(FilterChange::Location(LocationFilter::City));
        assert_eq!(session.complete_load(ticket), LoadOutcome::Stale);
        assert_eq!(session.view().records.len(), 9);

        let ticket = session.on_sentinel_visible().unwrap();
        assert_eq!(session.complete_load(ticket), LoadOutcome::Applied);
        assert_eq!(session.view().records.len(), 18);
        assert_eq!(session.load_more(), Some(LoadOutcome::Exhausted));
        assert_eq!(session.view().records.len(), 20);
        assert_eq!(session.load_more(), None);
    }

    #[test]
    fn test_no_second_ticket_while_loading() {
        let mut session = session(40);
        let ticket = session.on_sentinel_visible();
        assert!(ticket.is_some());
        assert!(session.on_sentinel_visible().is_none());
    }

    #[test]
    fn test_filters_that_exclude_everything_report_no_matches() {
        let mut session = session(10);
        session.update(FilterChange::OnlyWithData(true));
        assert_eq!(*session.status(), ResultsStatus::Ready);
        session.update(FilterChange::MaxDistance(0.0));
        assert_eq!(*session.status(), ResultsStatus::Ready);

        let mut session = ResultsSession::new(PipelineConfigBuilder::new().without_debounce().build());
        session.ingest_records(
            vec![HospitalRecord::new("1", "No data").with_location("Boston", "MA")],
            SearchLocation::new("Boston"),
        );
        session.update(FilterChange::OnlyWithData(true));
        assert_eq!(*session.status(), ResultsStatus::NoMatches);
        session.reset_all();
        assert_eq!(*session.status(), ResultsStatus::Ready);
    }

    #[test]
    fn test_location_filter_without_search_location_keeps_everything() {
        let mut session = ResultsSession::new(PipelineConfigBuilder::new().without_debounce().build());
        let boston: Vec<_> = (0..5)
            .map(|i| {
                HospitalRecord::new(format!("{i}"), format!("Hospital {i}"))
                    .with_location("Boston", "MA")
                    .with_score(f64::from(i))
            })
            .collect();
        session.ingest_records(boston, SearchLocation::none());
        assert_eq!(session.view().counts.other, 5);

        for location in [LocationFilter::City, LocationFilter::State, LocationFilter::Outside] {
            assert_eq!(session.update(FilterChange::Location(location)), vec![FilterField::Location]);
            let view = session.view();
            assert_eq!(view.total_matches, 5, "location {location:?}");
            assert_eq!(*view.status, ResultsStatus::Ready);
        }
    }

    #[test]
    fn test_view_reports_whether_more_records_exist() {
        let full = session(9);
        let view = full.view();
        assert_eq!(view.records.len(), 9);
        assert_eq!(
            view.window,
            WindowState::Incremental {
                loaded_count: 9,
                status: LoadStatus::Idle
            }
        );
        assert!(!view.has_more);

        let mut longer = session(12);
        assert!(longer.view().has_more);
        assert_eq!(longer.load_more(), Some(LoadOutcome::Exhausted));
        assert!(!longer.view().has_more);

        let mut session = ResultsSession::new(PipelineConfigBuilder::paged().without_debounce().build());
        session.ingest_records(records(12), SearchLocation::new("Boston"));
        assert!(session.view().has_more);
        assert!(!session.view().has_previous);
        assert!(session.next_page());
        assert!(!session.view().has_more);
        assert!(session.view().has_previous);
    }

    #[test]
    fn test_reset_field_reports_changed_fields() {
        let mut session = session(20);
        session.update(FilterChange::SortBy(SortKey::Name));
        let generation = session.generation();

        assert_eq!(session.reset_field(FilterField::SortBy), vec![FilterField::SortBy]);
        assert!(session.generation() > generation);
        let generation = session.generation();
        assert!(session.reset_field(FilterField::SortBy).is_empty());
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn test_malformed_payload_fails_closed() {
        let mut session = session(10);
        let err = session
            .ingest_value(serde_json::json!({ "unexpected": true }), SearchLocation::new("Boston"))
            .unwrap_err();
        assert!(err.is_malformed_input());
        assert!(matches!(session.status(), ResultsStatus::Failed(_)));
        assert!(session.view().records.is_empty());
        assert!(session.grouped().is_empty());

        // Filter changes do not resurrect a failed session.
        session.update(FilterChange::Location(LocationFilter::City));
        assert!(matches!(session.status(), ResultsStatus::Failed(_)));
    }

    #[test]
    fn test_debounced_updates_commit_on_tick() {
        let clock = ManualClock::new();
        let mut session = ResultsSession::with_clock(PipelineConfig::default(), clock.clone());
        session.ingest_records(records(20), SearchLocation::new("Boston"));
        let generation = session.generation();

        assert!(session.update(FilterChange::Location(LocationFilter::City)).is_empty());
        assert!(session.has_pending_updates());
        assert_eq!(session.view().total_matches, 20);
        let deadline = session.next_deadline().unwrap();
        assert_eq!(deadline, clock.now() + DEFAULT_DEBOUNCE_INTERVAL);

        clock.advance(Duration::from_millis(200));
        assert_eq!(session.tick(), vec![FilterField::Location]);
        assert!(session.next_deadline().is_none());
        assert_eq!(session.view().total_matches, 10);
        assert!(session.generation() > generation);
    }

    #[test]
    fn test_paged_navigation() {
        let mut session = ResultsSession::new(PipelineConfigBuilder::paged().without_debounce().build());
        session.ingest_records(records(20), SearchLocation::new("Boston"));
        assert!(session.on_sentinel_visible().is_none());
        assert!(session.next_page());
        assert!(session.next_page());
        assert!(!session.next_page());
        let view = session.view();
        assert_eq!(
            view.window,
            WindowState::Paged {
                current_page: 3,
                total_pages: 3,
                per_page: 9
            }
        );
        assert_eq!(view.records.len(), 2);

        session.update(FilterChange::Location(LocationFilter::City));
        assert_eq!(
            session.view().window,
            WindowState::Paged {
                current_page: 1,
                total_pages: 2,
                per_page: 9
            }
        );
    }
}
