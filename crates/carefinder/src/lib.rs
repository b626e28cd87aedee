//! Carefinder - Hospital Search Result Processing
//!
//! Carefinder takes the raw hospital list returned by a search and turns it
//! into what a results page shows: records classified by how close they are to
//! the searched location, narrowed by the user's facet filters, ranked with
//! explicit tie-breaks, and exposed through a paged or infinite-scroll window
//! that stays consistent while filters change.
//!
//! # Quick Start
//!
//! ```rust
//! use carefinder::{
//!     FilterChange, LocationFilter, PipelineConfigBuilder, ResultsSession, SearchLocation,
//! };
//! use carefinder::data::{TestDataConfig, generate_payload};
//!
//! let config = PipelineConfigBuilder::infinite_scroll().without_debounce().build();
//! let mut session = ResultsSession::new(config);
//!
//! // Any accepted payload shape: flat array, grouped buckets, or paged envelope
//! let payload = generate_payload(&TestDataConfig::minimal());
//! session.ingest_value(payload, SearchLocation::new("Boston"))?;
//!
//! session.update(FilterChange::Location(LocationFilter::City));
//! session.update(FilterChange::OnlyWithData(true));
//!
//! let view = session.view();
//! for hospital in view.records {
//!     println!("{hospital}");
//! }
//! assert!(view.counts.state == 0 && view.counts.other == 0);
//!
//! // Scrolling to the end of the list grows the window one page at a time
//! if let Some(ticket) = session.on_sentinel_visible() {
//!     session.complete_load(ticket);
//! }
//! # Ok::<(), carefinder::error::CarefinderError>(())
//! ```
//!
//! # Pipeline
//!
//! - **Classify**: city, state, or other, by a casefolded match of the search
//!   location against each record's address
//! - **Filter**: location, performance tier, data availability and distance
//!   facets, combined with logical AND
//! - **Sort**: score, name, rating or distance, always stable
//! - **Window**: numbered pages or a growing prefix
//!
//! Filter updates are debounced per field; every committed change re-runs the
//! pipeline and invalidates loads started before it.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod classify;
mod config;
mod core;
pub mod error;
mod filter;
mod sort;
mod store;
mod window;

pub use core::{
    IngestSummary, LoadOutcome, LoadTicket, ResultsSession, ResultsStatus, ResultsView,
};

pub use carefinder_data as data;
pub use carefinder_data::{HospitalRecord, PerformanceLevel, ResultSet, SourceShape};
pub use classify::{
    BucketCounts, GroupedResult, LocationRelevance, SearchLocation, bucket_ids, classify,
    relevance_of,
};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use filter::{
    DEFAULT_MAX_DISTANCE, FacetPredicate, FilterChange, FilterError, FilterField, FilterState,
    LocationFilter, PerformanceFilter, PerformanceTier, filter_grouped, filter_records,
};
pub use sort::{ScorePolarity, SortKey, compare, sort_records};
pub use store::{
    Clock, DEFAULT_DEBOUNCE_INTERVAL, FilterStore, ManualClock, SystemClock,
};
pub use window::{
    DEFAULT_PAGE_SIZE, IncrementalWindow, LoadStatus, PageWindow, Window, WindowMode,
    WindowState, clamp_page, page, total_pages,
};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Carefinder library.
///
/// Installs a formatting subscriber filtered at `level`, unless `RUST_LOG`
/// is set, in which case that wins. Later calls are no-ops.
///
/// # Examples
///
/// ```rust
/// use carefinder::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), carefinder::error::CarefinderError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::CarefinderError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?;

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err))?;
        Ok(())
    })
}
