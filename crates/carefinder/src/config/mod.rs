use std::time::Duration;

use crate::{
    error::CarefinderError,
    sort::ScorePolarity,
    store::DEFAULT_DEBOUNCE_INTERVAL,
    window::{DEFAULT_PAGE_SIZE, WindowMode},
};

/// Settings fixed for the lifetime of one results session.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Records per page, and per growth step of the incremental window
    pub page_size: usize,
    pub window_mode: WindowMode,
    pub score_polarity: ScorePolarity,
    /// Settle interval for per-field filter updates; zero disables debouncing
    pub debounce_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            window_mode: WindowMode::default(),
            score_polarity: ScorePolarity::default(),
            debounce_interval: DEFAULT_DEBOUNCE_INTERVAL,
        }
    }
}

/// Builder for creating pipeline configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Create a new builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// Numbered pages, as in a results table
    pub fn paged() -> Self {
        Self::new().window_mode(WindowMode::Paged)
    }

    /// A growing list that loads another page when scrolled to the end
    pub fn infinite_scroll() -> Self {
        Self::new().window_mode(WindowMode::Incremental)
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn window_mode(mut self, mode: WindowMode) -> Self {
        self.config.window_mode = mode;
        self
    }

    /// Set which direction of the score counts as better
    pub fn score_polarity(mut self, polarity: ScorePolarity) -> Self {
        self.config.score_polarity = polarity;
        self
    }

    pub fn higher_scores_are_better(self) -> Self {
        self.score_polarity(ScorePolarity::HigherIsBetter)
    }

    pub fn debounce_interval(mut self, interval: Duration) -> Self {
        self.config.debounce_interval = interval;
        self
    }

    /// Commit filter updates as soon as they are issued
    pub fn without_debounce(self) -> Self {
        self.debounce_interval(Duration::ZERO)
    }

    /// Build the final configuration, rejecting a page size of zero
    pub fn try_build(self) -> Result<PipelineConfig, CarefinderError> {
        if self.config.page_size == 0 {
            return Err(CarefinderError::ConfigError(
                "Page size must be at least 1".to_string(),
            ));
        }
        Ok(self.config)
    }

    /// Build the final configuration; a page size of zero is raised to 1
    pub fn build(self) -> PipelineConfig {
        let mut config = self.config;
        config.page_size = config.page_size.max(1);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder() {
        let config = PipelineConfigBuilder::new().build();
        assert_eq!(config.page_size, 9);
        assert_eq!(config.window_mode, WindowMode::Incremental);
        assert_eq!(config.score_polarity, ScorePolarity::LowerIsBetter);
        assert_eq!(config.debounce_interval, Duration::from_millis(150));
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_presets() {
        assert_eq!(
            PipelineConfigBuilder::paged().build().window_mode,
            WindowMode::Paged
        );
        assert_eq!(
            PipelineConfigBuilder::infinite_scroll().build().window_mode,
            WindowMode::Incremental
        );
    }

    #[test]
    fn test_method_chaining() {
        let config = PipelineConfigBuilder::paged()
            .page_size(20)
            .higher_scores_are_better()
            .without_debounce()
            .build();

        assert_eq!(config.page_size, 20);
        assert_eq!(config.window_mode, WindowMode::Paged);
        assert_eq!(config.score_polarity, ScorePolarity::HigherIsBetter);
        assert!(config.debounce_interval.is_zero());
    }

    #[test]
    fn test_zero_page_size_validation() {
        let result = PipelineConfigBuilder::new().page_size(0).try_build();
        assert!(matches!(result, Err(CarefinderError::ConfigError(_))));

        assert!(PipelineConfigBuilder::new().page_size(1).try_build().is_ok());
        assert_eq!(PipelineConfigBuilder::new().page_size(0).build().page_size, 1);
    }
}
