//! Index configuration.

use crate::error::{IndexError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Configuration for building the index.
///
/// Validated once before any computation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Calendar days of history ending at the latest price date (default: 30)
    pub lookback_days: u32,
    /// Number of constituents (default: 100)
    pub top_k: usize,
    /// Index level on the first date (default: 1000.0)
    pub base_value: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            top_k: 100,
            base_value: 1000.0,
        }
    }
}

impl IndexConfig {
    /// Check the configuration against the size of the candidate universe.
    ///
    /// # Errors
    /// Returns [`IndexError::Configuration`] when the window is empty, when
    /// `top_k` is zero or larger than the universe, or when the base value is
    /// not a positive finite number.
    pub fn validate(&self, universe_size: usize) -> Result<()> {
        if self.lookback_days == 0 {
            return Err(IndexError::Configuration(
                "lookback_days must be greater than 0".to_string(),
            ));
        }

        if self.top_k == 0 {
            return Err(IndexError::Configuration(
                "top_k must be greater than 0".to_string(),
            ));
        }

        if self.top_k > universe_size {
            return Err(IndexError::Configuration(format!(
                "top_k ({}) exceeds universe size ({})",
                self.top_k, universe_size
            )));
        }

        if !(self.base_value.is_finite() && self.base_value > 0.0) {
            return Err(IndexError::Configuration(format!(
                "base_value must be a positive number, got {}",
                self.base_value
            )));
        }

        Ok(())
    }

    /// First date of the window that ends on `end`.
    pub fn window_start(&self, end: NaiveDate) -> NaiveDate {
        end - Duration::days(i64::from(self.lookback_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_config_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.lookback_days, 30);
        assert_eq!(config.top_k, 100);
        assert_eq!(config.base_value, 1000.0);
        assert!(config.validate(120).is_ok());
    }

    #[rstest]
    #[case::zero_window(IndexConfig { lookback_days: 0, ..Default::default() }, 120)]
    #[case::zero_k(IndexConfig { top_k: 0, ..Default::default() }, 120)]
    #[case::k_above_universe(IndexConfig::default(), 99)]
    #[case::zero_base(IndexConfig { base_value: 0.0, ..Default::default() }, 120)]
    #[case::negative_base(IndexConfig { base_value: -5.0, ..Default::default() }, 120)]
    #[case::nan_base(IndexConfig { base_value: f64::NAN, ..Default::default() }, 120)]
    fn test_invalid_config(#[case] config: IndexConfig, #[case] universe_size: usize) {
        let err = config.validate(universe_size).unwrap_err();
        assert!(matches!(err, IndexError::Configuration(_)));
    }

    #[test]
    fn test_k_equal_to_universe_is_valid() {
        let config = IndexConfig {
            top_k: 4,
            ..Default::default()
        };
        assert!(config.validate(4).is_ok());
    }

    #[test]
    fn test_window_start() {
        let config = IndexConfig {
            lookback_days: 30,
            ..Default::default()
        };
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            config.window_start(end),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: IndexConfig = serde_json::from_str(r#"{"top_k": 50}"#).unwrap();
        assert_eq!(config.top_k, 50);
        assert_eq!(config.lookback_days, 30);
        assert_eq!(config.base_value, 1000.0);
    }
}
