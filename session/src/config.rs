//! Session configuration.

use ratekeeper_common::{
    is_valid_timestamp_format, ConverterError, CurrencyCode, SNAPSHOT_TIMESTAMP_FORMAT,
};

/// Main converter session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Longest formatted output accepted before `MaximumInput`.
    pub max_output_length: usize,
    /// Fewer active currencies than this yields `FewCurrency`.
    pub minimum_active_currencies: usize,
    /// chrono format stamped on fresh snapshots.
    pub timestamp_format: String,
    /// Capacity of the state broadcast channel.
    pub state_channel_capacity: usize,
    /// Base used when the session context has none.
    pub default_base: Option<CurrencyCode>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_output_length: 15,
            minimum_active_currencies: 2,
            timestamp_format: SNAPSHOT_TIMESTAMP_FORMAT.to_string(),
            state_channel_capacity: 64,
            default_base: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(len) = std::env::var("RATEKEEPER_MAX_OUTPUT_LENGTH") {
            if let Ok(len) = len.parse() {
                config.max_output_length = len;
            }
        }

        if let Ok(min) = std::env::var("RATEKEEPER_MIN_ACTIVE_CURRENCIES") {
            if let Ok(min) = min.parse() {
                config.minimum_active_currencies = min;
            }
        }

        if let Ok(capacity) = std::env::var("RATEKEEPER_STATE_CAPACITY") {
            if let Ok(capacity) = capacity.parse() {
                config.state_channel_capacity = capacity;
            }
        }

        if let Ok(base) = std::env::var("RATEKEEPER_DEFAULT_BASE") {
            if let Ok(base) = CurrencyCode::parse(&base) {
                config.default_base = Some(base);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConverterError> {
        if self.max_output_length == 0 {
            return Err(ConverterError::Configuration(
                "Max output length cannot be 0".to_string(),
            ));
        }

        if self.minimum_active_currencies == 0 {
            return Err(ConverterError::Configuration(
                "Minimum active currencies must be at least 1".to_string(),
            ));
        }

        if self.state_channel_capacity == 0 {
            return Err(ConverterError::Configuration(
                "State channel capacity cannot be 0".to_string(),
            ));
        }

        if !is_valid_timestamp_format(&self.timestamp_format) {
            return Err(ConverterError::Configuration(format!(
                "Invalid timestamp format: {:?}",
                self.timestamp_format
            )));
        }

        Ok(())
    }
}
