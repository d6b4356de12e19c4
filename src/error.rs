//! Domain errors
//!
//! Only failures the panel can say something useful about get their own
//! variant; everything else travels as a plain `anyhow` error with
//! context attached at the call site.

use thiserror::Error;

/// Failures raised by the panel's own components
#[derive(Error, Debug)]
pub enum WeatherGridError {
    /// Bad or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// An upstream service was unreachable or answered nonsense
    #[error("API error: {0}")]
    Api(String),

    /// Caller input that cannot be acted on
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The preference store could not be opened or prepared
    #[error("Store error: {0}")]
    Cache(String),
}

impl WeatherGridError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache(message.into())
    }

    /// Message shown to the user, without internal detail
    ///
    /// Validation messages are already written for the user and pass
    /// through unchanged.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) => "Configuration error. Please check your config file.".to_string(),
            Self::Api(_) => {
                "Unable to reach the weather services. Please check your internet connection."
                    .to_string()
            }
            Self::Validation(message) => format!("Invalid input: {message}"),
            Self::Cache(_) => {
                "The preference store is unusable. You may need to clear the cache directory."
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(WeatherGridError::config("no cache path"), "check your config file")]
    #[case(WeatherGridError::api("502 from upstream"), "Unable to reach")]
    #[case(WeatherGridError::validation("query too short"), "query too short")]
    #[case(WeatherGridError::cache("keyspace locked"), "cache directory")]
    fn test_user_message_per_variant(#[case] error: WeatherGridError, #[case] fragment: &str) {
        assert!(
            error.user_message().contains(fragment),
            "expected '{fragment}' in '{}'",
            error.user_message()
        );
    }

    #[test]
    fn test_display_keeps_detail_user_message_hides_it() {
        let error = WeatherGridError::api("DNS lookup failed");
        assert!(error.to_string().contains("DNS lookup failed"));
        assert!(!error.user_message().contains("DNS lookup failed"));
    }
}
