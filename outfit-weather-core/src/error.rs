use thiserror::Error;

use crate::provider::ProviderId;

/// Errors raised inside the engine.
///
/// Only [`WeatherError::UnknownRegion`] is meant to reach callers of the
/// region directory; provider-level variants are recoverable and drive the
/// fallback chains, which always end in a usable record.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Unknown region '{0}'")]
    UnknownRegion(String),

    #[error("Provider '{provider}' unavailable: {reason}")]
    ProviderUnavailable { provider: ProviderId, reason: String },

    #[error("Provider '{provider}' could not be reached: {reason}")]
    ProviderTransport { provider: ProviderId, reason: String },

    #[error("Provider '{provider}' returned HTTP {status}: {body}")]
    ProviderHttp {
        provider: ProviderId,
        status: u16,
        body: String,
    },

    #[error("Provider '{provider}' sent a malformed response: {reason}")]
    ProviderFormat { provider: ProviderId, reason: String },

    #[error("Provider '{provider}' did not answer within {budget_ms}ms")]
    Timeout { provider: ProviderId, budget_ms: u64 },

    #[error("All weather providers exhausted")]
    AllProvidersExhausted,

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl WeatherError {
    pub fn unavailable(provider: ProviderId, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable { provider, reason: reason.into() }
    }

    pub fn format(provider: ProviderId, reason: impl Into<String>) -> Self {
        Self::ProviderFormat { provider, reason: reason.into() }
    }

    /// Short machine-friendly tag used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownRegion(_) => "unknown_region",
            Self::ProviderUnavailable { .. } => "unavailable",
            Self::ProviderTransport { .. } => "transport",
            Self::ProviderHttp { .. } => "http",
            Self::ProviderFormat { .. } => "format",
            Self::Timeout { .. } => "timeout",
            Self::AllProvidersExhausted => "exhausted",
            Self::InvalidDate(_) => "invalid_date",
            Self::Cache(_) => "cache",
        }
    }

    /// Provider failures that should make the caller try the next source.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. }
                | Self::ProviderTransport { .. }
                | Self::ProviderHttp { .. }
                | Self::ProviderFormat { .. }
                | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_are_recoverable() {
        let err = WeatherError::unavailable(ProviderId::OpenWeather, "no key");
        assert!(err.is_recoverable());
        assert_eq!(err.kind(), "unavailable");

        let err = WeatherError::ProviderTransport {
            provider: ProviderId::WeatherApi,
            reason: "connection refused".into(),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.kind(), "transport");

        let err = WeatherError::Timeout { provider: ProviderId::Kma, budget_ms: 2000 };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("2000ms"));
    }

    #[test]
    fn unknown_region_is_fatal() {
        let err = WeatherError::UnknownRegion("atlantis".into());
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("atlantis"));
    }
}
