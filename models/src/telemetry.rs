//! Project-wide utility for initializing structured logging.
use serde::Deserialize;
use snafu::ResultExt;
use std::env;
use tracing::Subscriber;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, EnvFilter, Registry};

const DEFAULT_TRACING_FILTER_DIRECTIVE: LevelFilter = LevelFilter::INFO;

const TRACING_FILTER_DIRECTIVE_ENV_VAR: &str = "TRACING_FILTER_DIRECTIVE";
const LOGGING_FORMATTER_ENV_VAR: &str = "LOGGING_FORMATTER";
const LOGGING_ANSI_ENABLED_ENV_VAR: &str = "LOGGING_ANSI_ENABLED";

/// The message format for logging tracing events.
///
/// See https://docs.rs/tracing-subscriber/latest/tracing_subscriber/fmt/format/index.html
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// Human-readable, single-line logs for each event.
    Full,
    /// A variant of the default formatter optimized for short line lengths.
    Compact,
    #[default]
    /// Pretty-formatted multi-line logs optimized for human readability.
    Pretty,
    /// Newline-delimited JSON logs.
    Json,
}

/// Logging settings read from the process environment.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct LogFormatter {
    pub message_format: MessageFormat,
    pub ansi_enabled: bool,
}

impl LogFormatter {
    pub fn try_from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the formatter from an arbitrary variable lookup. Unset variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let message_format = match lookup(LOGGING_FORMATTER_ENV_VAR) {
            Some(formatter) => {
                serde_plain::from_str(&formatter).context(error::LogFormatterEnvSnafu {
                    env_value: formatter.clone(),
                })?
            }
            None => MessageFormat::default(),
        };

        let ansi_enabled = match lookup(LOGGING_ANSI_ENABLED_ENV_VAR) {
            Some(ansi_enabled) => {
                ansi_enabled
                    .to_lowercase()
                    .parse()
                    .context(error::LogAnsiEnvSnafu {
                        env_value: ansi_enabled.clone(),
                    })?
            }
            None => false,
        };

        Ok(Self {
            message_format,
            ansi_enabled,
        })
    }

    /// Wraps a subscriber with the formatting layer selected by `message_format`.
    fn layer_onto<S>(&self, subscriber: S) -> Box<dyn Subscriber + Send + Sync>
    where
        S: SubscriberExt + Send + Sync + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let ansi = self.ansi_enabled;
        match self.message_format {
            MessageFormat::Full => Box::new(subscriber.with(fmt::layer().with_ansi(ansi))),
            MessageFormat::Compact => {
                Box::new(subscriber.with(fmt::layer().compact().with_ansi(ansi)))
            }
            MessageFormat::Pretty => {
                Box::new(subscriber.with(fmt::layer().pretty().with_ansi(ansi)))
            }
            MessageFormat::Json => Box::new(subscriber.with(fmt::layer().json().with_ansi(ansi))),
        }
    }
}

/// Installs the global tracing subscriber. The filter is read from `TRACING_FILTER_DIRECTIVE`
/// and defaults to `info`.
pub fn init_telemetry_from_env() -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(DEFAULT_TRACING_FILTER_DIRECTIVE.into())
        .with_env_var(TRACING_FILTER_DIRECTIVE_ENV_VAR)
        .from_env_lossy();

    let subscriber = LogFormatter::try_from_env()?.layer_onto(Registry::default().with(env_filter));

    tracing::subscriber::set_global_default(subscriber)
        .context(error::TracingConfigurationSnafu)?;

    Ok(())
}

pub mod error {
    use std::str::ParseBoolError;

    use super::*;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum TelemetryConfigError {
        #[snafu(display("Error configuring tracing: '{}'", source))]
        TracingConfiguration {
            source: tracing::subscriber::SetGlobalDefaultError,
        },

        #[snafu(display(
            "Could not parse formatter from environment variable '{}={}': '{}'",
            LOGGING_FORMATTER_ENV_VAR,
            env_value,
            source
        ))]
        LogFormatterEnv {
            source: serde_plain::Error,
            env_value: String,
        },

        #[snafu(display(
            "Could not parse ANSI enablement from environment variable '{}={}': '{}'",
            LOGGING_ANSI_ENABLED_ENV_VAR,
            env_value,
            source
        ))]
        LogAnsiEnv {
            source: ParseBoolError,
            env_value: String,
        },
    }
}

type Result<T> = std::result::Result<T, TelemetryConfigError>;
pub use error::TelemetryConfigError;

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;
    use std::collections::HashMap;

    fn lookup(vars: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_log_formatter_from_lookup() {
        let test_cases = vec![
            (hashmap! {}, Some(LogFormatter::default())),
            (
                hashmap! {LOGGING_FORMATTER_ENV_VAR => "json"},
                Some(LogFormatter {
                    message_format: MessageFormat::Json,
                    ansi_enabled: false,
                }),
            ),
            (
                hashmap! {LOGGING_FORMATTER_ENV_VAR => "compact", LOGGING_ANSI_ENABLED_ENV_VAR => "TRUE"},
                Some(LogFormatter {
                    message_format: MessageFormat::Compact,
                    ansi_enabled: true,
                }),
            ),
            (hashmap! {LOGGING_FORMATTER_ENV_VAR => "yaml"}, None),
            (hashmap! {LOGGING_ANSI_ENABLED_ENV_VAR => "sometimes"}, None),
        ];

        for (vars, expected) in test_cases {
            assert_eq!(LogFormatter::from_lookup(lookup(vars)).ok(), expected);
        }
    }
}
