//! Requeue timing shared by every controller, read from the process environment.
use snafu::{ensure, ResultExt, Snafu};
use std::env;
use std::num::ParseIntError;
use std::time::Duration;

const POLL_INTERVAL_ENV_VAR: &str = "POLL_INTERVAL_SECONDS";
const SHORT_WAIT_ENV_VAR: &str = "SHORT_WAIT_SECONDS";
const ERROR_BACKOFF_ENV_VAR: &str = "ERROR_BACKOFF_SECONDS";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SHORT_WAIT: Duration = Duration::from_secs(30);
const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(15);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum OptionsError {
    #[snafu(display(
        "Could not parse environment variable '{}={}' as seconds: '{}'",
        env_var,
        env_value,
        source
    ))]
    ParseSeconds {
        env_var: String,
        env_value: String,
        source: ParseIntError,
    },

    #[snafu(display("Environment variable '{}' must be greater than zero", env_var))]
    ZeroSeconds { env_var: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControllerOptions {
    /// Delay before re-observing an up-to-date resource.
    pub poll_interval: Duration,
    /// Delay before re-observing a resource after a mutation was issued.
    pub short_wait: Duration,
    /// Delay before retrying a failed reconcile.
    pub error_backoff: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        ControllerOptions {
            poll_interval: DEFAULT_POLL_INTERVAL,
            short_wait: DEFAULT_SHORT_WAIT,
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }
}

impl ControllerOptions {
    pub fn try_from_env() -> Result<Self, OptionsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, OptionsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let seconds = |env_var: &str, default: Duration| -> Result<Duration, OptionsError> {
            match lookup(env_var) {
                Some(value) => {
                    let secs: u64 = value.trim().parse().context(ParseSecondsSnafu {
                        env_var,
                        env_value: value.clone(),
                    })?;
                    ensure!(secs > 0, ZeroSecondsSnafu { env_var });
                    Ok(Duration::from_secs(secs))
                }
                None => Ok(default),
            }
        };

        Ok(ControllerOptions {
            poll_interval: seconds(POLL_INTERVAL_ENV_VAR, DEFAULT_POLL_INTERVAL)?,
            short_wait: seconds(SHORT_WAIT_ENV_VAR, DEFAULT_SHORT_WAIT)?,
            error_backoff: seconds(ERROR_BACKOFF_ENV_VAR, DEFAULT_ERROR_BACKOFF)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;
    use std::collections::HashMap;

    fn lookup(vars: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_options_from_lookup() {
        let test_cases = vec![
            (hashmap! {}, Some(ControllerOptions::default())),
            (
                hashmap! {POLL_INTERVAL_ENV_VAR => "300", ERROR_BACKOFF_ENV_VAR => " 5 "},
                Some(ControllerOptions {
                    poll_interval: Duration::from_secs(300),
                    short_wait: DEFAULT_SHORT_WAIT,
                    error_backoff: Duration::from_secs(5),
                }),
            ),
            (hashmap! {SHORT_WAIT_ENV_VAR => "soon"}, None),
            (hashmap! {POLL_INTERVAL_ENV_VAR => "-1"}, None),
            (hashmap! {ERROR_BACKOFF_ENV_VAR => "0"}, None),
        ];

        for (vars, expected) in test_cases {
            assert_eq!(ControllerOptions::from_lookup(lookup(vars)).ok(), expected);
        }
    }
}
