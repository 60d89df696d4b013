// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Represents the resolved wait budget for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTimeoutValue {
    Finite(Duration),
    Infinite,
}

impl LockTimeoutValue {
    pub const fn from_secs(seconds: u64) -> Self {
        Self::Finite(Duration::from_secs(seconds))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self::Finite(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Duration {
        match self {
            LockTimeoutValue::Finite(duration) => *duration,
            LockTimeoutValue::Infinite => Duration::MAX,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, LockTimeoutValue::Infinite)
    }
}

impl From<Duration> for LockTimeoutValue {
    fn from(duration: Duration) -> Self {
        LockTimeoutValue::Finite(duration)
    }
}

impl fmt::Display for LockTimeoutValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockTimeoutValue::Infinite => f.write_str("infinite"),
            LockTimeoutValue::Finite(duration) => f.write_str(&format_duration(*duration)),
        }
    }
}

impl Serialize for LockTimeoutValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LockTimeoutValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TimeoutVisitor)
    }
}

struct TimeoutVisitor;

impl Visitor<'_> for TimeoutVisitor {
    type Value = LockTimeoutValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number of seconds, a duration such as \"250ms\", or \"infinite\"")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(LockTimeoutValue::from_secs(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        u64::try_from(value)
            .map(LockTimeoutValue::from_secs)
            .map_err(|_| E::custom(format!("lock timeout must not be negative: {value}")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        parse_timeout_override(value).map_err(E::custom)
    }
}

/// Renders a duration the way it is accepted back by [`parse_duration`].
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Source precedence used when resolving the effective timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockTimeoutSource {
    #[default]
    Default,
    Config,
    Environment,
    Cli,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeoutResolution {
    pub value: LockTimeoutValue,
    pub source: LockTimeoutSource,
}

impl fmt::Display for LockTimeoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LockTimeoutSource::Default => "built-in default",
            LockTimeoutSource::Config => "configuration file",
            LockTimeoutSource::Environment => "environment variable",
            LockTimeoutSource::Cli => "CLI flag",
        };
        f.write_str(label)
    }
}

/// Error produced when parsing a timeout or duration value fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTimeoutParseError {
    message: String,
}

impl fmt::Display for LockTimeoutParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LockTimeoutParseError {}

impl LockTimeoutParseError {
    fn invalid_value(value: &str) -> Self {
        Self {
            message: format!(
                "Lock timeout value '{value}' is invalid. Use an integer number of seconds, a \
                 value with a unit such as '500ms' or '5s', or the word 'infinite'."
            ),
        }
    }

    fn infinite_not_allowed(value: &str) -> Self {
        Self {
            message: format!("Duration '{value}' must be finite."),
        }
    }
}

/// Parses a finite duration: `"30"` (seconds), `"30s"`, or `"250ms"`.
pub fn parse_duration(value: &str) -> Result<Duration, LockTimeoutParseError> {
    match parse_timeout_override(value)? {
        LockTimeoutValue::Finite(duration) => Ok(duration),
        LockTimeoutValue::Infinite => Err(LockTimeoutParseError::infinite_not_allowed(value)),
    }
}

/// Parses a lock-timeout override value originating from CLI, environment, or configuration.
pub fn parse_timeout_override(value: &str) -> Result<LockTimeoutValue, LockTimeoutParseError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("infinite") {
        return Ok(LockTimeoutValue::Infinite);
    }

    let (digits, unit_millis) = if let Some(number) = trimmed.strip_suffix("ms") {
        (number, true)
    } else if let Some(number) = trimmed.strip_suffix('s') {
        (number, false)
    } else {
        (trimmed, false)
    };

    match digits.trim().parse::<u64>() {
        Ok(amount) if unit_millis => Ok(LockTimeoutValue::from_millis(amount)),
        Ok(amount) => Ok(LockTimeoutValue::from_secs(amount)),
        Err(_) => Err(LockTimeoutParseError::invalid_value(trimmed)),
    }
}

/// Resolves the effective timeout value based on CLI > env > config > default precedence.
pub struct LockTimeoutResolver<'a> {
    cli_override: Option<&'a str>,
    env_override: Option<&'a str>,
    config_value: LockTimeoutValue,
    default_value: LockTimeoutValue,
}

impl<'a> LockTimeoutResolver<'a> {
    pub fn new(
        cli_override: Option<&'a str>,
        env_override: Option<&'a str>,
        config_value: LockTimeoutValue,
        default_value: LockTimeoutValue,
    ) -> Self {
        Self {
            cli_override,
            env_override,
            config_value,
            default_value,
        }
    }

    pub fn resolve(self) -> Result<LockTimeoutResolution, LockTimeoutParseError> {
        if let Some(cli_value) = self.cli_override {
            let value = parse_timeout_override(cli_value)?;
            return Ok(LockTimeoutResolution {
                value,
                source: LockTimeoutSource::Cli,
            });
        }

        if let Some(env_value) = self.env_override {
            let value = parse_timeout_override(env_value)?;
            return Ok(LockTimeoutResolution {
                value,
                source: LockTimeoutSource::Environment,
            });
        }

        if self.config_value != self.default_value {
            return Ok(LockTimeoutResolution {
                value: self.config_value,
                source: LockTimeoutSource::Config,
            });
        }

        Ok(LockTimeoutResolution {
            value: self.default_value,
            source: LockTimeoutSource::Default,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numeric_values() {
        assert_eq!(
            parse_timeout_override("42").unwrap(),
            LockTimeoutValue::from_secs(42)
        );
        assert_eq!(
            parse_timeout_override("0").unwrap(),
            LockTimeoutValue::from_secs(0)
        );
    }

    #[test]
    fn parse_unit_suffixes() {
        assert_eq!(
            parse_timeout_override("250ms").unwrap(),
            LockTimeoutValue::from_millis(250)
        );
        assert_eq!(
            parse_timeout_override(" 5s ").unwrap(),
            LockTimeoutValue::from_secs(5)
        );
    }

    #[test]
    fn parse_infinite_keyword() {
        assert_eq!(
            parse_timeout_override("infinite").unwrap(),
            LockTimeoutValue::Infinite
        );
        assert_eq!(
            parse_timeout_override("Infinite").unwrap(),
            LockTimeoutValue::Infinite
        );
    }

    #[test]
    fn parse_rejects_invalid_input() {
        for input in ["abc", "-3", "1.5s", "ms", "10m"] {
            let err = parse_timeout_override(input).unwrap_err();
            assert!(err.to_string().contains("is invalid"), "{input}");
        }
    }

    #[test]
    fn parse_duration_rejects_infinite() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        let err = parse_duration("infinite").unwrap_err();
        assert!(err.to_string().contains("must be finite"));
    }

    #[test]
    fn display_round_trips_through_parser() {
        for value in [
            LockTimeoutValue::from_secs(30),
            LockTimeoutValue::from_millis(1_500),
            LockTimeoutValue::Infinite,
        ] {
            assert_eq!(parse_timeout_override(&value.to_string()).unwrap(), value);
        }
    }

    #[test]
    fn resolver_precedence() {
        let default = LockTimeoutValue::from_secs(30);
        let config = LockTimeoutValue::from_secs(120);
        let resolution = LockTimeoutResolver::new(Some("5"), Some("40"), config, default)
            .resolve()
            .unwrap();
        assert_eq!(resolution.source, LockTimeoutSource::Cli);
        assert_eq!(resolution.value, LockTimeoutValue::from_secs(5));
    }

    #[test]
    fn resolver_env_beats_config() {
        let default = LockTimeoutValue::from_secs(30);
        let config = LockTimeoutValue::from_secs(120);
        let resolution = LockTimeoutResolver::new(None, Some("infinite"), config, default)
            .resolve()
            .unwrap();
        assert_eq!(resolution.source, LockTimeoutSource::Environment);
        assert_eq!(resolution.value, LockTimeoutValue::Infinite);
    }

    #[test]
    fn resolver_defaults_when_config_matches() {
        let default = LockTimeoutValue::from_secs(30);
        let resolution = LockTimeoutResolver::new(None, None, default, default)
            .resolve()
            .unwrap();
        assert_eq!(resolution.source, LockTimeoutSource::Default);
        assert_eq!(resolution.value, default);
    }

    #[test]
    fn resolver_surfaces_parse_errors() {
        let default = LockTimeoutValue::from_secs(30);
        assert!(
            LockTimeoutResolver::new(Some("soon"), None, default, default)
                .resolve()
                .is_err()
        );
    }
}
