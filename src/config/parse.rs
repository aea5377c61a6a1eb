//! Environment variable parsing utilities.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Source of configuration variables.
///
/// The process environment in production; a plain map in tests so they do not
/// race on global state.
pub trait EnvSource {
    /// Value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

/// Get variable with default value.
pub fn env_or(env: &impl EnvSource, key: &str, default: &str) -> String {
    env.var(key).unwrap_or_else(|| default.to_string())
}

/// Get optional variable (None if empty or missing).
pub fn env_opt(env: &impl EnvSource, key: &str) -> Option<String> {
    env.var(key).filter(|s| !s.is_empty())
}

/// Parse variable as boolean.
/// Treats "1", "true" (case-insensitive) as true.
pub fn env_bool(env: &impl EnvSource, key: &str, default: bool) -> bool {
    env.var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// Parse variable with type conversion.
pub fn env_parse<T: FromStr>(env: &impl EnvSource, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env.var(key) {
        Some(v) if !v.is_empty() => v.parse().map_err(|e: T::Err| ConfigError::Parse {
            key: key.into(),
            value: v,
            error: e.to_string(),
        }),
        _ => Ok(default),
    }
}

/// Parse duration string (e.g., "30s", "2m", "1h", "1d", "1w").
/// Returns None for "off" or "0".
pub fn parse_duration(s: &str) -> Result<Option<Duration>, String> {
    let s = s.trim().to_lowercase();

    if s == "off" || s == "0" || s.is_empty() {
        return Ok(None);
    }

    let (num_str, multiplier) = match s.char_indices().last() {
        Some((idx, unit)) if unit.is_ascii_alphabetic() => {
            let multiplier = match unit {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                'w' => 86400 * 7,
                _ => return Err(format!("invalid unit: {}", unit)),
            };
            (&s[..idx], multiplier)
        }
        _ => (s.as_str(), 1),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid duration: {}", s))?;

    let secs = num
        .checked_mul(multiplier)
        .ok_or_else(|| format!("duration out of range: {}", s))?;

    Ok(Some(Duration::from_secs(secs)))
}

/// Parse variable as duration.
pub fn env_duration(
    env: &impl EnvSource,
    key: &str,
    default: &str,
) -> Result<Option<Duration>, ConfigError> {
    let value = env_or(env, key, default);
    parse_duration(&value).map_err(|e| ConfigError::Parse {
        key: key.into(),
        value,
        error: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("off").unwrap(), None);
        assert_eq!(parse_duration("0").unwrap(), None);
        assert_eq!(parse_duration("").unwrap(), None);

        assert_eq!(parse_duration("30s").unwrap(), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m").unwrap(), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h").unwrap(), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1d").unwrap(), Some(Duration::from_secs(86400)));
        assert_eq!(parse_duration("1w").unwrap(), Some(Duration::from_secs(604800)));

        // Plain seconds
        assert_eq!(parse_duration("120").unwrap(), Some(Duration::from_secs(120)));

        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        let err = parse_duration("99999999999999999w").unwrap_err();
        assert!(err.contains("out of range"));
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            Some(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn test_env_helpers() {
        let env = HashMap::from([
            ("PORT", "8080"),
            ("EMPTY", ""),
            ("FLAG", "TRUE"),
            ("BAD", "eighty"),
        ]);

        assert_eq!(env_or(&env, "PORT", "1"), "8080");
        assert_eq!(env_or(&env, "MISSING", "1"), "1");
        assert_eq!(env_opt(&env, "EMPTY"), None);
        assert!(env_bool(&env, "FLAG", false));
        assert!(!env_bool(&env, "MISSING", false));
        assert_eq!(env_parse(&env, "PORT", 0u16).unwrap(), 8080);
        assert_eq!(env_parse(&env, "EMPTY", 5u16).unwrap(), 5);
        assert!(matches!(
            env_parse(&env, "BAD", 0u16),
            Err(ConfigError::Parse { .. })
        ));
    }
}
