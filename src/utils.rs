// Utility modules

use std::str::FromStr;

/// Reads `name` from the environment, keeping `default` when the variable is
/// missing, unparsable or zero.
pub fn env_parse_positive<T>(name: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
        .unwrap_or(default)
}
