//! Helpers for reading configuration from environment variables

use std::env;
use std::str::FromStr;

use crate::{Error, Result};

/// First set variable among `names`, if any
pub fn first_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env::var(name).ok())
}

/// Parse `name` into `T`, falling back to `default` when unset
pub fn parse_var_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            Error::Configuration(format!("{name} has an invalid value: {raw:?}"))
        }),
        Err(_) => Ok(default),
    }
}
