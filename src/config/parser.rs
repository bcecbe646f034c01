use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::PathBuf;

/// Loads configuration from the environment
///
/// Unset variables fall back to the defaults in [`Config::default`]. The
/// loaded configuration is validated before being returned.
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - A variable had an unparseable value or validation failed
pub fn load_config() -> Result<Config, ConfigError> {
    let defaults = Config::default();

    let config = Config {
        database_path: env_var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path),
        sitemap_index_url: env_var("SITEMAP_INDEX_URL").unwrap_or(defaults.sitemap_index_url),
        base_url: env_var("BASE_URL").unwrap_or(defaults.base_url),
        target_category_id: parse_env("TARGET_CATEGORY_ID")?
            .unwrap_or(defaults.target_category_id),
        display_num: parse_env("DISPLAY_NUM")?,
        tunnel_config_path: env_var("TUNNEL_CONFIG").map(PathBuf::from),
        staleness_days: parse_env("SITEMAP_STALENESS_DAYS")?.unwrap_or(defaults.staleness_days),
        headless: parse_env("HEADLESS")?.unwrap_or(defaults.headless),
        datadump_dir: env_var("DATADUMP_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.datadump_dir),
    };

    validate(&config)?;

    Ok(config)
}

/// Reads an environment variable, treating empty values as unset
fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Reads and parses an environment variable into `T`
///
/// Returns `Ok(None)` when the variable is unset or empty, and a
/// `ConfigError::InvalidValue` when it is set but fails to parse.
fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                var: name.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}
