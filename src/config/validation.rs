use crate::config::types::Config;
use crate::ConfigError;
use url::Url;

/// Validates a loaded configuration
///
/// # Validation rules
///
/// - `sitemap_index_url` and `base_url` must be absolute http(s) URLs
/// - `target_category_id` must be non-zero
/// - `staleness_days` must be positive
///
/// # Arguments
///
/// * `config` - The configuration to validate
///
/// # Returns
///
/// * `Ok(())` - Configuration is valid
/// * `Err(ConfigError)` - Validation failed with a description
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_http_url(&config.sitemap_index_url, "SITEMAP_INDEX_URL")?;
    validate_http_url(&config.base_url, "BASE_URL")?;

    if config.target_category_id == 0 {
        return Err(ConfigError::Validation(
            "TARGET_CATEGORY_ID must be non-zero".to_string(),
        ));
    }

    if config.staleness_days <= 0 {
        return Err(ConfigError::Validation(
            "SITEMAP_STALENESS_DAYS must be positive".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a string is an absolute http or https URL
fn validate_http_url(value: &str, var: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(value)
        .map_err(|e| ConfigError::Validation(format!("{} is not a valid URL: {}", var, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} must use http or https, got '{}'",
            var,
            parsed.scheme()
        )));
    }

    Ok(())
}
