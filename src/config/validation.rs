use crate::config::types::{
    Config, DispatchConfig, OutputConfig, RateLimitConfig, SourceConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

const MAX_WORKERS: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_dispatch_config(&config.dispatch)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the discussion source
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    match (config.subject_id, &config.bvid) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::Validation(
                "set either subject_id or bvid, not both".to_string(),
            ));
        }
        (None, None) => {
            return Err(ConfigError::Validation(
                "one of subject_id or bvid is required".to_string(),
            ));
        }
        (Some(0), None) => {
            return Err(ConfigError::Validation(
                "subject_id must be a positive id".to_string(),
            ));
        }
        (None, Some(bvid)) => {
            validate_bvid(bvid)?;
            check_http_url("view_endpoint", &config.view_endpoint())?;
        }
        (Some(_), None) => {}
    }

    // Placeholder id only matters for the default template
    let endpoint = config.endpoint_for(config.subject_id.unwrap_or(1));
    check_http_url("endpoint", &endpoint)?;

    if config.upper_bound < 2 {
        return Err(ConfigError::Validation(format!(
            "upper_bound must be >= 2, got {}",
            config.upper_bound
        )));
    }

    Ok(())
}

/// Video ids look like `BV1f4411M7QC`
fn validate_bvid(bvid: &str) -> Result<(), ConfigError> {
    let well_formed = bvid.len() == 12
        && bvid.starts_with("BV")
        && bvid.chars().all(|c| c.is_ascii_alphanumeric());

    if !well_formed {
        return Err(ConfigError::Validation(format!(
            "bvid must be 'BV' followed by 10 alphanumeric characters, got '{}'",
            bvid
        )));
    }
    Ok(())
}

fn check_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            name, value
        )));
    }
    Ok(())
}

/// Validates request pacing
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    check_delay(config.average_delay, config.delay_range)
}

/// Rejects a range wider than the average, which would allow negative delays,
/// and bounds whose upper end does not fit in a `u64`
pub fn check_delay(average: u64, range: u64) -> Result<(), ConfigError> {
    if range > average {
        return Err(ConfigError::DelayRange { average, range });
    }
    if average.checked_add(range).is_none() {
        return Err(ConfigError::Validation(format!(
            "average_delay {} plus delay_range {} overflows",
            average, range
        )));
    }
    Ok(())
}

/// Validates writer pool settings
fn validate_dispatch_config(config: &DispatchConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
