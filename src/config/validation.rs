use crate::config::types::{
    Config, FetchConfig, OutputConfig, PipelineConfig, PolicyConfig, TriggerConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_pipeline_config(&config.pipeline)?;
    validate_fetch_config(&config.fetch)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_policy_config(&config.policy)?;
    validate_trigger_config(&config.trigger)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.lock_name.is_empty() {
        return Err(ConfigError::Validation(
            "lock_name cannot be empty".to_string(),
        ));
    }

    if config.lock_ttl_minutes < 1 {
        return Err(ConfigError::Validation(format!(
            "lock_ttl_minutes must be >= 1, got {}",
            config.lock_ttl_minutes
        )));
    }

    if config.concurrency < 1 || config.concurrency > 32 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 32, got {}",
            config.concurrency
        )));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be > 0".to_string(),
        ));
    }

    if config.robots_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "robots_timeout_secs must be > 0".to_string(),
        ));
    }

    if config.max_body_bytes == 0 {
        return Err(ConfigError::Validation(
            "max_body_bytes must be > 0".to_string(),
        ));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // The name doubles as the robots.txt product token
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_policy_config(config: &PolicyConfig) -> Result<(), ConfigError> {
    for pattern in &config.allowed_domains {
        validate_domain_pattern(pattern)?;
    }
    Ok(())
}

fn validate_trigger_config(config: &TriggerConfig) -> Result<(), ConfigError> {
    if config.secret.trim().is_empty() {
        return Err(ConfigError::Validation(
            "trigger secret cannot be empty".to_string(),
        ));
    }

    if config.bind.is_empty() {
        return Err(ConfigError::Validation(
            "trigger bind address cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    // Must contain at least one dot (e.g., example.com, not just "example")
    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid email format: '{}'", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_domain_pattern() {
        assert!(validate_domain_pattern("example.com").is_ok());
        assert!(validate_domain_pattern("*.example.com").is_ok());
        assert!(validate_domain_pattern("127.0.0.1").is_ok());

        assert!(validate_domain_pattern("").is_err());
        assert!(validate_domain_pattern("*.").is_err());
        assert!(validate_domain_pattern("example").is_err());
        assert!(validate_domain_pattern(".example.com").is_err());
        assert!(validate_domain_pattern("example..com").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }

    #[test]
    fn test_concurrency_bounds() {
        let mut config = PipelineConfig {
            lock_name: "scrape".to_string(),
            lock_ttl_minutes: 10,
            concurrency: 0,
            seeds: vec![],
        };
        assert!(validate_pipeline_config(&config).is_err());

        config.concurrency = 3;
        assert!(validate_pipeline_config(&config).is_ok());

        config.concurrency = 33;
        assert!(validate_pipeline_config(&config).is_err());
    }

    #[test]
    fn test_seed_scheme_rejected() {
        let config = PipelineConfig {
            lock_name: "scrape".to_string(),
            lock_ttl_minutes: 10,
            concurrency: 3,
            seeds: vec!["ftp://example.com/file".to_string()],
        };
        assert!(matches!(
            validate_pipeline_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_fetch_defaults_are_valid() {
        let mut config = FetchConfig::default();
        assert!(validate_fetch_config(&config).is_ok());
        assert_eq!(config.max_crawl_delay_secs, 30);

        config.max_body_bytes = 0;
        assert!(validate_fetch_config(&config).is_err());
    }
}
