mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./agrimedia.toml",
        "./config.toml",
        "~/.config/agrimedia/config.toml",
        "/etc/agrimedia/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.cache.enabled && config.cache.max_size == 0 {
        anyhow::bail!("Cache is enabled but max_size is 0");
    }

    if config.cache.enabled && config.cache.default_ttl_secs == 0 {
        anyhow::bail!("Cache default_ttl_secs must be greater than 0");
    }

    for (name, provider) in [
        ("unsplash", &config.providers.unsplash),
        ("pexels", &config.providers.pexels),
    ] {
        if provider.enabled && provider.api_key.trim().is_empty() {
            anyhow::bail!("Provider '{}' is enabled but has no API key", name);
        }
        if provider.hourly_limit == Some(0) {
            anyhow::bail!("Provider '{}' has an hourly_limit of 0", name);
        }
    }

    let perf = &config.performance;
    if perf.max_attempts == 0 {
        anyhow::bail!("performance.max_attempts must be at least 1");
    }
    if perf.base_delay_ms > perf.max_delay_ms {
        anyhow::bail!(
            "performance.base_delay_ms ({}) exceeds max_delay_ms ({})",
            perf.base_delay_ms,
            perf.max_delay_ms
        );
    }
    if perf.timeout_secs == 0 {
        anyhow::bail!("performance.timeout_secs must be greater than 0");
    }
    if perf.max_concurrency == 0 {
        anyhow::bail!("performance.max_concurrency must be at least 1");
    }

    for mapping in &config.categories {
        if mapping.primary.is_empty() {
            anyhow::bail!("Category '{}' has no primary terms", mapping.name);
        }
    }

    for rule in &config.monitoring.rules {
        if rule.window_secs == 0 {
            anyhow::bail!("Alert rule '{}' has a zero evaluation window", rule.id);
        }
    }

    if config.monitoring.log_capacity == 0 {
        tracing::warn!("monitoring.log_capacity is 0; structured log entries will be dropped");
    }

    Ok(())
}
