//! Resolver configuration, loaded from environment variables with sensible
//! defaults.

use crate::error::ConfigError;

/// Runtime-tunable knobs for an `InstanceResolver`.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Page size used by `list` when the caller does not specify one.
    pub default_page_size: u32,

    /// Upper bound on a caller-supplied page size; requests above this are
    /// clamped rather than rejected.
    pub max_page_size: u32,

    /// When set, every ACL evaluation is reported through an `AclTraceSink`
    /// instead of being silently discarded.
    pub acl_trace_enabled: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_page_size: 200,
            max_page_size: 200,
            acl_trace_enabled: false,
        }
    }
}

impl ResolverConfig {
    /// Build a `ResolverConfig` from environment variables.
    ///
    /// Environment variables:
    /// - `RESOLVER_DEFAULT_PAGE_SIZE`: default `list` page size (default: 200)
    /// - `RESOLVER_MAX_PAGE_SIZE`: max allowed page size (default: 200)
    /// - `RESOLVER_ACL_TRACE`: "true" or "false" (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let default_page_size = parse_env_or("RESOLVER_DEFAULT_PAGE_SIZE", 200)?;
        let max_page_size = parse_env_or("RESOLVER_MAX_PAGE_SIZE", 200)?;

        if default_page_size > max_page_size {
            return Err(ConfigError::InvalidValue {
                field: "RESOLVER_DEFAULT_PAGE_SIZE".to_string(),
                value: default_page_size.to_string(),
                reason: "must not exceed RESOLVER_MAX_PAGE_SIZE".to_string(),
            });
        }

        let acl_trace_enabled = std::env::var("RESOLVER_ACL_TRACE")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            default_page_size,
            max_page_size,
            acl_trace_enabled,
        })
    }

    /// Clamp a caller-requested page size into `[1, max_page_size]`.
    pub fn clamp_page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

fn parse_env_or(var: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            field: var.to_string(),
            value,
            reason: "not a valid unsigned integer".to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = ResolverConfig::default();
        assert_eq!(config.default_page_size, 200);
        assert_eq!(config.max_page_size, 200);
        assert!(!config.acl_trace_enabled);
    }

    #[test]
    fn clamp_page_size_respects_bounds() {
        let config = ResolverConfig::default();
        assert_eq!(config.clamp_page_size(None), 200);
        assert_eq!(config.clamp_page_size(Some(0)), 1);
        assert_eq!(config.clamp_page_size(Some(5_000)), 200);
        assert_eq!(config.clamp_page_size(Some(50)), 50);
    }
}
