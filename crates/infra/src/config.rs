//! Configuration loading from the environment.

use core::str::FromStr;

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
const DEFAULT_PRICE_CHANNELS: &str = "prices";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Which part of the pipeline a worker run executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineTask {
    /// Rebuild the simple-SKU price list.
    PriceList,
    /// Rebuild bundle prices from the current price list.
    Bundles,
    /// Publish unpublished prices and bundles.
    Publish,
    /// Price list, then bundles, then publish.
    #[default]
    All,
}

impl PipelineTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineTask::PriceList => "price-list",
            PipelineTask::Bundles => "bundles",
            PipelineTask::Publish => "publish",
            PipelineTask::All => "all",
        }
    }
}

impl FromStr for PipelineTask {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "price-list" => Ok(PipelineTask::PriceList),
            "bundles" => Ok(PipelineTask::Bundles),
            "publish" => Ok(PipelineTask::Publish),
            "all" => Ok(PipelineTask::All),
            other => Err(ConfigError::Invalid {
                key: "PRICEBOOK_TASK",
                value: other.to_string(),
            }),
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricebookConfig {
    /// `Some` iff persistent stores are enabled.
    pub database_url: Option<String>,
    pub use_persistent_stores: bool,
    pub redis_url: String,
    /// Redis channels receiving price messages.
    pub price_channels: Vec<String>,
    pub task: PipelineTask,
}

impl PricebookConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let use_persistent_stores = match lookup("USE_PERSISTENT_STORES") {
            None => false,
            Some(v) => v.trim().parse::<bool>().map_err(|_| ConfigError::Invalid {
                key: "USE_PERSISTENT_STORES",
                value: v.clone(),
            })?,
        };

        let database_url = if use_persistent_stores {
            let url = lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            Some(url)
        } else {
            None
        };

        let redis_url = lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

        let price_channels: Vec<String> = lookup("PRICE_CHANNELS")
            .unwrap_or_else(|| DEFAULT_PRICE_CHANNELS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        let task = match lookup("PRICEBOOK_TASK") {
            Some(v) => v.parse()?,
            None => PipelineTask::default(),
        };

        Ok(Self {
            database_url,
            use_persistent_stores,
            redis_url,
            price_channels,
            task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<PricebookConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        PricebookConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert!(!cfg.use_persistent_stores);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.redis_url, "redis://localhost:6379");
        assert_eq!(cfg.price_channels, vec!["prices".to_string()]);
        assert_eq!(cfg.task, PipelineTask::All);
    }

    #[test]
    fn persistent_stores_require_database_url() {
        let err = config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

        let cfg = config(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/pricebook"),
        ])
        .unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/pricebook"));
    }

    #[test]
    fn channels_and_task_are_parsed() {
        let cfg = config(&[("PRICE_CHANNELS", "erp, storefront ,,"), ("PRICEBOOK_TASK", "bundles")]).unwrap();
        assert_eq!(cfg.price_channels, vec!["erp".to_string(), "storefront".to_string()]);
        assert_eq!(cfg.task, PipelineTask::Bundles);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            config(&[("PRICEBOOK_TASK", "everything")]),
            Err(ConfigError::Invalid { key: "PRICEBOOK_TASK", .. })
        ));
        assert!(matches!(
            config(&[("USE_PERSISTENT_STORES", "yes")]),
            Err(ConfigError::Invalid { key: "USE_PERSISTENT_STORES", .. })
        ));
    }
}
