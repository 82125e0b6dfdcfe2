use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ApiConfig, LoggingConfig},
    registry_worker::{RegistryConfig, WorkerConfig},
    storage::{DedupConfig, StorageConfig},
};

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub dedup: DedupConfig,
    pub registry: RegistryConfig,
    pub worker: WorkerConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Built-in defaults
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (e.g. `FASTGETS_STORAGE__REDIS_URL`)
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file path, if None use default paths
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults =
            ConfigBuilder::try_from(&AppConfig::default()).context("构建默认配置失败")?;
        let mut builder = ConfigBuilder::builder().add_source(defaults);

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/fastgets.toml",
                "fastgets.toml",
                "/etc/fastgets/config.toml",
            ];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("FASTGETS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.storage.validate().context("存储配置验证失败")?;
        self.dedup.validate().context("去重配置验证失败")?;
        self.registry.validate().context("任务注册表配置验证失败")?;
        self.worker.validate().context("Worker配置验证失败")?;
        self.api.validate().context("API配置验证失败")?;
        self.logging.validate().context("日志配置验证失败")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogFormat, StorageBackend};
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.backend, StorageBackend::Redis);
        assert_eq!(config.dedup.ttl(), None);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [storage]
            backend = "memory"
            redis_url = "redis://cache:6379"
            key_prefix = "crawl"
            connection_timeout_seconds = 3

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.key_prefix, "crawl");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.worker.poll_interval_ms, 500);
        assert_eq!(config.registry.misfire_grace_seconds, 60);
    }

    #[test]
    fn invalid_sections_are_rejected() {
        let err = AppConfig::from_toml(
            r#"
            [dedup]
            key = "dedup"
            capacity = 1000
            error_rate = 1.5
            ttl_seconds = 0
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("去重配置验证失败"));

        let err = AppConfig::from_toml(
            r#"
            [worker]
            poll_interval_ms = 1000
            max_backoff_ms = 10
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Worker配置验证失败"));
    }

    #[test]
    fn load_reads_file_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [dedup]
            key = "seen_urls"
            capacity = 5000
            error_rate = 0.01
            ttl_seconds = 86400
            "#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.dedup.key, "seen_urls");
        assert_eq!(config.dedup.ttl(), Some(std::time::Duration::from_secs(86400)));
        assert_eq!(config.api.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn load_fails_for_missing_file() {
        assert!(AppConfig::load(Some("/nonexistent/fastgets.toml")).is_err());
    }

    #[test]
    fn toml_round_trip_keeps_values() {
        let mut config = AppConfig::default();
        config.worker.instance_id = Some("crawler-7".to_string());
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.worker.instance_id.as_deref(), Some("crawler-7"));
    }
}
