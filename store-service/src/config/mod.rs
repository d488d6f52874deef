//! Configuration module for store-service.

use crate::services::{FontSet, RenderSettings};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// `None` runs the service on the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub store: StoreInfo,
    pub fonts: FontConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Printed in invoice headers and footers.
#[derive(Debug, Clone)]
pub struct StoreInfo {
    pub name: String,
    pub contact: String,
}

#[derive(Debug, Clone, Default)]
pub struct FontConfig {
    pub regular_path: Option<String>,
    pub bold_path: Option<String>,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let database = match env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => Some(DatabaseConfig {
                url,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            }),
            _ => None,
        };

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "store-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database,
            store: StoreInfo {
                name: env::var("STORE_NAME").unwrap_or_else(|_| "FMSTYLE".to_string()),
                contact: env::var("STORE_CONTACT")
                    .unwrap_or_else(|_| "Hotline: 1900 0000 - fmstyle.vn".to_string()),
            },
            fonts: FontConfig {
                regular_path: env::var("INVOICE_FONT_PATH").ok(),
                bold_path: env::var("INVOICE_BOLD_FONT_PATH").ok(),
            },
        })
    }

    /// Settings for a service without a database, for tests and demos.
    pub fn in_memory() -> Self {
        Self {
            common: core_config::Config::default(),
            service_name: "store-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: None,
            store: StoreInfo {
                name: "FMSTYLE".to_string(),
                contact: "Hotline: 1900 0000 - fmstyle.vn".to_string(),
            },
            fonts: FontConfig::default(),
        }
    }

    /// Reads the configured font files. A missing file fails startup rather
    /// than silently falling back.
    pub fn render_settings(&self) -> Result<RenderSettings, AppError> {
        let read = |path: &Option<String>| -> Result<Option<Vec<u8>>, AppError> {
            match path {
                Some(path) => std::fs::read(path).map(Some).map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Cannot read font {}: {}", path, e))
                }),
                None => Ok(None),
            }
        };

        Ok(RenderSettings {
            store_name: self.store.name.clone(),
            store_contact: self.store.contact.clone(),
            fonts: FontSet {
                regular: read(&self.fonts.regular_path)?,
                bold: read(&self.fonts.bold_path)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_file_is_a_config_error() {
        let mut config = StoreConfig::in_memory();
        config.fonts.regular_path = Some("/nonexistent/font.ttf".to_string());
        let err = config.render_settings().unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }

    #[test]
    fn no_fonts_configured_uses_builtin() {
        let settings = StoreConfig::in_memory().render_settings().unwrap();
        assert!(settings.fonts.regular.is_none());
        assert_eq!(settings.store_name, "FMSTYLE");
    }
}
