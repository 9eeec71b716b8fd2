use crate::i18n::Language;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>, // Unset leaves the lead store unconfigured
    pub bitrix_webhook_url: Option<String>,
    pub settings_path: PathBuf,
    pub store_timeout: Duration,
    pub form_close_delay: Duration,
    pub default_language: Language,
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("SUPABASE_DB_URL"))
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            bitrix_webhook_url: std::env::var("BITRIX_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("BITRIX_WEBHOOK_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?,
            settings_path: std::env::var("SETTINGS_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "parkline-settings.json".to_string())
                .into(),
            store_timeout: duration_secs("STORE_TIMEOUT_SECS", 10)?,
            form_close_delay: duration_secs("FORM_CLOSE_DELAY_SECS", 3)?,
            default_language: std::env::var("DEFAULT_LANGUAGE")
                .unwrap_or_else(|_| "mk".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DEFAULT_LANGUAGE must be one of mk, en, sq"))?,
            admin_token: std::env::var("ADMIN_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match config.database_url {
            Some(ref url) => tracing::debug!("Database URL: {}...", url_preview(url)),
            None => tracing::warn!("⚠️  DATABASE_URL not set, lead submissions will be rejected"),
        }
        if config.bitrix_webhook_url.is_some() {
            tracing::info!("Bitrix webhook configured from environment");
        }
        if config.admin_token.is_none() {
            tracing::warn!("⚠️  ADMIN_TOKEN not set, admin endpoints are disabled");
        }
        tracing::debug!("Settings path: {}", config.settings_path.display());
        tracing::debug!("Store timeout: {:?}", config.store_timeout);
        tracing::debug!("Default language: {}", config.default_language);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn duration_secs(var: &str, default: u64) -> anyhow::Result<Duration> {
    let secs: u64 = match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds", var))?,
        _ => default,
    };

    if secs == 0 {
        anyhow::bail!("{} must be greater than zero", var);
    }

    Ok(Duration::from_secs(secs))
}

/// First 20 characters of a connection string, for logs.
fn url_preview(url: &str) -> String {
    url.chars().take(20).collect()
}
