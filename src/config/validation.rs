use super::models::Config;
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Handshake token is not set (WXVOICE_TOKEN)")]
    MissingToken,

    #[error("{field} must be an http(s) URL, got '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    #[error("Storage directory must not be empty")]
    EmptyStorageDir,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_wechat(config)?;
    validate_storage(config)?;
    validate_downloader(config)?;
    Ok(())
}

fn validate_wechat(config: &Config) -> Result<(), ValidationError> {
    if config.wechat.token.is_empty() {
        return Err(ValidationError::MissingToken);
    }

    check_http_url("wechat.media_endpoint", &config.wechat.media_endpoint)
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.dir.as_os_str().is_empty() {
        return Err(ValidationError::EmptyStorageDir);
    }

    check_http_url("storage.public_base_url", &config.storage.public_base_url)
}

fn validate_downloader(config: &Config) -> Result<(), ValidationError> {
    let downloader = &config.downloader;
    let checks = [
        ("downloader.workers", downloader.workers as u64),
        ("downloader.queue_capacity", downloader.queue_capacity as u64),
        ("downloader.connect_timeout_secs", downloader.connect_timeout_secs),
        ("downloader.request_timeout_secs", downloader.request_timeout_secs),
        ("server.max_body_bytes", config.server.max_body_bytes as u64),
    ];

    for (field, value) in checks {
        if value == 0 {
            return Err(ValidationError::NotPositive { field });
        }
    }

    Ok(())
}

fn check_http_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}
