use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::downloader::PoolConfig;
use crate::fetch::HttpConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub wechat: WechatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Largest accepted callback body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

/// Platform settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WechatConfig {
    /// Shared handshake token. Loaded from the environment, never from the file.
    #[serde(default, skip_serializing)]
    pub token: String,
    /// Media retrieval endpoint; the media id is appended as `mediaid=`
    #[serde(default = "default_media_endpoint")]
    pub media_endpoint: String,
}

impl Default for WechatConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            media_endpoint: default_media_endpoint(),
        }
    }
}

fn default_media_endpoint() -> String {
    "http://res.wx.qq.com/voice/getvoice".to_string()
}

/// Asset storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
    /// Base URL under which `/voice/<filename>` is reachable from outside
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            public_base_url: default_public_base_url(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("data/voice")
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

/// Download worker pool and HTTP client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Pending jobs per worker before submission waits
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl DownloaderConfig {
    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

fn default_workers() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    64
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    HttpConfig::default().user_agent
}
