pub mod api;
pub mod config;
pub mod downloader;
pub mod extract;
pub mod fetch;
pub mod ident;
pub mod observability;
pub mod signature;
pub mod storage;
pub mod wechat;
