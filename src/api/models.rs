//! JSON bodies of the operator endpoints. The platform-facing `/wx` route
//! speaks XML, see [`crate::wechat`].

use serde::Serialize;

use crate::observability::MetricsSnapshot;
use crate::storage::AssetState;

#[derive(Debug, Serialize)]
pub struct AssetStatusResponse {
    pub filename: String,
    pub state: AssetState,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub workers: usize,
    pub pending_assets: usize,
    pub counters: MetricsSnapshot,
}

