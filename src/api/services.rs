use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, warn};

use super::{
    error::ApiError,
    models::{AssetStatusResponse, HealthResponse},
    state::AppState,
    utils::read_body,
};
use crate::extract::media_references;
use crate::signature::HandshakeQuery;
use crate::wechat::{InboundMessage, compose_text_reply, parse_inbound};

/// Platform ownership handshake (GET /wx)
///
/// Missing parameters are a 400. A wrong signature is *not* an error: the
/// response is an empty 200 so nothing about the failure leaks.
pub async fn handshake(
    State(state): State<AppState>,
    Query(query): Query<HandshakeQuery>,
) -> Result<Response, ApiError> {
    let handshake = query.require().map_err(|key| {
        warn!(missing = key, "Handshake rejected, parameter missing");
        ApiError::MissingParameter(key)
    })?;

    if handshake.verify(state.token()) {
        state.metrics.handshake_accepted();
        info!(timestamp = %handshake.timestamp, "Handshake verified");
        Ok(plain_text(handshake.echostr))
    } else {
        state.metrics.handshake_rejected();
        debug!(
            timestamp = %handshake.timestamp,
            nonce = %handshake.nonce,
            "Handshake signature mismatch"
        );
        Ok(plain_text(String::new()))
    }
}

/// Inbound message callback (POST /wx)
///
/// ## Flow:
/// 1. Read the body (size limited) and parse the XML envelope
/// 2. Reject empty content with 400 before touching the network
/// 3. Fetch the page the content points at
/// 4. Extract voice media references
/// 5. Queue one background download per reference, collecting public URLs
/// 6. Reply with the URLs, one per line
///
/// Step 5 does not wait for the downloads; a returned URL may briefly 404.
pub async fn receive_message(State(state): State<AppState>, body: Body) -> Result<Response, ApiError> {
    let body = read_body(body, state.config.server.max_body_bytes).await?;

    // Malformed envelopes are a soft failure and end up on the empty-content path
    let message = parse_inbound(&body).unwrap_or_else(|e| {
        warn!(error = %e, size = body.len(), "Unparseable envelope, treating as empty");
        InboundMessage::default()
    });

    let source_url = message.trimmed_content();
    if source_url.is_empty() {
        debug!(from = %message.from_user, kind = ?message.kind(), "Wrong query: empty content");
        return Err(ApiError::WrongQuery);
    }

    info!(from = %message.from_user, url = source_url, "Fetching source page");
    let page = state.fetcher.fetch(source_url).await.map_err(|source| {
        error!(url = source_url, error = %source, "Source page fetch failed");
        ApiError::SourceFetch {
            url: source_url.to_string(),
            source,
        }
    })?;

    let media_ids = media_references(&String::from_utf8_lossy(&page));
    debug!(url = source_url, count = media_ids.len(), "Media references extracted");

    let urls = state
        .downloader
        .download_urls(&media_ids)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to reserve assets: {}", e)))?;

    state.metrics.message_handled();

    let reply = compose_text_reply(&message.from_user, &message.to_user, &urls.join("\n"));
    match reply.to_xml() {
        Ok(xml) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime::TEXT_XML.as_ref())],
            xml,
        )
            .into_response()),
        Err(e) => {
            error!(error = %e, to = %reply.to_user, "Reply serialization failed, sending empty body");
            Ok(plain_text(String::new()))
        }
    }
}

/// Readiness of a previously returned asset URL (GET /voice-status/{filename})
pub async fn asset_status(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<AssetStatusResponse>, ApiError> {
    let asset_state = state
        .downloader
        .store()
        .state(&filename)
        .map_err(|e| ApiError::InvalidFilename(e.to_string()))?;

    Ok(Json(AssetStatusResponse {
        filename,
        state: asset_state,
    }))
}

/// Health check endpoint (GET /health)
///
/// Returns 503 once any download worker has stopped.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.downloader.is_healthy();

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        workers: state.downloader.num_workers(),
        pending_assets: state.downloader.store().pending(),
        counters: state.metrics.snapshot(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

fn plain_text(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())],
        body,
    )
        .into_response()
}
