use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::Query,
    http::{Request, StatusCode, header},
    routing::get,
};
use bytes::Bytes;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt; // for `oneshot`

use wxvoice::api::build_router;
use wxvoice::api::state::AppState;
use wxvoice::config::Config;
use wxvoice::downloader::AssetDownloader;
use wxvoice::fetch::{FetchError, Fetcher, HttpClient, HttpConfig};
use wxvoice::ident::IdGenerator;
use wxvoice::observability::Metrics;
use wxvoice::signature::compute_signature;
use wxvoice::storage::{AssetState, AssetStore};
use wxvoice::wechat::parse_inbound;

const TOKEN: &str = "abc";
const PUBLIC_BASE: &str = "http://files.test";

/// Minimal config, bypassing file and environment loading
fn create_test_config(storage_dir: &std::path::Path, media_endpoint: &str) -> Config {
    let config_toml = format!(
        r#"
[server]
max_body_bytes = 4096

[wechat]
media_endpoint = "{media_endpoint}"

[storage]
dir = "{}"
public_base_url = "{PUBLIC_BASE}"

[downloader]
workers = 2
queue_capacity = 4
    "#,
        storage_dir.display()
    );

    let mut config: Config = toml::from_str(&config_toml).expect("Failed to parse test config");
    config.wechat.token = TOKEN.to_string();
    config
}

struct TestApp {
    router: Router,
    state: AppState,
    _temp_dir: TempDir,
}

/// Builds a test app around `fetcher`, with its own storage directory
fn build_test_app(fetcher: Arc<dyn Fetcher>, media_endpoint: &str) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&temp_dir.path().join("voice"), media_endpoint);

    let store = Arc::new(
        AssetStore::open(config.storage.dir.clone(), &config.storage.public_base_url).unwrap(),
    );
    let metrics = Arc::new(Metrics::new());
    let (downloader, _workers) = AssetDownloader::start(
        config.downloader.pool(),
        Url::parse(&config.wechat.media_endpoint).unwrap(),
        fetcher.clone(),
        store,
        Arc::new(IdGenerator::new()),
        metrics.clone(),
    );

    let state = AppState::new(config, fetcher, downloader, metrics);
    TestApp {
        router: build_router(state.clone()),
        state,
        _temp_dir: temp_dir,
    }
}

/// Stand-in for the article host and the media endpoint
async fn start_platform_server() -> String {
    async fn article() -> &'static str {
        r#"<html><body>
<mpvoice voice_encode_fileid="MzA5_voice_a" name="first"></mpvoice>
<p>interlude</p>
<mpvoice voice_encode_fileid="MzA5_voice_b" name="second"></mpvoice>
</body></html>"#
    }

    async fn broken_article() -> &'static str {
        r#"<mpvoice voice_encode_fileid="MzA5_voice_a"></mpvoice>
<mpvoice voice_encode_fileid="missing"></mpvoice>"#
    }

    async fn getvoice(Query(params): Query<HashMap<String, String>>) -> Result<Vec<u8>, StatusCode> {
        match params.get("mediaid").map(String::as_str) {
            Some("missing") | None => Err(StatusCode::NOT_FOUND),
            Some(id) => Ok(format!("ID3 voice {id}").into_bytes()),
        }
    }

    let app = Router::new()
        .route("/article", get(article))
        .route("/broken-article", get(broken_article))
        .route("/plain", get(|| async { "no voices in here" }))
        .route("/voice/getvoice", get(getvoice));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn http_app() -> (TestApp, String) {
    let platform = start_platform_server().await;
    let fetcher = Arc::new(HttpClient::new(HttpConfig::default()).unwrap());
    let app = build_test_app(fetcher, &format!("{platform}/voice/getvoice"));
    (app, platform)
}

/// Counts calls and never succeeds
#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, _url: &str) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Timeout)
    }
}

fn message_xml(content: &str) -> String {
    format!(
        "<xml>\
         <ToUserName><![CDATA[gh_official]]></ToUserName>\
         <FromUserName><![CDATA[o_user_1]]></FromUserName>\
         <CreateTime>1490000000</CreateTime>\
         <MsgType><![CDATA[text]]></MsgType>\
         <Content><![CDATA[{content}]]></Content>\
         <MsgId>6400000000000000000</MsgId>\
         </xml>"
    )
}

fn post_message(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .uri("/wx")
        .method("POST")
        .header(header::CONTENT_TYPE, "text/xml")
        .body(body.into())
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).method("GET").body(Body::empty()).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

/// Poll the store until `filename` leaves the pending state
async fn wait_settled(state: &AppState, filename: &str) -> AssetState {
    for _ in 0..100 {
        let current = state.downloader.store().state(filename).unwrap();
        if current != AssetState::Pending {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("{filename} still pending");
}

fn filename_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap()
}

#[tokio::test]
async fn test_handshake_echoes_on_valid_signature() {
    let app = build_test_app(Arc::new(CountingFetcher::default()), "http://media.test/getvoice");

    let signature = compute_signature(TOKEN, "123", "xyz");
    let uri = format!("/wx?signature={signature}&timestamp=123&nonce=xyz&echostr=ping");

    let response = app.router.oneshot(get_request(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ping");
    assert_eq!(app.state.metrics.snapshot().handshakes_accepted, 1);
}

#[tokio::test]
async fn test_handshake_mismatch_returns_empty_ok() {
    let app = build_test_app(Arc::new(CountingFetcher::default()), "http://media.test/getvoice");

    let signature = compute_signature("some-other-token", "123", "xyz");
    let uri = format!("/wx?signature={signature}&timestamp=123&nonce=xyz&echostr=ping");

    let response = app.router.oneshot(get_request(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "");
    assert_eq!(app.state.metrics.snapshot().handshakes_rejected, 1);
}

#[tokio::test]
async fn test_handshake_missing_parameters() {
    let app = build_test_app(Arc::new(CountingFetcher::default()), "http://media.test/getvoice");

    let cases = [
        ("/wx?timestamp=1&nonce=2&echostr=3", "signature"),
        ("/wx?signature=s&nonce=2&echostr=3", "timestamp"),
        ("/wx?signature=s&timestamp=1&echostr=3", "nonce"),
        ("/wx?signature=s&timestamp=1&nonce=2", "echostr"),
        ("/wx", "signature"),
    ];

    for (uri, missing) in cases {
        let response = ServiceExt::<Request<Body>>::oneshot(app.router.clone(), get_request(uri))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert!(body_string(response).await.contains(missing), "{uri}");
    }
}

#[tokio::test]
async fn test_empty_content_makes_no_downstream_calls() {
    let fetcher = Arc::new(CountingFetcher::default());
    let app = build_test_app(fetcher.clone(), "http://media.test/getvoice");

    let response = app.router.oneshot(post_message(message_xml(""))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Wrong query");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

    let files = std::fs::read_dir(app.state.downloader.store().dir()).unwrap().count();
    assert_eq!(files, 0);
}

#[tokio::test]
async fn test_malformed_envelope_is_wrong_query() {
    let fetcher = Arc::new(CountingFetcher::default());
    let app = build_test_app(fetcher.clone(), "http://media.test/getvoice");

    let response = app.router.oneshot(post_message("<xml><Content>")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Wrong query");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = build_test_app(Arc::new(CountingFetcher::default()), "http://media.test/getvoice");

    let response = app
        .router
        .oneshot(post_message(vec![b'x'; 8192]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_message_pipeline_end_to_end() {
    let (app, platform) = http_app().await;

    let response = ServiceExt::<Request<Body>>::oneshot(
        app.router.clone(),
        post_message(message_xml(&format!("{platform}/article"))),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .starts_with("text/xml")
    );

    let reply = parse_inbound(body_string(response).await.as_bytes()).unwrap();
    assert_eq!(reply.to_user, "o_user_1");
    assert_eq!(reply.from_user, "gh_official");
    assert_eq!(reply.msg_type, "text");

    let urls: Vec<&str> = reply.content.lines().collect();
    assert_eq!(urls.len(), 2);
    assert_ne!(urls[0], urls[1]);
    for (i, url) in urls.iter().enumerate() {
        assert!(url.starts_with(&format!("{PUBLIC_BASE}/voice/")));
        assert!(url.ends_with(&format!("{i}.mp3")));
    }

    // Both assets materialize and are served from /voice
    for (url, media_id) in urls.iter().zip(["MzA5_voice_a", "MzA5_voice_b"]) {
        let filename = filename_of(url);
        assert_eq!(wait_settled(&app.state, filename).await, AssetState::Ready);

        let response = ServiceExt::<Request<Body>>::oneshot(
            app.router.clone(),
            get_request(&format!("/voice/{filename}")),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, format!("ID3 voice {media_id}"));
    }

    assert_eq!(app.state.metrics.snapshot().messages_handled, 1);
}

#[tokio::test]
async fn test_partial_asset_failure_still_replies() {
    let (app, platform) = http_app().await;

    let response = ServiceExt::<Request<Body>>::oneshot(
        app.router.clone(),
        post_message(message_xml(&format!("{platform}/broken-article"))),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reply = parse_inbound(body_string(response).await.as_bytes()).unwrap();
    let urls: Vec<&str> = reply.content.lines().collect();
    assert_eq!(urls.len(), 2);

    assert_eq!(wait_settled(&app.state, filename_of(urls[0])).await, AssetState::Ready);
    assert_eq!(wait_settled(&app.state, filename_of(urls[1])).await, AssetState::Missing);

    let missing = ServiceExt::<Request<Body>>::oneshot(
        app.router.clone(),
        get_request(&format!("/voice/{}", filename_of(urls[1]))),
    )
    .await
    .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let files = std::fs::read_dir(app.state.downloader.store().dir()).unwrap().count();
    assert_eq!(files, 1);
}

#[tokio::test]
async fn test_page_without_references_replies_empty() {
    let (app, platform) = http_app().await;

    let response = app
        .router
        .oneshot(post_message(message_xml(&format!("{platform}/plain"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let reply = parse_inbound(body_string(response).await.as_bytes()).unwrap();
    assert!(reply.content.is_empty());
}

#[tokio::test]
async fn test_source_fetch_failure_is_bad_gateway() {
    let (app, platform) = http_app().await;

    let response = app
        .router
        .oneshot(post_message(message_xml(&format!("{platform}/no-such-page"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(app.state.metrics.snapshot().assets_queued, 0);
}

#[tokio::test]
async fn test_asset_status_endpoint() {
    let app = build_test_app(Arc::new(CountingFetcher::default()), "http://media.test/getvoice");

    let response = ServiceExt::<Request<Body>>::oneshot(
        app.router.clone(),
        get_request("/voice-status/unknown0.mp3"),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(status["filename"], "unknown0.mp3");
    assert_eq!(status["state"], "missing");

    let response = app
        .router
        .oneshot(get_request("/voice-status/bad%20name.mp3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_app(Arc::new(CountingFetcher::default()), "http://media.test/getvoice");

    let response = app.router.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let health: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("healthy"));
    assert_eq!(health.get("workers").and_then(|v| v.as_u64()), Some(2));
    assert!(health.get("version").is_some());
    assert!(health.get("counters").unwrap().is_object());
}
