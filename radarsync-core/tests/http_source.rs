mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use radarsync_core::{
    HttpRemoteSource, RemoteSource, StatusLevel, StatusLog, SyncError,
};
use support::{FakeRenderer, Workspace};
use url::Url;

#[derive(Default)]
struct Upstream {
    /// Requests for the flaky scan that should fail before it is served.
    flaky_failures: AtomicUsize,
    scan_requests: AtomicUsize,
}

const MANIFEST: &str = "TAMU_20240101_0000\nTAMU_20240101_0005\nTAMU_20240101_0005_annotated\n";

async fn scan(
    State(upstream): State<Arc<Upstream>>,
    Path(name): Path<String>,
) -> (StatusCode, Vec<u8>) {
    upstream.scan_requests.fetch_add(1, Ordering::SeqCst);
    if name == "dir.list" {
        return (StatusCode::OK, MANIFEST.as_bytes().to_vec());
    }
    if name == "TAMU_20240101_0005" {
        let remaining = upstream.flaky_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            upstream.flaky_failures.fetch_sub(1, Ordering::SeqCst);
            return (StatusCode::NOT_FOUND, b"not yet".to_vec());
        }
    }
    (StatusCode::OK, format!("volume {name}").into_bytes())
}

async fn serve(upstream: Arc<Upstream>) -> Url {
    let app = Router::new()
        .route("/data/ADRAD/TAMU/{name}", get(scan))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/data/ADRAD/TAMU/")).unwrap()
}

fn remote(base: Url) -> Arc<dyn RemoteSource> {
    Arc::new(HttpRemoteSource::new(base, "dir.list", Duration::from_secs(5)).unwrap())
}

#[tokio::test]
async fn manifest_and_fetch_over_http() {
    let base = serve(Arc::new(Upstream::default())).await;
    let source = remote(base);

    let manifest = source.manifest().await.unwrap();
    assert!(manifest.contains("TAMU_20240101_0000"));
    let bytes = source.fetch("TAMU_20240101_0000").await.unwrap();
    assert_eq!(bytes, b"volume TAMU_20240101_0000");
}

#[tokio::test]
async fn not_found_is_fetch_failed_and_retried_next_pass() {
    let upstream = Arc::new(Upstream {
        flaky_failures: AtomicUsize::new(1),
        ..Upstream::default()
    });
    let base = serve(upstream.clone()).await;
    let ws = Workspace::new();
    let status = Arc::new(StatusLog::new());
    let renderer = Arc::new(FakeRenderer::default());
    let controller = ws
        .controller(false, Some(remote(base)), status.clone())
        .with_renderer(renderer.clone());

    let first = controller.run_once().await.unwrap();
    assert_eq!(first.staged, 1);
    assert_eq!(first.fetch_failed, 1);
    assert_eq!(first.ignored, 1);
    assert_eq!(renderer.seen(), vec!["TAMU_20240101_0000"]);
    let warning = status
        .events()
        .into_iter()
        .find(|e| e.level == StatusLevel::Warn)
        .expect("fetch failure is reported");
    assert!(warning.message.contains("404"), "{}", warning.message);
    assert!(warning.message.contains("not yet"), "{}", warning.message);

    let second = controller.run_once().await.unwrap();
    assert_eq!(second.catalogued, 1);
    assert_eq!(second.staged, 1);
    assert_eq!(second.fetch_failed, 0);
    assert_eq!(
        renderer.seen(),
        vec!["TAMU_20240101_0000", "TAMU_20240101_0005"]
    );
}

#[tokio::test]
async fn unreachable_index_is_source_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let source = remote(Url::parse(&format!("http://{addr}/data/")).unwrap());

    let err = source.manifest().await.unwrap_err();
    assert!(matches!(err, SyncError::SourceUnavailable(_)));
}
