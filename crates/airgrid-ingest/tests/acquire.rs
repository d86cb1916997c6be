use airgrid_ads::{AdsClient, AdsConfig};
use airgrid_core::{Dataset, FetchRequest};
use airgrid_ingest::{AcquisitionService, ExitStatus, IngestError};
use airgrid_store::{LocalFsStore, ObjectStore};
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use bytes::Bytes;
use chrono::NaiveDate;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct Ads {
    addr: SocketAddr,
    calls: Arc<AtomicUsize>,
}

async fn spawn_ads() -> Ads {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let ads = Ads {
        addr: listener.local_addr().expect("addr"),
        calls: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new()
        .route(
            "/processes/:process/execution",
            post(|State(ads): State<Ads>| async move {
                ads.calls.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::CREATED,
                    Json(json!({"jobID": "job-1", "status": "accepted"})),
                )
            }),
        )
        .route(
            "/jobs/:id",
            get(|State(ads): State<Ads>| async move {
                ads.calls.fetch_add(1, Ordering::SeqCst);
                Json(json!({"jobID": "job-1", "status": "successful"}))
            }),
        )
        .route(
            "/jobs/:id/results",
            get(|State(ads): State<Ads>| async move {
                ads.calls.fetch_add(1, Ordering::SeqCst);
                let href = format!("http://{}/files/job-1.grib", ads.addr);
                Json(json!({"asset": {"value": {"type": "application/x-grib", "href": href}}}))
            }),
        )
        .route(
            "/files/job-1.grib",
            get(|State(ads): State<Ads>| async move {
                ads.calls.fetch_add(1, Ordering::SeqCst);
                Bytes::from_static(b"GRIB\x00\x01payload7777").into_response()
            }),
        )
        .with_state(ads.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    ads
}

fn service(ads: &Ads, store: Arc<dyn ObjectStore>) -> AcquisitionService {
    let config = AdsConfig::new(format!("http://{}", ads.addr), "key")
        .with_polling(Duration::from_millis(5), Duration::from_secs(5));
    let client = AdsClient::new(config).expect("client");
    AcquisitionService::new(Arc::new(client), store)
}

fn request() -> FetchRequest {
    FetchRequest::new(
        Dataset::CamsEuropeAirQualityForecastsAnalysis,
        NaiveDate::from_ymd_opt(2025, 3, 12).expect("date"),
    )
}

#[tokio::test]
async fn acquires_from_ads_into_the_local_store() {
    let ads = spawn_ads().await;
    let dir = tempdir().expect("tempdir");
    let store: Arc<dyn ObjectStore> = Arc::new(LocalFsStore::new(dir.path()));

    let acquisition = service(&ads, Arc::clone(&store))
        .acquire(
            &request(),
            "01890c24-905b-7122-b170-b60814e6ee06",
            &CancellationToken::new(),
        )
        .await
        .expect("acquire");

    let key = acquisition.key.render();
    assert_eq!(
        key,
        "ads/cams-europe-air-quality-forecasts-analysis/2025-03-12/01890c24-905b-7122-b170-b60814e6ee06.grib"
    );
    assert_eq!(
        store.get(&key).await.expect("get"),
        Bytes::from_static(b"GRIB\x00\x01payload7777")
    );
    assert!(dir.path().join(&key).is_file());
    assert_eq!(ads.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn invalid_run_id_makes_no_requests() {
    let ads = spawn_ads().await;
    let dir = tempdir().expect("tempdir");
    let store: Arc<dyn ObjectStore> = Arc::new(LocalFsStore::new(dir.path()));

    let err = service(&ads, Arc::clone(&store))
        .acquire(&request(), "nope", &CancellationToken::new())
        .await
        .expect_err("invalid run id");

    assert!(matches!(err, IngestError::Validation(_)));
    assert_eq!(err.exit_status(), ExitStatus::ConfigError);
    assert_eq!(ads.calls.load(Ordering::SeqCst), 0);
    assert!(store.list("").await.expect("list").is_empty());
}
