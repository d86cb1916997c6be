use airgrid_ads::{ADS_SOURCE, AdsClient, AdsConfig};
use airgrid_core::{Dataset, FetchRequest, RunId, parse_date};
use airgrid_ingest::{AcquisitionService, ExitStatus};
use airgrid_query::{ClickHouseConfig, ClickHousePointStore, QueryService, serve};
use airgrid_store::{LocalFsStore, ObjectKey, ObjectStore, S3Store};
use anyhow::{Context, anyhow};
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "airgrid", version)]
#[command(about = "Acquire gridded air-quality data and serve point queries")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one dataset/date from ADS and store it under the run id.
    Ingest(IngestArgs),
    /// Serve the point query HTTP API.
    Serve(ServeArgs),
    /// List stored objects for one source/dataset/date, or check one run's object.
    List(ListArgs),
}

#[derive(Args)]
struct IngestArgs {
    #[arg(long, default_value = "cams-europe-air-quality-forecasts-analysis")]
    dataset: String,
    /// YYYY-MM-DD, defaults to today (UTC).
    #[arg(long)]
    date: Option<String>,
    /// UUIDv7 minted by the orchestrator for this attempt.
    #[arg(long, default_value = "")]
    run_id: String,
    #[command(flatten)]
    ads: AdsArgs,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args)]
struct AdsArgs {
    #[arg(long, env = "ADS_BASE_URL")]
    ads_base_url: String,
    #[arg(long, env = "ADS_API_KEY", hide_env_values = true)]
    ads_api_key: String,
    #[arg(long, default_value_t = 10)]
    poll_interval_secs: u64,
    #[arg(long, default_value_t = 30 * 60)]
    poll_timeout_secs: u64,
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "AIRGRID_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,
    #[arg(long, env = "CLICKHOUSE_URL", default_value = "http://localhost:8123")]
    clickhouse_url: String,
    #[arg(long, env = "CLICKHOUSE_USER", default_value = "default")]
    clickhouse_user: String,
    #[arg(long, env = "CLICKHOUSE_PASSWORD", default_value = "", hide_env_values = true)]
    clickhouse_password: String,
    #[arg(long, env = "CLICKHOUSE_DATABASE", default_value = "airgrid")]
    clickhouse_database: String,
    /// Oldest sample accepted, in seconds before the requested time.
    #[arg(long, env = "AIRGRID_SNAP_WINDOW_SECS")]
    snap_window_secs: Option<u64>,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, default_value = ADS_SOURCE)]
    source: String,
    #[arg(long)]
    dataset: String,
    #[arg(long)]
    date: String,
    /// Only report the object stored under this run id, if present.
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long, default_value = "grib")]
    extension: String,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Clone)]
struct StoreArgs {
    #[arg(long, env = "AIRGRID_STORE_TYPE", default_value = "local")]
    store_type: String,
    #[arg(long, env = "AIRGRID_STORE_PATH")]
    store_path: Option<PathBuf>,
    #[arg(long, env = "S3_ENDPOINT")]
    s3_endpoint: Option<String>,
    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    s3_region: String,
    #[arg(long, env = "S3_ACCESS_KEY", default_value = "minioadmin", hide_env_values = true)]
    s3_access_key: String,
    #[arg(long, env = "S3_SECRET_KEY", default_value = "minioadmin", hide_env_values = true)]
    s3_secret_key: String,
    #[arg(long, env = "S3_BUCKET")]
    s3_bucket: Option<String>,
}

/// A failed command and the exit status the scheduler should see.
struct Failure {
    status: ExitStatus,
    error: anyhow::Error,
}

impl Failure {
    fn config(error: impl Into<anyhow::Error>) -> Self {
        Self {
            status: ExitStatus::ConfigError,
            error: error.into(),
        }
    }

    fn application(error: impl Into<anyhow::Error>) -> Self {
        Self {
            status: ExitStatus::ApplicationError,
            error: error.into(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return parse_failure_status(err.kind()).into();
        }
    };
    init_tracing(cli.log_json);

    let outcome = match cli.command {
        Commands::Ingest(args) => run_ingest_command(args).await,
        Commands::Serve(args) => run_serve_command(args).await,
        Commands::List(args) => run_list_command(args).await,
    };

    match outcome {
        Ok(()) => ExitStatus::Success.into(),
        Err(failure) => {
            let message = format!("{:#}", failure.error);
            error!(
                error = %message,
                exit_code = failure.status.code(),
                "command failed"
            );
            failure.status.into()
        }
    }
}

fn parse_failure_status(kind: ErrorKind) -> ExitStatus {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitStatus::Success,
        _ => ExitStatus::ConfigError,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn run_ingest_command(args: IngestArgs) -> Result<(), Failure> {
    // Argument checks come before anything touches the network.
    let run_id = RunId::parse(&args.run_id).map_err(Failure::config)?;
    let request = fetch_request(&args.dataset, args.date.as_deref()).map_err(Failure::config)?;
    let store = build_store(&args.store).await?;

    let config = AdsConfig {
        request_timeout: Duration::from_secs(args.ads.request_timeout_secs),
        ..AdsConfig::new(args.ads.ads_base_url, args.ads.ads_api_key).with_polling(
            Duration::from_secs(args.ads.poll_interval_secs),
            Duration::from_secs(args.ads.poll_timeout_secs),
        )
    };
    let client = AdsClient::new(config).map_err(Failure::config)?;
    let service = AcquisitionService::new(Arc::new(client), store);

    let cancel = CancellationToken::new();
    cancel_on_shutdown_signal(cancel.clone());

    let acquisition = service
        .acquire(&request, run_id.as_str(), &cancel)
        .await
        .map_err(|err| Failure {
            status: err.exit_status(),
            error: err.into(),
        })?;

    info!(
        key = %acquisition.key,
        size = acquisition.size,
        etag = %acquisition.etag,
        "ingestion complete"
    );
    Ok(())
}

async fn run_serve_command(args: ServeArgs) -> Result<(), Failure> {
    let config = ClickHouseConfig {
        user: args.clickhouse_user,
        password: args.clickhouse_password,
        snap_window: args.snap_window_secs.map(Duration::from_secs),
        ..ClickHouseConfig::new(args.clickhouse_url, args.clickhouse_database)
    };
    let store = ClickHousePointStore::new(config).map_err(Failure::config)?;
    let service = Arc::new(QueryService::new(Arc::new(store)));

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))
        .map_err(Failure::config)?;

    let shutdown = CancellationToken::new();
    cancel_on_shutdown_signal(shutdown.clone());
    serve(listener, service, shutdown)
        .await
        .context("query API server failed")
        .map_err(Failure::application)
}

async fn run_list_command(args: ListArgs) -> Result<(), Failure> {
    for key in list_keys(&args).await? {
        println!("{key}");
    }
    Ok(())
}

async fn list_keys(args: &ListArgs) -> Result<Vec<String>, Failure> {
    let dataset: Dataset = args.dataset.parse().map_err(Failure::config)?;
    let date = parse_date(&args.date).map_err(Failure::config)?;
    let run_id = args
        .run_id
        .as_deref()
        .map(RunId::parse)
        .transpose()
        .map_err(Failure::config)?;
    let store = build_store(&args.store).await?;

    let Some(run_id) = run_id else {
        let prefix = ObjectKey::prefix(&args.source, dataset, date);
        return store
            .list(&prefix)
            .await
            .with_context(|| format!("failed to list {prefix}"))
            .map_err(Failure::application);
    };
    let key = ObjectKey::new(args.source.clone(), dataset, date, run_id, args.extension.clone())
        .render();
    let found = store
        .exists(&key)
        .await
        .with_context(|| format!("failed to check {key}"))
        .map_err(Failure::application)?;
    Ok(if found { vec![key] } else { Vec::new() })
}

fn fetch_request(dataset: &str, date: Option<&str>) -> anyhow::Result<FetchRequest> {
    let dataset: Dataset = dataset.parse()?;
    let date = match date {
        Some(raw) => parse_date(raw)?,
        None => chrono::Utc::now().date_naive(),
    };
    Ok(FetchRequest::new(dataset, date))
}

/// Missing or unknown store arguments are config errors; an endpoint that
/// cannot provide the bucket is an application error.
async fn build_store(args: &StoreArgs) -> Result<Arc<dyn ObjectStore>, Failure> {
    match args.store_type.as_str() {
        "local" => {
            let path = args.store_path.as_ref().ok_or_else(|| {
                Failure::config(anyhow!("--store-path is required for --store-type local"))
            })?;
            Ok(Arc::new(LocalFsStore::new(path)))
        }
        "s3" => {
            let endpoint = args.s3_endpoint.as_deref().ok_or_else(|| {
                Failure::config(anyhow!("--s3-endpoint is required for --store-type s3"))
            })?;
            let bucket = args.s3_bucket.as_deref().ok_or_else(|| {
                Failure::config(anyhow!("--s3-bucket is required for --store-type s3"))
            })?;
            let store = S3Store::from_endpoint(
                endpoint,
                &args.s3_region,
                &args.s3_access_key,
                &args.s3_secret_key,
                bucket,
            );
            store
                .ensure_bucket()
                .await
                .with_context(|| format!("bucket {bucket} is not usable"))
                .map_err(Failure::application)?;
            Ok(Arc::new(store))
        }
        other => Err(Failure::config(anyhow!("unsupported --store-type {other}"))),
    }
}

fn cancel_on_shutdown_signal(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        token.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
