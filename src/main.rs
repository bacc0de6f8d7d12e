use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use transcode_worker::config::env::{self, EnvKey};
use transcode_worker::config::settings::AppConfig;
use transcode_worker::infrastructure::db::job_record::PgJobRecordStore;
use transcode_worker::infrastructure::db::pool;
use transcode_worker::infrastructure::storage::s3::StorageService;
use transcode_worker::modules::status::server::StatusServer;
use transcode_worker::modules::transcode::command::FfmpegLauncher;
use transcode_worker::modules::transcode::drain::TracingDiagnostics;
use transcode_worker::modules::transcode::model::{JobOutcome, TranscodeJob};
use transcode_worker::modules::transcode::probe::FfprobeProber;
use transcode_worker::modules::transcode::progress::ProgressState;
use transcode_worker::workers::transcoder::JobOrchestrator;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    init_tracing();

    match run().await {
        Ok(outcome) if outcome.is_complete() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!("❌ Worker could not start: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let use_json = env::get_opt(EnvKey::LogFormat)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<JobOutcome> {
    info!("Starting transcode worker...");

    let config = AppConfig::new().context("invalid configuration")?;
    let job = TranscodeJob::from_config(&config);
    let progress = ProgressState::new();

    let storage = StorageService::new(
        config.s3_endpoint.as_deref(),
        &config.s3_region,
        &config.access_key,
        &config.secret_key,
    )
    .await;

    let db = pool::connect_lazy(&config.database_url).context("invalid DATABASE_URL")?;
    let records = PgJobRecordStore::new(db, &config.job_table);

    let status = match StatusServer::start(config.status_addr(), progress.clone()).await {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("Status service unavailable on {}: {}", config.status_addr(), e);
            None
        }
    };

    let orchestrator = JobOrchestrator::new(
        Arc::new(storage),
        Arc::new(records),
        Arc::new(FfprobeProber::new(config.ffprobe_path.clone())),
        Arc::new(FfmpegLauncher::new(config.ffmpeg_path.clone())),
        progress,
    )
    .with_diagnostics(Arc::new(TracingDiagnostics));

    Ok(orchestrator.run(&job, status).await)
}
