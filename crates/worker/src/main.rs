use chrono::NaiveDate;
use clap::Parser;
use ibov_core::pipeline::{RunOutcome, RunReport};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ibov_worker")]
struct Args {
    /// Fetch, extract and stage the snapshot locally; skip upload and job trigger.
    #[arg(long)]
    dry_run: bool,

    /// Directory for the staged JSON file. Overrides STAGING_DIR.
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Request the table for this trading day (YYYY-MM-DD). Records keep the processing date.
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = ibov_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let now = chrono::Utc::now();

    let report = if args.dry_run {
        let mut source = ibov_core::config::SourceConfig::from_settings(&settings)?;
        if let Some(dir) = args.staging_dir {
            source.staging_dir = dir;
        }
        source.reference_date = args.date;
        let fetcher = ibov_core::ingest::fetch::HttpPageFetcher::from_config(&source)?;
        ibov_core::pipeline::stage_snapshot(&fetcher, &source, now).await
    } else {
        let mut config = ibov_core::config::PipelineConfig::from_settings(&settings)?;
        if let Some(dir) = args.staging_dir {
            config.source.staging_dir = dir;
        }
        config.source.reference_date = args.date;
        let pipeline = ibov_core::pipeline::Pipeline::connect(config).await?;
        pipeline.run(now).await
    };

    into_result(report, args.dry_run)
}

fn into_result(report: RunReport, dry_run: bool) -> anyhow::Result<()> {
    match report.outcome {
        RunOutcome::Completed(summary) => {
            tracing::info!(
                run_id = %report.run_id,
                dry_run,
                records = summary.records,
                path = %summary.local_path.display(),
                object_key = summary.object_key.as_deref().unwrap_or("-"),
                "ingest run completed"
            );
            Ok(())
        }
        RunOutcome::Failed { step, error } => {
            let err = anyhow::Error::new(error).context(format!(
                "ingest run {} failed at {step:?} (completed: {:?})",
                report.run_id, report.completed
            ));
            sentry_anyhow::capture_anyhow(&err);
            Err(err)
        }
    }
}

fn init_sentry(settings: &ibov_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
