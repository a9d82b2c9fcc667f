use crate::config::{PipelineConfig, PublishConfig, SourceConfig};
use crate::domain::record::Snapshot;
use crate::error::IngestError;
use crate::ingest::fetch::{HttpPageFetcher, PageFetcher};
use crate::ingest::table::extract_records;
use crate::jobs::glue::GlueJobLauncher;
use crate::jobs::{JobLauncher, JobRequest, JobRun};
use crate::storage::load_aws_config;
use crate::storage::object_store::{object_key, publish_file, ObjectStore, S3ObjectStore};
use crate::storage::snapshot::{remove_staged, write_snapshot};
use crate::time::b3_market::capture_date;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

const METADATA_SOURCE: &str = "B3_IBOV";

/// Steps of one run, in the order they execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Fetch,
    Extract,
    Write,
    Publish,
    Trigger,
}

#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Steps that finished, in order. On failure this is the prefix that took effect.
    pub completed: Vec<Step>,
    pub outcome: RunOutcome,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    Failed { step: Step, error: IngestError },
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: usize,
    pub local_path: PathBuf,
    /// `None` for staging-only runs.
    pub object_key: Option<String>,
    pub job_run: Option<JobRun>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed(_))
    }

    pub fn failure(&self) -> Option<(Step, &IngestError)> {
        match &self.outcome {
            RunOutcome::Failed { step, error } => Some((*step, error)),
            RunOutcome::Completed(_) => None,
        }
    }
}

struct Progress {
    completed: Vec<Step>,
}

impl Progress {
    fn new() -> Self {
        Self {
            completed: Vec::with_capacity(5),
        }
    }

    fn done(&mut self, step: Step) {
        tracing::debug!(?step, "step completed");
        self.completed.push(step);
    }
}

type StepResult<T> = Result<T, (Step, IngestError)>;

fn at<T>(step: Step, res: Result<T, IngestError>) -> StepResult<T> {
    res.map_err(|e| (step, e))
}

/// Fetch → extract → write → publish → trigger. Any failure stops the chain; nothing that
/// already happened is undone.
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn ObjectStore>,
    jobs: Arc<dyn JobLauncher>,
    source: SourceConfig,
    publish: PublishConfig,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn ObjectStore>,
        jobs: Arc<dyn JobLauncher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fetcher,
            store,
            jobs,
            source: config.source,
            publish: config.publish,
        }
    }

    /// Wires the HTTP fetcher, S3 and Glue from validated config.
    pub async fn connect(config: PipelineConfig) -> anyhow::Result<Self> {
        let fetcher = HttpPageFetcher::from_config(&config.source)?;
        let sdk_config = load_aws_config(&config.publish.aws_region).await;
        tracing::info!(
            region = %config.publish.aws_region,
            bucket = %config.publish.bucket,
            job = %config.publish.glue_job_name,
            "pipeline configured"
        );

        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(S3ObjectStore::new(&sdk_config)),
            Arc::new(GlueJobLauncher::new(&sdk_config)),
            config,
        ))
    }

    /// Runs every step with `now` as the single timestamp for the capture date, the staged file
    /// name and the object key.
    pub async fn run(&self, now: DateTime<Utc>) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("ingest_run", %run_id);

        async move {
            let mut progress = Progress::new();
            let res = self.run_steps(now, &mut progress).await;
            finish(run_id, now, progress, res)
        }
        .instrument(span)
        .await
    }

    async fn run_steps(&self, now: DateTime<Utc>, progress: &mut Progress) -> StepResult<RunSummary> {
        let (snapshot, local_path) =
            stage_steps(self.fetcher.as_ref(), &self.source, now, progress).await?;

        let key = object_key(&self.publish.raw_key_prefix, &snapshot.file_name());
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), METADATA_SOURCE.to_string());
        metadata.insert("records_count".to_string(), snapshot.records.len().to_string());
        metadata.insert("extraction_time".to_string(), now.to_rfc3339());

        at(
            Step::Publish,
            publish_file(
                self.store.as_ref(),
                &local_path,
                &self.publish.bucket,
                &key,
                metadata,
            )
            .await,
        )?;
        progress.done(Step::Publish);

        if self.source.staging_cleanup {
            if let Err(err) = remove_staged(&local_path).await {
                tracing::warn!(error = %err, "failed to remove staged snapshot");
            }
        }

        let processing_date = capture_date(now, self.source.capture_clock);
        let job_run = at(
            Step::Trigger,
            self.jobs
                .start_job(JobRequest::for_snapshot(
                    &self.publish.glue_job_name,
                    &self.publish.bucket,
                    &key,
                    processing_date,
                ))
                .await,
        )?;
        progress.done(Step::Trigger);

        tracing::info!(
            service = self.jobs.service_name(),
            job_name = %job_run.job_name,
            job_run_id = job_run.run_id.as_deref().unwrap_or("-"),
            "started downstream job"
        );

        Ok(RunSummary {
            records: snapshot.records.len(),
            local_path,
            object_key: Some(key),
            job_run: Some(job_run),
        })
    }
}

/// Fetch, extract and stage only. Nothing leaves the machine.
pub async fn stage_snapshot(
    fetcher: &dyn PageFetcher,
    source: &SourceConfig,
    now: DateTime<Utc>,
) -> RunReport {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("stage_run", %run_id);

    async move {
        let mut progress = Progress::new();
        let res = stage_steps(fetcher, source, now, &mut progress)
            .await
            .map(|(snapshot, local_path)| RunSummary {
                records: snapshot.records.len(),
                local_path,
                object_key: None,
                job_run: None,
            });
        finish(run_id, now, progress, res)
    }
    .instrument(span)
    .await
}

async fn stage_steps(
    fetcher: &dyn PageFetcher,
    source: &SourceConfig,
    now: DateTime<Utc>,
    progress: &mut Progress,
) -> StepResult<(Snapshot, PathBuf)> {
    let html = at(Step::Fetch, fetcher.fetch_page().await)?;
    progress.done(Step::Fetch);
    tracing::info!(url = fetcher.source_url(), bytes = html.len(), "fetched source page");

    let date = capture_date(now, source.capture_clock);
    let records = at(Step::Extract, extract_records(&html, date, &source.layout))?;
    progress.done(Step::Extract);
    if records.is_empty() {
        tracing::warn!(%date, "source table has no data rows");
    }

    let snapshot = Snapshot::new(now, records);
    let local_path = at(Step::Write, write_snapshot(&source.staging_dir, &snapshot).await)?;
    progress.done(Step::Write);
    tracing::info!(
        path = %local_path.display(),
        records = snapshot.records.len(),
        "wrote snapshot"
    );

    Ok((snapshot, local_path))
}

fn finish(
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    progress: Progress,
    res: StepResult<RunSummary>,
) -> RunReport {
    let outcome = match res {
        Ok(summary) => RunOutcome::Completed(summary),
        Err((step, error)) => {
            tracing::error!(
                ?step,
                kind = error.kind(),
                completed = ?progress.completed,
                error = %error,
                "ingest run aborted"
            );
            RunOutcome::Failed { step, error }
        }
    };

    RunReport {
        run_id,
        generated_at,
        completed: progress.completed,
        outcome,
    }
}
