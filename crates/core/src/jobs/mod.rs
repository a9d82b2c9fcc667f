use crate::error::IngestError;
use std::collections::BTreeMap;

pub mod glue;

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_name: String,
    pub arguments: BTreeMap<String, String>,
}

impl JobRequest {
    /// Arguments the downstream ETL job reads to locate the raw snapshot.
    pub fn for_snapshot(
        job_name: &str,
        bucket: &str,
        key: &str,
        processing_date: chrono::NaiveDate,
    ) -> Self {
        let mut arguments = BTreeMap::new();
        arguments.insert("--source_bucket".to_string(), bucket.to_string());
        arguments.insert("--source_key".to_string(), key.to_string());
        arguments.insert("--processing_date".to_string(), processing_date.to_string());
        Self {
            job_name: job_name.to_string(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRun {
    pub job_name: String,
    pub run_id: Option<String>,
}

/// Starts a batch job and returns as soon as the service accepts it.
#[async_trait::async_trait]
pub trait JobLauncher: Send + Sync {
    fn service_name(&self) -> &'static str;

    async fn start_job(&self, req: JobRequest) -> Result<JobRun, IngestError>;
}
