use crate::error::IngestError;
use crate::jobs::{JobLauncher, JobRequest, JobRun};
use aws_sdk_glue::error::DisplayErrorContext;

#[derive(Debug, Clone)]
pub struct GlueJobLauncher {
    client: aws_sdk_glue::Client,
}

impl GlueJobLauncher {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_glue::Client::new(sdk_config),
        }
    }
}

#[async_trait::async_trait]
impl JobLauncher for GlueJobLauncher {
    fn service_name(&self) -> &'static str {
        "glue"
    }

    async fn start_job(&self, req: JobRequest) -> Result<JobRun, IngestError> {
        let JobRequest {
            job_name,
            arguments,
        } = req;

        let out = self
            .client
            .start_job_run()
            .job_name(&job_name)
            .set_arguments(Some(arguments.into_iter().collect()))
            .send()
            .await
            .map_err(|e| IngestError::JobTrigger(format!("{job_name}: {}", DisplayErrorContext(&e))))?;

        Ok(JobRun {
            job_name,
            run_id: out.job_run_id().map(str::to_string),
        })
    }
}
