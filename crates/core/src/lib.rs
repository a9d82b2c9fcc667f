pub mod domain;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod pipeline;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::ingest::table::ColumnLayout;
    use crate::time::b3_market::CaptureClock;

    pub const DEFAULT_SOURCE_URL: &str =
        "https://sistemaswebb3-listados.b3.com.br/indexPage/day/IBOV?language=pt-br";
    pub const DEFAULT_RAW_KEY_PREFIX: &str = "raw/";
    pub const DEFAULT_STAGING_DIR: &str = ".";

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub aws_region: Option<String>,
        pub s3_bucket: Option<String>,
        pub glue_job_name: Option<String>,
        pub source_url: Option<String>,
        pub source_timeout_secs: Option<String>,
        pub source_expected_headers: Option<String>,
        pub staging_dir: Option<String>,
        pub staging_cleanup: Option<String>,
        pub raw_key_prefix: Option<String>,
        pub capture_date_tz: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                aws_region: std::env::var("AWS_REGION").ok(),
                s3_bucket: std::env::var("S3_BUCKET").ok(),
                glue_job_name: std::env::var("GLUE_JOB_NAME").ok(),
                source_url: std::env::var("B3_SOURCE_URL").ok(),
                source_timeout_secs: std::env::var("SOURCE_TIMEOUT_SECS").ok(),
                source_expected_headers: std::env::var("SOURCE_EXPECTED_HEADERS").ok(),
                staging_dir: std::env::var("STAGING_DIR").ok(),
                staging_cleanup: std::env::var("STAGING_CLEANUP").ok(),
                raw_key_prefix: std::env::var("RAW_KEY_PREFIX").ok(),
                capture_date_tz: std::env::var("CAPTURE_DATE_TZ").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_aws_region(&self) -> anyhow::Result<&str> {
            non_blank(self.aws_region.as_deref()).context("AWS_REGION is required")
        }

        pub fn require_s3_bucket(&self) -> anyhow::Result<&str> {
            non_blank(self.s3_bucket.as_deref()).context("S3_BUCKET is required")
        }

        pub fn require_glue_job_name(&self) -> anyhow::Result<&str> {
            non_blank(self.glue_job_name.as_deref()).context("GLUE_JOB_NAME is required")
        }
    }

    fn non_blank(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|s| !s.is_empty())
    }

    /// Options needed to fetch, extract and stage a snapshot. Valid without any cloud settings,
    /// which is what a dry run relies on.
    #[derive(Debug, Clone)]
    pub struct SourceConfig {
        pub url: String,
        /// Past trading day to request from the source (backfill). Not read from the
        /// environment; records are still stamped with the processing date.
        pub reference_date: Option<NaiveDate>,
        pub timeout: Option<Duration>,
        pub layout: ColumnLayout,
        pub staging_dir: PathBuf,
        pub staging_cleanup: bool,
        pub capture_clock: CaptureClock,
    }

    /// Destination of the snapshot and the job that consumes it.
    #[derive(Debug, Clone)]
    pub struct PublishConfig {
        pub aws_region: String,
        pub bucket: String,
        pub raw_key_prefix: String,
        pub glue_job_name: String,
    }

    #[derive(Debug, Clone)]
    pub struct PipelineConfig {
        pub source: SourceConfig,
        pub publish: PublishConfig,
    }

    impl SourceConfig {
        pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
            let url = non_blank(settings.source_url.as_deref())
                .unwrap_or(DEFAULT_SOURCE_URL)
                .to_string();

            let timeout = match non_blank(settings.source_timeout_secs.as_deref()) {
                Some(s) => {
                    let secs = s
                        .parse::<u64>()
                        .with_context(|| format!("SOURCE_TIMEOUT_SECS must be an integer (got {s})"))?;
                    anyhow::ensure!(secs > 0, "SOURCE_TIMEOUT_SECS must be > 0");
                    Some(Duration::from_secs(secs))
                }
                None => None,
            };

            let layout = match non_blank(settings.source_expected_headers.as_deref()) {
                Some(s) => ColumnLayout::from_header_list(s)?,
                None => ColumnLayout::Positional,
            };

            let staging_dir = PathBuf::from(
                non_blank(settings.staging_dir.as_deref()).unwrap_or(DEFAULT_STAGING_DIR),
            );

            let staging_cleanup = match non_blank(settings.staging_cleanup.as_deref()) {
                Some(s) => parse_bool(s)
                    .with_context(|| format!("STAGING_CLEANUP must be true/false (got {s})"))?,
                None => false,
            };

            let capture_clock = match non_blank(settings.capture_date_tz.as_deref()) {
                Some(s) => s.parse::<CaptureClock>()?,
                None => CaptureClock::Utc,
            };

            Ok(Self {
                url,
                reference_date: None,
                timeout,
                layout,
                staging_dir,
                staging_cleanup,
                capture_clock,
            })
        }
    }

    impl PublishConfig {
        pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
            let raw_key_prefix = non_blank(settings.raw_key_prefix.as_deref())
                .unwrap_or(DEFAULT_RAW_KEY_PREFIX)
                .to_string();

            Ok(Self {
                aws_region: settings.require_aws_region()?.to_string(),
                bucket: settings.require_s3_bucket()?.to_string(),
                raw_key_prefix,
                glue_job_name: settings.require_glue_job_name()?.to_string(),
            })
        }
    }

    impl PipelineConfig {
        /// Validates everything up front so a missing variable fails at startup rather than at
        /// the first remote call.
        pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
            Ok(Self {
                source: SourceConfig::from_settings(settings)?,
                publish: PublishConfig::from_settings(settings)?,
            })
        }
    }

    fn parse_bool(s: &str) -> Option<bool> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

}
