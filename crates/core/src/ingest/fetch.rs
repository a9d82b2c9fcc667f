use crate::config::SourceConfig;
use crate::error::IngestError;
use anyhow::Context;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    fn source_url(&self) -> &str;

    /// Single GET of the source page. No retry.
    async fn fetch_page(&self) -> Result<String, IngestError>;
}

#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    http: reqwest::Client,
    url: String,
    // Sent as `date=YYYY-MM-DD` to request a past day's table. Records keep the processing date.
    reference_date: Option<NaiveDate>,
}

impl HttpPageFetcher {
    pub fn from_config(config: &SourceConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("pt-BR,pt;q=0.9,en;q=0.8"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build source http client")?;

        Ok(Self {
            http,
            url: config.url.clone(),
            reference_date: config.reference_date,
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher {
    fn source_url(&self) -> &str {
        &self.url
    }

    async fn fetch_page(&self) -> Result<String, IngestError> {
        let mut req = self.http.get(&self.url);
        if let Some(date) = self.reference_date {
            req = req.query(&[("date", date.to_string())]);
        }

        let res = req
            .send()
            .await
            .map_err(|e| IngestError::Network(format!("GET {}: {e}", self.url)))?;

        let status = res.status();
        if !status.is_success() {
            return Err(IngestError::Http {
                status: status.as_u16(),
            });
        }

        res.text()
            .await
            .map_err(|e| IngestError::Network(format!("failed to read source body: {e}")))
    }
}
