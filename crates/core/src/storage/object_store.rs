use crate::error::IngestError;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::BTreeMap;
use std::path::Path;

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub metadata: BTreeMap<String, String>,
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    fn store_name(&self) -> &'static str;

    async fn put_object(&self, req: PutObject) -> Result<(), IngestError>;
}

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    fn store_name(&self) -> &'static str {
        "s3"
    }

    async fn put_object(&self, req: PutObject) -> Result<(), IngestError> {
        let PutObject {
            bucket,
            key,
            body,
            content_type,
            metadata,
        } = req;

        self.client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .set_metadata(Some(metadata.into_iter().collect()))
            .send()
            .await
            .map_err(|e| {
                IngestError::Storage(format!("s3://{bucket}/{key}: {}", DisplayErrorContext(&e)))
            })?;

        Ok(())
    }
}

/// `raw/` + `b3_data_1.json` → `raw/b3_data_1.json`.
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_start_matches('/');
    if prefix.is_empty() {
        return file_name.to_string();
    }
    format!("{}/{}", prefix.trim_end_matches('/'), file_name)
}

/// Reads the staged file in full and uploads it as JSON.
pub async fn publish_file(
    store: &dyn ObjectStore,
    path: &Path,
    bucket: &str,
    key: &str,
    metadata: BTreeMap<String, String>,
) -> Result<(), IngestError> {
    let body = tokio::fs::read(path)
        .await
        .map_err(|e| IngestError::fs(path, e))?;
    let size = body.len();

    store
        .put_object(PutObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_type: JSON_CONTENT_TYPE,
            metadata,
        })
        .await?;

    tracing::info!(store = store.store_name(), bucket, key, size, "published snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemStore {
        puts: Mutex<Vec<PutObject>>,
    }

    #[async_trait::async_trait]
    impl ObjectStore for MemStore {
        fn store_name(&self) -> &'static str {
            "mem"
        }

        async fn put_object(&self, req: PutObject) -> Result<(), IngestError> {
            self.puts.lock().unwrap().push(req);
            Ok(())
        }
    }

    #[test]
    fn derives_raw_key() {
        assert_eq!(object_key("raw/", "b3_data_1.json"), "raw/b3_data_1.json");
        assert_eq!(object_key("raw", "b3_data_1.json"), "raw/b3_data_1.json");
        assert_eq!(object_key("/landing/raw/", "f.json"), "landing/raw/f.json");
        assert_eq!(object_key("", "f.json"), "f.json");
    }

    #[tokio::test]
    async fn uploads_file_contents_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b3_data_1.json");
        std::fs::write(&path, b"[]").unwrap();

        let store = MemStore::default();
        let mut metadata = BTreeMap::new();
        metadata.insert("records_count".to_string(), "0".to_string());
        publish_file(&store, &path, "bucket", "raw/b3_data_1.json", metadata)
            .await
            .unwrap();

        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].bucket, "bucket");
        assert_eq!(puts[0].key, "raw/b3_data_1.json");
        assert_eq!(puts[0].body, b"[]");
        assert_eq!(puts[0].content_type, "application/json");
        assert_eq!(puts[0].metadata.get("records_count").map(String::as_str), Some("0"));
    }

    #[tokio::test]
    async fn missing_local_file_fails_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemStore::default();
        let err = publish_file(
            &store,
            &dir.path().join("nope.json"),
            "bucket",
            "raw/nope.json",
            BTreeMap::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, IngestError::FileSystem { .. }));
        assert!(store.puts.lock().unwrap().is_empty());
    }
}
