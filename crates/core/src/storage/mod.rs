pub mod object_store;
pub mod snapshot;

/// Shared AWS SDK config for the S3 and Glue clients.
pub async fn load_aws_config(region: &str) -> aws_config::SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await
}
