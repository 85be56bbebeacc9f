use anyhow::Result;
use object_store::aws::{AmazonS3, AmazonS3Builder};

use crate::config::S3Config;

pub(super) fn build(config: &S3Config) -> Result<AmazonS3> {
    // path-style addressing so minio and other s3-compatible endpoints work
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&config.bucket)
        .with_region(&config.region)
        .with_virtual_hosted_style_request(false);

    if let Some(endpoint) = &config.endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }

    // empty credentials fall through to the default aws credential chain
    if !config.access_key.is_empty() {
        builder = builder.with_access_key_id(&config.access_key);
    }
    if !config.secret_key.is_empty() {
        builder = builder.with_secret_access_key(&config.secret_key);
    }

    let store = builder.build()?;

    return Ok(store);
}
