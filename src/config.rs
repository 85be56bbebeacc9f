use anyhow::Context;
use chrono_tz::Tz;
use dotenv::dotenv;
use serde::Deserialize;
use tracing::warn;

/// How the storage key of an uploaded statement is chosen, and whether older
/// statements of the same account are cleaned up afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPolicy {
    /// Store under the file name sent by the client.
    ClientName,
    /// Store under a generated `YYYY-MM-DD_HH-MM-SS.csv` key.
    Timestamp,
    /// Store under the client file name and delete every other statement
    /// sharing its `<account>_` prefix.
    AccountPrefix,
}

#[derive(Deserialize)]
pub struct EnvironmentVariables {
    pub s3_bucket: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,

    pub upload_policy: Option<UploadPolicy>,
    pub upload_timezone: Option<Tz>,
    pub max_upload_bytes: Option<usize>,

    pub front_base_url: Option<String>,
    pub port: Option<u16>,

    pub otel_exporter_otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub s3: S3Config,

    pub upload_policy: UploadPolicy,
    pub upload_timezone: Tz,
    pub max_upload_bytes: usize,

    pub front_base_url: Option<String>,
    pub port: u16,

    pub otel_exporter_otlp_endpoint: Option<String>,
}

pub const DEFAULT_S3_REGION: &str = "eu-central-1";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

impl Config {
    pub fn new() -> Result<Self, anyhow::Error> {
        let _ = dotenv().map_err(|err| warn!("error loading .env: {:?}", err));

        let envs =
            envy::from_env::<EnvironmentVariables>().context("invalid environment variables")?;

        return Ok(Config::from_envs(envs));
    }

    pub fn from_envs(envs: EnvironmentVariables) -> Self {
        return Config {
            s3: S3Config {
                bucket: envs.s3_bucket,
                region: envs
                    .s3_region
                    .filter(|region| !region.is_empty())
                    .unwrap_or_else(|| DEFAULT_S3_REGION.to_owned()),
                endpoint: envs.s3_endpoint.filter(|endpoint| !endpoint.is_empty()),
                access_key: envs.s3_access_key.unwrap_or_default(),
                secret_key: envs.s3_secret_key.unwrap_or_default(),
            },

            upload_policy: envs.upload_policy.unwrap_or(UploadPolicy::AccountPrefix),
            upload_timezone: envs.upload_timezone.unwrap_or(Tz::UTC),
            max_upload_bytes: envs.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),

            front_base_url: envs.front_base_url.filter(|url| !url.is_empty()),
            port: envs.port.unwrap_or(8000),

            otel_exporter_otlp_endpoint: envs
                .otel_exporter_otlp_endpoint
                .filter(|endpoint| !endpoint.is_empty()),
        };
    }
}
