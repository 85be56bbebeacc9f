use bytes::Bytes;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::{
    config::UploadPolicy,
    error::ApiError,
    statement_parsing::{NormalizedRow, ParseError, normalize_csv},
    storage::{Storage, StorageError, StoredObject},
};

pub const CSV_SUFFIX: &str = ".csv";
pub const DEFAULT_CONTENT_TYPE: &str = "text/csv";
const TIMESTAMP_KEY_FORMAT: &str = "%Y-%m-%d_%H-%M-%S.csv";

#[derive(Debug, thiserror::Error)]
pub enum StatementError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Only .csv files are allowed")]
    NotCsv,

    #[error("File is too large")]
    TooLarge,

    #[error("Account must be alphanumeric")]
    InvalidAccount,

    #[error("No CSV files found")]
    NoStatements,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<StatementError> for ApiError {
    fn from(err: StatementError) -> Self {
        return match err {
            StatementError::MissingFile
            | StatementError::NotCsv
            | StatementError::TooLarge
            | StatementError::InvalidAccount => ApiError::BadRequest(err.to_string()),
            StatementError::NoStatements => ApiError::NotFound(err.to_string()),
            StatementError::Storage(err @ StorageError::InvalidKey { .. }) => {
                ApiError::BadRequest(err.public_message().to_owned())
            }
            StatementError::Storage(err) => ApiError::Storage(err),
            StatementError::Parse(err) => ApiError::Parse(err),
        };
    }
}

pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug)]
pub struct LatestStatement {
    pub key: String,
    pub rows: Vec<NormalizedRow>,
}

pub fn has_csv_suffix(name: &str) -> bool {
    return name.to_lowercase().ends_with(CSV_SUFFIX);
}

fn is_account(value: &str) -> bool {
    return !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric());
}

/// The account number a file name starts with, as in `ABC123_march.csv`.
pub fn account_prefix(file_name: &str) -> Option<&str> {
    let (prefix, _) = file_name.split_once('_')?;

    return is_account(prefix).then_some(prefix);
}

/// Picks the most recently modified `.csv` object. Objects with the same
/// timestamp keep their listing order.
pub fn select_latest(objects: Vec<StoredObject>) -> Option<StoredObject> {
    let mut candidates = objects
        .into_iter()
        .filter(|object| has_csv_suffix(&object.key))
        .collect::<Vec<_>>();

    candidates.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));

    return candidates.into_iter().next();
}

pub fn storage_key(
    policy: UploadPolicy,
    file_name: &str,
    now: DateTime<Utc>,
    timezone: Tz,
) -> String {
    return match policy {
        UploadPolicy::ClientName | UploadPolicy::AccountPrefix => file_name.to_owned(),
        UploadPolicy::Timestamp => now
            .with_timezone(&timezone)
            .format(TIMESTAMP_KEY_FORMAT)
            .to_string(),
    };
}

/// Fetches the newest statement, optionally limited to one account, and
/// normalizes its columns.
#[tracing::instrument(skip(storage))]
pub async fn latest(
    storage: &Storage,
    account: Option<&str>,
) -> Result<LatestStatement, StatementError> {
    let prefix = match account {
        Some(account) if !is_account(account) => return Err(StatementError::InvalidAccount),
        Some(account) => format!("{account}_"),
        None => String::new(),
    };

    let objects = storage.list(&prefix).await?;
    debug!("found {} objects", objects.len());

    let latest = select_latest(objects).ok_or(StatementError::NoStatements)?;

    let bytes = storage.get(&latest.key).await?;
    let rows = normalize_csv(&bytes)?;

    return Ok(LatestStatement {
        key: latest.key,
        rows,
    });
}

/// Stores an uploaded statement under the key the policy derives for it.
/// Returns the key that was written.
#[tracing::instrument(skip(storage, upload), fields(file_name = %upload.file_name))]
pub async fn upload(
    storage: &Storage,
    policy: UploadPolicy,
    timezone: Tz,
    upload: Upload,
) -> Result<String, StatementError> {
    if !has_csv_suffix(&upload.file_name) {
        return Err(StatementError::NotCsv);
    }

    let key = storage_key(policy, &upload.file_name, Utc::now(), timezone);

    let content_type = upload
        .content_type
        .filter(|content_type| !content_type.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());

    storage.put(&key, upload.bytes, &content_type).await?;
    info!("stored statement {key}");

    if policy == UploadPolicy::AccountPrefix {
        if let Some(account) = account_prefix(&upload.file_name) {
            remove_previous(storage, account, &key).await;
        }
    }

    return Ok(key);
}

/// Deletes every other statement of the account. Failures are only logged,
/// the new statement is already stored.
async fn remove_previous(storage: &Storage, account: &str, keep: &str) {
    let prefix = format!("{account}_");

    let objects = match storage.list(&prefix).await {
        Ok(objects) => objects,
        Err(err) => {
            warn!("error listing previous statements of {account}: {err:?}");
            return;
        }
    };

    for object in objects {
        if object.key == keep || !has_csv_suffix(&object.key) {
            continue;
        }

        match storage.delete(&object.key).await {
            Ok(()) => info!("removed previous statement {}", object.key),
            Err(err) => warn!("error removing previous statement {}: {err:?}", object.key),
        }
    }
}
