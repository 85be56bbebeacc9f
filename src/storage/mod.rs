use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::{
    Attribute, Attributes, ObjectStore, PutOptions, PutPayload, memory::InMemory, path::Path,
};

use crate::config::S3Config;

mod s3;

/// A key/last-modified pair as reported by the bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object key {key:?}")]
    InvalidKey {
        key: String,
        #[source]
        source: object_store::path::Error,
    },

    #[error("error uploading {key}")]
    Put {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("error listing objects")]
    List(#[source] object_store::Error),

    #[error("error reading {key}")]
    Get {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("error deleting {key}")]
    Delete {
        key: String,
        #[source]
        source: object_store::Error,
    },
}

impl StorageError {
    /// Message shown to API callers, without backend details.
    pub fn public_message(&self) -> &'static str {
        return match self {
            StorageError::InvalidKey { .. } => "Invalid file name",
            StorageError::Put { .. } => "Failed to upload to S3",
            StorageError::List(_) | StorageError::Get { .. } => "Failed to fetch CSV from S3",
            StorageError::Delete { .. } => "Failed to delete from S3",
        };
    }
}

#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn ObjectStore>,
}

impl Storage {
    pub fn new(config: &S3Config) -> Result<Self> {
        let store = s3::build(config).context("error creating s3 client")?;

        return Ok(Self::from_store(Arc::new(store)));
    }

    pub fn from_store(store: Arc<dyn ObjectStore>) -> Self {
        return Self { store };
    }

    pub fn in_memory() -> Self {
        return Self::from_store(Arc::new(InMemory::new()));
    }

    pub fn object_path(key: &str) -> Result<Path, StorageError> {
        return Path::parse(key).map_err(|source| StorageError::InvalidKey {
            key: key.to_owned(),
            source,
        });
    }

    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let path = Self::object_path(key)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_owned().into());

        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&path, PutPayload::from(bytes), opts)
            .await
            .map_err(|source| StorageError::Put {
                key: key.to_owned(),
                source,
            })?;

        return Ok(());
    }

    /// Lists every object whose key starts with `prefix`.
    ///
    /// The object store only understands `/`-delimited prefixes, so the whole
    /// bucket is listed and filtered on the raw key string.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let objects = self
            .store
            .list(None)
            .try_collect::<Vec<_>>()
            .await
            .map_err(StorageError::List)?
            .into_iter()
            .map(|meta| StoredObject {
                key: meta.location.to_string(),
                last_modified: meta.last_modified,
            })
            .filter(|object| object.key.starts_with(prefix))
            .collect();

        return Ok(objects);
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = Self::object_path(key)?;
        let map_err = |source| StorageError::Get {
            key: key.to_owned(),
            source,
        };

        let result = self.store.get(&path).await.map_err(map_err)?;
        let bytes = result.bytes().await.map_err(map_err)?;

        return Ok(bytes);
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = Self::object_path(key)?;

        self.store
            .delete(&path)
            .await
            .map_err(|source| StorageError::Delete {
                key: key.to_owned(),
                source,
            })?;

        return Ok(());
    }
}
