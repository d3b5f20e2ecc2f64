//! Google Cloud Storage adapter over the JSON API.

use crate::error::{sanitize_error_message, Result, StageError};
use crate::store::{ObjectStore, StoredObject};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1/b";
const OBJECTS_BASE: &str = "https://storage.googleapis.com/storage/v1/b";

/// Builder for [`GcsStore`].
#[derive(Debug, Clone)]
pub struct GcsStoreBuilder {
    bucket: Option<String>,
    access_token: Option<String>,
    timeout: Duration,
}

impl Default for GcsStoreBuilder {
    fn default() -> Self {
        Self {
            bucket: None,
            access_token: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl GcsStoreBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bucket name. Required.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Sets the OAuth access token. Falls back to `GOOGLE_ACCESS_TOKEN` env var.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the per-request deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the store, resolving bucket and credentials.
    pub fn build(self) -> Result<GcsStore> {
        let bucket = self
            .bucket
            .ok_or_else(|| StageError::Config("GCS bucket not set".into()))?;

        let access_token = self
            .access_token
            .or_else(|| std::env::var("GOOGLE_ACCESS_TOKEN").ok())
            .ok_or_else(|| {
                StageError::Auth("GOOGLE_ACCESS_TOKEN not set and no access token provided".into())
            })?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()?;

        Ok(GcsStore {
            client,
            bucket,
            access_token,
        })
    }
}

/// Object store backed by a Google Cloud Storage bucket.
///
/// Uploads use simple media upload, which overwrites any existing object
/// under the same name, giving `put` the required overwrite semantics.
#[derive(Debug)]
pub struct GcsStore {
    client: reqwest::Client,
    bucket: String,
    access_token: String,
}

impl GcsStore {
    /// Creates a new [`GcsStoreBuilder`].
    pub fn builder() -> GcsStoreBuilder {
        GcsStoreBuilder::new()
    }

    fn classify_failure(&self, status: u16, text: &str) -> StageError {
        let text = sanitize_error_message(text);
        match status {
            401 => StageError::Auth(text),
            403 => StageError::Permission(format!(
                "access to bucket '{}' denied: {}",
                self.bucket, text
            )),
            404 => StageError::Storage(format!(
                "bucket '{}' or object not found: {}",
                self.bucket, text
            )),
            _ => StageError::Storage(format!("GCS returned {status}: {text}")),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject> {
        let size = bytes.len();
        let url = format!("{UPLOAD_BASE}/{}/o", self.bucket);

        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(&self.access_token)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StageError::Storage(format!("upload failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(status.as_u16(), &text));
        }

        let object: GcsObject = response.json().await?;
        tracing::debug!(key, size, "object uploaded");

        Ok(StoredObject {
            key: object.name,
            uri: object.media_link,
            size,
        })
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(uri)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| StageError::Storage(format!("download failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(status.as_u16(), &text));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let url = format!("{OBJECTS_BASE}/{}/o", self.bucket);

        let response = self
            .client
            .get(&url)
            .query(&[("prefix", key), ("maxResults", "1")])
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| StageError::Storage(format!("list failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(status.as_u16(), &text));
        }

        let listing: GcsListing = response.json().await?;
        Ok(listing.items.iter().any(|item| item.name == key))
    }
}

// Response wire types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsObject {
    name: String,
    media_link: String,
}

#[derive(Debug, Deserialize)]
struct GcsListing {
    #[serde(default)]
    items: Vec<GcsListingItem>,
}

#[derive(Debug, Deserialize)]
struct GcsListingItem {
    name: String,
}
