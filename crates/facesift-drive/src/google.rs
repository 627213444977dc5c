//! Google Drive v3 REST client (API-key access to publicly shared folders).

use crate::error::{DriveError, Result};
use crate::provider::StorageProvider;
use crate::types::FilePage;
use async_trait::async_trait;

const BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Only the fields the enumerator reads.
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType)";

pub struct GoogleDriveClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleDriveClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL.to_string())
    }

    /// Point the client at a different endpoint (proxies, local mocks).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DriveError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }
}

/// Drive search expression for the non-trashed direct children of a folder.
fn children_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed = false")
}

#[async_trait]
impl StorageProvider for GoogleDriveClient {
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<FilePage> {
        let url = format!("{}/files", self.base_url);
        let page_size = page_size.to_string();
        let query = children_query(folder_id);

        let mut params: Vec<(&str, &str)> = vec![
            ("q", query.as_str()),
            ("pageSize", page_size.as_str()),
            ("fields", LIST_FIELDS),
            ("key", self.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let resp = self.client.get(&url).query(&params).send().await?;
        let resp = Self::check(resp).await?;

        let body = resp.text().await?;
        let page: FilePage = serde_json::from_str(&body)?;
        tracing::debug!(
            folder_id,
            files = page.files.len(),
            more = page.next_page_token.is_some(),
            "drive list"
        );
        Ok(page)
    }

    async fn download_content(&self, file_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        let resp = self
            .client
            .get(&url)
            .query(&[("alt", "media"), ("key", self.api_key.as_str())])
            .send()
            .await?;
        let resp = Self::check(resp).await?;

        let bytes = resp.bytes().await?;
        tracing::trace!(file_id, bytes = bytes.len(), "drive download");
        Ok(bytes.to_vec())
    }
}
