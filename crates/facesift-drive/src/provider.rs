//! The storage operations the pipeline needs from a remote provider.

use crate::error::Result;
use crate::types::FilePage;
use async_trait::async_trait;

#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// One page of the direct children of `folder_id`.
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<FilePage>;

    /// Raw content of one file.
    async fn download_content(&self, file_id: &str) -> Result<Vec<u8>>;
}
