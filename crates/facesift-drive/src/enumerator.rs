//! Paginated folder enumeration.
//!
//! A folder link is resolved to a folder id up front (no network call for a
//! bad link), then listing pages are fetched lazily, one per poll, following
//! the provider's continuation token. Each yielded page is already filtered
//! to image files. The first listing error is yielded and ends the stream,
//! so pages fetched before it stay visible to the consumer.

use crate::error::EnumerateError;
use crate::locator::parse_folder_id;
use crate::provider::StorageProvider;
use crate::types::CandidateFile;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;

/// Default number of entries requested per listing call.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

pub type PageStream = BoxStream<'static, Result<Vec<CandidateFile>, EnumerateError>>;
pub type FileStream = BoxStream<'static, Result<CandidateFile, EnumerateError>>;

#[derive(Clone)]
pub struct FolderEnumerator {
    storage: Arc<dyn StorageProvider>,
    page_size: u32,
}

struct Cursor {
    storage: Arc<dyn StorageProvider>,
    folder_id: String,
    page_size: u32,
    token: Option<String>,
    page: usize,
    done: bool,
}

impl FolderEnumerator {
    pub fn new(storage: Arc<dyn StorageProvider>, page_size: u32) -> Self {
        Self {
            storage,
            page_size: page_size.max(1),
        }
    }

    /// Image files of the folder, one listing page per item, in provider order.
    pub fn pages(&self, locator: &str) -> Result<PageStream, EnumerateError> {
        let folder_id = parse_folder_id(locator)
            .ok_or_else(|| EnumerateError::InvalidFolderLocator(locator.to_string()))?;

        let cursor = Cursor {
            storage: Arc::clone(&self.storage),
            folder_id: folder_id.to_string(),
            page_size: self.page_size,
            token: None,
            page: 0,
            done: false,
        };

        Ok(stream::unfold(cursor, |mut cursor| async move {
            if cursor.done {
                return None;
            }
            cursor.page += 1;

            let listed = cursor
                .storage
                .list_children(&cursor.folder_id, cursor.token.as_deref(), cursor.page_size)
                .await;

            match listed {
                Ok(page) => {
                    let listed_count = page.files.len();
                    let images: Vec<CandidateFile> =
                        page.files.into_iter().filter(CandidateFile::is_image).collect();
                    cursor.token = page.next_page_token.filter(|t| !t.is_empty());
                    cursor.done = cursor.token.is_none();

                    tracing::debug!(
                        folder = %cursor.folder_id,
                        page = cursor.page,
                        listed = listed_count,
                        images = images.len(),
                        last = cursor.done,
                        "listing page fetched"
                    );
                    Some((Ok(images), cursor))
                }
                Err(source) => {
                    tracing::warn!(
                        folder = %cursor.folder_id,
                        page = cursor.page,
                        error = %source,
                        "listing page failed"
                    );
                    cursor.done = true;
                    let page = cursor.page;
                    Some((Err(EnumerateError::ListingUnavailable { page, source }), cursor))
                }
            }
        })
        .boxed())
    }

    /// Flattened view of [`pages`](Self::pages).
    pub fn files(&self, locator: &str) -> Result<FileStream, EnumerateError> {
        Ok(self
            .pages(locator)?
            .flat_map(|page| match page {
                Ok(files) => stream::iter(files.into_iter().map(Ok).collect::<Vec<_>>()),
                Err(e) => stream::iter(vec![Err(e)]),
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DriveError, Result};
    use crate::types::FilePage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves pre-built pages; page `fail_at` (0-based) errors instead.
    struct PagedFolder {
        folder_id: String,
        pages: Vec<Vec<CandidateFile>>,
        fail_at: Option<usize>,
        calls: AtomicUsize,
        tokens_seen: Mutex<Vec<Option<String>>>,
    }

    impl PagedFolder {
        fn new(folder_id: &str, pages: Vec<Vec<CandidateFile>>) -> Self {
            Self {
                folder_id: folder_id.to_string(),
                pages,
                fail_at: None,
                calls: AtomicUsize::new(0),
                tokens_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StorageProvider for PagedFolder {
        async fn list_children(
            &self,
            folder_id: &str,
            page_token: Option<&str>,
            _page_size: u32,
        ) -> Result<FilePage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tokens_seen.lock().unwrap().push(page_token.map(str::to_string));
            assert_eq!(folder_id, self.folder_id);

            let index = match page_token {
                None => 0,
                Some(t) => t.trim_start_matches("page-").parse::<usize>().unwrap(),
            };
            if self.fail_at == Some(index) {
                return Err(DriveError::Api {
                    status: 403,
                    message: "rate limit exceeded".into(),
                });
            }
            let next = index + 1;
            Ok(FilePage {
                files: self.pages[index].clone(),
                next_page_token: (next < self.pages.len()).then(|| format!("page-{next}")),
            })
        }

        async fn download_content(&self, _file_id: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn file(id: &str, mime: &str) -> CandidateFile {
        CandidateFile {
            id: id.to_string(),
            name: format!("{id}.bin"),
            mime_type: mime.to_string(),
        }
    }

    #[tokio::test]
    async fn test_pages_follow_tokens_and_filter_images() {
        let folder = Arc::new(PagedFolder::new(
            "F1",
            vec![
                vec![file("a", "image/jpeg"), file("doc", "text/plain"), file("b", "image/png")],
                vec![file("sub", "application/vnd.google-apps.folder"), file("c", "image/jpeg")],
            ],
        ));
        let enumerator = FolderEnumerator::new(folder.clone(), 100);

        let pages: Vec<_> = enumerator
            .pages("https://drive.google.com/drive/folders/F1?usp=sharing")
            .unwrap()
            .collect()
            .await;

        assert_eq!(pages.len(), 2);
        let ids: Vec<String> = pages
            .into_iter()
            .flat_map(|p| p.unwrap())
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(
            *folder.tokens_seen.lock().unwrap(),
            vec![None, Some("page-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_invalid_locator_makes_no_call() {
        let folder = Arc::new(PagedFolder::new("F1", vec![vec![]]));
        let enumerator = FolderEnumerator::new(folder.clone(), 100);

        let result = enumerator.pages("https://example.com/not-a-drive-link");
        assert!(matches!(result, Err(EnumerateError::InvalidFolderLocator(_))));
        assert_eq!(folder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_page_failure_keeps_first_page() {
        let mut folder = PagedFolder::new(
            "F1",
            vec![
                vec![file("a", "image/jpeg"), file("b", "image/jpeg")],
                vec![file("c", "image/jpeg")],
                vec![file("d", "image/jpeg")],
            ],
        );
        folder.fail_at = Some(1);
        let folder = Arc::new(folder);
        let enumerator = FolderEnumerator::new(folder.clone(), 2);

        let items: Vec<_> = enumerator
            .files("https://host/drive/folders/F1")
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().id, "a");
        assert_eq!(items[1].as_ref().unwrap().id, "b");
        assert!(matches!(
            items[2],
            Err(EnumerateError::ListingUnavailable { page: 2, .. })
        ));
        // Stream ends at the error; the third page is never requested.
        assert_eq!(folder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_page_failure_yields_only_error() {
        let mut folder = PagedFolder::new("F1", vec![vec![file("a", "image/jpeg")]]);
        folder.fail_at = Some(0);
        let enumerator = FolderEnumerator::new(Arc::new(folder), 100);

        let items: Vec<_> = enumerator
            .files("https://host/drive/folders/F1")
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
