//! facesift-drive — Remote folder access.
//!
//! Defines the storage operations the matcher needs ([`StorageProvider`]),
//! folder-link parsing, lazy paginated enumeration filtered to images, and a
//! Google Drive v3 client.

pub mod enumerator;
pub mod error;
pub mod google;
pub mod locator;
pub mod provider;
pub mod types;

pub use enumerator::{FileStream, FolderEnumerator, PageStream, DEFAULT_PAGE_SIZE};
pub use error::{DriveError, EnumerateError, Result};
pub use google::GoogleDriveClient;
pub use locator::parse_folder_id;
pub use provider::StorageProvider;
pub use types::{CandidateFile, FilePage};
