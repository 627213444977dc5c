use serde::{Deserialize, Serialize};

/// One file in a remote folder that may be scanned for faces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl CandidateFile {
    /// Image-like content, judged by declared MIME type only.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    #[serde(default)]
    pub files: Vec<CandidateFile>,
    /// Opaque continuation token; absent on the last page.
    pub next_page_token: Option<String>,
}
