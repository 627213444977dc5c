//! Shareable folder links → provider folder ids.

const FOLDER_MARKER: &str = "folders/";

/// Extract the folder id from a link such as
/// `https://drive.google.com/drive/u/0/folders/<id>?usp=sharing`.
///
/// The id is the run of characters after the first `folders/` up to the
/// next `/` or `?`. Returns `None` when there is no such non-empty run.
pub fn parse_folder_id(link: &str) -> Option<&str> {
    let start = link.find(FOLDER_MARKER)? + FOLDER_MARKER.len();
    let rest = &link[start..];
    let end = rest.find(|c: char| c == '/' || c == '?').unwrap_or(rest.len());
    let id = &rest[..end];
    (!id.is_empty()).then_some(id)
}
