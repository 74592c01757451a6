pub mod cat;
pub mod ls;
pub mod mkdir;
pub mod root;
pub mod write;

/// Strip leading separators so `/notes` and `notes` name the same directory.
///
/// Returns `None` when the path names the root itself.
pub fn directory_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.trim_end_matches('/').is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
