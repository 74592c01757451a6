//! Logical path decomposition.
//!
//! A logical path is a `/`-separated string naming zero or more directories
//! followed by an optional file name. Decomposition follows one rule: when the
//! path has more than one component the last one is the file name candidate
//! and everything before it is a directory; a single component is a file name
//! with no directories. Empty and `.` directory components are skipped, and an
//! empty (or `.`) file name means the path only names directories. `..` is kept
//! as written; navigation refuses paths that contain it.

use std::fmt;

const CURRENT_DIR: &str = ".";
const PARENT_DIR: &str = "..";

/// A logical path split into directory components and a terminal file name.
///
/// # Examples
///
/// ```
/// use oxnav_core::path::PathRequest;
///
/// let request = PathRequest::parse("notes/2024//today.txt");
/// assert_eq!(request.directories().collect::<Vec<_>>(), vec!["notes", "2024"]);
/// assert_eq!(request.file_name(), Some("today.txt"));
///
/// let dir_only = PathRequest::parse("notes/");
/// assert!(dir_only.is_directory_only());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRequest<'a> {
    raw: &'a str,
    directories: Vec<&'a str>,
    file_name: &'a str,
}

impl<'a> PathRequest<'a> {
    /// Decompose `path`. Never fails; every string is a valid logical path.
    pub fn parse(path: &'a str) -> Self {
        let mut components: Vec<&'a str> = path.split('/').collect();
        // `split` always yields at least one item.
        let file_name = match components.pop() {
            Some(CURRENT_DIR) | None => "",
            Some(name) => name,
        };
        components.retain(|component| !component.is_empty() && *component != CURRENT_DIR);

        Self {
            raw: path,
            directories: components,
            file_name,
        }
    }

    /// The path as given.
    #[inline]
    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    /// First `..` component, if any. Such a path would leave the directory it
    /// is resolved against.
    pub fn parent_component(&self) -> Option<&'a str> {
        self.directories
            .iter()
            .copied()
            .chain(std::iter::once(self.file_name))
            .find(|component| *component == PARENT_DIR)
    }

    /// Non-empty directory components, outermost first.
    pub fn directories(&self) -> impl ExactSizeIterator<Item = &'a str> + '_ {
        self.directories.iter().copied()
    }

    /// Number of directories that will be walked.
    #[inline]
    pub fn depth(&self) -> usize {
        self.directories.len()
    }

    /// Terminal file name, or `None` when the path ends in a separator or is empty.
    pub fn file_name(&self) -> Option<&'a str> {
        if self.file_name.is_empty() {
            None
        } else {
            Some(self.file_name)
        }
    }

    /// True when no file will be resolved.
    #[inline]
    pub fn is_directory_only(&self) -> bool {
        self.file_name.is_empty()
    }
}

impl fmt::Display for PathRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
