//! Photo references and their resolved local forms.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A caller-supplied photo reference: a storage key or local path plus
/// an order index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
    /// Storage key (blob store) or path relative to the local storage root.
    pub key: String,
    /// Position of this photo in the requested sequence.
    pub order: u32,
}

impl PhotoRef {
    pub fn new(key: impl Into<String>, order: u32) -> Self {
        Self {
            key: key.into(),
            order,
        }
    }

    /// File name component of the reference, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.key.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

/// How a photo reference was resolved to a local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoOrigin {
    /// Reference pointed at an existing local file.
    Local,
    /// Downloaded from the blob store into job-scoped scratch space.
    Fetched,
    /// Replaced by a similarly named or arbitrary available photo.
    Substituted,
}

impl PhotoOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoOrigin::Local => "local",
            PhotoOrigin::Fetched => "fetched",
            PhotoOrigin::Substituted => "substituted",
        }
    }
}

impl std::fmt::Display for PhotoOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A photo reference reduced to a guaranteed-accessible local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPhoto {
    /// Absolute local path, exists at resolution time.
    pub path: PathBuf,
    pub origin: PhotoOrigin,
    pub size_bytes: u64,
}

impl ResolvedPhoto {
    pub fn new(path: impl Into<PathBuf>, origin: PhotoOrigin, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            origin,
            size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_extraction() {
        assert_eq!(
            PhotoRef::new("uploads/abc/IMG_0001.jpg", 0).file_name(),
            Some("IMG_0001.jpg")
        );
        assert_eq!(PhotoRef::new("IMG_0001.jpg", 0).file_name(), Some("IMG_0001.jpg"));
        assert_eq!(PhotoRef::new("uploads/", 0).file_name(), None);
    }

    #[test]
    fn test_origin_serde_is_snake_case() {
        let json = serde_json::to_string(&PhotoOrigin::Fetched).unwrap();
        assert_eq!(json, "\"fetched\"");
    }
}
