//! Source registry: the immutable camera list loaded at startup.
//!
//! The camera list is a JSON array of
//! `{camera_id, name, rtsp_url?, file_path?}` objects. Loading is
//! fail-fast: one malformed entry, a duplicated id, or an entry without
//! exactly one origin rejects the whole file so the operator sees the
//! problem before any scheduler starts.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use firewatch_types::{CameraInfo, Source};

/// Errors that can occur when loading the source registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The camera list could not be read.
    #[error("failed to read camera list {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The camera list is not valid JSON or an entry is malformed.
    #[error("invalid camera list: {source}")]
    Parse {
        /// The underlying JSON error (carries the entry's validation error).
        #[from]
        source: serde_json::Error,
    },

    /// Two entries share the same id.
    #[error("duplicate camera id `{id}`")]
    DuplicateId {
        /// The repeated id.
        id: String,
    },
}

/// The ordered, immutable list of sources to poll.
///
/// Cloning is cheap; all clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Arc<[Source]>,
}

impl SourceRegistry {
    /// Build a registry from already-validated sources.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateId`] if two sources share an id.
    pub fn new(sources: Vec<Source>) -> Result<Self, RegistryError> {
        let mut seen = BTreeSet::new();
        for source in &sources {
            if !seen.insert(source.id()) {
                return Err(RegistryError::DuplicateId {
                    id: source.id().to_owned(),
                });
            }
        }
        Ok(Self {
            sources: sources.into(),
        })
    }

    /// Load and validate the camera list at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the file cannot be read, fails to
    /// parse, contains an invalid entry, or repeats an id.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_json(&contents)?;
        tracing::info!(
            path = %path.display(),
            cameras = registry.len(),
            "Camera list loaded"
        );
        Ok(registry)
    }

    /// Parse a camera list from a JSON string.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus I/O.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let sources: Vec<Source> = serde_json::from_str(json)?;
        Self::new(sources)
    }

    /// All sources in file order.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Look up a source by id.
    pub fn get(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// Listing representation of every source, in file order.
    pub fn camera_infos(&self) -> Vec<CameraInfo> {
        self.sources.iter().map(Source::to_info).collect()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the registry has no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use std::io::Write as _;

    use firewatch_types::SourceOrigin;

    use super::*;

    #[test]
    fn loads_valid_list_in_order() {
        let registry = SourceRegistry::from_json(
            r#"[
                {"camera_id": "cam1", "name": "Lobby", "rtsp_url": "rtsp://x"},
                {"camera_id": "cam2", "name": "Yard", "file_path": "/data/yard.mp4"}
            ]"#,
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        let ids: Vec<&str> = registry.sources().iter().map(Source::id).collect();
        assert_eq!(ids, vec!["cam1", "cam2"]);
        assert_eq!(
            registry.get("cam2").map(Source::origin),
            Some(&SourceOrigin::FilePath("/data/yard.mp4".to_owned()))
        );
        assert!(registry.get("cam3").is_none());
    }

    #[test]
    fn missing_origin_fails_whole_load() {
        let err = SourceRegistry::from_json(
            r#"[
                {"camera_id": "cam1", "name": "Lobby", "rtsp_url": "rtsp://x"},
                {"camera_id": "cam2", "name": "Yard"}
            ]"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
        assert!(err.to_string().contains("cam2"));
    }

    #[test]
    fn duplicate_id_fails() {
        let err = SourceRegistry::from_json(
            r#"[
                {"camera_id": "cam1", "name": "A", "rtsp_url": "rtsp://a"},
                {"camera_id": "cam1", "name": "B", "rtsp_url": "rtsp://b"}
            ]"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { ref id } if id == "cam1"));
    }

    #[test]
    fn missing_required_field_fails() {
        let err = SourceRegistry::from_json(r#"[{"name": "Lobby", "rtsp_url": "rtsp://x"}]"#)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn empty_list_is_allowed() {
        let registry = SourceRegistry::from_json("[]").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"camera_id": "cam1", "name": "Lobby", "rtsp_url": "rtsp://x"}}]"#
        )
        .unwrap();

        let registry = SourceRegistry::load(file.path()).unwrap();
        assert_eq!(registry.camera_infos()[0].camera_id, "cam1");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = SourceRegistry::load(Path::new("/nonexistent/cameras.json")).unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
    }

    #[test]
    fn shipped_camera_list_parses() {
        let registry = SourceRegistry::from_json(include_str!("../../../config/cameras.json")).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.get("cam-03").is_some());
    }
}
