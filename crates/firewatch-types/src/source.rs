//! Source (camera) definitions.
//!
//! A [`Source`] is immutable once constructed and always carries exactly
//! one origin. The invariant is enforced by [`Source::new`] and by the
//! serde bridge through [`CameraInfo`], so a malformed entry in the camera
//! list can never reach the scheduler.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Errors raised when a source definition violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The source id is empty or whitespace.
    #[error("source id must not be empty")]
    EmptyId,

    /// Neither `rtsp_url` nor `file_path` was provided.
    #[error("source {id}: either rtsp_url or file_path must be provided")]
    MissingOrigin {
        /// The offending source id.
        id: String,
    },

    /// Both `rtsp_url` and `file_path` were provided.
    #[error("source {id}: rtsp_url and file_path are mutually exclusive")]
    AmbiguousOrigin {
        /// The offending source id.
        id: String,
    },
}

/// Where a source's frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    /// A live stream, e.g. `rtsp://camera.local/stream1`.
    StreamUri(String),
    /// A recorded file on local disk.
    FilePath(String),
}

/// One independently polled origin of detection data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CameraInfo", into = "CameraInfo")]
pub struct Source {
    id: String,
    display_name: String,
    origin: SourceOrigin,
}

impl Source {
    /// Build a source from the raw optional origin fields.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the id is blank or if not exactly one of
    /// `stream_uri` / `file_path` is set. Empty strings count as unset.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        stream_uri: Option<String>,
        file_path: Option<String>,
    ) -> Result<Self, SourceError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SourceError::EmptyId);
        }

        let stream_uri = stream_uri.filter(|s| !s.trim().is_empty());
        let file_path = file_path.filter(|s| !s.trim().is_empty());

        let origin = match (stream_uri, file_path) {
            (Some(uri), None) => SourceOrigin::StreamUri(uri),
            (None, Some(path)) => SourceOrigin::FilePath(path),
            (None, None) => return Err(SourceError::MissingOrigin { id }),
            (Some(_), Some(_)) => return Err(SourceError::AmbiguousOrigin { id }),
        };

        Ok(Self {
            id,
            display_name: display_name.into(),
            origin,
        })
    }

    /// Stable identifier, used as `camera_id` on the wire.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The source's single origin.
    pub const fn origin(&self) -> &SourceOrigin {
        &self.origin
    }

    /// Project this source into its listing representation.
    pub fn to_info(&self) -> CameraInfo {
        CameraInfo::from(self.clone())
    }
}

/// Listing representation of a [`Source`], as served by `GET /api/cameras`
/// and as stored in the camera list file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CameraInfo {
    /// Stable source identifier.
    pub camera_id: String,
    /// Human-readable name.
    pub name: String,
    /// Stream URI, when the source is a live stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub rtsp_url: Option<String>,
    /// Local file path, when the source is a recording.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub file_path: Option<String>,
}

impl TryFrom<CameraInfo> for Source {
    type Error = SourceError;

    fn try_from(info: CameraInfo) -> Result<Self, Self::Error> {
        Self::new(info.camera_id, info.name, info.rtsp_url, info.file_path)
    }
}

impl From<Source> for CameraInfo {
    fn from(source: Source) -> Self {
        let (rtsp_url, file_path) = match source.origin {
            SourceOrigin::StreamUri(uri) => (Some(uri), None),
            SourceOrigin::FilePath(path) => (None, Some(path)),
        };
        Self {
            camera_id: source.id,
            name: source.display_name,
            rtsp_url,
            file_path,
        }
    }
}
