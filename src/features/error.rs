use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A draft field that can block submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum DraftField {
    ClientName,
    Notes,
    Location,
    PhotoBefore,
    PhotoAfter,
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DraftField::ClientName => "client name",
            DraftField::Notes => "notes",
            DraftField::Location => "GPS location",
            DraftField::PhotoBefore => "before photo",
            DraftField::PhotoAfter => "after photo",
        };
        f.write_str(name)
    }
}

/// The three dependent backend calls of a submission, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum SubmissionStep {
    ResolveClient,
    CreateVisit,
    UploadImages,
}

impl fmt::Display for SubmissionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionStep::ResolveClient => "resolving the client",
            SubmissionStep::CreateVisit => "creating the visit",
            SubmissionStep::UploadImages => "uploading the photos",
        };
        f.write_str(name)
    }
}

/// Failure reported by a backend collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// HTTP status when the failure came from a response rather than the connection.
    pub status: Option<u16>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Unsupported file type for a visit photo: {0}")]
    UnsupportedFileType(String),

    #[error("Image is too large ({size} bytes, maximum is {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Camera frame of {width}x{height} does not match its {len} byte buffer")]
    MalformedFrame { width: u32, height: u32, len: usize },

    #[error("Image could not be processed")]
    ImageProcessing(#[from] image::ImageError),
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera permission denied. Enable camera access in the device settings")]
    PermissionDenied,

    #[error("No camera is available on this device")]
    DeviceUnavailable,

    #[error("The camera is being used by another application")]
    DeviceBusy,

    #[error("The camera is not active")]
    InvalidState,

    #[error("The captured frame could not be encoded: {0}")]
    Encoding(#[from] ArtifactError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("Location permission denied. Enable GPS on the device")]
    PermissionDenied,

    #[error("Location is not available. Try again")]
    PositionUnavailable,

    #[error("Timed out waiting for a location fix. Try again")]
    Timeout,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Client name must be between 2 and 100 characters: {0:?}")]
    InvalidName(String),

    #[error("Client directory request failed: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Submission blocked: the {0} is missing or invalid")]
    Validation(DraftField),

    #[error("Submission failed while {step}: {source}")]
    Network {
        step: SubmissionStep,
        #[source]
        source: TransportError,
    },
}

impl SubmissionError {
    /// The backend call that failed, if the failure happened past validation.
    #[must_use]
    pub fn failed_step(&self) -> Option<SubmissionStep> {
        match self {
            SubmissionError::Validation(_) => None,
            SubmissionError::Network { step, .. } => Some(*step),
        }
    }
}
