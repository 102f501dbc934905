use crate::features::error::{
    ArtifactError, CameraError, DirectoryError, DraftField, GeolocationError, SubmissionError,
    SubmissionStep,
};
use crate::structs::StepIndex;
use thiserror::Error;

/// The primary error type for the visit-capture crate.
#[derive(Error, Debug)]
pub enum VisitCaptureError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Location error: {0}")]
    Geolocation(#[from] GeolocationError),

    #[error("Photo rejected: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Client directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("{0}")]
    Submission(#[from] SubmissionError),

    // --- Workflow misuse ---
    #[error("Cannot {action} on {step}")]
    WrongStep { action: &'static str, step: StepIndex },
}

/// Coarse classification of every failure the workflow can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    DeviceUnavailable,
    DeviceBusy,
    PositionUnavailable,
    Timeout,
    InvalidImage,
    Validation(DraftField),
    Network(SubmissionStep),
    InvalidState,
}

/// What the user can do to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    RestartCamera,
    AcquireLocation,
    PickAnotherImage,
    CompleteField(DraftField),
    RetrySubmission(SubmissionStep),
    /// Reload the client list.
    RefreshClients,
}

impl VisitCaptureError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            VisitCaptureError::Camera(e) => match e {
                CameraError::PermissionDenied => ErrorKind::PermissionDenied,
                CameraError::DeviceUnavailable => ErrorKind::DeviceUnavailable,
                CameraError::DeviceBusy => ErrorKind::DeviceBusy,
                CameraError::InvalidState => ErrorKind::InvalidState,
                CameraError::Encoding(_) => ErrorKind::InvalidImage,
            },
            VisitCaptureError::Geolocation(e) => match e {
                GeolocationError::PermissionDenied => ErrorKind::PermissionDenied,
                GeolocationError::PositionUnavailable => ErrorKind::PositionUnavailable,
                GeolocationError::Timeout => ErrorKind::Timeout,
            },
            VisitCaptureError::Artifact(_) => ErrorKind::InvalidImage,
            VisitCaptureError::Directory(e) => match e {
                DirectoryError::InvalidName(_) => ErrorKind::Validation(DraftField::ClientName),
                DirectoryError::Transport(_) => ErrorKind::Network(SubmissionStep::ResolveClient),
            },
            VisitCaptureError::Submission(e) => match e {
                SubmissionError::Validation(field) => ErrorKind::Validation(*field),
                SubmissionError::Network { step, .. } => ErrorKind::Network(*step),
            },
            VisitCaptureError::WrongStep { .. } => ErrorKind::InvalidState,
        }
    }

    /// The retry affordance to offer alongside the error message.
    #[must_use]
    pub fn retry_action(&self) -> Option<RetryAction> {
        match self {
            VisitCaptureError::Camera(CameraError::Encoding(_)) | VisitCaptureError::Artifact(_) => {
                Some(RetryAction::PickAnotherImage)
            }
            VisitCaptureError::Camera(_) => Some(RetryAction::RestartCamera),
            VisitCaptureError::Geolocation(_) => Some(RetryAction::AcquireLocation),
            VisitCaptureError::Directory(DirectoryError::InvalidName(_)) => {
                Some(RetryAction::CompleteField(DraftField::ClientName))
            }
            VisitCaptureError::Directory(DirectoryError::Transport(_)) => {
                Some(RetryAction::RefreshClients)
            }
            VisitCaptureError::Submission(SubmissionError::Validation(field)) => {
                Some(RetryAction::CompleteField(*field))
            }
            VisitCaptureError::Submission(SubmissionError::Network { step, .. }) => {
                Some(RetryAction::RetrySubmission(*step))
            }
            VisitCaptureError::WrongStep { .. } => None,
        }
    }
}

/// A user-facing snapshot of an error: message plus retry affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub kind: ErrorKind,
    pub message: String,
    pub retry: Option<RetryAction>,
}

impl From<&VisitCaptureError> for ErrorNotice {
    fn from(error: &VisitCaptureError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            retry: error.retry_action(),
        }
    }
}
