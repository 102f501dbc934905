use crate::features::artifact::{Frame, ImageArtifact, ImageCodec};
use crate::features::error::CameraError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum FacingMode {
    /// Rear camera, the one pointed at the site.
    Environment,
    User,
}

/// What the session asks the platform for when opening a stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConstraints {
    pub facing_mode: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub audio: bool,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
            audio: false,
        }
    }
}

/// Platform camera access (permission prompt plus stream acquisition).
#[async_trait]
pub trait CameraDeviceProvider: Send + Sync {
    /// Opens a live stream and attaches it to the platform's viewfinder.
    async fn open(&self, constraints: &CameraConstraints) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// A live capture stream holding a device lock until [`CameraStream::stop`].
#[async_trait]
pub trait CameraStream: Send {
    async fn grab_frame(&mut self) -> Result<Frame, CameraError>;

    /// Releases every track of the stream. Must be safe to call more than once.
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    Idle,
    Active,
    /// The last `start()` failed. `start()` may be retried.
    Error,
}

/// Owns at most one live camera stream at a time.
///
/// The stream is stopped on every exit path: explicit `stop()`, after `capture()`,
/// before a new `start()`, and when the session is dropped.
pub struct CameraSession {
    provider: Arc<dyn CameraDeviceProvider>,
    constraints: CameraConstraints,
    stream: Option<Box<dyn CameraStream>>,
    failed: bool,
}

impl CameraSession {
    pub fn new(provider: Arc<dyn CameraDeviceProvider>, constraints: CameraConstraints) -> Self {
        Self {
            provider,
            constraints,
            stream: None,
            failed: false,
        }
    }

    #[must_use]
    pub fn status(&self) -> CameraStatus {
        match (&self.stream, self.failed) {
            (Some(_), _) => CameraStatus::Active,
            (None, true) => CameraStatus::Error,
            (None, false) => CameraStatus::Idle,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens the camera, stopping any stream this session already holds first.
    ///
    /// # Errors
    ///
    /// [`CameraError::PermissionDenied`], [`CameraError::DeviceUnavailable`] or
    /// [`CameraError::DeviceBusy`] as reported by the provider. The session is then
    /// in [`CameraStatus::Error`].
    pub async fn start(&mut self) -> Result<(), CameraError> {
        self.stop();
        match self.provider.open(&self.constraints).await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.failed = false;
                info!(facing = ?self.constraints.facing_mode, "Camera stream opened");
                Ok(())
            }
            Err(e) => {
                self.failed = true;
                warn!(error = %e, "Camera could not be started");
                Err(e)
            }
        }
    }

    /// Samples the current frame, encodes it and stops the stream.
    ///
    /// # Errors
    ///
    /// * [`CameraError::InvalidState`] if no stream is active; the session is reset to idle.
    /// * Any error from sampling the frame or [`CameraError::Encoding`]. The stream is
    ///   stopped either way.
    pub async fn capture(&mut self, codec: &ImageCodec) -> Result<ImageArtifact, CameraError> {
        let Some(stream) = self.stream.as_mut() else {
            self.failed = false;
            return Err(CameraError::InvalidState);
        };
        let frame = stream.grab_frame().await;
        self.stop();
        let artifact = codec.encode_frame(frame?)?;
        info!(size = artifact.bytes().len(), "Photo captured");
        Ok(artifact)
    }

    /// Releases the stream, if any. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("Camera stream released");
        }
        self.failed = false;
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeCamera, codec};

    #[tokio::test]
    async fn test_start_activates_single_stream() {
        let camera = FakeCamera::new();
        let mut session = CameraSession::new(camera.provider(), CameraConstraints::default());
        assert_eq!(session.status(), CameraStatus::Idle);

        session.start().await.unwrap();

        assert_eq!(session.status(), CameraStatus::Active);
        assert_eq!(camera.live_streams(), 1);
        assert_eq!(
            camera.last_constraints().map(|c| c.facing_mode),
            Some(FacingMode::Environment)
        );
    }

    #[tokio::test]
    async fn test_second_start_stops_first_stream_before_opening() {
        let camera = FakeCamera::new();
        let mut session = CameraSession::new(camera.provider(), CameraConstraints::default());

        session.start().await.unwrap();
        session.start().await.unwrap();

        assert_eq!(camera.opened(), 2);
        assert_eq!(camera.stopped(), 1, "First stream must have been stopped");
        assert_eq!(camera.live_streams(), 1);
        assert_eq!(
            camera.max_live_at_open(),
            0,
            "No stream may be live when a new one is requested"
        );
    }

    #[tokio::test]
    async fn test_many_starts_never_overlap() {
        let camera = FakeCamera::new();
        let mut session = CameraSession::new(camera.provider(), CameraConstraints::default());

        for _ in 0..5 {
            session.start().await.unwrap();
            assert_eq!(camera.live_streams(), 1);
        }
        session.stop();
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(camera.max_live_at_open(), 0);
    }

    #[tokio::test]
    async fn test_failed_start_enters_error_and_can_be_retried() {
        let camera = FakeCamera::new();
        camera.fail_next_open(CameraError::PermissionDenied);
        let mut session = CameraSession::new(camera.provider(), CameraConstraints::default());

        let result = session.start().await;
        assert!(matches!(result, Err(CameraError::PermissionDenied)));
        assert_eq!(session.status(), CameraStatus::Error);

        session.start().await.unwrap();
        assert_eq!(session.status(), CameraStatus::Active);
    }

    #[tokio::test]
    async fn test_capture_produces_artifact_and_stops() {
        let camera = FakeCamera::new();
        let (registry, codec) = codec();
        let mut session = CameraSession::new(camera.provider(), CameraConstraints::default());
        session.start().await.unwrap();

        let artifact = session.capture(&codec).await.unwrap();

        assert_eq!(artifact.mime_type(), "image/jpeg");
        assert_eq!(session.status(), CameraStatus::Idle);
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(registry.live(), 1);
    }

    #[tokio::test]
    async fn test_capture_without_stream_is_invalid_state() {
        let camera = FakeCamera::new();
        let (_registry, codec) = codec();
        let mut session = CameraSession::new(camera.provider(), CameraConstraints::default());

        let result = session.capture(&codec).await;

        assert!(matches!(result, Err(CameraError::InvalidState)));
        assert_eq!(session.status(), CameraStatus::Idle);
        assert_eq!(camera.opened(), 0);
    }

    #[tokio::test]
    async fn test_failed_frame_still_releases_stream() {
        let camera = FakeCamera::new();
        camera.fail_frames();
        let (registry, codec) = codec();
        let mut session = CameraSession::new(camera.provider(), CameraConstraints::default());
        session.start().await.unwrap();

        let result = session.capture(&codec).await;

        assert!(matches!(result, Err(CameraError::DeviceUnavailable)));
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(registry.issued(), 0);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_drop_releases() {
        let camera = FakeCamera::new();
        let mut session = CameraSession::new(camera.provider(), CameraConstraints::default());
        session.stop();
        session.stop();
        assert_eq!(camera.stopped(), 0);

        session.start().await.unwrap();
        session.stop();
        session.stop();
        assert_eq!(camera.stopped(), 1);

        session.start().await.unwrap();
        drop(session);
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(camera.stopped(), 2);
    }
}
