//! In-memory stand-ins for the device and backend collaborators.

use crate::features::artifact::{Frame, ImageArtifact, ImageCodec, PreviewRegistry};
use crate::features::camera::{CameraConstraints, CameraDeviceProvider, CameraStream};
use crate::features::directory::ClientDirectory;
use crate::features::error::{CameraError, GeolocationError, TransportError};
use crate::features::geolocation::{GeolocationProvider, PositionOptions, RawPosition};
use crate::features::submission::{
    ImageUploadService, NewVisit, SubmissionOrchestrator, UploadImage, VisitRepository,
};
use crate::structs::{ClientId, ClientSuggestion, GeoFix, PhotoSlot, VisitDraft, VisitId};
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

pub fn codec() -> (PreviewRegistry, ImageCodec) {
    let registry = PreviewRegistry::new();
    let codec = ImageCodec::new(registry.clone(), (16, 16), 90, 1024 * 1024);
    (registry, codec)
}

pub fn solid_frame(width: u32, height: u32) -> Frame {
    Frame {
        width,
        height,
        pixels: [200, 120, 40].repeat((width * height) as usize),
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([10, 180, 90]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

pub fn sample_artifact(codec: &ImageCodec) -> ImageArtifact {
    codec.encode_frame(solid_frame(8, 8)).unwrap()
}

pub fn client(id: i64, name: &str) -> ClientSuggestion {
    ClientSuggestion {
        id: ClientId(id),
        name: name.to_string(),
    }
}

/// Draft ready for submission: "Tienda ABC" at (19.43, -99.13) ±8 m with both photos.
pub fn complete_draft(codec: &ImageCodec) -> VisitDraft {
    let mut draft = VisitDraft::default();
    draft.client_name = "Tienda ABC".to_string();
    draft.location = GeoFix::new(19.43, -99.13, 8.0);
    draft.set_photo(PhotoSlot::Before, sample_artifact(codec));
    draft.set_photo(PhotoSlot::After, sample_artifact(codec));
    draft
}

// --- Camera ---

#[derive(Default)]
struct CameraState {
    live: usize,
    opened: usize,
    stopped: usize,
    leaked: usize,
    max_live_at_open: usize,
    last_constraints: Option<CameraConstraints>,
    fail_next_open: Option<CameraError>,
    fail_frames: bool,
    hang_opens: bool,
    hang_frames: bool,
}

#[derive(Clone, Default)]
pub struct FakeCamera {
    state: Arc<Mutex<CameraState>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(&self) -> Arc<dyn CameraDeviceProvider> {
        Arc::new(self.clone())
    }

    pub fn fail_next_open(&self, error: CameraError) {
        self.state.lock().unwrap().fail_next_open = Some(error);
    }

    pub fn fail_frames(&self) {
        self.state.lock().unwrap().fail_frames = true;
    }

    /// Opens never complete until [`FakeCamera::resume`].
    pub fn hang_opens(&self) {
        self.state.lock().unwrap().hang_opens = true;
    }

    /// Frames never arrive until [`FakeCamera::resume`].
    pub fn hang_frames(&self) {
        self.state.lock().unwrap().hang_frames = true;
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap();
        state.hang_opens = false;
        state.hang_frames = false;
    }

    pub fn live_streams(&self) -> usize {
        self.state.lock().unwrap().live
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn stopped(&self) -> usize {
        self.state.lock().unwrap().stopped
    }

    /// Streams dropped without ever being stopped.
    pub fn leaked(&self) -> usize {
        self.state.lock().unwrap().leaked
    }

    /// Highest number of live streams observed at the moment a new one was requested.
    pub fn max_live_at_open(&self) -> usize {
        self.state.lock().unwrap().max_live_at_open
    }

    pub fn last_constraints(&self) -> Option<CameraConstraints> {
        self.state.lock().unwrap().last_constraints.clone()
    }
}

#[async_trait]
impl CameraDeviceProvider for FakeCamera {
    async fn open(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.max_live_at_open = state.max_live_at_open.max(state.live);
            state.last_constraints = Some(constraints.clone());
            if let Some(error) = state.fail_next_open.take() {
                return Err(error);
            }
            state.hang_opens
        };
        if hang {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock().unwrap();
        state.live += 1;
        state.opened += 1;
        Ok(Box::new(FakeStream {
            state: self.state.clone(),
            stopped: false,
        }))
    }
}

struct FakeStream {
    state: Arc<Mutex<CameraState>>,
    stopped: bool,
}

#[async_trait]
impl CameraStream for FakeStream {
    async fn grab_frame(&mut self) -> Result<Frame, CameraError> {
        let (fail, hang) = {
            let state = self.state.lock().unwrap();
            (state.fail_frames, state.hang_frames)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(CameraError::DeviceUnavailable);
        }
        Ok(solid_frame(32, 24))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            let mut state = self.state.lock().unwrap();
            state.live -= 1;
            state.stopped += 1;
        }
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        if !self.stopped {
            let mut state = self.state.lock().unwrap();
            state.live -= 1;
            state.leaked += 1;
        }
    }
}

// --- Geolocation ---

#[derive(Clone)]
enum GeoMode {
    Answer(RawPosition),
    Silent,
    Fail(GeolocationError),
}

struct GeoState {
    mode: GeoMode,
    calls: usize,
    last_options: Option<PositionOptions>,
}

#[derive(Clone)]
pub struct FakeGeolocation {
    state: Arc<Mutex<GeoState>>,
}

impl FakeGeolocation {
    fn with_mode(mode: GeoMode) -> Self {
        Self {
            state: Arc::new(Mutex::new(GeoState {
                mode,
                calls: 0,
                last_options: None,
            })),
        }
    }

    pub fn answering(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self::with_mode(GeoMode::Answer(RawPosition {
            latitude,
            longitude,
            accuracy,
        }))
    }

    /// Never answers; only a timeout ends the request.
    pub fn silent() -> Self {
        Self::with_mode(GeoMode::Silent)
    }

    pub fn failing(error: GeolocationError) -> Self {
        Self::with_mode(GeoMode::Fail(error))
    }

    pub fn answer_with(&self, latitude: f64, longitude: f64, accuracy: f64) {
        self.state.lock().unwrap().mode = GeoMode::Answer(RawPosition {
            latitude,
            longitude,
            accuracy,
        });
    }

    pub fn provider(&self) -> Arc<dyn GeolocationProvider> {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn last_options(&self) -> Option<PositionOptions> {
        self.state.lock().unwrap().last_options
    }
}

#[async_trait]
impl GeolocationProvider for FakeGeolocation {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<RawPosition, GeolocationError> {
        let mode = {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            state.last_options = Some(*options);
            state.mode.clone()
        };
        match mode {
            GeoMode::Answer(position) => Ok(position),
            GeoMode::Fail(error) => Err(error),
            GeoMode::Silent => std::future::pending().await,
        }
    }
}

// --- Backend ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListClients,
    CreateClient(String),
    CreateVisit(ClientId),
    UploadPair(VisitId),
}

struct BackendState {
    clients: Vec<ClientSuggestion>,
    calls: Vec<Call>,
    next_client_id: i64,
    next_visit_id: i64,
    last_visit: Option<NewVisit>,
    last_upload_names: Option<(String, String)>,
    fail_listing: Option<TransportError>,
    fail_visit_once: Option<TransportError>,
    fail_upload_once: Option<TransportError>,
    hang_uploads: bool,
}

/// Client directory, visit repository and upload service sharing one call log.
#[derive(Clone)]
pub struct Backend {
    state: Arc<Mutex<BackendState>>,
}

impl Backend {
    pub fn with_clients(clients: Vec<ClientSuggestion>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BackendState {
                clients,
                calls: Vec::new(),
                next_client_id: 1000,
                next_visit_id: 500,
                last_visit: None,
                last_upload_names: None,
                fail_listing: None,
                fail_visit_once: None,
                fail_upload_once: None,
                hang_uploads: false,
            })),
        }
    }

    pub fn directory(&self) -> Arc<dyn ClientDirectory> {
        Arc::new(self.clone())
    }

    pub fn visits(&self) -> Arc<dyn VisitRepository> {
        Arc::new(self.clone())
    }

    pub fn uploads(&self) -> Arc<dyn ImageUploadService> {
        Arc::new(self.clone())
    }

    pub fn orchestrator(&self) -> SubmissionOrchestrator {
        SubmissionOrchestrator::new(self.visits(), self.uploads())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn created_clients(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateClient(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == Call::ListClients)
            .count()
    }

    pub fn last_visit(&self) -> Option<NewVisit> {
        self.state.lock().unwrap().last_visit.clone()
    }

    pub fn last_upload_names(&self) -> Option<(String, String)> {
        self.state.lock().unwrap().last_upload_names.clone()
    }

    /// Every subsequent listing fails until cleared with [`Backend::restore_listing`].
    pub fn fail_listing(&self, error: TransportError) {
        self.state.lock().unwrap().fail_listing = Some(error);
    }

    pub fn restore_listing(&self) {
        self.state.lock().unwrap().fail_listing = None;
    }

    pub fn fail_visit_creation_once(&self, error: TransportError) {
        self.state.lock().unwrap().fail_visit_once = Some(error);
    }

    pub fn fail_upload_once(&self, error: TransportError) {
        self.state.lock().unwrap().fail_upload_once = Some(error);
    }

    /// Uploads are recorded but never complete until [`Backend::resume_uploads`].
    pub fn hang_uploads(&self) {
        self.state.lock().unwrap().hang_uploads = true;
    }

    pub fn resume_uploads(&self) {
        self.state.lock().unwrap().hang_uploads = false;
    }
}

#[async_trait]
impl ClientDirectory for Backend {
    async fn list_clients(&self) -> Result<Vec<ClientSuggestion>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_listing.clone() {
            return Err(error);
        }
        state.calls.push(Call::ListClients);
        Ok(state.clients.clone())
    }

    async fn create_client(&self, name: &str) -> Result<ClientId, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateClient(name.to_string()));
        let id = ClientId(state.next_client_id);
        state.next_client_id += 1;
        state.clients.push(ClientSuggestion {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }
}

#[async_trait]
impl VisitRepository for Backend {
    async fn create_visit(&self, visit: &NewVisit) -> Result<VisitId, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateVisit(visit.client_id));
        if let Some(error) = state.fail_visit_once.take() {
            return Err(error);
        }
        let id = VisitId(state.next_visit_id);
        state.next_visit_id += 1;
        state.last_visit = Some(visit.clone());
        Ok(id)
    }
}

#[async_trait]
impl ImageUploadService for Backend {
    async fn upload_pair(
        &self,
        visit_id: VisitId,
        before: UploadImage<'_>,
        after: UploadImage<'_>,
    ) -> Result<(), TransportError> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::UploadPair(visit_id));
            if let Some(error) = state.fail_upload_once.take() {
                return Err(error);
            }
            state.hang_uploads
        };
        if hang {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock().unwrap();
        assert!(!before.artifact.bytes().is_empty());
        assert!(!after.artifact.bytes().is_empty());
        state.last_upload_names = Some((before.file_name(), after.file_name()));
        Ok(())
    }
}
