use crate::VisitCaptureError;
use crate::error::ErrorNotice;
use crate::features::artifact::{ImageCodec, PreviewRegistry};
use crate::features::camera::{CameraConstraints, CameraDeviceProvider, CameraSession, CameraStatus};
use crate::features::directory::{
    ClientDirectory, ClientDirectoryResolver, Suggestions, same_client_name,
};
use crate::features::geolocation::{GeolocationAcquirer, GeolocationProvider};
use crate::features::submission::{
    ImageUploadService, SubmissionOrchestrator, SubmissionReceipt, VisitRepository,
};
use crate::structs::{ClientSuggestion, GeoFix, PhotoSlot, StepIndex, VisitDraft};
use bon::bon;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The guided capture flow for a single visit.
///
/// Holds the draft and the current [`StepIndex`], and owns every device and backend
/// capability the steps use. Forward navigation is gated on the current step's
/// completion predicate; every step change stops the camera.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use visit_capture::{VisitWorkflow, VisitCaptureError};
/// # use visit_capture::features::camera::CameraDeviceProvider;
/// # use visit_capture::features::geolocation::GeolocationProvider;
/// # use visit_capture::features::directory::ClientDirectory;
/// # use visit_capture::features::submission::{VisitRepository, ImageUploadService};
/// # async fn run(
/// #     camera: Arc<dyn CameraDeviceProvider>,
/// #     gps: Arc<dyn GeolocationProvider>,
/// #     directory: Arc<dyn ClientDirectory>,
/// #     visits: Arc<dyn VisitRepository>,
/// #     uploads: Arc<dyn ImageUploadService>,
/// # ) -> Result<(), VisitCaptureError> {
/// let mut workflow = VisitWorkflow::builder()
///     .camera(camera)
///     .geolocation(gps)
///     .directory(directory)
///     .visits(visits)
///     .uploads(uploads)
///     .build()
///     .await;
///
/// workflow.set_client_name("Tienda ABC");
/// assert!(workflow.advance().await); // enters Location and requests a fix
/// # Ok(())
/// # }
/// ```
pub struct VisitWorkflow {
    step: StepIndex,
    draft: VisitDraft,
    camera: CameraSession,
    geolocation: GeolocationAcquirer,
    directory: ClientDirectoryResolver,
    orchestrator: SubmissionOrchestrator,
    codec: ImageCodec,
    geolocation_timeout: Duration,
    high_accuracy: bool,
    location_requested: bool,
    last_error: Option<ErrorNotice>,
}

#[bon]
impl VisitWorkflow {
    /// Builds a workflow at [`StepIndex::ClientAndNotes`] with an empty draft and
    /// loads the client list for typeahead.
    ///
    /// # Builder Arguments
    ///
    /// * `camera`, `geolocation`, `directory`, `visits`, `uploads` - the device and backend collaborators.
    /// * `camera_constraints` - (Default: rear camera, 1280x720, no audio) what to ask the camera for.
    /// * `geolocation_timeout: Duration` - (Default: 10 s) bounded wait for a location fix.
    /// * `high_accuracy: bool` - (Default: `true`) request a GPS-grade fix.
    /// * `suggestion_limit: usize` - (Default: `20`) maximum typeahead suggestions.
    /// * `preview_max_size: (u32, u32)` - (Default: `(320, 320)`) bounding box of photo previews.
    /// * `jpeg_quality: u8` - (Default: `90`) quality of captured frames.
    /// * `max_image_bytes: usize` - (Default: 10 MiB) largest file accepted from the picker.
    /// * `preview_registry` - registry that tracks every preview handed out.
    ///
    /// A failure to load the client list is not fatal: it is logged and reported through
    /// [`VisitWorkflow::last_error`], and the list can be reloaded with
    /// [`VisitWorkflow::refresh_clients`].
    #[builder]
    pub async fn new(
        camera: Arc<dyn CameraDeviceProvider>,
        geolocation: Arc<dyn GeolocationProvider>,
        directory: Arc<dyn ClientDirectory>,
        visits: Arc<dyn VisitRepository>,
        uploads: Arc<dyn ImageUploadService>,
        #[builder(default)] camera_constraints: CameraConstraints,
        #[builder(default = Duration::from_secs(10))] geolocation_timeout: Duration,
        #[builder(default = true)] high_accuracy: bool,
        #[builder(default = 20)] suggestion_limit: usize,
        #[builder(default = (320, 320))] preview_max_size: (u32, u32),
        #[builder(default = 90)] jpeg_quality: u8,
        #[builder(default = 10 * 1024 * 1024)] max_image_bytes: usize,
        #[builder(default)] preview_registry: PreviewRegistry,
    ) -> Self {
        let mut workflow = Self {
            step: StepIndex::ClientAndNotes,
            draft: VisitDraft::default(),
            camera: CameraSession::new(camera, camera_constraints),
            geolocation: GeolocationAcquirer::new(geolocation),
            directory: ClientDirectoryResolver::new(directory, suggestion_limit),
            orchestrator: SubmissionOrchestrator::new(visits, uploads),
            codec: ImageCodec::new(
                preview_registry,
                preview_max_size,
                jpeg_quality,
                max_image_bytes,
            ),
            geolocation_timeout,
            high_accuracy,
            location_requested: false,
            last_error: None,
        };
        if let Err(e) = workflow.refresh_clients().await {
            warn!(error = %e, "Client list unavailable, typeahead disabled until refreshed");
        }
        workflow
    }

    #[must_use]
    pub fn step(&self) -> StepIndex {
        self.step
    }

    #[must_use]
    pub fn draft(&self) -> &VisitDraft {
        &self.draft
    }

    #[must_use]
    pub fn camera_status(&self) -> CameraStatus {
        self.camera.status()
    }

    #[must_use]
    pub fn previews(&self) -> &PreviewRegistry {
        self.codec.registry()
    }

    /// Data URL preview of the photo in `slot`, for the review screen.
    #[must_use]
    pub fn preview(&self, slot: PhotoSlot) -> Option<&str> {
        self.draft.photo(slot).map(|photo| photo.preview().data_url())
    }

    /// The most recent failure, until the next step change or successful submission.
    #[must_use]
    pub fn last_error(&self) -> Option<&ErrorNotice> {
        self.last_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    fn record<T>(&mut self, result: Result<T, VisitCaptureError>) -> Result<T, VisitCaptureError> {
        if let Err(e) = &result {
            warn!(step = %self.step, error = %e, "Workflow action failed");
            self.last_error = Some(ErrorNotice::from(e));
        }
        result
    }

    // --- Navigation ---

    /// Whether the current step's completion predicate holds.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.draft.is_step_complete(self.step)
    }

    /// Moves to the next step if the current one is complete.
    ///
    /// Returns `false` without changing anything when the step is incomplete, or on
    /// [`StepIndex::Review`], whose exit is [`VisitWorkflow::submit`]. Entering
    /// [`StepIndex::Location`] for the first time without a fix requests one; a failed
    /// request is reported through [`VisitWorkflow::last_error`].
    pub async fn advance(&mut self) -> bool {
        let Some(next) = self.step.next() else {
            return false;
        };
        if !self.can_advance() {
            debug!(step = %self.step, "Advance rejected, step incomplete");
            return false;
        }
        self.enter(next);

        if next == StepIndex::Location && self.draft.location.is_none() && !self.location_requested {
            // The outcome is kept in the draft or in `last_error`. A cancelled request
            // leaves the flag unset, so the next entry asks again.
            let _ = self.acquire_location().await;
            self.location_requested = true;
        }
        true
    }

    /// Moves back one step. Always allowed except on the first step.
    pub fn retreat(&mut self) -> bool {
        let Some(previous) = self.step.previous() else {
            return false;
        };
        self.enter(previous);
        true
    }

    /// Walks one step at a time towards `target`, stopping at the first gate that
    /// does not open. Returns whether `target` was reached.
    pub async fn go_to(&mut self, target: StepIndex) -> bool {
        while self.step != target {
            let moved = if target > self.step {
                self.advance().await
            } else {
                self.retreat()
            };
            if !moved {
                return false;
            }
        }
        true
    }

    fn enter(&mut self, step: StepIndex) {
        self.camera.stop();
        self.last_error = None;
        info!(from = %self.step, to = %step, "Step changed");
        self.step = step;
    }

    // --- Client and notes ---

    /// Updates the client name. A previously selected or resolved client id is
    /// dropped when the name changes, unless the visit was already created for it.
    pub fn set_client_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        let renamed = !same_client_name(&self.draft.client_name, &name);
        if renamed && self.draft.client_id.is_some() && self.draft.visit_id.is_none() {
            debug!("Client name edited, clearing selected client");
            self.draft.client_id = None;
        }
        self.draft.client_name = name;
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.draft.notes = notes.into();
    }

    /// Typeahead suggestions for `term` from the cached client list.
    #[must_use]
    pub fn search_clients(&self, term: &str) -> Suggestions<'_> {
        self.directory.search(term)
    }

    /// Picks an existing client, so submission never needs to resolve or create one.
    pub fn select_client(&mut self, client: &ClientSuggestion) {
        if self.draft.visit_id.is_some() {
            warn!("Visit already created, keeping its client");
            return;
        }
        self.draft.client_name = client.name.clone();
        self.draft.client_id = Some(client.id);
        debug!(client_id = %client.id, "Client selected");
    }

    /// Reloads the client list.
    ///
    /// # Errors
    ///
    /// [`VisitCaptureError::Directory`] when the listing fails; the old list is kept.
    pub async fn refresh_clients(&mut self) -> Result<usize, VisitCaptureError> {
        let result = self.directory.refresh().await.map_err(VisitCaptureError::from);
        self.record(result)
    }

    // --- Location ---

    /// Requests a fresh fix and stores it in the draft, replacing any previous one.
    ///
    /// # Errors
    ///
    /// [`VisitCaptureError::Geolocation`]; the draft's location is left as it was.
    pub async fn acquire_location(&mut self) -> Result<GeoFix, VisitCaptureError> {
        let result = self
            .geolocation
            .acquire(self.geolocation_timeout, self.high_accuracy)
            .await
            .map_err(VisitCaptureError::from);
        if let Ok(fix) = &result {
            self.draft.location = Some(*fix);
            self.last_error = None;
        }
        self.record(result)
    }

    // --- Photos ---

    fn photo_slot(&self, action: &'static str) -> Result<PhotoSlot, VisitCaptureError> {
        self.step.photo_slot().ok_or(VisitCaptureError::WrongStep {
            action,
            step: self.step,
        })
    }

    /// Opens the camera for the current photo step.
    ///
    /// # Errors
    ///
    /// * [`VisitCaptureError::WrongStep`] outside the photo steps.
    /// * [`VisitCaptureError::Camera`] when the device refuses.
    pub async fn start_camera(&mut self) -> Result<(), VisitCaptureError> {
        let result = match self.photo_slot("start the camera") {
            Ok(_) => self.camera.start().await.map_err(VisitCaptureError::from),
            Err(e) => Err(e),
        };
        self.record(result)
    }

    /// Captures the current frame into this step's photo slot and stops the camera.
    ///
    /// # Errors
    ///
    /// * [`VisitCaptureError::WrongStep`] outside the photo steps.
    /// * [`VisitCaptureError::Camera`] with [`crate::features::error::CameraError::InvalidState`]
    ///   when the camera was not started; the camera is reset and can be started again.
    pub async fn capture_photo(&mut self) -> Result<PhotoSlot, VisitCaptureError> {
        let result = self.try_capture_photo().await;
        self.record(result)
    }

    async fn try_capture_photo(&mut self) -> Result<PhotoSlot, VisitCaptureError> {
        let slot = self.photo_slot("capture a photo")?;
        let artifact = self.camera.capture(&self.codec).await?;
        self.draft.set_photo(slot, artifact);
        Ok(slot)
    }

    /// Uses a file from the gallery/file picker for this step's photo slot, without the camera.
    ///
    /// # Errors
    ///
    /// * [`VisitCaptureError::WrongStep`] outside the photo steps.
    /// * [`VisitCaptureError::Artifact`] when the file is not a usable image.
    pub fn pick_photo(
        &mut self,
        bytes: Vec<u8>,
        file_name: Option<&str>,
    ) -> Result<PhotoSlot, VisitCaptureError> {
        let result = self.try_pick_photo(bytes, file_name);
        self.record(result)
    }

    fn try_pick_photo(
        &mut self,
        bytes: Vec<u8>,
        file_name: Option<&str>,
    ) -> Result<PhotoSlot, VisitCaptureError> {
        let slot = self.photo_slot("pick a photo")?;
        let artifact = self.codec.from_picked_file(bytes, file_name)?;
        self.camera.stop();
        self.draft.set_photo(slot, artifact);
        Ok(slot)
    }

    /// Stops the camera without capturing.
    pub fn stop_camera(&mut self) {
        self.camera.stop();
    }

    /// Clears this step's photo, releasing its preview. Returns whether there was one.
    ///
    /// # Errors
    ///
    /// [`VisitCaptureError::WrongStep`] outside the photo steps.
    pub fn remove_photo(&mut self) -> Result<bool, VisitCaptureError> {
        let result = self.photo_slot("remove a photo").map(|slot| {
            self.camera.stop();
            self.draft.clear_photo(slot)
        });
        self.record(result)
    }

    /// Clears this step's photo and opens the camera again.
    ///
    /// # Errors
    ///
    /// Same as [`VisitCaptureError::WrongStep`] and [`VisitWorkflow::start_camera`].
    pub async fn retake_photo(&mut self) -> Result<(), VisitCaptureError> {
        self.remove_photo()?;
        self.start_camera().await
    }

    // --- Submission ---

    /// Submits the visit from the review step.
    ///
    /// On success the draft is discarded (both previews released) and the workflow
    /// starts over with an empty draft at the first step. On failure the draft,
    /// including any client or visit id already obtained, is kept so that calling
    /// `submit` again resumes at the step that failed.
    ///
    /// # Errors
    ///
    /// * [`VisitCaptureError::WrongStep`] before the review step.
    /// * [`VisitCaptureError::Submission`] naming the missing field or the failed step.
    pub async fn submit(&mut self) -> Result<SubmissionReceipt, VisitCaptureError> {
        if self.step != StepIndex::Review {
            let result = Err(VisitCaptureError::WrongStep {
                action: "submit the visit",
                step: self.step,
            });
            return self.record(result);
        }
        self.camera.stop();
        let result = self
            .orchestrator
            .submit(&mut self.draft, &mut self.directory)
            .await
            .map_err(VisitCaptureError::from);
        let receipt = self.record(result)?;

        std::mem::take(&mut self.draft).discard();
        self.step = StepIndex::ClientAndNotes;
        self.location_requested = false;
        self.last_error = None;
        info!(
            client_id = %receipt.client_id,
            visit_id = %receipt.visit_id,
            "Visit submitted"
        );
        Ok(receipt)
    }

    /// Abandons the visit: stops the camera and discards the draft, releasing its previews.
    pub fn cancel(mut self) {
        self.camera.stop();
        std::mem::take(&mut self.draft).discard();
        info!(step = %self.step, "Visit capture cancelled");
    }
}
