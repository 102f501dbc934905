use crate::features::artifact::ImageArtifact;
use crate::features::directory::ClientDirectoryResolver;
use crate::features::error::{DirectoryError, DraftField, SubmissionError, SubmissionStep, TransportError};
use crate::structs::{ClientId, PhotoSlot, VisitDraft, VisitId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Payload for the visit-creation call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisit {
    pub client_id: ClientId,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub notes: String,
}

#[async_trait]
pub trait VisitRepository: Send + Sync {
    async fn create_visit(&self, visit: &NewVisit) -> Result<VisitId, TransportError>;
}

/// One photo of the pair, borrowed from the draft for the duration of the upload.
#[derive(Debug, Clone, Copy)]
pub struct UploadImage<'a> {
    pub slot: PhotoSlot,
    pub artifact: &'a ImageArtifact,
}

impl UploadImage<'_> {
    #[must_use]
    pub fn file_name(&self) -> String {
        self.artifact.file_name(self.slot)
    }
}

#[async_trait]
pub trait ImageUploadService: Send + Sync {
    async fn upload_pair(
        &self,
        visit_id: VisitId,
        before: UploadImage<'_>,
        after: UploadImage<'_>,
    ) -> Result<(), TransportError>;
}

/// Outcome of a completed submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub client_id: ClientId,
    pub visit_id: VisitId,
    pub submitted_at: DateTime<Utc>,
}

/// Runs resolve-client, create-visit and upload-photos strictly in that order.
///
/// Ids are written back into the draft as soon as each call succeeds, so a retry
/// after a failure skips the calls that already went through.
#[derive(Clone)]
pub struct SubmissionOrchestrator {
    visits: Arc<dyn VisitRepository>,
    uploads: Arc<dyn ImageUploadService>,
}

impl SubmissionOrchestrator {
    pub fn new(visits: Arc<dyn VisitRepository>, uploads: Arc<dyn ImageUploadService>) -> Self {
        Self { visits, uploads }
    }

    /// Submits `draft`. The draft is left in place either way; on success the caller
    /// is expected to discard it.
    ///
    /// # Errors
    ///
    /// * [`SubmissionError::Validation`] naming the first missing field. No call is made.
    /// * [`SubmissionError::Network`] naming the step that failed. Ids obtained by earlier
    ///   steps stay in the draft.
    pub async fn submit(
        &self,
        draft: &mut VisitDraft,
        resolver: &mut ClientDirectoryResolver,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        if let Some(field) = draft.first_missing_field() {
            return Err(SubmissionError::Validation(field));
        }
        let Some(location) = draft.location else {
            return Err(SubmissionError::Validation(DraftField::Location));
        };

        let client_id = match draft.client_id {
            Some(id) => id,
            None => {
                let id = resolver
                    .resolve(&draft.client_name)
                    .await
                    .map_err(|e| match e {
                        DirectoryError::InvalidName(_) => SubmissionError::Validation(DraftField::ClientName),
                        DirectoryError::Transport(source) => network(SubmissionStep::ResolveClient, source),
                    })?;
                draft.client_id = Some(id);
                id
            }
        };

        let visit_id = match draft.visit_id {
            Some(id) => id,
            None => {
                let visit = NewVisit {
                    client_id,
                    latitude: location.latitude(),
                    longitude: location.longitude(),
                    accuracy: location.accuracy_meters(),
                    notes: draft.notes.clone(),
                };
                let id = self
                    .visits
                    .create_visit(&visit)
                    .await
                    .map_err(|source| network(SubmissionStep::CreateVisit, source))?;
                info!(%client_id, visit_id = %id, "Visit created");
                draft.visit_id = Some(id);
                id
            }
        };

        let (Some(before), Some(after)) = (draft.photo(PhotoSlot::Before), draft.photo(PhotoSlot::After))
        else {
            return Err(SubmissionError::Validation(DraftField::PhotoBefore));
        };
        self.uploads
            .upload_pair(
                visit_id,
                UploadImage {
                    slot: PhotoSlot::Before,
                    artifact: before,
                },
                UploadImage {
                    slot: PhotoSlot::After,
                    artifact: after,
                },
            )
            .await
            .map_err(|source| network(SubmissionStep::UploadImages, source))?;
        info!(%visit_id, "Visit photos uploaded");

        Ok(SubmissionReceipt {
            client_id,
            visit_id,
            submitted_at: Utc::now(),
        })
    }
}

fn network(step: SubmissionStep, source: TransportError) -> SubmissionError {
    warn!(%step, error = %source, "Submission step failed");
    SubmissionError::Network { step, source }
}
