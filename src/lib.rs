//! # Visit Capture
//!
//! Guided, step-by-step capture of a field visit: who was visited, where, and a
//! before/after photo pair, submitted to a backend as one visit record.
//!
//! ## Key Features
//!
//! - **Step Gating**: Five ordered steps, each of which must be complete before moving on.
//! - **Client Typeahead**: Search a cached client list, or type a new name that is created on submission.
//! - **Location**: One-shot, high-accuracy position fixes with a bounded wait.
//! - **Photos**: Camera capture or file picker, JPEG encoding and base64 data URL previews.
//! - **Resumable Submission**: Client, visit and photos are sent in order; a retry skips what already succeeded.
//!
//! ## Usage
//!
//! Build a `VisitWorkflow` with your platform's camera and location providers and your
//! backend's client directory, visit repository and upload service.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use visit_capture::{StepIndex, VisitWorkflow};
//! # use visit_capture::features::camera::CameraDeviceProvider;
//! # use visit_capture::features::geolocation::GeolocationProvider;
//! # use visit_capture::features::directory::ClientDirectory;
//! # use visit_capture::features::submission::{ImageUploadService, VisitRepository};
//!
//! # async fn run(
//! #     camera: Arc<dyn CameraDeviceProvider>,
//! #     gps: Arc<dyn GeolocationProvider>,
//! #     backend_clients: Arc<dyn ClientDirectory>,
//! #     backend_visits: Arc<dyn VisitRepository>,
//! #     backend_uploads: Arc<dyn ImageUploadService>,
//! #     before_jpg: Vec<u8>,
//! # ) -> color_eyre::Result<()> {
//! let mut workflow = VisitWorkflow::builder()
//!     .camera(camera)
//!     .geolocation(gps)
//!     .directory(backend_clients)
//!     .visits(backend_visits)
//!     .uploads(backend_uploads)
//!     .build()
//!     .await;
//!
//! workflow.set_client_name("Tienda ABC");
//! workflow.set_notes("Shelf restocked");
//! workflow.advance().await; // Location, a fix is requested on entry
//! workflow.advance().await;
//!
//! workflow.pick_photo(before_jpg, Some("before.jpg"))?;
//! workflow.advance().await;
//! workflow.start_camera().await?;
//! workflow.capture_photo().await?;
//! workflow.advance().await;
//!
//! assert_eq!(workflow.step(), StepIndex::Review);
//! let receipt = workflow.submit().await?;
//! println!("Visit {} saved", receipt.visit_id);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod features;
pub mod structs;
pub mod visit_workflow;

#[cfg(test)]
mod test_support;

pub use error::{ErrorKind, ErrorNotice, RetryAction, VisitCaptureError};
pub use features::submission::SubmissionReceipt;
pub use structs::{ClientId, ClientSuggestion, GeoFix, PhotoSlot, StepIndex, VisitDraft, VisitId};
pub use visit_workflow::VisitWorkflow;
