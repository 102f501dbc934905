use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use visit_capture::features::artifact::Frame;
use visit_capture::features::camera::{CameraConstraints, CameraDeviceProvider, CameraStream};
use visit_capture::features::directory::ClientDirectory;
use visit_capture::features::error::{CameraError, GeolocationError, TransportError};
use visit_capture::features::geolocation::{GeolocationProvider, PositionOptions, RawPosition};
use visit_capture::features::submission::{ImageUploadService, NewVisit, UploadImage, VisitRepository};
use visit_capture::{ClientId, ClientSuggestion, StepIndex, VisitId, VisitWorkflow};

/// Camera that renders a horizontal gradient at the requested resolution.
struct GradientCamera;

struct GradientStream {
    width: u32,
    height: u32,
}

#[async_trait]
impl CameraDeviceProvider for GradientCamera {
    async fn open(&self, constraints: &CameraConstraints) -> Result<Box<dyn CameraStream>, CameraError> {
        Ok(Box::new(GradientStream {
            width: constraints.ideal_width,
            height: constraints.ideal_height,
        }))
    }
}

#[async_trait]
impl CameraStream for GradientStream {
    async fn grab_frame(&mut self) -> Result<Frame, CameraError> {
        let mut pixels = Vec::with_capacity((self.width * self.height * 3) as usize);
        for _ in 0..self.height {
            for x in 0..self.width {
                let shade = (x * 255 / self.width.max(1)) as u8;
                pixels.extend_from_slice(&[shade, 128, 255 - shade]);
            }
        }
        Ok(Frame {
            width: self.width,
            height: self.height,
            pixels,
        })
    }

    fn stop(&mut self) {}
}

/// Answers with a fixed position after a short delay.
struct FixedGps;

#[async_trait]
impl GeolocationProvider for FixedGps {
    async fn current_position(&self, _options: &PositionOptions) -> Result<RawPosition, GeolocationError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(RawPosition {
            latitude: 19.4326,
            longitude: -99.1332,
            accuracy: 6.5,
        })
    }
}

#[derive(Default)]
struct InMemoryBackend {
    clients: Mutex<Vec<ClientSuggestion>>,
    next_id: AtomicI64,
}

#[async_trait]
impl ClientDirectory for InMemoryBackend {
    async fn list_clients(&self) -> Result<Vec<ClientSuggestion>, TransportError> {
        let clients = self.clients.lock().map_err(|e| TransportError::new(e.to_string()))?;
        Ok(clients.clone())
    }

    async fn create_client(&self, name: &str) -> Result<ClientId, TransportError> {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut clients = self.clients.lock().map_err(|e| TransportError::new(e.to_string()))?;
        clients.push(ClientSuggestion {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }
}

#[async_trait]
impl VisitRepository for InMemoryBackend {
    async fn create_visit(&self, visit: &NewVisit) -> Result<VisitId, TransportError> {
        let json = serde_json::to_string(visit).map_err(|e| TransportError::new(e.to_string()))?;
        println!("POST /visits {json}");
        Ok(VisitId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[async_trait]
impl ImageUploadService for InMemoryBackend {
    async fn upload_pair(
        &self,
        visit_id: VisitId,
        before: UploadImage<'_>,
        after: UploadImage<'_>,
    ) -> Result<(), TransportError> {
        for image in [before, after] {
            println!(
                "POST /visits/{visit_id}/images {} ({} bytes, {})",
                image.file_name(),
                image.artifact.bytes().len(),
                image.artifact.mime_type()
            );
        }
        Ok(())
    }
}

/// Runs a full visit against simulated devices and an in-memory backend.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let backend = Arc::new(InMemoryBackend::default());
    backend.create_client("Farmacia Central").await?;

    let mut workflow = VisitWorkflow::builder()
        .camera(Arc::new(GradientCamera))
        .geolocation(Arc::new(FixedGps))
        .directory(backend.clone())
        .visits(backend.clone())
        .uploads(backend)
        .build()
        .await;

    for suggestion in workflow.search_clients("farm") {
        println!("Suggestion: {} (#{})", suggestion.name, suggestion.id);
    }
    workflow.set_client_name("Tienda ABC");
    workflow.set_notes("Shelf restocked, promo banner installed");

    workflow.advance().await;
    let fix = workflow.draft().location;
    println!("Location: {fix:?}");

    while workflow.step() != StepIndex::Review {
        if workflow.step().photo_slot().is_some() {
            workflow.start_camera().await?;
            workflow.capture_photo().await?;
        }
        if !workflow.advance().await {
            color_eyre::eyre::bail!("Stuck on {}", workflow.step());
        }
    }

    let receipt = workflow.submit().await?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}
