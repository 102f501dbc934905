//! Turns camera frames and picked files into uploadable photo artifacts.
//!
//! Every artifact carries a [`PreviewHandle`]: a small JPEG thumbnail rendered
//! once as a data URL and tracked by a [`PreviewRegistry`]. The handle is released
//! exactly once, either explicitly through [`ImageArtifact::release`] or when the
//! artifact is dropped.

use crate::features::error::ArtifactError;
use crate::structs::PhotoSlot;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, ImageFormat, RgbImage};
use mime_guess::MimeGuess;
use std::collections::HashSet;
use std::fmt;
use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

pub const JPEG_MIME: &str = "image/jpeg";

/// A raw RGB8 frame sampled from a live camera stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB8 pixels, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    live: HashSet<u64>,
    issued: u64,
    released: u64,
    double_releases: u64,
}

/// Keeps count of every preview handed out so leaks and double releases are observable.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl PreviewRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RegistryState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn issue(&self, data_url: String) -> PreviewHandle {
        let id = self.with_state(|state| {
            state.next_id += 1;
            state.issued += 1;
            state.live.insert(state.next_id);
            state.next_id
        });
        debug!(preview_id = id, "Preview issued");
        PreviewHandle {
            id,
            data_url,
            registry: self.clone(),
            released: false,
        }
    }

    fn release(&self, id: u64) {
        let first_release = self.with_state(|state| {
            if state.live.remove(&id) {
                state.released += 1;
                true
            } else {
                state.double_releases += 1;
                false
            }
        });
        if first_release {
            debug!(preview_id = id, "Preview released");
        } else {
            warn!(preview_id = id, "Preview released more than once");
        }
    }

    /// Previews currently held by some artifact.
    #[must_use]
    pub fn live(&self) -> usize {
        self.with_state(|state| state.live.len())
    }

    #[must_use]
    pub fn issued(&self) -> u64 {
        self.with_state(|state| state.issued)
    }

    #[must_use]
    pub fn released(&self) -> u64 {
        self.with_state(|state| state.released)
    }

    #[must_use]
    pub fn double_releases(&self) -> u64 {
        self.with_state(|state| state.double_releases)
    }
}

/// A renderable thumbnail of an artifact. Released exactly once.
pub struct PreviewHandle {
    id: u64,
    data_url: String,
    registry: PreviewRegistry,
    released: bool,
}

impl PreviewHandle {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// `data:image/jpeg;base64,...` thumbnail suitable for an `<img>` source.
    #[must_use]
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(self.id);
        }
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("id", &self.id)
            .field("data_url_len", &self.data_url.len())
            .finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}

/// A captured or picked photo in its transport form.
#[derive(Debug)]
pub struct ImageArtifact {
    bytes: Vec<u8>,
    mime_type: String,
    captured_at: DateTime<Utc>,
    preview: PreviewHandle,
}

impl ImageArtifact {
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    #[must_use]
    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    /// Upload file name, e.g. `photo_before_1700000000000.jpg`.
    #[must_use]
    pub fn file_name(&self, slot: PhotoSlot) -> String {
        let extension = mime_guess::get_mime_extensions_str(&self.mime_type)
            .and_then(|extensions| {
                extensions
                    .iter()
                    .find(|ext| **ext == "jpg")
                    .or_else(|| extensions.first())
            })
            .copied()
            .unwrap_or("bin");
        format!(
            "{}_{}.{extension}",
            slot.file_stem(),
            self.captured_at.timestamp_millis()
        )
    }

    /// Releases the preview and drops the artifact.
    pub fn release(mut self) {
        self.preview.release_once();
    }
}

/// Converts device frames and picked files into [`ImageArtifact`]s.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    registry: PreviewRegistry,
    preview_max_size: (u32, u32),
    jpeg_quality: u8,
    max_image_bytes: usize,
}

impl ImageCodec {
    #[must_use]
    pub fn new(
        registry: PreviewRegistry,
        preview_max_size: (u32, u32),
        jpeg_quality: u8,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            registry,
            preview_max_size,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            max_image_bytes,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }

    /// Encodes a raw camera frame straight to JPEG bytes.
    ///
    /// # Errors
    ///
    /// * [`ArtifactError::MalformedFrame`] when the pixel buffer does not match the dimensions.
    /// * [`ArtifactError::ImageProcessing`] when JPEG encoding fails.
    pub fn encode_frame(&self, frame: Frame) -> Result<ImageArtifact, ArtifactError> {
        let Frame {
            width,
            height,
            pixels,
        } = frame;
        let len = pixels.len();
        let rgb = RgbImage::from_raw(width, height, pixels).ok_or(ArtifactError::MalformedFrame {
            width,
            height,
            len,
        })?;

        let mut bytes = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality).encode_image(&rgb)?;
        let bytes = bytes.into_inner();

        let preview = self.render_preview(&DynamicImage::ImageRgb8(rgb))?;
        debug!(width, height, size = bytes.len(), "Encoded camera frame");
        Ok(ImageArtifact {
            bytes,
            mime_type: JPEG_MIME.to_string(),
            captured_at: Utc::now(),
            preview,
        })
    }

    /// Accepts a file from the gallery/file picker as-is, without re-encoding.
    ///
    /// The MIME type is sniffed from the content and falls back to the file name.
    /// Any `image/*` file is accepted. Formats without a decoder (HEIC, TIFF, ...)
    /// are previewed with their original bytes instead of a thumbnail.
    ///
    /// # Errors
    ///
    /// * [`ArtifactError::TooLarge`] when the file exceeds the configured maximum.
    /// * [`ArtifactError::UnsupportedFileType`] when it is not an image.
    /// * [`ArtifactError::ImageProcessing`] when a decodable format turns out to be corrupt.
    pub fn from_picked_file(
        &self,
        bytes: Vec<u8>,
        file_name: Option<&str>,
    ) -> Result<ImageArtifact, ArtifactError> {
        if bytes.len() > self.max_image_bytes {
            return Err(ArtifactError::TooLarge {
                size: bytes.len(),
                max: self.max_image_bytes,
            });
        }

        let sniffed = image::guess_format(&bytes).ok();
        let mime_type = match sniffed {
            Some(format) => format.to_mime_type().to_string(),
            None => file_name
                .map(|name| MimeGuess::from_path(name).first_or_octet_stream())
                .map_or_else(|| "application/octet-stream".to_string(), |m| m.to_string()),
        };
        if !mime_type.starts_with("image/") {
            return Err(ArtifactError::UnsupportedFileType(mime_type));
        }

        let format = sniffed.or_else(|| ImageFormat::from_mime_type(&mime_type));
        let decoded = match format {
            Some(format) => match image::load_from_memory_with_format(&bytes, format) {
                Ok(img) => Some(img),
                Err(ImageError::Unsupported(reason)) => {
                    debug!(%reason, "No decoder for picked image");
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        let preview = match decoded {
            Some(img) => self.render_preview(&img)?,
            None => self.registry.issue(data_url(&mime_type, &bytes)),
        };
        debug!(%mime_type, size = bytes.len(), "Accepted picked image");
        Ok(ImageArtifact {
            bytes,
            mime_type,
            captured_at: Utc::now(),
            preview,
        })
    }

    fn render_preview(&self, img: &DynamicImage) -> Result<PreviewHandle, ArtifactError> {
        let (max_width, max_height) = self.preview_max_size;
        // JPEG has no alpha channel.
        let thumbnail = DynamicImage::ImageRgb8(img.thumbnail(max_width, max_height).to_rgb8());
        let mut bytes = Cursor::new(Vec::new());
        thumbnail.write_to(&mut bytes, ImageFormat::Jpeg)?;
        Ok(self.registry.issue(data_url(JPEG_MIME, &bytes.into_inner())))
    }
}

fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    let b64 = general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{b64}")
}
