use crate::features::artifact::ImageArtifact;
use crate::features::error::DraftField;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of the free-text visit notes.
pub const MAX_NOTES_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ClientId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct VisitId(pub i64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single position reading. Only constructed through [`GeoFix::new`] (deserialization
/// included), so every value in circulation has finite, in-range coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", try_from = "UncheckedGeoFix")]
pub struct GeoFix {
    latitude: f64,
    longitude: f64,
    accuracy_meters: f64,
}

impl GeoFix {
    /// Returns `None` for non-finite or out-of-range readings.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64) -> Option<Self> {
        let finite = latitude.is_finite() && longitude.is_finite() && accuracy_meters.is_finite();
        let in_range = (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude)
            && accuracy_meters >= 0.0;
        (finite && in_range).then_some(Self {
            latitude,
            longitude,
            accuracy_meters,
        })
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    #[must_use]
    pub fn accuracy_meters(&self) -> f64 {
        self.accuracy_meters
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UncheckedGeoFix {
    latitude: f64,
    longitude: f64,
    accuracy_meters: f64,
}

impl TryFrom<UncheckedGeoFix> for GeoFix {
    type Error = &'static str;

    fn try_from(raw: UncheckedGeoFix) -> Result<Self, Self::Error> {
        GeoFix::new(raw.latitude, raw.longitude, raw.accuracy_meters)
            .ok_or("coordinates or accuracy out of range")
    }
}

/// A client as listed by the directory. Read-only; the draft only copies its id and name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientSuggestion {
    pub id: ClientId,
    pub name: String,
}

/// The five steps of the capture flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[repr(u8)]
pub enum StepIndex {
    ClientAndNotes = 1,
    Location = 2,
    PhotoBefore = 3,
    PhotoAfter = 4,
    Review = 5,
}

impl StepIndex {
    pub const ALL: [StepIndex; 5] = [
        StepIndex::ClientAndNotes,
        StepIndex::Location,
        StepIndex::PhotoBefore,
        StepIndex::PhotoAfter,
        StepIndex::Review,
    ];

    #[must_use]
    pub fn number(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            StepIndex::ClientAndNotes => Some(StepIndex::Location),
            StepIndex::Location => Some(StepIndex::PhotoBefore),
            StepIndex::PhotoBefore => Some(StepIndex::PhotoAfter),
            StepIndex::PhotoAfter => Some(StepIndex::Review),
            StepIndex::Review => None,
        }
    }

    #[must_use]
    pub fn previous(self) -> Option<Self> {
        match self {
            StepIndex::ClientAndNotes => None,
            StepIndex::Location => Some(StepIndex::ClientAndNotes),
            StepIndex::PhotoBefore => Some(StepIndex::Location),
            StepIndex::PhotoAfter => Some(StepIndex::PhotoBefore),
            StepIndex::Review => Some(StepIndex::PhotoAfter),
        }
    }

    /// The photo slot this step fills, if it is a photo step.
    #[must_use]
    pub fn photo_slot(self) -> Option<PhotoSlot> {
        match self {
            StepIndex::PhotoBefore => Some(PhotoSlot::Before),
            StepIndex::PhotoAfter => Some(PhotoSlot::After),
            _ => None,
        }
    }
}

impl fmt::Display for StepIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepIndex::ClientAndNotes => "client and notes",
            StepIndex::Location => "location",
            StepIndex::PhotoBefore => "photo before",
            StepIndex::PhotoAfter => "photo after",
            StepIndex::Review => "review",
        };
        write!(f, "step {} ({label})", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum PhotoSlot {
    Before,
    After,
}

impl PhotoSlot {
    /// File-name stem used when an artifact for this slot is uploaded.
    #[must_use]
    pub fn file_stem(self) -> &'static str {
        match self {
            PhotoSlot::Before => "photo_before",
            PhotoSlot::After => "photo_after",
        }
    }

    #[must_use]
    pub fn field(self) -> DraftField {
        match self {
            PhotoSlot::Before => DraftField::PhotoBefore,
            PhotoSlot::After => DraftField::PhotoAfter,
        }
    }
}

/// The in-progress visit. Owned by exactly one workflow; dropping it releases
/// both photo previews.
#[derive(Debug, Default)]
pub struct VisitDraft {
    pub client_name: String,
    pub client_id: Option<ClientId>,
    pub notes: String,
    pub location: Option<GeoFix>,
    photo_before: Option<ImageArtifact>,
    photo_after: Option<ImageArtifact>,
    /// Set once the backend has accepted the visit record, so a retried
    /// submission skips straight to the upload.
    pub visit_id: Option<VisitId>,
}

impl VisitDraft {
    #[must_use]
    pub fn photo(&self, slot: PhotoSlot) -> Option<&ImageArtifact> {
        match slot {
            PhotoSlot::Before => self.photo_before.as_ref(),
            PhotoSlot::After => self.photo_after.as_ref(),
        }
    }

    /// Puts `artifact` into `slot`, releasing the preview of whatever was there.
    pub fn set_photo(&mut self, slot: PhotoSlot, artifact: ImageArtifact) {
        let previous = match slot {
            PhotoSlot::Before => self.photo_before.replace(artifact),
            PhotoSlot::After => self.photo_after.replace(artifact),
        };
        if let Some(previous) = previous {
            previous.release();
        }
    }

    /// Empties `slot`, releasing its preview. Returns whether anything was removed.
    pub fn clear_photo(&mut self, slot: PhotoSlot) -> bool {
        let previous = match slot {
            PhotoSlot::Before => self.photo_before.take(),
            PhotoSlot::After => self.photo_after.take(),
        };
        previous.map(ImageArtifact::release).is_some()
    }

    /// Completion predicate for `step`.
    #[must_use]
    pub fn is_step_complete(&self, step: StepIndex) -> bool {
        match step {
            StepIndex::ClientAndNotes => !self.client_name.trim().is_empty(),
            StepIndex::Location => self.location.is_some(),
            StepIndex::PhotoBefore => self.photo_before.is_some(),
            StepIndex::PhotoAfter => self.photo_after.is_some(),
            StepIndex::Review => true,
        }
    }

    /// First field that blocks submission, in step order.
    #[must_use]
    pub fn first_missing_field(&self) -> Option<DraftField> {
        if self.client_name.trim().is_empty() {
            return Some(DraftField::ClientName);
        }
        if self.notes.chars().count() > MAX_NOTES_CHARS {
            return Some(DraftField::Notes);
        }
        if self.location.is_none() {
            return Some(DraftField::Location);
        }
        if self.photo_before.is_none() {
            return Some(DraftField::PhotoBefore);
        }
        if self.photo_after.is_none() {
            return Some(DraftField::PhotoAfter);
        }
        None
    }

    /// Releases both previews and drops the draft.
    pub fn discard(mut self) {
        self.clear_photo(PhotoSlot::Before);
        self.clear_photo(PhotoSlot::After);
    }
}
