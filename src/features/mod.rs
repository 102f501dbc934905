//! Device capabilities, image handling and backend submission used by the capture flow.
pub mod artifact;
pub mod camera;
pub mod directory;
pub mod error;
pub mod geolocation;
pub mod submission;
