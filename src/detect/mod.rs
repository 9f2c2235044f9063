//! Detector collaborators and the records they produce.
//!
//! The detector itself is a black box: given one frame it returns a sequence
//! of `{label, box, confidence}` entries. Backends here either script that
//! output or replay a recorded session.

mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ReplayBackend, StubBackend};
pub use registry::BackendRegistry;
pub use result::{ClassLabel, DetectionRecord, RawDetection};
