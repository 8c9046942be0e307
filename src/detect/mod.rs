//! Object detection collaborators.
//!
//! The detector pipeline treats the model as an opaque function
//! `infer(image, params) -> [(label, confidence, box)]`. This module holds the
//! trait that captures that contract, the backends that implement it and a
//! small registry used to pick one by name at startup.

mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ScriptedBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::BackendRegistry;
pub use result::{InferenceParams, RawDetection};
