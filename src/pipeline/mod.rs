pub mod classify;
pub mod extraction;
pub mod fingerprint;
pub mod loader;
pub mod model;
pub mod orchestrator;
pub mod progress;

pub use classify::{classify, content_from_upload, detect_kind, ContentKind};
pub use loader::PatientDataLoader;
pub use orchestrator::{build_pipeline, ExtractionPipeline, PipelineError};
pub use progress::{FnSink, NoopSink, ProgressError, ProgressEvent, ProgressSink};
