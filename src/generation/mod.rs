//! Generation orchestrator.
//!
//! Sequences AI calls, document updates and saves for one active carousel.

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{BulkReport, GenerationRequest, Orchestrator, RunState};
pub use progress::{AssetKind, NoProgress, ProgressEvent, ProgressSink};
