//! Progress events emitted while a run is in flight.

use std::fmt;

/// Kind of per-slide asset a bulk run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Video,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// One step of a generation run. `index` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Slide text is being written.
    Content { topic: String },
    /// An asset request for one slide is starting.
    Asset {
        kind: AssetKind,
        index: usize,
        total: usize,
        slide_id: String,
    },
    /// An asset request for one slide finished.
    AssetDone {
        kind: AssetKind,
        index: usize,
        total: usize,
        slide_id: String,
        succeeded: bool,
    },
    /// The run is over.
    Done,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content { .. } => write!(f, "Generating content..."),
            Self::Asset {
                kind, index, total, ..
            } => write!(f, "Generating {} {} of {}", kind.as_str(), index, total),
            Self::AssetDone {
                kind,
                index,
                total,
                succeeded,
                ..
            } => {
                if *succeeded {
                    write!(f, "Finished {} {} of {}", kind.as_str(), index, total)
                } else {
                    write!(f, "Failed {} {} of {}", kind.as_str(), index, total)
                }
            }
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&self, _event: &ProgressEvent) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}
