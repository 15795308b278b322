//! Terminal progress bar fed by orchestrator events.

use indicatif::{ProgressBar, ProgressStyle};

use caroumate::ProgressEvent;
use caroumate::ProgressSink;

/// Progress bar over the per-slide steps of a run.
#[derive(Clone)]
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=>-"),
        );
        Ok(Self { bar })
    }

    /// Progress for a migration of `total` records.
    pub fn start(&self, total: usize) {
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    pub fn step(&self, index: usize, message: String) {
        self.bar.set_position(index as u64);
        self.bar.set_message(message);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarSink {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Content { .. } => {
                self.start(0);
                self.bar.enable_steady_tick(std::time::Duration::from_millis(120));
                self.bar.set_message(event.to_string());
            }
            ProgressEvent::Asset { index, total, .. } => {
                if self.bar.length() != Some(*total as u64) {
                    self.start(*total);
                }
                self.step(index - 1, event.to_string());
            }
            ProgressEvent::AssetDone { index, succeeded, .. } => {
                if !succeeded {
                    self.bar.println(event.to_string());
                }
                self.bar.set_position(*index as u64);
            }
            ProgressEvent::Done => self.finish(),
        }
    }
}
