//! Progress reporting for long-running operations, using `indicatif`

use indicatif::{ProgressBar, ProgressStyle};

/// Default style for a main progress bar
pub const DEFAULT_MAIN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}";

/// Create a main progress bar with the standard style
#[must_use]
pub fn create_main_progress_bar(length: u64, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(length);
    let style = ProgressStyle::default_bar()
        .template(DEFAULT_MAIN_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }
    pb
}

/// Finish a progress bar with an optional completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    if let Some(msg) = message {
        pb.finish_with_message(msg.to_string());
    } else {
        pb.finish();
    }
}

/// Stage-level progress of a pipeline run
///
/// Hidden unless enabled, so library callers and tests stay quiet.
#[derive(Debug, Clone)]
pub struct StageProgress {
    bar: ProgressBar,
}

impl StageProgress {
    /// Create a tracker over `stages` steps
    #[must_use]
    pub fn new(stages: u64, enabled: bool) -> Self {
        let bar = if enabled {
            create_main_progress_bar(stages, Some("starting"))
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    /// Mark the start of a stage
    pub fn begin(&self, stage: &str) {
        self.bar.set_message(stage.to_string());
    }

    /// Mark the current stage as done
    pub fn advance(&self) {
        self.bar.inc(1);
    }

    /// Finish the run
    pub fn finish(&self, message: &str) {
        finish_progress_bar(&self.bar, Some(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_progress_still_counts() {
        let progress = StageProgress::new(3, false);
        progress.begin("identity");
        progress.advance();
        progress.advance();
        assert_eq!(progress.bar.position(), 2);
        progress.finish("done");
        assert!(progress.bar.is_finished());
    }
}
