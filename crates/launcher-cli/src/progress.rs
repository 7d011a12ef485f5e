//! Terminal rendering of update progress.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use launcher_updater::{EventReceiver, Phase, ProgressModel, UpdateEvent};

const BAR_TEMPLATE: &str = "  {prefix} {msg:<28} [{bar:30}] {pos:>3}%";

/// Folds engine events into a [`ProgressModel`] and draws one bar per patch.
pub struct ProgressRenderer {
    model: ProgressModel,
    bar: Option<ProgressBar>,
    visible: bool,
}

impl ProgressRenderer {
    /// Creates a renderer. Hidden renderers only track the model.
    pub fn new(visible: bool) -> Self {
        Self {
            model: ProgressModel::default(),
            bar: None,
            visible,
        }
    }

    /// Consume events until the engine drops its sink.
    pub async fn drive(mut self, mut rx: EventReceiver) -> ProgressModel {
        while let Some(event) = rx.recv().await {
            self.handle(&event);
        }
        self.finish();
        self.model
    }

    /// Apply one event and redraw.
    pub fn handle(&mut self, event: &UpdateEvent) {
        self.model.apply(event);

        match event {
            UpdateEvent::Status(message) => self.println(message),
            UpdateEvent::VersionCheckComplete { installed, latest } => {
                self.println(&format!("Installed {installed}, latest {latest}"));
            }
            UpdateEvent::PatchStarted { patch, .. } => {
                self.finish();
                let bar = self.new_bar();
                bar.set_prefix(format!(
                    "[{}/{}]",
                    self.model.patch_number, self.model.patch_total
                ));
                bar.set_message(format!("Downloading {patch}"));
                self.bar = Some(bar);
            }
            UpdateEvent::DownloadProgress { .. } => {
                self.set_position(self.model.download_percent);
            }
            UpdateEvent::ExtractionProgress { patch, .. } => {
                if let Some(bar) = &self.bar
                    && self.model.phase == Phase::Extracting
                {
                    bar.set_message(format!("Installing {patch}"));
                }
                self.set_position(self.model.extract_percent);
            }
            UpdateEvent::PatchApplied { patch, version } => {
                if let Some(bar) = self.bar.take() {
                    bar.set_position(100);
                    bar.finish_with_message(format!("{patch} -> {version}"));
                }
            }
            UpdateEvent::Succeeded { installed } => {
                self.finish();
                self.println(&format!("Game is at version {installed}"));
            }
            UpdateEvent::Failed { message } => {
                if let Some(bar) = self.bar.take() {
                    bar.abandon();
                }
                self.println(&format!("Update failed: {message}"));
            }
        }
    }

    fn new_bar(&self) -> ProgressBar {
        let bar = ProgressBar::new(100);
        if !self.visible {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }

    fn set_position(&self, percent: u8) {
        if let Some(bar) = &self.bar {
            bar.set_position(u64::from(percent));
        }
    }

    fn println(&self, message: &str) {
        if !self.visible {
            return;
        }
        match &self.bar {
            Some(bar) => bar.println(message),
            None => eprintln!("{message}"),
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}
