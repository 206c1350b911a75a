// Download progress bar - renders manager progress callbacks with indicatif

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for one model's initialization
#[derive(Clone)]
pub struct DownloadBar {
    bar: ProgressBar,
}

impl DownloadBar {
    pub fn new(model_id: &str) -> Self {
        let bar = ProgressBar::new(100);
        // Template is static, so a parse failure just keeps the default style
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_message(format!("Loading {}", model_id));
        Self { bar }
    }

    /// Bar that draws nothing (non-interactive output, tests)
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Callback suitable for `set_download_callback`
    pub fn callback(&self) -> impl Fn(u8) + Send + Sync + 'static {
        let bar = self.bar.clone();
        move |percent| {
            bar.set_position(u64::from(percent.min(100)));
            if percent >= 100 {
                bar.finish_with_message("Model ready");
            }
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Remove the bar if loading never finished (e.g. it failed or was cached)
    pub fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
