//! Terminal progress for the command-line tools.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Bar over the recording limit; the message carries the running score.
    pub fn recording(&self, limit_ms: u64) -> RecordingProgress {
        let bar = if self.use_pretty() {
            let bar = ProgressBar::new(limit_ms.max(1));
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("● REC {bar:30} {elapsed_precise} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            Some(bar)
        } else {
            None
        };
        RecordingProgress {
            bar,
            limit_ms,
            last_plain_secs: None,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct RecordingProgress {
    bar: Option<ProgressBar>,
    limit_ms: u64,
    last_plain_secs: Option<u64>,
}

impl RecordingProgress {
    pub fn update(&mut self, elapsed_ms: u64, score: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(elapsed_ms.min(self.limit_ms));
            bar.set_message(format!("score {score}"));
            return;
        }
        // Plain mode prints once per recorded second.
        let secs = elapsed_ms / 1000;
        if self.last_plain_secs != Some(secs) {
            self.last_plain_secs = Some(secs);
            eprintln!(
                "    {} / {}  score {}",
                format_duration(Duration::from_millis(elapsed_ms)),
                format_duration(Duration::from_millis(self.limit_ms)),
                score
            );
        }
    }

    pub fn note(&self, line: &str) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("    {line}"),
        }
    }

    pub fn finish(self, score: u64) {
        let message = format!("✔ recorded, score {score}");
        match self.bar {
            Some(bar) => bar.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_flag_selects_mode() {
        assert_eq!(Ui::from_args(Some("plain"), true, false).mode, UiMode::Plain);
        assert_eq!(Ui::from_args(Some("pretty"), false, false).mode, UiMode::Pretty);
        assert_eq!(Ui::from_args(None, true, false).mode, UiMode::Auto);
        assert!(!Ui::from_args(Some("pretty"), false, false).use_pretty());
        assert!(!Ui::from_args(None, true, true).use_pretty());
    }

    #[test]
    fn formats_short_and_long_durations() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
