use crate::facts::Progress;
use core::fmt::{Debug, Formatter};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ohno::AppError;

/// Refresh rate for progress updates (10 Hz).
const REFRESH_INTERVAL_MS: u64 = 100;

const TEMPLATE: &str = "{prefix:>12.bold.cyan} [{bar:25}] {pos}/{len} {msg}";
const TEMPLATE_NO_COLOR: &str = "{prefix:>12} [{bar:25}] {pos}/{len} {msg}";

/// Terminal progress for a collection run.
///
/// Per-technology outcomes are printed as lines above the bar. The bar itself is only drawn when
/// `show_bar` is set and stderr is a terminal.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    use_colors: bool,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(use_colors: bool, show_bar: bool) -> Self {
        let target = if show_bar {
            ProgressDrawTarget::stderr_with_hz(10)
        } else {
            ProgressDrawTarget::hidden()
        };

        Self {
            bar: ProgressBar::with_draw_target(None, target),
            use_colors,
        }
    }

    /// Print a message line without disrupting the progress indicator.
    fn println(&self, msg: &str) {
        self.bar.suspend(|| eprintln!("{msg}"));
    }
}

impl Progress for ProgressReporter {
    fn started(&self, total: usize) {
        let template = if self.use_colors { TEMPLATE } else { TEMPLATE_NO_COLOR };
        self.bar.set_style(
            ProgressStyle::default_bar()
                .template(template)
                .expect("could not create progress bar style")
                .progress_chars("=> "),
        );

        self.bar.set_prefix("Collecting");
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.enable_steady_tick(Duration::from_millis(REFRESH_INTERVAL_MS));
    }

    fn collecting(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn collected(&self, name: &str) {
        self.println(&format!("Collected: {name}"));
        self.bar.inc(1);
    }

    fn failed(&self, name: &str, error: &AppError) {
        self.println(&format!("ERROR collecting {name}: {error}"));
        self.bar.inc(1);
    }

    fn done(&self) {
        self.bar.finish_and_clear();
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("bar", &self.bar)
            .field("use_colors", &self.use_colors)
            .finish()
    }
}
