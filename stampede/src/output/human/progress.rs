use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Duration bar on stderr, created lazily on the first update.
pub(crate) struct HumanProgress {
    inner: Mutex<Inner>,
}

struct Inner {
    multi: MultiProgress,
    bar: Option<ProgressBar>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));

        Self {
            inner: Mutex::new(Inner { multi, bar: None }),
        }
    }

    pub(crate) fn update(
        &self,
        scenario: &str,
        total: Duration,
        elapsed: Duration,
        message: String,
    ) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let Inner { multi, bar } = &mut *inner;
        let pb = bar.get_or_insert_with(|| {
            let pb = multi.add(ProgressBar::new(0));
            pb.set_style(bar_style());
            pb.set_prefix(scenario.to_string());
            pb
        });

        let total_ms = total.as_millis() as u64;
        pb.set_length(total_ms);
        pb.set_position((elapsed.as_millis() as u64).min(total_ms));
        pb.set_message(message);
    }

    pub(crate) fn finish(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pb) = inner.bar.take() {
            pb.finish_and_clear();
        }
        let _ = inner.multi.clear();
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}
