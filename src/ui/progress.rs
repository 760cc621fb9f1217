use crate::recovery::{PassRecord, ProgressEvent};
use crate::scan::SectorProgress;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

const BAR_TEMPLATE: &str = "{spinner:.cyan} {msg:<28} [{bar:40.green/black}] {pos}/{len} sectors  ETA {eta}";

/// Progress display for one scan or recovery run.
///
/// Feed it from the synchronous progress callback; it never touches the
/// engine's state.
pub struct RunProgress {
    bar: ProgressBar,
    started: Instant,
    pass: u32,
    bad_in_pass: usize,
}

impl RunProgress {
    /// `scope_len` is the number of sectors visited per pass
    pub fn new(scope_len: u64) -> Self {
        let bar = ProgressBar::new(scope_len);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("█▓░"));
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self::with_bar(bar)
    }

    /// Swallows all output (JSON mode, tests)
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden()))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_message("Scanning");
        Self {
            bar,
            started: Instant::now(),
            pass: 0,
            bad_in_pass: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn bad_in_pass(&self) -> usize {
        self.bad_in_pass
    }

    pub fn on_sector(&mut self, progress: &SectorProgress) {
        if self.bar.length().unwrap_or(0) == 0 {
            self.bar.set_length(progress.total_sectors);
        }
        if !progress.is_good {
            self.bad_in_pass += 1;
        }
        self.bar.inc(1);
    }

    pub fn on_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Sector(progress) => self.on_sector(progress),
            ProgressEvent::PassStarted { pass, pattern, bad_count } => {
                self.pass = *pass;
                self.bad_in_pass = 0;
                self.bar.reset();
                let message = match pattern {
                    Some(pattern) => format!("Pass {} after {:?}", pass, pattern),
                    None if *pass == 0 => "Initial scan".to_string(),
                    None => format!("Pass {} ({} bad)", pass, bad_count),
                };
                self.bar.set_message(message);
            }
            ProgressEvent::PassCompleted(record) => self.bar.println(pass_line(record)),
        }
    }

    pub fn finish(&self) {
        self.bar
            .finish_with_message(format!("Done in {}", format_duration(self.started.elapsed())));
    }
}

/// One line summarizing a finished pass
pub fn pass_line(record: &PassRecord) -> String {
    let delta = if record.pass_index == 0 {
        "initial".to_string()
    } else {
        format!("{:+}", record.delta_from_previous)
    };
    format!(
        "Pass {:>2}: {:>5} bad ({}), {} recovered, {}",
        record.pass_index,
        record.bad_count,
        delta,
        record.recovered_addresses.len(),
        format_duration(record.duration)
    )
}

/// Format a duration as H:MM:SS, or M:SS under an hour
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod progress_tests;
