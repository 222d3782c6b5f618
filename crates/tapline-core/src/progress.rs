//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one spinner line per stream with a running record count.
//! Non-TTY mode: hidden spinners, the log is the only progress indicator.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Redraw the record counter every N records
const UPDATE_INTERVAL: usize = 100;

/// Central progress context owning the `MultiProgress`.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    pub fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Spinner status line for one stage (hidden off-TTY).
    ///
    /// Update with `pb.set_message(...)`; `pb.finish()` stops the spinner.
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        let style = ProgressStyle::with_template("{spinner:.green} {prefix:<14.cyan.bold} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Record counter for a stream being drained
    pub fn stream(&self, name: &str) -> StreamProgress {
        StreamProgress {
            name: name.to_string(),
            bar: self.stage_line(name),
            records: 0,
            started: Instant::now(),
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// `MultiProgress` for the log bridge
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Running count of records emitted by one stream
pub struct StreamProgress {
    name: String,
    bar: ProgressBar,
    records: usize,
    started: Instant,
}

impl StreamProgress {
    pub fn record(&mut self) {
        self.records += 1;
        if self.records.is_multiple_of(UPDATE_INTERVAL) {
            self.bar
                .set_message(format!("{} records", fmt_num(self.records)));
        }
    }

    /// Stop the spinner and log a one-line summary
    pub fn finish(self, interrupted: bool) -> usize {
        let elapsed = self.started.elapsed();
        let status = if interrupted { "interrupted" } else { "done" };
        self.bar.finish_and_clear();
        log::info!(
            "{}: {} records in {:.1}s ({status})",
            self.name,
            fmt_num(self.records),
            elapsed.as_secs_f64()
        );
        self.records
    }
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_num_small() {
        assert_eq!(fmt_num(0), "0");
        assert_eq!(fmt_num(12), "12");
        assert_eq!(fmt_num(123), "123");
    }

    #[test]
    fn fmt_num_thousands() {
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(123_456), "123,456");
        assert_eq!(fmt_num(1_234_567_890), "1,234,567,890");
    }

    #[test]
    fn hidden_stream_counts_records() {
        let ctx = ProgressContext::with_tty(false);
        let mut p = ctx.stream("attendees");
        for _ in 0..250 {
            p.record();
        }
        assert_eq!(p.finish(false), 250);
    }
}
