use std::io::Write;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

/// Telemetry events emitted by the fetch loop
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// A condition value was resolved
    LookupSucceeded,
    /// A lookup failed and the row field was left empty
    LookupFailed,
    /// Every condition of a run has been attempted
    RunCompleted { run: u32 },
}

/// Statistics aggregated from telemetry events
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchStats {
    pub runs_completed: usize,
    pub lookups_succeeded: u64,
    pub lookups_failed: u64,
}

impl FetchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a telemetry event
    pub fn update(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::LookupSucceeded => self.lookups_succeeded += 1,
            TelemetryEvent::LookupFailed => self.lookups_failed += 1,
            TelemetryEvent::RunCompleted { .. } => self.runs_completed += 1,
        }
    }

    pub fn lookups(&self) -> u64 {
        self.lookups_succeeded + self.lookups_failed
    }
}

/// Destination for user-facing console lines produced while a report runs
pub trait ConsoleSink {
    /// Print one line of text
    fn line(&mut self, text: &str) -> Result<()>;

    /// Observe a telemetry event (progress display)
    fn event(&mut self, _event: &TelemetryEvent) {}
}

impl ConsoleSink for Vec<u8> {
    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self, "{text}")?;
        Ok(())
    }
}

impl ConsoleSink for std::io::Stderr {
    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self, "{text}")?;
        Ok(())
    }
}

/// Prints lines to stderr above a run-progress bar
pub struct ProgressConsole {
    bar: ProgressBar,
}

impl ProgressConsole {
    pub fn new(total_runs: u64) -> Self {
        let bar = ProgressBar::new(total_runs);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] Runs: [{bar:30.cyan/blue}] {pos}/{len} ({percent}%) | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConsoleSink for ProgressConsole {
    fn line(&mut self, text: &str) -> Result<()> {
        // println() is a no-op on a hidden bar; suspend() always runs.
        self.bar.suspend(|| eprintln!("{text}"));
        Ok(())
    }

    fn event(&mut self, event: &TelemetryEvent) {
        if let TelemetryEvent::RunCompleted { run } = event {
            self.bar.inc(1);
            self.bar.set_message(format!("run {run}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_update() {
        let mut stats = FetchStats::new();
        for event in [
            TelemetryEvent::LookupSucceeded,
            TelemetryEvent::LookupFailed,
            TelemetryEvent::LookupSucceeded,
            TelemetryEvent::RunCompleted { run: 1 },
        ] {
            stats.update(&event);
        }
        assert_eq!(stats.lookups_succeeded, 2);
        assert_eq!(stats.lookups_failed, 1);
        assert_eq!(stats.runs_completed, 1);
        assert_eq!(stats.lookups(), 3);
    }

    #[test]
    fn test_buffer_sink_collects_lines() {
        let mut sink: Vec<u8> = Vec::new();
        sink.line("first").unwrap();
        sink.line("second").unwrap();
        assert_eq!(String::from_utf8(sink).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_progress_console_counts_runs() {
        let mut console = ProgressConsole::new(3);
        console.event(&TelemetryEvent::RunCompleted { run: 10 });
        console.event(&TelemetryEvent::LookupFailed);
        assert_eq!(console.bar.position(), 1);
        console.finish();
    }
}
