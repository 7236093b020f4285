use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for pipeline orchestration events.
///
/// Decouples the detection loop from specific output mechanisms
/// (stdout, log crate, test recorders) so each caller can observe
/// pipeline behavior without changing the orchestration code.
pub trait PipelineLogger {
    /// Report that a tick completed. `max_ticks` is `None` for
    /// unbounded runs.
    fn progress(&mut self, tick: u64, max_ticks: Option<u64>);

    /// Record how long a named pipeline stage took for one tick.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. players per tick).
    fn metric(&mut self, name: &str, value: f64);

    /// Report a recoverable anomaly, such as a detection that had to
    /// be dropped.
    fn warning(&mut self, message: &str);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _tick: u64, _max_ticks: Option<u64>) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn warning(&mut self, _message: &str) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI-oriented logger that tracks per-stage timing and metrics and
/// provides a summary report when the run ends.
///
/// Progress output is throttled to every `throttle_ticks` ticks to
/// avoid flooding the log on fast capture loops.
pub struct StdoutPipelineLogger {
    throttle_ticks: u64,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    ticks: u64,
    warning_count: u64,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_ticks: u64) -> Self {
        Self {
            throttle_ticks: throttle_ticks.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            ticks: 0,
            warning_count: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let ticks = self.ticks;
        let mut lines = Vec::new();

        lines.push(format!(
            "Run summary ({ticks} ticks, {:.1}s total):",
            elapsed_ms / 1000.0
        ));

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = if durations.is_empty() {
                0.0
            } else {
                total_ms / durations.len() as f64
            };
            let pct = if elapsed_ms > 0.0 {
                total_ms / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({pct:4.1}%)"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let avg = if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            };
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        if self.warning_count > 0 {
            lines.push(format!("  Warnings: {}", self.warning_count));
        }

        if ticks > 0 && elapsed_ms > 0.0 {
            let fps = ticks as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} ticks/s"));
        }

        Some(lines.join("\n"))
    }

    /// Returns the timing data for a given stage.
    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    /// Returns the metric data for a given name.
    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, tick: u64, max_ticks: Option<u64>) {
        self.ticks = tick;
        let due = tick % self.throttle_ticks == 0 || Some(tick) == max_ticks;
        if !due {
            return;
        }
        match max_ticks {
            Some(max) if max > 0 => {
                let pct = tick as f64 / max as f64 * 100.0;
                log::info!("Processing: {tick}/{max} ticks ({pct:.1}%)");
            }
            _ => log::info!("Processing: tick {tick}"),
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn warning(&mut self, message: &str) {
        self.warning_count += 1;
        log::warn!("{message}");
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
