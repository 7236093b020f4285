use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::capture::domain::frame_source::CaptureError;
use crate::detection::domain::detector::DetectionError;

/// Configuration for one pipeline run.
pub struct PipelineConfig {
    /// Cooperative stop flag, polled at the start of every tick before
    /// the next frame is acquired. Typically wired to a Ctrl-C handler.
    pub cancelled: Arc<AtomicBool>,
    /// Stop after this many completed ticks. `None` runs until
    /// cancelled or a stage fails.
    pub max_ticks: Option<u64>,
    /// Lower bound on tick duration. Ticks that finish faster sleep
    /// off the remainder, capping the capture rate.
    pub min_tick_interval: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            max_ticks: None,
            min_tick_interval: None,
        }
    }
}

/// Where the pipeline currently is in its lifecycle.
///
/// `Closed` and `Failed` are terminal; everything else describes the
/// stage being executed within the current tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Capturing,
    Detecting,
    Assembling,
    Presenting,
    Closed,
    Failed,
}

/// Totals accumulated over a completed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks that ran to completion.
    pub ticks: u64,
    /// Players presented, summed across all ticks.
    pub players: u64,
    /// Detections dropped during assembly.
    pub warnings: u64,
}

/// A pipeline run failure. Every variant is fatal: the run stops, the
/// source is released, and the pipeline ends in the `Failed` state.
///
/// `tick` is the zero-based index of the tick that was executing when
/// the stage failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Pipeline already executed")]
    AlreadyExecuted,
    #[error("Failed to open the frame source")]
    Open(#[source] CaptureError),
    #[error("Frame acquisition failed on tick {tick}")]
    Acquisition {
        tick: u64,
        #[source]
        source: CaptureError,
    },
    #[error("Detection failed on tick {tick}")]
    Detection {
        tick: u64,
        #[source]
        source: DetectionError,
    },
    #[error("Presentation failed on tick {tick}")]
    Presentation {
        tick: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
