use crate::detection::domain::player::Player;
use crate::shared::frame::Frame;

/// Consumes each processed frame together with the players assembled
/// from it.
///
/// This is a port (application-layer interface). Infrastructure decides
/// what presenting means: drawing an overlay, writing snapshots,
/// printing a status line.
pub trait FrameSink {
    fn present(
        &mut self,
        frame: &Frame,
        players: &[Player],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Sink that discards everything.
///
/// Used when a run only needs the pipeline's side effects (logging,
/// summaries) and by tests that do not care about presentation.
pub struct NullFrameSink;

impl FrameSink for NullFrameSink {
    fn present(
        &mut self,
        _frame: &Frame,
        _players: &[Player],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}
