//! The persistence seam for finished matches.
//!
//! Rampart does not decide where scoreboards end up; that belongs to the
//! deployment. The room hands every finished match to a
//! [`ResultSink`] and moves on; sink failures are logged by the caller and
//! never reach clients or alter an already-broadcast outcome.

use std::future::Future;

use rampart_core::MatchRecord;

/// Receives the final scoreboard of each finished match.
pub trait ResultSink: Send + Sync + 'static {
    /// Persists one match record.
    ///
    /// Called from a detached task after the final `phase_change`
    /// broadcast, so implementations may suspend freely.
    fn persist(&self, record: MatchRecord) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Errors a sink implementation may report.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The backing store rejected or never received the record.
    #[error("result sink unavailable: {0}")]
    Unavailable(String),
}

/// Default sink: writes the scoreboard to the structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl ResultSink for LoggingSink {
    async fn persist(&self, record: MatchRecord) -> Result<(), SinkError> {
        tracing::info!(
            winner = record.winner_player_num,
            duration_s = record.battle_duration,
            reason = %record.win_reason,
            p1_kills = record.player1_kills,
            p2_kills = record.player2_kills,
            "match result recorded"
        );
        Ok(())
    }
}
