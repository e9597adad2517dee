//! Iterative-deepening analysis of a hypothetical continuation.

use std::sync::Arc;

use game_tree::notation::{apply_sequence, line_to_san};
use game_tree::TreeError;
use shakmaty::{Chess, Color, Move};
use thiserror::Error;
use tracing::{debug, info};

use crate::analyzer::CancelToken;
use crate::engine::{EngineError, EngineGateway};
use crate::line::AnalysisLine;

/// Depth the first iteration starts from, unless the target is shallower.
pub const PROBE_START_DEPTH: u32 = 10;

/// Plies of the leading line reported with each progress step.
const PROGRESS_PV_PLIES: usize = 8;

#[derive(Error, Debug)]
pub enum ProbeError {
    /// The hypothetical line could not be applied. Nothing was analysed.
    #[error(transparent)]
    InvalidVariation(#[from] TreeError),
    #[error("Engine unavailable: {0}")]
    Engine(#[from] EngineError),
}

/// Reported after each completed depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeProgress {
    pub depth: u32,
    pub target_depth: u32,
    /// White-relative evaluation of the leading line.
    pub eval: String,
    /// SAN of the leading line so far.
    pub pv: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Position after the hypothetical moves.
    pub position: Chess,
    pub moves: Vec<Move>,
    pub sans: Vec<String>,
    /// Lines from the deepest completed iteration.
    pub lines: Vec<AnalysisLine>,
    /// 0 when cancelled before the first iteration finished.
    pub depth_reached: u32,
    pub cancelled: bool,
}

/// Runs deep what-if analysis through a shared gateway.
pub struct DeepProbe {
    gateway: Arc<EngineGateway>,
}

impl DeepProbe {
    pub fn new(gateway: Arc<EngineGateway>) -> Self {
        Self { gateway }
    }

    /// Apply `sequence` to a copy of `pos` and analyse the result at every
    /// depth from `min(10, target_depth)` up to `target_depth`.
    ///
    /// The whole call fails with [`ProbeError::InvalidVariation`] if any
    /// token is unparseable or illegal. Cancellation is checked before each
    /// depth; lines from the last completed depth are kept.
    pub fn analyze_hypothetical<F>(
        &self,
        pos: &Chess,
        sequence: &str,
        target_depth: u32,
        line_count: usize,
        cancel: &CancelToken,
        mut on_progress: F,
    ) -> Result<ProbeResult, ProbeError>
    where
        F: FnMut(&ProbeProgress),
    {
        let (position, moves) = apply_sequence(pos, sequence)?;
        let sans = line_to_san(pos, &moves, moves.len());
        let target_depth = target_depth.max(1);
        let start_depth = PROBE_START_DEPTH.min(target_depth);
        info!(line = %sans.join(" "), start_depth, target_depth, "deep probe started");

        let mut result = ProbeResult {
            position,
            moves,
            sans,
            lines: Vec::new(),
            depth_reached: 0,
            cancelled: false,
        };

        for depth in start_depth..=target_depth {
            if cancel.is_cancelled() {
                info!(depth_reached = result.depth_reached, "deep probe cancelled");
                result.cancelled = true;
                break;
            }
            let lines = self.gateway.analyse(&result.position, depth, line_count)?;
            let progress = ProbeProgress {
                depth,
                target_depth,
                eval: lines
                    .first()
                    .map(|l| l.eval_label(Color::White))
                    .unwrap_or_default(),
                pv: lines
                    .first()
                    .map(|l| l.san_pv(&result.position, PROGRESS_PV_PLIES))
                    .unwrap_or_default(),
            };
            debug!(depth, pv = %progress.pv.join(" "), "probe depth done");
            on_progress(&progress);
            result.lines = lines;
            result.depth_reached = depth;
        }
        Ok(result)
    }
}
