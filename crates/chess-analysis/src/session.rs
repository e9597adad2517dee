//! Interactive coaching over one loaded game.
//!
//! [`CoachSession`] owns the navigator and borrows the shared engine per
//! request. Navigation failures are returned as they are; engine failures
//! come back as [`EngineError`] so the caller can carry on without the
//! engine.

use std::sync::Arc;

use game_tree::notation::{fen_of, san_of};
use game_tree::{BranchPoint, CursorStatus, GameTree, Navigator, TreeError};
use shakmaty::Color;
use tracing::info;

use crate::analyzer::{AnalysisConfig, CancelToken, GameAnalyzer, PlyAnalysis};
use crate::engine::{EngineError, EngineGateway};
use crate::line::AnalysisLine;
use crate::probe::{DeepProbe, ProbeError, ProbeProgress, ProbeResult};

/// Plies of each line shown by a quick evaluation.
const QUICK_PV_PLIES: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub analysis: AnalysisConfig,
    /// Names the coached player uses, matched against the game headers.
    pub player_names: Vec<String>,
    /// Full-move window searched first for a branch point.
    pub branch_min_fullmove: u32,
    pub branch_max_fullmove: u32,
    pub eval_depth: u32,
    pub eval_lines: usize,
    pub probe_depth: u32,
    pub probe_lines: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            player_names: Vec::new(),
            branch_min_fullmove: 4,
            branch_max_fullmove: 6,
            eval_depth: 18,
            eval_lines: 2,
            probe_depth: 23,
            probe_lines: 2,
        }
    }
}

/// One line of a quick evaluation, white-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalLine {
    pub rank: usize,
    pub cp_white: i32,
    pub eval: String,
    pub pv_san: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickEval {
    pub fen: String,
    pub lines: Vec<EvalLine>,
}

/// The engine's choice at the cursor and the moves about as good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMove {
    /// Empty when the engine returned no line.
    pub best: String,
    pub equal_alternatives: Vec<String>,
}

pub struct CoachSession {
    navigator: Navigator,
    gateway: Arc<EngineGateway>,
    config: SessionConfig,
}

impl CoachSession {
    pub fn new(tree: GameTree, gateway: Arc<EngineGateway>, config: SessionConfig) -> Self {
        let navigator = Navigator::new(tree, &config.player_names);
        Self {
            navigator,
            gateway,
            config,
        }
    }

    /// Replace the game. The cursor starts over.
    pub fn load(&mut self, tree: GameTree) {
        self.navigator = Navigator::new(tree, &self.config.player_names);
        info!(plies = self.navigator.mainline_len(), "game loaded");
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> CursorStatus {
        self.navigator.status()
    }

    pub fn goto_ply(&mut self, n: usize) -> CursorStatus {
        self.navigator.goto_ply(n)
    }

    pub fn forward(&mut self) -> CursorStatus {
        self.navigator.forward()
    }

    pub fn back(&mut self) -> CursorStatus {
        self.navigator.back()
    }

    pub fn goto_by_notation(&mut self, notation: &str) -> Result<CursorStatus, TreeError> {
        self.navigator.goto_by_notation(notation)
    }

    /// Move to the first branch point in the configured window.
    pub fn first_branch(&mut self) -> BranchPoint {
        self.navigator
            .advance_to_first_branch(self.config.branch_min_fullmove, self.config.branch_max_fullmove)
    }

    /// Engine lines for the cursor position.
    pub fn quick_eval(&self) -> Result<QuickEval, EngineError> {
        let pos = self.navigator.cursor().position();
        let lines = self
            .gateway
            .analyse(pos, self.config.eval_depth, self.config.eval_lines)?;
        Ok(QuickEval {
            fen: fen_of(pos),
            lines: lines
                .iter()
                .map(|line| EvalLine {
                    rank: line.rank,
                    cp_white: line.cp_for(Color::White),
                    eval: line.eval_label(Color::White),
                    pv_san: line.numbered_pv(pos, QUICK_PV_PLIES),
                })
                .collect(),
        })
    }

    /// Best move at the cursor and up to the configured number of moves
    /// within tolerance of it.
    pub fn best_and_alternatives(&self) -> Result<BestMove, EngineError> {
        let pos = self.navigator.cursor().position();
        let thresholds = &self.config.analysis.thresholds;
        let lines = self
            .gateway
            .analyse(pos, self.config.eval_depth, self.config.analysis.multipv.max(3))?;

        let san = |line: &AnalysisLine| line.first_move().map(|mv| san_of(pos, mv));
        let Some(best) = lines.first() else {
            return Ok(BestMove {
                best: String::new(),
                equal_alternatives: Vec::new(),
            });
        };
        let best_san = san(best).unwrap_or_default();
        let mut equal: Vec<String> = Vec::new();
        for line in &lines[1..] {
            if best.cp().saturating_sub(line.cp()).abs() > thresholds.alt_tolerance_cp {
                continue;
            }
            if let Some(alt) = san(line) {
                if alt != best_san && !equal.contains(&alt) {
                    equal.push(alt);
                }
            }
        }
        equal.truncate(thresholds.alternates());
        Ok(BestMove {
            best: best_san,
            equal_alternatives: equal,
        })
    }

    /// Judge the mainline move played from the cursor. `None` at the end of
    /// the game.
    pub fn check_next_move(&self) -> Option<PlyAnalysis> {
        let mv = self.navigator.next_move()?;
        let cursor = self.navigator.cursor();
        let analyzer = GameAnalyzer::new(Arc::clone(&self.gateway), self.config.analysis.clone());
        Some(analyzer.analyze_ply(cursor.ply(), cursor.position(), mv))
    }

    /// Deep analysis of `sequence` played from the cursor. The cursor does
    /// not move.
    pub fn what_if<F>(&self, sequence: &str, cancel: &CancelToken, on_progress: F) -> Result<ProbeResult, ProbeError>
    where
        F: FnMut(&ProbeProgress),
    {
        DeepProbe::new(Arc::clone(&self.gateway)).analyze_hypothetical(
            self.navigator.cursor().position(),
            sequence,
            self.config.probe_depth,
            self.config.probe_lines,
            cancel,
            on_progress,
        )
    }
}
