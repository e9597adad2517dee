//! Batch analysis of a game's mainline.
//!
//! [`GameAnalyzer`] walks every mainline ply, asks the engine for the lines
//! before and after the move, and classifies the move. Engine failures never
//! abort the pass: the ply is logged, kept with its error, and skipped by
//! everything downstream.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use game_tree::notation::{fen_of, fullmove_number, san_of, uci_of};
use game_tree::GameTree;
use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Color, Move, Position};
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::{EngineError, EngineGateway};
use crate::line::AnalysisLine;
use crate::quality::{classify, Classification, Thresholds};

/// Errors reading or writing the per-ply log.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Bad log record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("No record for ply {0}")]
    MissingPly(usize),
}

/// Cooperative cancellation flag shared between a worker and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Configuration for a batch pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Search depth for every position.
    pub depth: u32,
    /// Lines requested for the position before each move.
    pub multipv: usize,
    /// Full moves of each line written to the log and report.
    pub pv_moves: usize,
    pub thresholds: Thresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            depth: 18,
            multipv: 3,
            pv_moves: 5,
            thresholds: Thresholds::default(),
        }
    }
}

/// Progress after a ply has been analysed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisProgress {
    /// Plies done so far.
    pub done: usize,
    pub total: usize,
    /// SAN of the ply just analysed.
    pub san: String,
}

/// Engine output and verdict for one mainline ply.
#[derive(Debug, Clone)]
pub struct PlyAnalysis {
    /// Number of mainline moves played before this one.
    pub ply: usize,
    pub before: Chess,
    pub played: Move,
    pub san: String,
    pub pre_lines: Vec<AnalysisLine>,
    pub post_lines: Vec<AnalysisLine>,
    /// `None` when the engine failed for this ply.
    pub classification: Option<Classification>,
    pub error: Option<String>,
}

impl PlyAnalysis {
    fn skipped(ply: usize, before: &Chess, played: Move, error: &EngineError) -> Self {
        Self {
            ply,
            before: before.clone(),
            played,
            san: san_of(before, played),
            pre_lines: Vec::new(),
            post_lines: Vec::new(),
            classification: None,
            error: Some(error.to_string()),
        }
    }

    /// Centipawn loss, 0 for skipped plies.
    pub fn cpl(&self) -> i32 {
        self.classification.as_ref().map_or(0, |c| c.verdict.cpl)
    }

    /// Serializable log record. PVs are cut to `pv_moves` full moves.
    pub fn record(&self, pv_moves: usize) -> PlyRecord {
        let lines = self
            .pre_lines
            .iter()
            .map(|line| LineRecord {
                rank: line.rank,
                cp_white: line.cp_for(Color::White),
                mate: line.mate_for(Color::White),
                pv_san: line.numbered_pv(&self.before, pv_moves * 2),
            })
            .collect();
        let c = self.classification.as_ref();
        PlyRecord {
            ply: self.ply,
            fullmove: fullmove_number(&self.before),
            side: side_name(self.before.turn()).to_string(),
            fen_before: fen_of(&self.before),
            move_san: self.san.clone(),
            move_uci: uci_of(self.played),
            lines,
            best_cp_before_stm: c.map_or(0, |c| c.best_cp_before),
            best_cp_before_white: c.map_or(0, |c| c.best_cp_before_white),
            post_cp_for_mover: c.and_then(|c| c.post_cp_for_mover),
            post_cp_white: c.and_then(|c| c.post_cp_white),
            cpl: self.cpl(),
            mark: c.map_or("", |c| c.verdict.mark.symbol()).to_string(),
            decisive: c.is_some_and(|c| c.decisive),
            in_opening: c.is_some_and(|c| c.in_opening),
            error: self.error.clone(),
        }
    }
}

fn side_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

/// One pre-move engine line in the log, white-relative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    pub rank: usize,
    pub cp_white: i32,
    /// Positive when White mates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mate: Option<i32>,
    pub pv_san: String,
}

/// One line of the JSONL log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlyRecord {
    pub ply: usize,
    pub fullmove: u32,
    pub side: String,
    pub fen_before: String,
    pub move_san: String,
    pub move_uci: String,
    pub lines: Vec<LineRecord>,
    pub best_cp_before_stm: i32,
    pub best_cp_before_white: i32,
    pub post_cp_for_mover: Option<i32>,
    pub post_cp_white: Option<i32>,
    pub cpl: i32,
    pub mark: String,
    pub decisive: bool,
    pub in_opening: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The result of a batch pass.
#[derive(Debug, Clone, Default)]
pub struct GameReview {
    /// Analysed plies in mainline order. Shorter than the mainline when the
    /// pass was cancelled.
    pub plies: Vec<PlyAnalysis>,
    pub total_plies: usize,
    pub cancelled: bool,
}

impl GameReview {
    pub fn ply(&self, ply: usize) -> Option<&PlyAnalysis> {
        self.plies.get(ply).filter(|p| p.ply == ply)
    }

    pub fn records(&self, pv_moves: usize) -> Vec<PlyRecord> {
        self.plies.iter().map(|p| p.record(pv_moves)).collect()
    }

    /// Write one JSON record per ply.
    pub fn write_jsonl<P: AsRef<Path>>(&self, path: P, pv_moves: usize) -> Result<(), LogError> {
        let mut out = BufWriter::new(File::create(path)?);
        for record in self.records(pv_moves) {
            serde_json::to_writer(&mut out, &record).map_err(std::io::Error::from)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Read a JSONL log written by [`GameReview::write_jsonl`]. Blank lines are
/// ignored.
pub fn read_jsonl<P: AsRef<Path>>(path: P) -> Result<Vec<PlyRecord>, LogError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| LogError::Parse { line: i + 1, source })?;
        records.push(record);
    }
    Ok(records)
}

/// The logged record for `ply`.
pub fn find_record(records: &[PlyRecord], ply: usize) -> Result<&PlyRecord, LogError> {
    records
        .iter()
        .find(|r| r.ply == ply)
        .ok_or(LogError::MissingPly(ply))
}

/// Analyses complete games against a shared engine.
pub struct GameAnalyzer {
    gateway: Arc<EngineGateway>,
    config: AnalysisConfig,
}

impl GameAnalyzer {
    pub fn new(gateway: Arc<EngineGateway>, config: AnalysisConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse every mainline ply of `tree`.
    ///
    /// `cancel` is checked between plies; plies analysed before cancellation
    /// are kept. `progress` is called after each ply.
    pub fn analyze_game<F>(&self, tree: &GameTree, cancel: &CancelToken, mut progress: F) -> GameReview
    where
        F: FnMut(AnalysisProgress),
    {
        let moves = tree.mainline_moves();
        let total = moves.len();
        let mut review = GameReview {
            plies: Vec::with_capacity(total),
            total_plies: total,
            cancelled: false,
        };

        if let Err(e) = self.gateway.new_game() {
            warn!(error = %e, "could not reset engine before game");
        }
        info!(plies = total, depth = self.config.depth, multipv = self.config.multipv, "game analysis started");

        let mut board = tree.start_position().clone();
        for (ply, mv) in moves.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(done = ply, total, "game analysis cancelled");
                review.cancelled = true;
                break;
            }
            let analysis = self.analyze_ply(ply, &board, mv);
            progress(AnalysisProgress {
                done: ply + 1,
                total,
                san: analysis.san.clone(),
            });
            review.plies.push(analysis);
            board.play_unchecked(mv);
        }

        let skipped = review.plies.iter().filter(|p| p.error.is_some()).count();
        info!(analysed = review.plies.len(), skipped, "game analysis finished");
        review
    }

    /// Analyse a single move from `before`.
    pub fn analyze_ply(&self, ply: usize, before: &Chess, played: Move) -> PlyAnalysis {
        let depth = self.config.depth;
        let pre_lines = match self.gateway.analyse(before, depth, self.config.multipv.max(2)) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(ply, error = %e, "skipping ply: pre-move analysis failed");
                return PlyAnalysis::skipped(ply, before, played, &e);
            }
        };

        let mut after = before.clone();
        after.play_unchecked(played);
        let post_lines = if after.legal_moves().is_empty() {
            Vec::new()
        } else {
            match self.gateway.analyse(&after, depth, 1) {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(ply, error = %e, "skipping ply: post-move analysis failed");
                    return PlyAnalysis::skipped(ply, before, played, &e);
                }
            }
        };

        let classification = classify(before, played, &pre_lines, &post_lines, &self.config.thresholds);
        PlyAnalysis {
            ply,
            before: before.clone(),
            played,
            san: classification.verdict.played.clone(),
            pre_lines,
            post_lines,
            classification: Some(classification),
            error: None,
        }
    }
}
