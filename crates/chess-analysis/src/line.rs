//! One ranked line of engine output.

use crate::evaluation::{format_eval, mate_for, to_centipawns, Evaluation};
use game_tree::notation::{line_to_san, numbered_line};
use shakmaty::{Chess, Color, Move};

/// A principal variation with its score, as returned by the engine gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisLine {
    /// 1 = best line.
    pub rank: usize,
    /// Depth the line was searched to.
    pub depth: u32,
    /// Score relative to `pov`. `None` when the engine gave no usable score.
    pub score: Option<Evaluation>,
    /// Side to move in the analysed position.
    pub pov: Color,
    /// Legal moves from the analysed position.
    pub pv: Vec<Move>,
}

impl AnalysisLine {
    /// Score in centipawns for the side to move.
    pub fn cp(&self) -> i32 {
        to_centipawns(self.score, self.pov, self.pov)
    }

    /// Score in centipawns for `perspective`.
    pub fn cp_for(&self, perspective: Color) -> i32 {
        to_centipawns(self.score, self.pov, perspective)
    }

    /// Forced-mate distance for `perspective`, if any.
    pub fn mate_for(&self, perspective: Color) -> Option<i32> {
        mate_for(self.score, self.pov, perspective)
    }

    pub fn first_move(&self) -> Option<Move> {
        self.pv.first().copied()
    }

    /// Evaluation label from `perspective`, e.g. `+0.35` or `#3`.
    pub fn eval_label(&self, perspective: Color) -> String {
        format_eval(self.score, self.pov, perspective)
    }

    /// SAN of the first `max_plies` moves, played from `pos`.
    pub fn san_pv(&self, pos: &Chess, max_plies: usize) -> Vec<String> {
        line_to_san(pos, &self.pv, max_plies)
    }

    /// Numbered SAN of the first `max_plies` moves, e.g. `3... Nf6 4. d3`.
    pub fn numbered_pv(&self, pos: &Chess, max_plies: usize) -> String {
        numbered_line(pos, &self.pv, max_plies)
    }
}
