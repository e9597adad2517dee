//! Move quality classification.
//!
//! A played move is compared against the engine's lines for the position
//! before it and the single best line for the position after it. The result
//! is a centipawn loss, a severity mark, and the lines worth showing as
//! alternatives.

use crate::evaluation::MATE_SCORE_CP;
use crate::line::AnalysisLine;
use game_tree::notation::{fullmove_number, san_of};
use game_tree::Nag;
use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Color, Move, Position};

/// Severity of a move, from nothing to report up to a blunder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    None,
    /// `?!`
    Inaccuracy,
    /// `?`
    Mistake,
    /// `??`
    Blunder,
}

impl Severity {
    /// Severity for a centipawn loss. Non-positive losses are never marked.
    pub fn from_cpl(cpl: i32, thresholds: &Thresholds) -> Self {
        if cpl <= 0 {
            Severity::None
        } else if cpl >= thresholds.blunder_cp {
            Severity::Blunder
        } else if cpl >= thresholds.mistake_cp {
            Severity::Mistake
        } else if cpl >= thresholds.inaccuracy_cp {
            Severity::Inaccuracy
        } else {
            Severity::None
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Severity::None => "",
            Severity::Inaccuracy => "?!",
            Severity::Mistake => "?",
            Severity::Blunder => "??",
        }
    }

    pub fn nag(self) -> Option<Nag> {
        match self {
            Severity::None => None,
            Severity::Inaccuracy => Some(Nag::DUBIOUS),
            Severity::Mistake => Some(Nag::MISTAKE),
            Severity::Blunder => Some(Nag::BLUNDER),
        }
    }

    pub fn is_marked(self) -> bool {
        self != Severity::None
    }
}

/// Tunable constants for classification and annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Moves played at or before this full-move number are never judged.
    pub opening_grace_fullmoves: u32,
    /// A move within this many centipawns of the best line counts as equal.
    pub alt_tolerance_cp: i32,
    /// A best move this far ahead of the second line has no equal alternatives.
    pub unique_gap_cp: i32,
    pub inaccuracy_cp: i32,
    pub mistake_cp: i32,
    pub blunder_cp: i32,
    /// Positions beyond this white-relative score are already decided.
    pub decisive_cp: i32,
    /// Losses at or above this put the evaluation at the head of a variation.
    pub warn_drop_cp: i32,
    /// Exported variations are cut to this many full moves.
    pub variation_full_moves: usize,
    /// Number of alternative lines shown per move, at most 2.
    pub alternates_shown: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            opening_grace_fullmoves: 5,
            alt_tolerance_cp: 25,
            unique_gap_cp: 60,
            inaccuracy_cp: 50,
            mistake_cp: 150,
            blunder_cp: 300,
            decisive_cp: 1000,
            warn_drop_cp: 50,
            variation_full_moves: 3,
            alternates_shown: 2,
        }
    }
}

impl Thresholds {
    /// Number of alternatives to show, capped at 2.
    pub fn alternates(&self) -> usize {
        self.alternates_shown.min(2)
    }
}

/// The outcome of judging one played move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MistakeVerdict {
    /// The played move in SAN.
    pub played: String,
    /// The engine's best move in SAN; empty when there were no lines.
    pub best: String,
    /// Centipawn loss; positive means worse for the mover.
    pub cpl: i32,
    pub mark: Severity,
}

/// Everything the classifier worked out for one ply.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub verdict: MistakeVerdict,
    /// Severity before decisive-position suppression.
    pub raw_mark: Severity,
    pub mover: Color,
    /// Best pre-move score for the side to move.
    pub best_cp_before: i32,
    pub best_cp_before_white: i32,
    /// Post-move best score for the mover, when known.
    pub post_cp_for_mover: Option<i32>,
    pub post_cp_white: Option<i32>,
    /// Index into the pre-move lines of the line starting with the played move.
    pub played_index: Option<usize>,
    pub in_opening: bool,
    /// Either side of the move was already decided.
    pub decisive: bool,
    /// Indices of pre-move lines as good as the best one, played move excluded.
    pub equal_alternatives: Vec<usize>,
    /// Indices of pre-move lines to insert as variations when annotating.
    pub suggestions: Vec<usize>,
}

/// Judge `played` from position `before`.
///
/// `pre` are the ranked lines for `before`; `post` the lines for the
/// position after the move. Empty `post` after a mating move is treated as
/// a won position for the mover.
pub fn classify(
    before: &Chess,
    played: Move,
    pre: &[AnalysisLine],
    post: &[AnalysisLine],
    thresholds: &Thresholds,
) -> Classification {
    let mover = before.turn();
    let played_san = san_of(before, played);
    let best_san = pre
        .first()
        .and_then(AnalysisLine::first_move)
        .map(|mv| san_of(before, mv))
        .unwrap_or_default();

    let best_cp_before = pre.first().map_or(0, AnalysisLine::cp);
    let best_cp_before_white = pre.first().map_or(0, |l| l.cp_for(Color::White));
    let (post_cp_for_mover, post_cp_white) = post_scores(before, played, post, mover);

    let played_index = pre.iter().position(|l| l.first_move() == Some(played));
    let played_cp = played_index.map(|i| pre[i].cp());

    let in_opening = fullmove_number(before) <= thresholds.opening_grace_fullmoves;
    let decisive = best_cp_before_white.abs() > thresholds.decisive_cp
        || post_cp_white.is_some_and(|cp| cp.abs() > thresholds.decisive_cp);

    let equal_to_best = played_index == Some(0)
        || played_cp.is_some_and(|cp| best_cp_before.saturating_sub(cp).abs() <= thresholds.alt_tolerance_cp);

    let cpl = if in_opening || equal_to_best {
        0
    } else {
        post_cp_for_mover.map_or(0, |post| best_cp_before.saturating_sub(post))
    };

    let raw_mark = if in_opening {
        Severity::None
    } else {
        Severity::from_cpl(cpl, thresholds)
    };
    let mark = if decisive { Severity::None } else { raw_mark };

    let equal_alternatives = find_equal_alternatives(before, &played_san, played_index, pre, thresholds);
    let suggestions = if in_opening || decisive {
        Vec::new()
    } else {
        pick_suggestions(before, &played_san, played_index, pre, &equal_alternatives, thresholds)
    };

    Classification {
        verdict: MistakeVerdict {
            played: played_san,
            best: best_san,
            cpl,
            mark,
        },
        raw_mark,
        mover,
        best_cp_before,
        best_cp_before_white,
        post_cp_for_mover,
        post_cp_white,
        played_index,
        in_opening,
        decisive,
        equal_alternatives,
        suggestions,
    }
}

fn post_scores(before: &Chess, played: Move, post: &[AnalysisLine], mover: Color) -> (Option<i32>, Option<i32>) {
    if let Some(line) = post.first() {
        return (Some(line.cp_for(mover)), Some(line.cp_for(Color::White)));
    }
    let mut after = before.clone();
    after.play_unchecked(played);
    if after.is_checkmate() {
        let white = if mover == Color::White { MATE_SCORE_CP } else { -MATE_SCORE_CP };
        (Some(MATE_SCORE_CP), Some(white))
    } else if after.is_stalemate() {
        (Some(0), Some(0))
    } else {
        (None, None)
    }
}

fn line_san(before: &Chess, line: &AnalysisLine) -> Option<String> {
    line.first_move().map(|mv| san_of(before, mv))
}

fn find_equal_alternatives(
    before: &Chess,
    played_san: &str,
    played_index: Option<usize>,
    pre: &[AnalysisLine],
    thresholds: &Thresholds,
) -> Vec<usize> {
    let Some(best) = pre.first().map(AnalysisLine::cp) else {
        return Vec::new();
    };
    let mut seen: Vec<String> = vec![played_san.to_string()];
    let mut picked = Vec::new();
    for (i, line) in pre.iter().enumerate() {
        if picked.len() >= 2 {
            break;
        }
        if Some(i) == played_index || best.saturating_sub(line.cp()).abs() > thresholds.alt_tolerance_cp {
            continue;
        }
        let Some(san) = line_san(before, line) else {
            continue;
        };
        if seen.contains(&san) {
            continue;
        }
        seen.push(san);
        picked.push(i);
    }
    picked
}

/// Lines to show next to the played move.
///
/// A played move among the engine lines gets its equal alternatives, unless
/// it was the clear best by `unique_gap_cp`. Any other move gets the top
/// lines as refutation.
fn pick_suggestions(
    before: &Chess,
    played_san: &str,
    played_index: Option<usize>,
    pre: &[AnalysisLine],
    equal: &[usize],
    thresholds: &Thresholds,
) -> Vec<usize> {
    let limit = thresholds.alternates();
    match played_index {
        Some(0) if pre.len() > 1 && pre[0].cp().saturating_sub(pre[1].cp()) >= thresholds.unique_gap_cp => {
            Vec::new()
        }
        Some(_) => equal.iter().copied().take(limit).collect(),
        None => {
            let mut seen: Vec<String> = vec![played_san.to_string()];
            let mut picked = Vec::new();
            for (i, line) in pre.iter().enumerate() {
                if picked.len() >= limit {
                    break;
                }
                if let Some(san) = line_san(before, line) {
                    if !seen.contains(&san) {
                        seen.push(san);
                        picked.push(i);
                    }
                }
            }
            picked
        }
    }
}
