//! Markdown summary of an analysed game.

use std::fmt::Write;

use game_tree::notation::fullmove_number;
use game_tree::GameTree;
use shakmaty::{Color, Position};

use crate::analyzer::{AnalysisConfig, GameReview, PlyAnalysis};
use crate::evaluation::format_cp;

/// Evaluations within this many centipawns of equality are not worth printing.
pub const FLAT_EVAL_CP: i32 = 30;

/// Render the per-move report followed by the critical moments.
pub fn render_markdown(tree: &GameTree, review: &GameReview, config: &AnalysisConfig) -> String {
    let mut md = String::new();
    let header = |name: &str| tree.header(name).unwrap_or("?").to_string();

    let _ = writeln!(md, "# Game review: {} vs {}", header("White"), header("Black"));
    let _ = writeln!(md, "Event: {}, Date: {}, Result: {}", header("Event"), header("Date"), tree.result());
    let _ = writeln!(md);
    let _ = writeln!(
        md,
        "Depth: {}, MultiPV: {}, PV length: {} moves",
        config.depth, config.multipv, config.pv_moves
    );
    if review.cancelled {
        let _ = writeln!(
            md,
            "\n_Analysis stopped after {} of {} plies._",
            review.plies.len(),
            review.total_plies
        );
    }
    let _ = writeln!(md);

    for ply in &review.plies {
        write_ply(&mut md, ply, config);
    }

    let _ = writeln!(md, "## Critical moments");
    let moments = critical_moments(review);
    if moments.is_empty() {
        let _ = writeln!(md, "_No moves marked ?!, ? or ??._");
    }
    for ply in moments {
        let (eval, pv) = ply
            .pre_lines
            .first()
            .map(|l| {
                (
                    l.eval_label(Color::White),
                    l.numbered_pv(&ply.before, config.pv_moves * 2),
                )
            })
            .unwrap_or_default();
        let mark = ply
            .classification
            .as_ref()
            .map_or("", |c| c.verdict.mark.symbol());
        let _ = writeln!(
            md,
            "- ply {}: **{}{}** (CPL {:+}): 1) {} {}",
            ply.ply,
            ply.san,
            mark,
            ply.cpl(),
            eval,
            pv
        );
    }
    md
}

/// Marked plies ordered by decreasing centipawn loss, mainline order on ties.
pub fn critical_moments(review: &GameReview) -> Vec<&PlyAnalysis> {
    let mut marked: Vec<&PlyAnalysis> = review
        .plies
        .iter()
        .filter(|p| p.classification.as_ref().is_some_and(|c| c.verdict.mark.is_marked()))
        .collect();
    marked.sort_by_key(|p| std::cmp::Reverse(p.cpl().saturating_abs()));
    marked
}

fn move_number(ply: &PlyAnalysis) -> String {
    let n = fullmove_number(&ply.before);
    if ply.before.turn() == Color::White {
        format!("{}.", n)
    } else {
        format!("{}...", n)
    }
}

fn write_ply(md: &mut String, ply: &PlyAnalysis, config: &AnalysisConfig) {
    let number = move_number(ply);
    let Some(c) = ply.classification.as_ref() else {
        let reason = ply.error.as_deref().unwrap_or("not analysed");
        let _ = writeln!(md, "**{} {}** (skipped: {})\n", number, ply.san, reason);
        return;
    };

    let quiet = c.in_opening || c.decisive;
    let post_white = c.post_cp_white.unwrap_or(0);
    let flat = c.best_cp_before_white.abs() <= FLAT_EVAL_CP && post_white.abs() <= FLAT_EVAL_CP;
    let evals = if quiet || flat {
        String::new()
    } else {
        format!(
            " (CPL: {:+}, best: {}, post: {})",
            c.verdict.cpl,
            format_cp(c.best_cp_before_white),
            format_cp(post_white)
        )
    };
    let _ = writeln!(md, "**{} {}{}**{}", number, ply.san, c.verdict.mark.symbol(), evals);

    if !quiet {
        let eval_first = c.verdict.cpl >= config.thresholds.warn_drop_cp;
        for line in &ply.pre_lines {
            let eval = line.eval_label(Color::White);
            let pv = line.numbered_pv(&ply.before, config.pv_moves * 2);
            if eval_first {
                let _ = writeln!(md, "  - {}) {}: {}", line.rank, eval, pv);
            } else {
                let _ = writeln!(md, "  - {}) {}: {}", line.rank, pv, eval);
            }
        }
    }
    let _ = writeln!(md);
}
