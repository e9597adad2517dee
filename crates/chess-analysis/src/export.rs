//! Annotated export of an analysed game.
//!
//! The exporter never touches the loaded tree. It builds a fresh tree that
//! mirrors the mainline, then hangs the suggested engine lines next to the
//! played moves and tags the played moves with severity NAGs.

use game_tree::{GameTree, NodeId};
use shakmaty::{Chess, Color, Move};
use tracing::{debug, warn};

use crate::analyzer::{GameReview, PlyAnalysis};
use crate::line::AnalysisLine;
use crate::quality::Thresholds;

/// Builds annotated copies of analysed games.
#[derive(Debug, Clone, Default)]
pub struct AnnotatedExporter {
    thresholds: Thresholds,
}

impl AnnotatedExporter {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Annotated copy of `tree`'s mainline.
    ///
    /// Headers, the mainline and its comments are kept. Plies without
    /// analysis are copied as they are.
    pub fn export(&self, tree: &GameTree, review: &GameReview) -> GameTree {
        let mut out = tree.empty_copy();
        let root = out.root();
        out.set_comment(root, tree.node(tree.root()).comment());

        let mut parent = root;
        for (ply, id) in tree.mainline().into_iter().enumerate() {
            let source = tree.node(id);
            let Some(&mv) = source.mv() else {
                break;
            };
            let played = match out.add_variation(parent, mv) {
                Ok(node) => node,
                Err(e) => {
                    warn!(ply, error = %e, "stopping export at unplayable mainline move");
                    break;
                }
            };
            out.set_comment(played, source.comment());

            let analysis = review.ply(ply).filter(|a| a.played == mv);
            let mark = analysis
                .and_then(|a| a.classification.as_ref())
                .map(|c| c.verdict.mark)
                .unwrap_or_default();
            for &nag in source.nags() {
                if !(mark.is_marked() && nag.is_move_assessment()) {
                    out.push_nag(played, nag);
                }
            }
            if let Some(nag) = mark.nag() {
                out.push_nag(played, nag);
            }

            if let Some(analysis) = analysis {
                self.insert_suggestions(&mut out, parent, analysis);
            }
            parent = played;
        }
        out
    }

    fn insert_suggestions(&self, out: &mut GameTree, parent: NodeId, analysis: &PlyAnalysis) {
        let Some(c) = analysis.classification.as_ref() else {
            return;
        };
        let at_head = c.verdict.cpl >= self.thresholds.warn_drop_cp;
        let max_plies = self.thresholds.variation_full_moves * 2;

        for &index in &c.suggestions {
            let Some(line) = analysis.pre_lines.get(index) else {
                continue;
            };
            if line.first_move() == Some(analysis.played) {
                continue;
            }
            add_line(out, parent, &analysis.before, line, max_plies, at_head);
        }
    }
}

/// Add `line` as a variation of `parent`, cut to `max_plies`, with its
/// white-relative evaluation on the first or last node.
fn add_line(out: &mut GameTree, parent: NodeId, before: &Chess, line: &AnalysisLine, max_plies: usize, at_head: bool) {
    let moves: Vec<Move> = line.pv.iter().copied().take(max_plies).collect();
    let Some((&first, rest)) = moves.split_first() else {
        return;
    };
    let head = match out.add_variation(parent, first) {
        Ok(node) => node,
        Err(e) => {
            debug!(error = %e, "suggested line rejected");
            return;
        }
    };
    let mut tail = head;
    for &mv in rest {
        match out.add_variation(tail, mv) {
            Ok(node) => tail = node,
            Err(_) => break,
        }
    }

    let eval = line.eval_label(Color::White);
    out.set_comment(if at_head { head } else { tail }, &eval);
    debug!(line = %line.numbered_pv(before, max_plies), %eval, "suggestion added");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Evaluation;
    use crate::quality::classify;
    use game_tree::notation::{apply_sequence, parse_move};
    use game_tree::pgn::{read_pgn, write_pgn};
    use game_tree::Nag;
    use shakmaty::Position;

    fn line(pos: &Chess, rank: usize, cp: i32, moves: &str) -> AnalysisLine {
        AnalysisLine {
            rank,
            depth: 18,
            score: Some(Evaluation::Centipawns(cp)),
            pov: pos.turn(),
            pv: apply_sequence(pos, moves).unwrap().1,
        }
    }

    fn no_grace() -> Thresholds {
        Thresholds {
            opening_grace_fullmoves: 0,
            ..Thresholds::default()
        }
    }

    /// Review of `1. e4 e5 2. Nf3 <reply>` where only the reply is analysed.
    fn review_of(tree: &GameTree, pre: Vec<AnalysisLine>, post_cp: i32) -> GameReview {
        let before = tree.mainline_position(3).clone();
        let played = tree.mainline_moves()[3];
        let mut after = before.clone();
        after.play_unchecked(played);
        let post = vec![line(&after, 1, post_cp, "d4")];
        let classification = classify(&before, played, &pre, &post, &no_grace());
        let mut plies = Vec::new();
        for ply in 0..3 {
            let before = tree.mainline_position(ply).clone();
            let played = tree.mainline_moves()[ply];
            plies.push(PlyAnalysis {
                ply,
                san: game_tree::san_of(&before, played),
                before,
                played,
                pre_lines: Vec::new(),
                post_lines: Vec::new(),
                classification: None,
                error: Some("engine unavailable".to_string()),
            });
        }
        plies.push(PlyAnalysis {
            ply: 3,
            before,
            played,
            san: classification.verdict.played.clone(),
            pre_lines: pre,
            post_lines: post,
            classification: Some(classification),
            error: None,
        });
        GameReview {
            plies,
            total_plies: 4,
            cancelled: false,
        }
    }

    #[test]
    fn test_blunder_gets_nag_and_head_comment() {
        let tree = read_pgn("1. e4 e5 2. Nf3 f6 { weak } *").unwrap();
        let before = tree.mainline_position(3).clone();
        let pre = vec![line(&before, 1, 35, "Nc6 Bb5 a6 Ba4 Nf6"), line(&before, 2, 20, "Bc5")];
        let review = review_of(&tree, pre, 305);

        let out = AnnotatedExporter::new(no_grace()).export(&tree, &review);
        assert_eq!(out.mainline_sans(), tree.mainline_sans());

        let mainline = out.mainline();
        let f6 = out.node(mainline[3]);
        assert_eq!(f6.nags(), &[Nag::BLUNDER]);
        assert_eq!(f6.comment(), "weak");

        let nf3 = mainline[2];
        let siblings = out.node(nf3).children();
        assert_eq!(siblings.len(), 3);
        let nc6 = out.node(siblings[1]);
        assert_eq!(nc6.san(), "Nc6");
        // CPL is past the warning threshold: evaluation at the head.
        assert_eq!(nc6.comment(), "-0.35");
        // Cut to three full moves: Nc6 Bb5 a6 Ba4 Nf6 stays within six plies.
        let text = write_pgn(&out).replace('\n', " ");
        assert!(text.contains("(2... Nc6 {-0.35} 3. Bb5 a6 4. Ba4 Nf6)"), "{}", text);
        assert!(text.contains("f6 $4 {weak}"), "{}", text);
    }

    #[test]
    fn test_equal_alternative_gets_tail_comment() {
        let tree = read_pgn("1. e4 e5 2. Nf3 Bc5 *").unwrap();
        let before = tree.mainline_position(3).clone();
        let pre = vec![line(&before, 1, 35, "Nc6 Bb5"), line(&before, 2, 20, "Bc5 Nxe5")];
        let review = review_of(&tree, pre, -20);

        let out = AnnotatedExporter::new(no_grace()).export(&tree, &review);
        let nf3 = out.mainline()[2];
        let children = out.node(nf3).children();
        assert_eq!(children.len(), 2);
        assert!(out.node(out.mainline()[3]).nags().is_empty());

        let head = out.node(children[1]);
        assert_eq!(head.san(), "Nc6");
        assert_eq!(head.comment(), "");
        let tail = out.node(head.children()[0]);
        assert_eq!(tail.san(), "Bb5");
        assert_eq!(tail.comment(), "-0.35");
    }

    #[test]
    fn test_played_move_never_duplicated() {
        let tree = read_pgn("1. e4 e5 2. Nf3 Bc5 *").unwrap();
        let before = tree.mainline_position(3).clone();
        let pre = vec![line(&before, 1, 35, "Nc6"), line(&before, 2, 20, "Bc5")];
        let mut review = review_of(&tree, pre, -20);
        // Force the played line into the suggestions.
        if let Some(c) = review.plies[3].classification.as_mut() {
            c.suggestions = vec![0, 1];
        }

        let out = AnnotatedExporter::new(no_grace()).export(&tree, &review);
        let nf3 = out.mainline()[2];
        let sans: Vec<&str> = out
            .node(nf3)
            .children()
            .iter()
            .map(|&id| out.node(id).san())
            .collect();
        assert_eq!(sans, vec!["Bc5", "Nc6"]);
    }

    #[test]
    fn test_mark_replaces_authored_assessment() {
        let tree = read_pgn("1. e4 e5 2. Nf3 f6! $14 *").unwrap();
        let before = tree.mainline_position(3).clone();
        let pre = vec![line(&before, 1, 35, "Nc6")];
        let review = review_of(&tree, pre, 305);

        let out = AnnotatedExporter::new(no_grace()).export(&tree, &review);
        let f6 = out.node(out.mainline()[3]);
        assert_eq!(f6.nags(), &[Nag(14), Nag::BLUNDER]);
    }

    #[test]
    fn test_export_without_analysis_round_trips() {
        let text = "[White \"A\"]\n[Black \"B\"]\n[Result \"1/2-1/2\"]\n\n{ start } 1. d4 d5 $1 2. c4 (2. Nf3) 2... e6 1/2-1/2";
        let tree = read_pgn(text).unwrap();
        let out = AnnotatedExporter::default().export(&tree, &GameReview::default());

        let reparsed = read_pgn(&write_pgn(&out)).unwrap();
        assert_eq!(reparsed.mainline_sans(), tree.mainline_sans());
        assert_eq!(reparsed.header("White"), Some("A"));
        assert_eq!(reparsed.result(), "1/2-1/2");
        assert_eq!(reparsed.node(reparsed.root()).comment(), "start");
        assert_eq!(reparsed.node(reparsed.mainline()[1]).nags(), &[Nag::GOOD]);
        // Authored variations are not carried over.
        assert!(reparsed.branch_points().is_empty());
    }

    #[test]
    fn test_mismatched_analysis_is_ignored() {
        let tree = read_pgn("1. e4 e5 2. Nf3 f6 *").unwrap();
        let other = read_pgn("1. e4 e5 2. Nf3 d6 *").unwrap();
        let before = other.mainline_position(3).clone();
        let pre = vec![line(&before, 1, 35, "Nc6")];
        let review = review_of(&other, pre, 305);
        let played = parse_move(&before, "d6").unwrap();
        assert_eq!(review.plies[3].played, played);

        let out = AnnotatedExporter::new(no_grace()).export(&tree, &review);
        assert!(out.node(out.mainline()[3]).nags().is_empty());
        assert_eq!(out.node(out.mainline()[2]).children().len(), 1);
    }
}
