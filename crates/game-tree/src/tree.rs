//! Arena-backed game tree.

use crate::notation::{fullmove_number, san_of};
use crate::TreeError;
use shakmaty::{Chess, Move, Position};

/// Index of a node inside its [`GameTree`].
///
/// Ids are only meaningful for the tree that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Numeric Annotation Glyph attached to a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nag(pub u8);

impl Nag {
    pub const GOOD: Nag = Nag(1);
    pub const MISTAKE: Nag = Nag(2);
    pub const BRILLIANT: Nag = Nag(3);
    pub const BLUNDER: Nag = Nag(4);
    pub const SPECULATIVE: Nag = Nag(5);
    pub const DUBIOUS: Nag = Nag(6);

    /// Move-suffix symbol for the six move-assessment glyphs.
    pub fn symbol(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("!"),
            2 => Some("?"),
            3 => Some("!!"),
            4 => Some("??"),
            5 => Some("!?"),
            6 => Some("?!"),
            _ => None,
        }
    }

    pub fn is_move_assessment(self) -> bool {
        (1..=6).contains(&self.0)
    }
}

/// One position in the tree and the move that led to it.
#[derive(Debug, Clone)]
pub struct MoveNode {
    mv: Option<Move>,
    san: String,
    position: Chess,
    comment: String,
    nags: Vec<Nag>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl MoveNode {
    /// The move that produced this node. `None` only for the root.
    pub fn mv(&self) -> Option<&Move> {
        self.mv.as_ref()
    }

    /// SAN of the move including check suffix. Empty for the root.
    pub fn san(&self) -> &str {
        &self.san
    }

    /// Position after the move.
    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn nags(&self) -> &[Nag] {
        &self.nags
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child variations, mainline continuation first.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// How [`GameTree::find_first_branch`] arrived at its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    /// Earliest branch point inside the requested move range.
    InRange,
    /// No branch point in range; earliest one in the game.
    Earliest,
    /// The mainline never branches.
    NoBranch,
}

/// A mainline ply where the authored game offers alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPoint {
    /// Mainline index of the branching move; the cursor sits before it.
    pub ply: usize,
    /// Full-move number of the position before the branching move.
    pub fullmove: u32,
    /// SAN moves from the start up to the branch point.
    pub path: Vec<String>,
    /// The mainline continuation.
    pub mainline: Option<String>,
    /// Up to two sibling moves.
    pub alternatives: Vec<String>,
    pub kind: BranchKind,
}

/// A game: headers plus a tree of moves rooted at the start position.
#[derive(Debug, Clone)]
pub struct GameTree {
    headers: Vec<(String, String)>,
    nodes: Vec<MoveNode>,
}

impl Default for GameTree {
    fn default() -> Self {
        Self::new(Chess::default())
    }
}

impl GameTree {
    /// Create an empty game starting from `start`.
    pub fn new(start: Chess) -> Self {
        Self {
            headers: Vec::new(),
            nodes: vec![MoveNode {
                mv: None,
                san: String::new(),
                position: start,
                comment: String::new(),
                nags: Vec::new(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Copy of this tree's headers and start position without any moves.
    pub fn empty_copy(&self) -> Self {
        let mut tree = Self::new(self.start_position().clone());
        tree.headers = self.headers.clone();
        tree
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Access a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different tree.
    pub fn node(&self, id: NodeId) -> &MoveNode {
        &self.nodes[id.0]
    }

    pub fn start_position(&self) -> &Chess {
        &self.nodes[0].position
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing an existing value with the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self.headers.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Game termination marker from the `Result` header, `*` when absent.
    pub fn result(&self) -> &str {
        self.header("Result").unwrap_or("*")
    }

    /// Append `mv` as the last variation of `parent`. The first child added
    /// becomes the mainline continuation.
    pub fn add_variation(&mut self, parent: NodeId, mv: Move) -> Result<NodeId, TreeError> {
        let before = &self.node(parent).position;
        if !before.legal_moves().contains(&mv) {
            return Err(TreeError::InvalidVariation {
                token: format!("{:?}", mv),
                reason: "illegal in this position".to_string(),
            });
        }

        let san = san_of(before, mv);
        let mut position = before.clone();
        position.play_unchecked(mv);

        let id = NodeId(self.nodes.len());
        self.nodes.push(MoveNode {
            mv: Some(mv),
            san,
            position,
            comment: String::new(),
            nags: Vec::new(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Replace a node's comment.
    pub fn set_comment(&mut self, id: NodeId, comment: &str) {
        self.nodes[id.0].comment = comment.trim().to_string();
    }

    /// Append to a node's comment, separated by a space.
    pub fn append_comment(&mut self, id: NodeId, comment: &str) {
        let comment = comment.trim();
        if comment.is_empty() {
            return;
        }
        let existing = &mut self.nodes[id.0].comment;
        if !existing.is_empty() {
            existing.push(' ');
        }
        existing.push_str(comment);
    }

    /// Attach a NAG unless the node already carries it.
    pub fn push_nag(&mut self, id: NodeId, nag: Nag) {
        let nags = &mut self.nodes[id.0].nags;
        if !nags.contains(&nag) {
            nags.push(nag);
        }
    }

    /// Mainline nodes in order, root excluded.
    pub fn mainline(&self) -> Vec<NodeId> {
        let mut line = Vec::new();
        let mut current = self.root();
        while let Some(&next) = self.node(current).children.first() {
            line.push(next);
            current = next;
        }
        line
    }

    pub fn mainline_moves(&self) -> Vec<Move> {
        self.mainline()
            .into_iter()
            .filter_map(|id| self.node(id).mv)
            .collect()
    }

    pub fn mainline_sans(&self) -> Vec<String> {
        self.mainline()
            .into_iter()
            .map(|id| self.node(id).san.clone())
            .collect()
    }

    /// The position reached after the first `ply` mainline moves, clamped to
    /// the mainline length.
    pub fn mainline_position(&self, ply: usize) -> &Chess {
        let line = self.mainline();
        match ply.min(line.len()) {
            0 => self.start_position(),
            n => &self.node(line[n - 1]).position,
        }
    }

    /// Mainline plies whose move has at least one sibling variation.
    pub fn branch_points(&self) -> Vec<usize> {
        self.mainline()
            .into_iter()
            .enumerate()
            .filter(|&(_, id)| self.is_branching(id))
            .map(|(ply, _)| ply)
            .collect()
    }

    fn is_branching(&self, id: NodeId) -> bool {
        self.node(id)
            .parent
            .is_some_and(|p| self.node(p).children.len() > 1)
    }

    /// Locate the first mainline branch point.
    ///
    /// Prefers the earliest branch whose pre-move full-move number lies in
    /// `[min_fullmove, max_fullmove]`, then the earliest branch anywhere,
    /// then ply 0.
    pub fn find_first_branch(&self, min_fullmove: u32, max_fullmove: u32) -> BranchPoint {
        let line = self.mainline();
        let mut in_range = None;
        let mut earliest = None;

        for (ply, &id) in line.iter().enumerate() {
            if !self.is_branching(id) {
                continue;
            }
            let fullmove = match self.node(id).parent {
                Some(p) => fullmove_number(&self.node(p).position),
                None => continue,
            };
            if earliest.is_none() {
                earliest = Some(ply);
            }
            if (min_fullmove..=max_fullmove).contains(&fullmove) {
                in_range = Some(ply);
                break;
            }
        }

        let (ply, kind) = match (in_range, earliest) {
            (Some(ply), _) => (ply, BranchKind::InRange),
            (None, Some(ply)) => (ply, BranchKind::Earliest),
            (None, None) => (0, BranchKind::NoBranch),
        };

        let before = if ply == 0 { self.root() } else { line[ply - 1] };
        let siblings = &self.node(before).children;

        BranchPoint {
            ply,
            fullmove: fullmove_number(&self.node(before).position),
            path: line[..ply].iter().map(|&id| self.node(id).san.clone()).collect(),
            mainline: siblings.first().map(|&id| self.node(id).san.clone()),
            alternatives: siblings
                .iter()
                .skip(1)
                .take(2)
                .map(|&id| self.node(id).san.clone())
                .collect(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse_move;

    fn play_line(tree: &mut GameTree, from: NodeId, sans: &[&str]) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut current = from;
        for san in sans {
            let mv = parse_move(tree.node(current).position(), san).unwrap();
            current = tree.add_variation(current, mv).unwrap();
            ids.push(current);
        }
        ids
    }

    /// Mainline of ten full moves with sidelines at full moves 2 and 9.
    fn branching_game() -> GameTree {
        let mut tree = GameTree::default();
        let root = tree.root();
        let main = play_line(
            &mut tree,
            root,
            &[
                "e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Ba4", "Nf6", "O-O", "Be7", "Re1", "b5",
                "Bb3", "d6", "c3", "O-O", "h3", "Nb8", "d4", "Nbd7",
            ],
        );
        // 2. Nc3 instead of 2. Nf3
        play_line(&mut tree, main[1], &["Nc3"]);
        // 9. d3 instead of 9. h3
        play_line(&mut tree, main[15], &["d3"]);
        tree
    }

    #[test]
    fn test_mainline_follows_first_child() {
        let tree = branching_game();
        let sans = tree.mainline_sans();
        assert_eq!(sans.len(), 20);
        assert_eq!(sans[0], "e4");
        assert_eq!(sans[2], "Nf3");
        assert_eq!(sans[16], "h3");
    }

    #[test]
    fn test_branch_points() {
        let tree = branching_game();
        assert_eq!(tree.branch_points(), vec![2, 16]);
    }

    #[test]
    fn test_find_first_branch_falls_back_to_earliest() {
        let tree = branching_game();
        let branch = tree.find_first_branch(4, 6);

        assert_eq!(branch.kind, BranchKind::Earliest);
        assert_eq!(branch.ply, 2);
        assert_eq!(branch.fullmove, 2);
        assert_eq!(branch.path, vec!["e4", "e5"]);
        assert_eq!(branch.mainline.as_deref(), Some("Nf3"));
        assert_eq!(branch.alternatives, vec!["Nc3"]);
    }

    #[test]
    fn test_find_first_branch_in_range() {
        let tree = branching_game();
        let branch = tree.find_first_branch(8, 10);

        assert_eq!(branch.kind, BranchKind::InRange);
        assert_eq!(branch.ply, 16);
        assert_eq!(branch.fullmove, 9);
        assert_eq!(branch.mainline.as_deref(), Some("h3"));
        assert_eq!(branch.alternatives, vec!["d3"]);
    }

    #[test]
    fn test_find_first_branch_without_branches() {
        let mut tree = GameTree::default();
        let root = tree.root();
        play_line(&mut tree, root, &["d4", "d5"]);

        let branch = tree.find_first_branch(4, 6);
        assert_eq!(branch.kind, BranchKind::NoBranch);
        assert_eq!(branch.ply, 0);
        assert!(branch.path.is_empty());
        assert_eq!(branch.mainline.as_deref(), Some("d4"));
        assert!(branch.alternatives.is_empty());
    }

    #[test]
    fn test_alternatives_capped_at_two() {
        let mut tree = GameTree::default();
        let root = tree.root();
        play_line(&mut tree, root, &["e4"]);
        play_line(&mut tree, root, &["d4"]);
        play_line(&mut tree, root, &["c4"]);
        play_line(&mut tree, root, &["Nf3"]);

        let branch = tree.find_first_branch(1, 1);
        assert_eq!(branch.ply, 0);
        assert_eq!(branch.mainline.as_deref(), Some("e4"));
        assert_eq!(branch.alternatives, vec!["d4", "c4"]);
    }

    #[test]
    fn test_illegal_variation_rejected() {
        let mut tree = GameTree::default();
        let root = tree.root();
        let after_e4 = play_line(&mut tree, root, &["e4"])[0];
        // White's move from the position where Black is to move.
        let white_move = parse_move(&Chess::default(), "d4").unwrap();

        assert!(tree.add_variation(after_e4, white_move).is_err());
        assert!(tree.node(after_e4).children().is_empty());
    }

    #[test]
    fn test_nags_deduplicated_and_comments_appended() {
        let mut tree = GameTree::default();
        let root = tree.root();
        let id = play_line(&mut tree, root, &["e4"])[0];

        tree.push_nag(id, Nag::DUBIOUS);
        tree.push_nag(id, Nag::DUBIOUS);
        tree.append_comment(id, "first");
        tree.append_comment(id, "  second ");

        assert_eq!(tree.node(id).nags(), &[Nag::DUBIOUS]);
        assert_eq!(tree.node(id).comment(), "first second");
    }

    #[test]
    fn test_headers_replace() {
        let mut tree = GameTree::default();
        tree.set_header("White", "A");
        tree.set_header("White", "B");
        assert_eq!(tree.header("White"), Some("B"));
        assert_eq!(tree.result(), "*");
    }

    #[test]
    fn test_mainline_position_clamps() {
        let mut tree = GameTree::default();
        let root = tree.root();
        let ids = play_line(&mut tree, root, &["e4", "e5"]);

        assert_eq!(tree.mainline_position(0).turn(), shakmaty::Color::White);
        let last = tree.node(ids[1]).position().clone();
        assert_eq!(
            crate::notation::fen_of(tree.mainline_position(99)),
            crate::notation::fen_of(&last)
        );
    }
}
