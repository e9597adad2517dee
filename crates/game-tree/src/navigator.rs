//! Mainline navigation for an interactive session.

use crate::notation::{fen_of, fullmove_number, notation_matches, notation_matches_ignore_case};
use crate::tree::{BranchPoint, GameTree, NodeId};
use crate::TreeError;
use shakmaty::{Chess, Color, Move, Position};
use tracing::debug;

/// Where the session currently stands in the mainline.
#[derive(Debug, Clone)]
pub struct SessionCursor {
    ply: usize,
    position: Chess,
    user_side: Option<Color>,
}

impl SessionCursor {
    /// Number of mainline moves played to reach the cursor.
    pub fn ply(&self) -> usize {
        self.ply
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    /// Side played by the coached player, if it could be determined.
    pub fn user_side(&self) -> Option<Color> {
        self.user_side
    }
}

/// Rough stage of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Opening,
    Middlegame,
    Endgame,
}

impl GamePhase {
    /// Seven or fewer pieces is an endgame, otherwise the first fifteen
    /// moves are the opening.
    pub fn of(pos: &Chess) -> Self {
        if pos.board().occupied().count() <= 7 {
            GamePhase::Endgame
        } else if fullmove_number(pos) <= 15 {
            GamePhase::Opening
        } else {
            GamePhase::Middlegame
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GamePhase::Opening => "opening",
            GamePhase::Middlegame => "middlegame",
            GamePhase::Endgame => "endgame",
        }
    }
}

/// Snapshot of the cursor for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorStatus {
    pub ply: usize,
    pub fullmove: u32,
    pub turn: Color,
    pub fen: String,
    pub moves_total: usize,
    pub user_side: Option<Color>,
    pub phase: GamePhase,
    /// The mainline move played from here, if any.
    pub next_move: Option<String>,
}

/// Owns a loaded game and the session cursor over its mainline.
#[derive(Debug, Clone)]
pub struct Navigator {
    tree: GameTree,
    mainline: Vec<NodeId>,
    cursor: SessionCursor,
}

impl Navigator {
    /// Load a game, placing the cursor at the start.
    ///
    /// `player_names` are matched against the White and Black headers to
    /// decide which side the coached player had.
    pub fn new(tree: GameTree, player_names: &[String]) -> Self {
        let user_side = detect_user_side(
            tree.header("White").unwrap_or(""),
            tree.header("Black").unwrap_or(""),
            player_names,
        );
        let mainline = tree.mainline();
        let cursor = SessionCursor {
            ply: 0,
            position: tree.start_position().clone(),
            user_side,
        };
        Self {
            tree,
            mainline,
            cursor,
        }
    }

    pub fn tree(&self) -> &GameTree {
        &self.tree
    }

    pub fn cursor(&self) -> &SessionCursor {
        &self.cursor
    }

    pub fn mainline_len(&self) -> usize {
        self.mainline.len()
    }

    /// The mainline move played from the cursor position.
    pub fn next_move(&self) -> Option<Move> {
        self.mainline
            .get(self.cursor.ply)
            .and_then(|&id| self.tree.node(id).mv().copied())
    }

    pub fn next_san(&self) -> Option<&str> {
        self.mainline
            .get(self.cursor.ply)
            .map(|&id| self.tree.node(id).san())
    }

    pub fn status(&self) -> CursorStatus {
        let pos = &self.cursor.position;
        CursorStatus {
            ply: self.cursor.ply,
            fullmove: fullmove_number(pos),
            turn: pos.turn(),
            fen: fen_of(pos),
            moves_total: self.mainline.len(),
            user_side: self.cursor.user_side,
            phase: GamePhase::of(pos),
            next_move: self.next_san().map(str::to_string),
        }
    }

    /// Move the cursor to ply `n`, clamped to the mainline length.
    pub fn goto_ply(&mut self, n: usize) -> CursorStatus {
        let ply = n.min(self.mainline.len());
        self.cursor.ply = ply;
        self.cursor.position = self.tree.mainline_position(ply).clone();
        debug!(ply, requested = n, "cursor moved");
        self.status()
    }

    pub fn forward(&mut self) -> CursorStatus {
        self.goto_ply(self.cursor.ply + 1)
    }

    pub fn back(&mut self) -> CursorStatus {
        self.goto_ply(self.cursor.ply.saturating_sub(1))
    }

    /// Place the cursor before the first mainline move written as `notation`.
    ///
    /// Check and annotation suffixes are ignored. An exact match wins over a
    /// case-insensitive one, so `bxc3` still finds the pawn capture when
    /// `Bxc3` was also played. The cursor does not move when nothing matches.
    pub fn goto_by_notation(&mut self, notation: &str) -> Result<CursorStatus, TreeError> {
        let sans: Vec<&str> = self.mainline.iter().map(|&id| self.tree.node(id).san()).collect();
        let found = sans
            .iter()
            .position(|san| notation_matches(san, notation))
            .or_else(|| sans.iter().position(|san| notation_matches_ignore_case(san, notation)));
        match found {
            Some(ply) => Ok(self.goto_ply(ply)),
            None => Err(TreeError::NotFound(format!(
                "move '{}' is not in the mainline",
                notation.trim()
            ))),
        }
    }

    /// Find the first branch point (see [`GameTree::find_first_branch`]) and
    /// move the cursor to it.
    pub fn advance_to_first_branch(&mut self, min_fullmove: u32, max_fullmove: u32) -> BranchPoint {
        let branch = self.tree.find_first_branch(min_fullmove, max_fullmove);
        self.goto_ply(branch.ply);
        branch
    }
}

/// Decide which side the coached player had from the game headers.
///
/// Returns `None` when neither or both player names match.
pub fn detect_user_side(white: &str, black: &str, player_names: &[String]) -> Option<Color> {
    let is_user = |header: &str| player_names.iter().any(|name| names_match(header, name));
    match (is_user(white), is_user(black)) {
        (true, false) => Some(Color::White),
        (false, true) => Some(Color::Black),
        _ => None,
    }
}

/// Loose name comparison: case and common accents ignored, and any word of
/// one name that is a prefix (three letters or more) of a word of the other.
fn names_match(header: &str, name: &str) -> bool {
    let header = normalize_name(header);
    let name = normalize_name(name);
    if header.is_empty() || name.is_empty() {
        return false;
    }
    if header.join(" ") == name.join(" ") {
        return true;
    }
    header.iter().any(|h| {
        name.iter().any(|n| {
            let (short, long) = if h.len() <= n.len() { (h, n) } else { (n, h) };
            short.chars().count() >= 3 && long.starts_with(short.as_str())
        })
    })
}

fn normalize_name(name: &str) -> Vec<String> {
    name.chars()
        .map(fold_accent)
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'Á' | 'À' | 'Â' | 'Ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Î' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'Ó' | 'Ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ü' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        _ => c,
    }
}
