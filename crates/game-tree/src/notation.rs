//! Move notation helpers.

use crate::TreeError;
use std::borrow::Cow;
use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position};

/// SAN of `mv` in `pos`, with `+` or `#` appended.
pub fn san_of(pos: &Chess, mv: Move) -> String {
    let mut san = San::from_move(pos, mv).to_string();
    let mut after = pos.clone();
    after.play_unchecked(mv);
    if after.is_checkmate() {
        san.push('#');
    } else if after.is_check() {
        san.push('+');
    }
    san
}

/// Long algebraic notation (`e2e4`, `e7e8q`, `e1g1`).
pub fn uci_of(mv: Move) -> String {
    mv.to_uci(CastlingMode::Standard).to_string()
}

pub fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

pub fn parse_fen(fen: &str) -> Result<Chess, TreeError> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|e| TreeError::BadRecord(format!("invalid FEN '{}': {}", fen, e)))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| TreeError::BadRecord(format!("illegal FEN position '{}': {}", fen, e)))
}

pub fn fullmove_number(pos: &Chess) -> u32 {
    pos.fullmoves().get()
}

/// Strip check, mate and annotation suffixes: `Nf3+!?` becomes `Nf3`.
pub fn strip_suffixes(notation: &str) -> &str {
    notation.trim().trim_end_matches(['+', '#', '!', '?'])
}

/// Castling written with zeros (`0-0`, `0-0-0+`) in the letter form SAN uses.
pub fn normalize_castling(notation: &str) -> Cow<'_, str> {
    if notation.starts_with("0-0") {
        Cow::Owned(notation.replace('0', "O"))
    } else {
        Cow::Borrowed(notation)
    }
}

/// Compare two move notations ignoring suffixes.
pub fn notation_matches(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_castling(strip_suffixes(a)), normalize_castling(strip_suffixes(b)));
    !a.is_empty() && a == b
}

/// Like [`notation_matches`], but `nf3` also matches `Nf3`.
pub fn notation_matches_ignore_case(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_castling(strip_suffixes(a)), normalize_castling(strip_suffixes(b)));
    !a.is_empty() && a.eq_ignore_ascii_case(&b)
}

/// Parse a single SAN or UCI token as a legal move in `pos`.
pub fn parse_move(pos: &Chess, token: &str) -> Result<Move, TreeError> {
    let invalid = |reason: String| TreeError::InvalidVariation {
        token: token.to_string(),
        reason,
    };

    if let Ok(san) = normalize_castling(token).parse::<SanPlus>() {
        if let Ok(mv) = san.san.to_move(pos) {
            return Ok(mv);
        }
    }

    let uci: UciMove = token
        .parse()
        .map_err(|_| invalid("not SAN or UCI notation".to_string()))?;
    uci.to_move(pos)
        .map_err(|_| invalid("illegal in this position".to_string()))
}

/// Split a free-form move sequence into move tokens.
///
/// Commas separate like spaces; move numbers (`12.`, `12...`) and bare
/// ellipses are dropped, including numbers glued to a move (`3.Bb5`).
/// Digits not followed by a dot belong to the move (`0-0`).
pub fn tokenize_sequence(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .map(strip_move_number)
        .filter(|tok| !tok.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_move_number(token: &str) -> &str {
    let rest = token.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.is_empty() {
        return rest;
    }
    if rest.len() != token.len() && !rest.starts_with(['.', '…']) {
        return token;
    }
    rest.trim_start_matches(['.', '…'])
}

/// Apply a move sequence to a copy of `pos`.
///
/// Fails on the first token that is not a legal move, leaving the caller's
/// position untouched.
pub fn apply_sequence(pos: &Chess, text: &str) -> Result<(Chess, Vec<Move>), TreeError> {
    let mut board = pos.clone();
    let mut moves = Vec::new();
    for token in tokenize_sequence(text) {
        let mv = parse_move(&board, &token)?;
        board.play_unchecked(mv);
        moves.push(mv);
    }
    Ok((board, moves))
}

/// SAN for up to `max_plies` moves of `moves` played from `pos`.
///
/// Stops early at a move that is not legal in the running position.
pub fn line_to_san(pos: &Chess, moves: &[Move], max_plies: usize) -> Vec<String> {
    let mut board = pos.clone();
    let mut sans = Vec::new();
    for &mv in moves.iter().take(max_plies) {
        if !board.legal_moves().contains(&mv) {
            break;
        }
        sans.push(san_of(&board, mv));
        board.play_unchecked(mv);
    }
    sans
}

/// SAN moves with move numbers, e.g. `12... Nf6 13. Bg5`.
pub fn numbered_line(pos: &Chess, moves: &[Move], max_plies: usize) -> String {
    let mut board = pos.clone();
    let mut parts = Vec::new();
    for (i, &mv) in moves.iter().take(max_plies).enumerate() {
        if !board.legal_moves().contains(&mv) {
            break;
        }
        let number = fullmove_number(&board);
        if board.turn().is_white() {
            parts.push(format!("{}. {}", number, san_of(&board, mv)));
        } else if i == 0 {
            parts.push(format!("{}... {}", number, san_of(&board, mv)));
        } else {
            parts.push(san_of(&board, mv));
        }
        board.play_unchecked(mv);
    }
    parts.join(" ")
}
