//! PGN (Portable Game Notation) reading and writing.
//!
//! Reading keeps the full authored tree: variations, comments and NAGs.
//! Writing produces standard export-style movetext wrapped at 80 columns.

use crate::notation::{fullmove_number, parse_fen};
use crate::tree::{GameTree, Nag, NodeId};
use crate::TreeError;
use pgn_reader::{RawComment, RawTag, Reader, SanPlus, Skip, Visitor};
use shakmaty::{Chess, Position};
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;

const LINE_WIDTH: usize = 80;

/// Visitor that builds a [`GameTree`] from one game.
struct TreeBuilder;

/// Movetext state while a game is being read.
struct Movetext {
    tree: GameTree,
    cursor: NodeId,
    /// Cursor to restore when each open variation closes.
    stack: Vec<NodeId>,
}

type Output = Result<GameTree, TreeError>;

impl Visitor for TreeBuilder {
    type Tags = Vec<(String, String)>;
    type Movetext = Movetext;
    type Output = Output;

    fn begin_tags(&mut self) -> ControlFlow<Output, Self::Tags> {
        ControlFlow::Continue(Vec::new())
    }

    fn tag(&mut self, tags: &mut Self::Tags, name: &[u8], value: RawTag<'_>) -> ControlFlow<Output> {
        tags.push((
            String::from_utf8_lossy(name).into_owned(),
            value.decode_utf8_lossy().into_owned(),
        ));
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Output, Movetext> {
        let start = match tags.iter().find(|(k, _)| k == "FEN") {
            Some((_, fen)) => match parse_fen(fen) {
                Ok(pos) => pos,
                Err(e) => return ControlFlow::Break(Err(e)),
            },
            None => Chess::default(),
        };

        let mut tree = GameTree::new(start);
        for (name, value) in &tags {
            tree.set_header(name, value);
        }
        let cursor = tree.root();
        ControlFlow::Continue(Movetext {
            tree,
            cursor,
            stack: Vec::new(),
        })
    }

    fn san(&mut self, state: &mut Movetext, san_plus: SanPlus) -> ControlFlow<Output> {
        let pos = state.tree.node(state.cursor).position();
        let mv = match san_plus.san.to_move(pos) {
            Ok(mv) => mv,
            Err(e) => {
                return ControlFlow::Break(Err(TreeError::BadRecord(format!(
                    "illegal move {} at move {}: {}",
                    san_plus,
                    fullmove_number(pos),
                    e
                ))))
            }
        };
        match state.tree.add_variation(state.cursor, mv) {
            Ok(id) => {
                state.cursor = id;
                ControlFlow::Continue(())
            }
            Err(e) => ControlFlow::Break(Err(TreeError::BadRecord(e.to_string()))),
        }
    }

    fn nag(&mut self, state: &mut Movetext, nag: pgn_reader::Nag) -> ControlFlow<Output> {
        if state.cursor != state.tree.root() {
            state.tree.push_nag(state.cursor, Nag(nag.0));
        }
        ControlFlow::Continue(())
    }

    fn comment(&mut self, state: &mut Movetext, comment: RawComment<'_>) -> ControlFlow<Output> {
        let text = String::from_utf8_lossy(comment.as_bytes());
        state.tree.append_comment(state.cursor, &text);
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, state: &mut Movetext) -> ControlFlow<Output, Skip> {
        // A variation replaces the last move, so it starts from its parent.
        state.stack.push(state.cursor);
        if let Some(parent) = state.tree.node(state.cursor).parent() {
            state.cursor = parent;
        }
        ControlFlow::Continue(Skip(false))
    }

    fn end_variation(&mut self, state: &mut Movetext) -> ControlFlow<Output> {
        if let Some(cursor) = state.stack.pop() {
            state.cursor = cursor;
        }
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, state: Movetext) -> Output {
        let tree = state.tree;
        if tree.headers().is_empty() && tree.node(tree.root()).children().is_empty() {
            return Err(TreeError::BadRecord("no headers or moves".to_string()));
        }
        Ok(tree)
    }
}

/// Parse the first game of a PGN text.
pub fn read_pgn(text: &str) -> Result<GameTree, TreeError> {
    let mut reader = Reader::new(text.as_bytes());
    match reader.read_game(&mut TreeBuilder) {
        Ok(Some(result)) => result,
        Ok(None) => Err(TreeError::BadRecord("no game found".to_string())),
        Err(e) => Err(TreeError::BadRecord(e.to_string())),
    }
}

/// Read and parse the first game of a PGN file.
pub fn read_pgn_file<P: AsRef<Path>>(path: P) -> Result<GameTree, TreeError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| TreeError::BadRecord(format!("{}: {}", path.display(), e)))?;
    read_pgn(&text)
}

/// Movetext pieces before spacing is applied.
enum Token {
    Word(String),
    Open,
    Close,
}

/// Serialize a tree as PGN text.
///
/// Headers come first in their stored order, then the movetext with every
/// variation, NAG and comment, terminated by the game result.
pub fn write_pgn(tree: &GameTree) -> String {
    let mut out = String::new();
    for (name, value) in tree.headers() {
        out.push_str(&format!("[{} \"{}\"]\n", name, escape_tag(value)));
    }
    if !tree.headers().is_empty() {
        out.push('\n');
    }

    let mut tokens = Vec::new();
    let root = tree.node(tree.root());
    let mut force_number = false;
    if !root.comment().is_empty() {
        tokens.push(Token::Word(format!("{{{}}}", escape_comment(root.comment()))));
        force_number = true;
    }
    write_line(tree, tree.root(), &mut tokens, force_number);
    tokens.push(Token::Word(tree.result().to_string()));

    for line in wrap(&glue(tokens), LINE_WIDTH) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Writes a tree to a PGN file.
pub fn write_pgn_file<P: AsRef<Path>>(path: P, tree: &GameTree) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(write_pgn(tree).as_bytes())?;
    Ok(())
}

/// Write the mainline continuation from `start`, with sidelines in place.
fn write_line(tree: &GameTree, start: NodeId, tokens: &mut Vec<Token>, mut force_number: bool) {
    let mut current = start;
    while let Some((&main, sides)) = tree.node(current).children().split_first() {
        force_number = write_move(tree, main, tokens, force_number);
        for &side in sides {
            tokens.push(Token::Open);
            let force = write_move(tree, side, tokens, true);
            write_line(tree, side, tokens, force);
            tokens.push(Token::Close);
        }
        force_number |= !sides.is_empty();
        current = main;
    }
}

/// Write one move with its number, NAGs and comment. Returns whether the
/// following move needs an explicit number.
fn write_move(tree: &GameTree, id: NodeId, tokens: &mut Vec<Token>, force_number: bool) -> bool {
    let node = tree.node(id);
    let before = match node.parent() {
        Some(parent) => tree.node(parent).position(),
        None => return false,
    };

    let number = fullmove_number(before);
    if before.turn().is_white() {
        tokens.push(Token::Word(format!("{}.", number)));
    } else if force_number {
        tokens.push(Token::Word(format!("{}...", number)));
    }
    tokens.push(Token::Word(node.san().to_string()));
    for nag in node.nags() {
        tokens.push(Token::Word(format!("${}", nag.0)));
    }
    if node.comment().is_empty() {
        false
    } else {
        tokens.push(Token::Word(format!("{{{}}}", escape_comment(node.comment()))));
        true
    }
}

/// Attach parentheses to their neighbouring words.
fn glue(tokens: Vec<Token>) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut open = 0;
    for token in tokens {
        match token {
            Token::Open => open += 1,
            Token::Close => match words.last_mut() {
                Some(last) => last.push(')'),
                None => words.push(")".to_string()),
            },
            Token::Word(word) => {
                words.push(format!("{}{}", "(".repeat(open), word));
                open = 0;
            }
        }
    }
    words
}

fn wrap(words: &[String], width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in words {
        if !line.is_empty() && line.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn escape_tag(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_comment(comment: &str) -> String {
    comment.replace('}', ")")
}
