//! Scripted in-memory engine for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chess_analysis::{AnalysisBackend, EngineError, EngineGateway, Evaluation, RawLine};
use game_tree::notation::{apply_sequence, fen_of, uci_of};
use shakmaty::Chess;

/// A request the backend received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub fen: String,
    pub depth: u32,
    pub multipv: usize,
}

/// Answers with canned lines keyed by FEN. Unknown positions either fail or
/// get a single level line without moves.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    lines: HashMap<String, Vec<RawLine>>,
    failing: Vec<String>,
    fail_unknown: bool,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown positions fail like a dead engine.
    pub fn strict(mut self) -> Self {
        self.fail_unknown = true;
        self
    }

    /// Script lines for `pos`. Each entry is a side-to-move score and a SAN
    /// line from `pos`.
    pub fn with(mut self, pos: &Chess, lines: &[(i32, &str)]) -> Self {
        let raw = lines
            .iter()
            .enumerate()
            .map(|(i, &(cp, san))| raw_line(pos, i + 1, Evaluation::Centipawns(cp), san))
            .collect();
        self.lines.insert(fen_of(pos), raw);
        self
    }

    pub fn with_mate(mut self, pos: &Chess, mate: i32, san: &str) -> Self {
        self.lines
            .insert(fen_of(pos), vec![raw_line(pos, 1, Evaluation::Mate(mate), san)]);
        self
    }

    /// `pos` always fails.
    pub fn failing_at(mut self, pos: &Chess) -> Self {
        self.failing.push(fen_of(pos));
        self
    }

    /// Shared log of every request, readable after the engine moved into a
    /// gateway.
    pub fn requests(&self) -> Arc<Mutex<Vec<Request>>> {
        Arc::clone(&self.requests)
    }

    pub fn into_gateway(self) -> Arc<EngineGateway> {
        Arc::new(EngineGateway::new(self))
    }
}

fn raw_line(pos: &Chess, multipv: usize, score: Evaluation, san: &str) -> RawLine {
    let (_, moves) = apply_sequence(pos, san).unwrap();
    RawLine {
        multipv,
        depth: 20,
        score: Some(score),
        pv: moves.into_iter().map(uci_of).collect(),
    }
}

impl AnalysisBackend for ScriptedEngine {
    fn analyse(&mut self, pos: &Chess, depth: u32, multipv: usize) -> Result<Vec<RawLine>, EngineError> {
        let fen = fen_of(pos);
        self.requests.lock().unwrap().push(Request {
            fen: fen.clone(),
            depth,
            multipv,
        });
        if self.failing.contains(&fen) {
            return Err(EngineError::InvalidResponse("scripted failure".to_string()));
        }
        match self.lines.get(&fen) {
            Some(lines) => Ok(lines
                .iter()
                .take(multipv)
                .map(|l| RawLine { depth, ..l.clone() })
                .collect()),
            None if self.fail_unknown => Err(EngineError::InvalidResponse(format!("no script for {}", fen))),
            None => Ok(vec![RawLine {
                multipv: 1,
                depth,
                score: Some(Evaluation::Centipawns(0)),
                pv: Vec::new(),
            }]),
        }
    }

    fn quit(&mut self) {}
}

/// Position after `moves` from the start.
pub fn pos(moves: &str) -> Chess {
    apply_sequence(&Chess::default(), moves).unwrap().0
}
