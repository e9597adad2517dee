//! UCI engine process and the serialized gateway in front of it.

use crate::evaluation::Evaluation;
use crate::line::AnalysisLine;
use game_tree::notation::fen_of;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Position};
use std::collections::BTreeMap;
use std::io::BufReader;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};
use uci::{EngineInfo, EngineMessage, GoOptions, GuiCommand, ScoreBound, UciConnection, UciError};

/// Maximum number of lines to read before giving up on a UCI response.
pub const MAX_UCI_LINES: usize = 50_000;

/// Errors that can occur when working with chess engines.
///
/// Every variant means the engine is unavailable for the current request.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to spawn the engine process.
    #[error("Failed to spawn engine: {0}")]
    SpawnError(#[from] std::io::Error),
    /// Engine executable was not found at the specified path.
    #[error("Engine not found at path: {0}")]
    NotFound(String),
    /// Engine failed to initialize properly (UCI handshake failed).
    #[error("Engine initialization failed")]
    InitFailed,
    /// Engine returned an invalid or unexpected response.
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
    /// Reading from or writing to the engine failed.
    #[error("Engine protocol error: {0}")]
    Protocol(#[from] UciError),
    /// The gateway has been closed.
    #[error("Engine is closed")]
    Closed,
}

/// Options applied once after the UCI handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub threads: u32,
    pub hash_mb: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 128,
        }
    }
}

/// One line as reported by a backend, before moves are checked against the
/// position.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    /// 1-based line index.
    pub multipv: usize,
    pub depth: u32,
    pub score: Option<Evaluation>,
    /// Moves in long algebraic notation.
    pub pv: Vec<String>,
}

/// Something that can search a position and report ranked lines.
pub trait AnalysisBackend: Send {
    /// Search `pos` to `depth`, reporting up to `multipv` lines.
    fn analyse(&mut self, pos: &Chess, depth: u32, multipv: usize) -> Result<Vec<RawLine>, EngineError>;

    /// Reset search state before analysing a new game.
    fn new_game(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Terminate the backend. Must not panic and may be called once.
    fn quit(&mut self);
}

/// A UCI engine running as a child process.
pub struct UciEngine {
    /// The engine process handle.
    process: Child,
    conn: UciConnection<BufReader<ChildStdout>, ChildStdin>,
    /// The engine's name (reported via UCI id).
    name: String,
    /// MultiPV value currently set in the engine.
    multipv: usize,
    quit_sent: bool,
}

impl UciEngine {
    /// Spawn the engine and perform the UCI handshake.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotFound` if the engine executable doesn't exist
    /// - `EngineError::SpawnError` if the engine process fails to start
    /// - `EngineError::InitFailed` if UCI initialization fails
    pub fn new(engine_path: &str, options: &EngineOptions) -> Result<Self, EngineError> {
        // Bare names are looked up on PATH by the OS.
        let path = std::path::Path::new(engine_path);
        if path.components().count() > 1 && !path.exists() {
            return Err(EngineError::NotFound(engine_path.to_string()));
        }

        let mut process = Command::new(engine_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EngineError::NotFound(engine_path.to_string()),
                _ => EngineError::SpawnError(e),
            })?;

        let stdin = process.stdin.take().ok_or(EngineError::InitFailed)?;
        let stdout = process.stdout.take().ok_or(EngineError::InitFailed)?;

        let mut engine = Self {
            process,
            conn: UciConnection::new(BufReader::new(stdout), stdin),
            name: String::new(),
            multipv: 1,
            quit_sent: false,
        };
        engine.init_uci(options)?;
        info!(engine = %engine.name, threads = options.threads, hash_mb = options.hash_mb, "engine ready");
        Ok(engine)
    }

    /// Returns the engine's name as reported via UCI protocol.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn init_uci(&mut self, options: &EngineOptions) -> Result<(), EngineError> {
        self.send(&GuiCommand::Uci)?;
        let mut lines_read = 0;
        loop {
            if lines_read > MAX_UCI_LINES {
                return Err(EngineError::InitFailed);
            }
            lines_read += 1;
            match self.read()? {
                EngineMessage::Id { name: Some(name), .. } => self.name = name,
                EngineMessage::UciOk => break,
                _ => {}
            }
        }
        if self.name.is_empty() {
            self.name = "Unknown Engine".to_string();
        }

        self.send(&GuiCommand::set_option("Threads", options.threads))?;
        self.send(&GuiCommand::set_option("Hash", options.hash_mb))?;
        self.send(&GuiCommand::set_option("MultiPV", self.multipv))?;
        self.wait_ready()
    }

    fn wait_ready(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::IsReady)?;
        let mut lines_read = 0;
        loop {
            if lines_read > MAX_UCI_LINES {
                return Err(EngineError::InitFailed);
            }
            lines_read += 1;
            if self.read()? == EngineMessage::ReadyOk {
                return Ok(());
            }
        }
    }

    fn send(&mut self, cmd: &GuiCommand) -> Result<(), EngineError> {
        debug!(cmd = %cmd.to_uci(), "engine <");
        self.conn.send(cmd)?;
        Ok(())
    }

    fn read(&mut self) -> Result<EngineMessage, EngineError> {
        match self.conn.read_message()? {
            Some(msg) => Ok(msg),
            None => Err(EngineError::InvalidResponse(
                "Engine closed unexpectedly".to_string(),
            )),
        }
    }
}

impl AnalysisBackend for UciEngine {
    fn analyse(&mut self, pos: &Chess, depth: u32, multipv: usize) -> Result<Vec<RawLine>, EngineError> {
        if multipv != self.multipv {
            self.send(&GuiCommand::set_option("MultiPV", multipv))?;
            self.multipv = multipv;
        }
        self.send(&GuiCommand::Position {
            fen: Some(fen_of(pos)),
            moves: vec![],
        })?;
        self.send(&GuiCommand::Go(GoOptions::depth(depth)))?;

        // Deepest exact report per line index.
        let mut lines: BTreeMap<usize, EngineInfo> = BTreeMap::new();
        let mut lines_read = 0;
        let best_move = loop {
            if lines_read > MAX_UCI_LINES {
                return Err(EngineError::InvalidResponse(
                    "Too many lines without bestmove".to_string(),
                ));
            }
            lines_read += 1;
            match self.read()? {
                EngineMessage::Info(info) if info.is_line() => {
                    let index = info.multipv.unwrap_or(1);
                    let keep = match lines.get(&index) {
                        None => true,
                        Some(prev) => info.bound == ScoreBound::Exact || prev.bound != ScoreBound::Exact,
                    };
                    if keep {
                        lines.insert(index, info);
                    }
                }
                EngineMessage::BestMove { mv, .. } => break mv,
                _ => {}
            }
        };

        if let Some(top) = lines.values().next() {
            debug!(
                depth = top.depth,
                nodes = top.nodes,
                time_ms = top.time,
                lines = lines.len(),
                "search finished"
            );
        }
        if lines.is_empty() && best_move.is_some() {
            return Err(EngineError::InvalidResponse(
                "bestmove without any scored line".to_string(),
            ));
        }

        Ok(lines
            .into_iter()
            .map(|(multipv, info)| RawLine {
                multipv,
                depth: info.depth.unwrap_or(0),
                score: info.score.map(Evaluation::from_uci_score),
                pv: info.pv,
            })
            .collect())
    }

    fn new_game(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::UciNewGame)?;
        self.wait_ready()
    }

    fn quit(&mut self) {
        if self.quit_sent {
            return;
        }
        self.quit_sent = true;
        let _ = self.send(&GuiCommand::Quit);
        let _ = self.process.wait();
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        if !self.quit_sent {
            self.quit();
        }
    }
}

/// Serializes access to a single long-lived engine.
///
/// Each call holds the lock for its whole duration, so concurrent callers
/// queue up behind one another. After [`close`](Self::close) every request
/// fails with [`EngineError::Closed`].
pub struct EngineGateway {
    backend: Mutex<Option<Box<dyn AnalysisBackend>>>,
}

impl EngineGateway {
    pub fn new(backend: impl AnalysisBackend + 'static) -> Self {
        Self {
            backend: Mutex::new(Some(Box::new(backend))),
        }
    }

    /// A gateway without an engine. Every request fails with
    /// [`EngineError::Closed`].
    pub fn closed() -> Self {
        Self {
            backend: Mutex::new(None),
        }
    }

    /// Spawn a UCI engine and wrap it in a gateway.
    pub fn spawn(engine_path: &str, options: &EngineOptions) -> Result<Self, EngineError> {
        Ok(Self::new(UciEngine::new(engine_path, options)?))
    }

    /// Analyse `pos` to `depth`, returning up to `line_count` lines ordered by
    /// rank.
    ///
    /// Principal variations are truncated at the first move that is not
    /// legal in the running position.
    pub fn analyse(&self, pos: &Chess, depth: u32, line_count: usize) -> Result<Vec<AnalysisLine>, EngineError> {
        let line_count = line_count.max(1);
        let mut guard = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        let backend = guard.as_mut().ok_or(EngineError::Closed)?;

        let raw = backend.analyse(pos, depth, line_count).map_err(|e| {
            warn!(error = %e, depth, "engine analysis failed");
            e
        })?;

        let mut lines: Vec<AnalysisLine> = raw
            .into_iter()
            .map(|line| AnalysisLine {
                rank: line.multipv,
                depth: line.depth,
                score: line.score,
                pov: pos.turn(),
                pv: legal_prefix(pos, &line.pv),
            })
            .collect();
        lines.sort_by_key(|line| line.rank);
        lines.truncate(line_count);
        Ok(lines)
    }

    /// Reset engine state before a new game.
    pub fn new_game(&self) -> Result<(), EngineError> {
        let mut guard = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_mut().ok_or(EngineError::Closed)?.new_game()
    }

    /// Terminate the engine. Safe to call any number of times.
    pub fn close(&self) {
        let mut guard = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut backend) = guard.take() {
            backend.quit();
            info!("engine closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.backend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for EngineGateway {
    fn drop(&mut self) {
        self.close();
    }
}

/// Parse UCI moves in order, stopping at the first one that is not legal.
fn legal_prefix(pos: &Chess, pv: &[String]) -> Vec<shakmaty::Move> {
    let mut board = pos.clone();
    let mut moves = Vec::new();
    for token in pv {
        let mv = match token.parse::<UciMove>().ok().and_then(|uci| uci.to_move(&board).ok()) {
            Some(mv) => mv,
            None => break,
        };
        board.play_unchecked(mv);
        moves.push(mv);
    }
    moves
}
