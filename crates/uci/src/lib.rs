//! UCI (Universal Chess Interface) protocol library, GUI side.
//!
//! This crate provides the commands a GUI sends to an analysis engine and
//! parsing for the messages the engine writes back.
//!
//! # Commands we send
//!
//! - `uci` / `uciok` - Handshake
//! - `setoption name <name> value <value>` - Engine options (Threads, Hash, MultiPV)
//! - `isready` / `readyok` - Synchronization
//! - `ucinewgame` - Reset engine state between games
//! - `position fen <fen> [moves <move>...]` - Set position
//! - `go depth <d>` - Start search
//! - `quit`
//!
//! # Messages we read
//!
//! - `id name|author ...`
//! - `info ... multipv <k> score cp|mate <x> ... pv <moves>`
//! - `bestmove <move> [ponder <move>]`

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{EngineInfo, Score, ScoreBound};

use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Best move found. `None` when the position has no legal moves.
    BestMove { mv: Option<String>, ponder: Option<String> },
    /// Anything we do not interpret (option lists, copyright banners).
    Other(String),
}

impl EngineMessage {
    /// Parse one line of engine output.
    pub fn parse(line: &str) -> Result<Self, UciError> {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next().unwrap_or("") {
            "uciok" => Ok(EngineMessage::UciOk),
            "readyok" => Ok(EngineMessage::ReadyOk),
            "info" => EngineInfo::parse(line)
                .map(EngineMessage::Info)
                .ok_or_else(|| UciError::InvalidMessage(line.to_string())),
            "bestmove" => {
                let mv = match parts.next() {
                    Some("(none)") | Some("0000") => None,
                    Some(mv) => Some(mv.to_string()),
                    None => {
                        return Err(UciError::ParseError(
                            "bestmove without a move".to_string(),
                        ))
                    }
                };
                let ponder = match parts.next() {
                    Some("ponder") => parts.next().map(str::to_string),
                    _ => None,
                };
                Ok(EngineMessage::BestMove { mv, ponder })
            }
            "id" => {
                let rest: Vec<&str> = parts.collect();
                match rest.split_first() {
                    Some((&"name", value)) => Ok(EngineMessage::Id {
                        name: Some(value.join(" ")),
                        author: None,
                    }),
                    Some((&"author", value)) => Ok(EngineMessage::Id {
                        name: None,
                        author: Some(value.join(" ")),
                    }),
                    _ => Ok(EngineMessage::Other(line.to_string())),
                }
            }
            _ => Ok(EngineMessage::Other(line.to_string())),
        }
    }
}

/// Line-oriented UCI connection to an engine.
pub struct UciConnection<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> UciConnection<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Send a command to the engine.
    pub fn send(&mut self, cmd: &GuiCommand) -> Result<(), UciError> {
        writeln!(self.writer, "{}", cmd.to_uci())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Read and parse the next message. Returns `None` when the engine closed
    /// its output.
    pub fn read_message(&mut self) -> Result<Option<EngineMessage>, UciError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        EngineMessage::parse(&line).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_bestmove_with_ponder() {
        let msg = EngineMessage::parse("bestmove e2e4 ponder e7e5").unwrap();
        assert_eq!(
            msg,
            EngineMessage::BestMove {
                mv: Some("e2e4".to_string()),
                ponder: Some("e7e5".to_string()),
            }
        );
    }

    #[test]
    fn parse_bestmove_none() {
        let msg = EngineMessage::parse("bestmove (none)").unwrap();
        assert_eq!(msg, EngineMessage::BestMove { mv: None, ponder: None });
    }

    #[test]
    fn parse_bare_bestmove_is_error() {
        assert!(EngineMessage::parse("bestmove").is_err());
    }

    #[test]
    fn parse_id_name() {
        let msg = EngineMessage::parse("id name Stockfish 17").unwrap();
        assert_eq!(
            msg,
            EngineMessage::Id { name: Some("Stockfish 17".to_string()), author: None }
        );
    }

    #[test]
    fn unknown_lines_are_other() {
        let msg = EngineMessage::parse("option name Hash type spin default 16").unwrap();
        assert!(matches!(msg, EngineMessage::Other(_)));
    }

    #[test]
    fn connection_round_trip() {
        let input = Cursor::new("uciok\nreadyok\n");
        let mut output = Vec::new();
        {
            let mut conn = UciConnection::new(input, &mut output);
            conn.send(&GuiCommand::Uci).unwrap();
            assert_eq!(conn.read_message().unwrap(), Some(EngineMessage::UciOk));
            assert_eq!(conn.read_message().unwrap(), Some(EngineMessage::ReadyOk));
            assert_eq!(conn.read_message().unwrap(), None);
        }
        assert_eq!(String::from_utf8(output).unwrap(), "uci\n");
    }
}
