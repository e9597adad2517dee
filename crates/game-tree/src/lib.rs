//! Branching chess game tree.
//!
//! A parsed game is stored as an arena of [`MoveNode`]s addressed by
//! [`NodeId`]. Every node records the move that produced it, the resulting
//! position, its comment and NAGs, and an ordered list of child variations
//! (index 0 is the mainline continuation).
//!
//! # Overview
//!
//! - [`GameTree`] - The arena, headers and branch-point discovery
//! - [`pgn`] - Reading PGN into a tree and writing a tree back out
//! - [`notation`] - SAN/UCI helpers and move-sequence application
//! - [`Navigator`] - Mainline cursor used by an interactive session
//!
//! # Example
//!
//! ```ignore
//! use game_tree::{pgn, Navigator};
//!
//! let tree = pgn::read_pgn(&text)?;
//! let mut nav = Navigator::new(tree, &["Magnus".to_string()]);
//! let branch = nav.advance_to_first_branch(4, 6);
//! println!("branch at ply {}: {:?}", branch.ply, branch.alternatives);
//! ```

pub mod navigator;
pub mod notation;
pub mod pgn;
pub mod tree;

pub use navigator::{detect_user_side, CursorStatus, GamePhase, Navigator, SessionCursor};
pub use notation::{apply_sequence, notation_matches, san_of};
pub use tree::{BranchKind, BranchPoint, GameTree, MoveNode, Nag, NodeId};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The PGN text could not be turned into a game.
    #[error("Bad game record: {0}")]
    BadRecord(String),
    /// A notation or ply lookup found nothing.
    #[error("Not found: {0}")]
    NotFound(String),
    /// A hypothetical move sequence failed to parse or apply.
    #[error("Invalid variation at '{token}': {reason}")]
    InvalidVariation { token: String, reason: String },
}
