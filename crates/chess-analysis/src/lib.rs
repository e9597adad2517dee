//! Engine-backed move quality classification and game annotation.
//!
//! This crate drives a UCI engine over a loaded [`game_tree::GameTree`]:
//! it normalizes engine scores, judges each played move against the
//! engine's alternatives and writes the verdicts back out as an annotated
//! game, a JSONL log and a Markdown report.
//!
//! # Overview
//!
//! - [`EngineGateway`] - Serialized access to one long-lived engine process
//! - [`Evaluation`] and [`to_centipawns`] - Perspective-correct scores
//! - [`classify`] - Centipawn loss, severity marks and equal alternatives
//! - [`GameAnalyzer`] - Batch pass over a game's mainline
//! - [`DeepProbe`] - Iterative deepening on a hypothetical line
//! - [`AnnotatedExporter`] - Annotated copy of an analysed game
//! - [`CoachSession`] - Navigation plus engine queries for one game
//!
//! # Example
//!
//! ```ignore
//! use chess_analysis::{AnalysisConfig, CancelToken, EngineGateway, EngineOptions, GameAnalyzer};
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(EngineGateway::spawn("stockfish", &EngineOptions::default())?);
//! let analyzer = GameAnalyzer::new(gateway, AnalysisConfig::default());
//! let review = analyzer.analyze_game(&tree, &CancelToken::new(), |p| println!("{}/{}", p.done, p.total));
//! review.write_jsonl("game.jsonl", 5)?;
//! ```

pub mod analyzer;
pub mod engine;
pub mod evaluation;
pub mod export;
pub mod line;
pub mod probe;
pub mod quality;
pub mod report;
pub mod session;

pub use analyzer::{
    find_record, read_jsonl, AnalysisConfig, AnalysisProgress, CancelToken, GameAnalyzer, GameReview, LineRecord,
    LogError, PlyAnalysis, PlyRecord,
};
pub use engine::{AnalysisBackend, EngineError, EngineGateway, EngineOptions, RawLine, UciEngine};
pub use evaluation::{format_cp, format_eval, to_centipawns, Evaluation, MATE_SCORE_CP};
pub use export::AnnotatedExporter;
pub use line::AnalysisLine;
pub use probe::{DeepProbe, ProbeError, ProbeProgress, ProbeResult};
pub use quality::{classify, Classification, MistakeVerdict, Severity, Thresholds};
pub use report::{critical_moments, render_markdown};
pub use session::{BestMove, CoachSession, EvalLine, QuickEval, SessionConfig};
