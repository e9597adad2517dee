//! `info` lines sent by the engine while it searches.

use serde::{Deserialize, Serialize};

/// Score relative to the side to move at the searched position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    Cp(i32),
    /// Moves to mate. Positive when the side to move mates, zero or negative
    /// when it is mated.
    Mate(i32),
}

/// Whether a reported score is exact or a search bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoreBound {
    #[default]
    Exact,
    Lower,
    Upper,
}

/// The parts of an `info` line an analysis client cares about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineInfo {
    pub depth: Option<u32>,
    /// 1-based line index when several lines are searched.
    pub multipv: Option<usize>,
    pub score: Option<Score>,
    pub bound: ScoreBound,
    pub nodes: Option<u64>,
    /// Milliseconds.
    pub time: Option<u64>,
    /// Principal variation in UCI long algebraic notation.
    pub pv: Vec<String>,
    pub currmove: Option<String>,
    pub string: Option<String>,
}

const KEYWORDS: &[&str] = &[
    "depth",
    "seldepth",
    "multipv",
    "score",
    "lowerbound",
    "upperbound",
    "nodes",
    "nps",
    "time",
    "pv",
    "currmove",
    "currmovenumber",
    "hashfull",
    "tbhits",
    "cpuload",
    "refutation",
    "currline",
    "string",
];

impl EngineInfo {
    /// True when this line reports a scored principal variation rather than
    /// search chatter.
    pub fn is_line(&self) -> bool {
        self.score.is_some() && self.currmove.is_none() && self.string.is_none()
    }

    /// Parses an `info` line. Unknown or malformed fields are skipped.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace().peekable();
        if tokens.next() != Some("info") {
            return None;
        }

        let mut info = EngineInfo::default();
        while let Some(keyword) = tokens.next() {
            match keyword {
                "depth" => info.depth = tokens.next().and_then(|t| t.parse().ok()),
                "multipv" => info.multipv = tokens.next().and_then(|t| t.parse().ok()),
                "nodes" => info.nodes = tokens.next().and_then(|t| t.parse().ok()),
                "time" => info.time = tokens.next().and_then(|t| t.parse().ok()),
                "currmove" => info.currmove = tokens.next().map(str::to_string),
                "score" => {
                    let kind = tokens.next();
                    let value = tokens.next().and_then(|t| t.parse().ok());
                    info.score = match kind {
                        Some("cp") => value.map(Score::Cp),
                        Some("mate") => value.map(Score::Mate),
                        _ => None,
                    };
                }
                "lowerbound" => info.bound = ScoreBound::Lower,
                "upperbound" => info.bound = ScoreBound::Upper,
                "pv" => {
                    while let Some(mv) = tokens.next_if(|t| !KEYWORDS.contains(t)) {
                        info.pv.push(mv.to_string());
                    }
                }
                "string" => {
                    info.string = Some(tokens.by_ref().collect::<Vec<_>>().join(" "));
                }
                // Fields with one value we do not keep.
                "seldepth" | "nps" | "currmovenumber" | "hashfull" | "tbhits" | "cpuload" => {
                    tokens.next();
                }
                _ => {}
            }
        }
        Some(info)
    }
}
