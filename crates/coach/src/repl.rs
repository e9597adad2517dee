//! Line-oriented coaching session over one game.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use chess_analysis::{CancelToken, CoachSession, PlyAnalysis, ProbeResult};
use game_tree::{BranchKind, BranchPoint, CursorStatus};
use shakmaty::Color;

/// Plies of each line printed for a what-if.
const WHAT_IF_PV_PLIES: usize = 12;

const HELP: &str = "\
commands:
  status | s         where the cursor is
  next | n           step forward one move
  back | b           step back one move
  goto <ply|move>    jump to a ply number or the first mainline move matching
  branch             jump to the first branch point
  eval               engine lines for the current position
  best               best move and equally good alternatives
  check              judge the next mainline move
  whatif <moves>     deep analysis of a line from the current position
  help               this text
  quit | q           leave the session";

/// The probe currently running, so an interrupt can stop it.
pub type ProbeSlot = Arc<Mutex<Option<CancelToken>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Next,
    Back,
    Goto(String),
    Branch,
    Eval,
    Best,
    Check,
    WhatIf(String),
    Help,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines give `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let command = match word.to_lowercase().as_str() {
            "status" | "s" => Command::Status,
            "next" | "n" => Command::Next,
            "back" | "b" => Command::Back,
            "goto" | "g" if !rest.is_empty() => Command::Goto(rest.to_string()),
            "goto" | "g" => return Err("usage: goto <ply|move>".to_string()),
            "branch" => Command::Branch,
            "eval" | "e" => Command::Eval,
            "best" => Command::Best,
            "check" | "c" => Command::Check,
            "whatif" | "w" if !rest.is_empty() => Command::WhatIf(rest.to_string()),
            "whatif" | "w" => return Err("usage: whatif <moves>".to_string()),
            "help" | "h" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

pub enum Outcome {
    Reply(String),
    Quit,
}

/// Runs one command against the session. `out` receives what-if progress
/// as it arrives.
pub fn execute<W: Write>(session: &mut CoachSession, command: Command, probe: &ProbeSlot, out: &mut W) -> Outcome {
    let reply = match command {
        Command::Status => format_status(&session.status()),
        Command::Next => format_status(&session.forward()),
        Command::Back => format_status(&session.back()),
        Command::Goto(target) => match goto(session, &target) {
            Ok(status) => format_status(&status),
            Err(e) => e,
        },
        Command::Branch => format_branch(&session.first_branch()),
        Command::Eval => match session.quick_eval() {
            Ok(eval) if eval.lines.is_empty() => "no legal moves".to_string(),
            Ok(eval) => eval
                .lines
                .iter()
                .map(|l| format!("{}) {}: {}", l.rank, l.eval, l.pv_san))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("engine unavailable: {}", e),
        },
        Command::Best => match session.best_and_alternatives() {
            Ok(best) if best.best.is_empty() => "no legal moves".to_string(),
            Ok(best) if best.equal_alternatives.is_empty() => format!("best: {}", best.best),
            Ok(best) => format!("best: {} (also fine: {})", best.best, best.equal_alternatives.join(", ")),
            Err(e) => format!("engine unavailable: {}", e),
        },
        Command::Check => match session.check_next_move() {
            Some(analysis) => format_check(&analysis),
            None => "no move to check: end of game".to_string(),
        },
        Command::WhatIf(line) => what_if(session, &line, probe, out),
        Command::Help => HELP.to_string(),
        Command::Quit => return Outcome::Quit,
    };
    Outcome::Reply(reply)
}

/// Reads commands from `input` until it ends or the user quits.
pub fn run<R: BufRead, W: Write>(
    session: &mut CoachSession,
    input: R,
    out: &mut W,
    probe: &ProbeSlot,
) -> std::io::Result<()> {
    writeln!(out, "{}", format_status(&session.status()))?;
    write!(out, "> ")?;
    out.flush()?;
    for line in input.lines() {
        match Command::parse(&line?) {
            Ok(Some(command)) => match execute(session, command, probe, out) {
                Outcome::Reply(reply) => writeln!(out, "{}", reply)?,
                Outcome::Quit => return Ok(()),
            },
            Ok(None) => {}
            Err(e) => writeln!(out, "{}", e)?,
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

fn goto(session: &mut CoachSession, target: &str) -> Result<CursorStatus, String> {
    if let Ok(ply) = target.parse::<usize>() {
        return Ok(session.goto_ply(ply));
    }
    session.goto_by_notation(target).map_err(|e| e.to_string())
}

fn what_if<W: Write>(session: &CoachSession, line: &str, probe: &ProbeSlot, out: &mut W) -> String {
    let cancel = CancelToken::new();
    if let Ok(mut slot) = probe.lock() {
        *slot = Some(cancel.clone());
    }
    let result = session.what_if(line, &cancel, |p| {
        let _ = writeln!(out, "  depth {}/{} {} {}", p.depth, p.target_depth, p.eval, p.pv.join(" "));
        let _ = out.flush();
    });
    if let Ok(mut slot) = probe.lock() {
        *slot = None;
    }
    match result {
        Ok(result) => format_probe(&result),
        Err(e) => e.to_string(),
    }
}

pub fn side_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}

pub fn format_status(status: &CursorStatus) -> String {
    let mut text = format!(
        "ply {}/{} (move {}, {} to move, {})",
        status.ply,
        status.moves_total,
        status.fullmove,
        side_name(status.turn),
        status.phase.as_str()
    );
    if let Some(side) = status.user_side {
        text.push_str(&format!(" | you: {}", side_name(side)));
    }
    match &status.next_move {
        Some(san) => text.push_str(&format!(" | next: {}", san)),
        None => text.push_str(" | end of game"),
    }
    text
}

pub fn format_branch(branch: &BranchPoint) -> String {
    if branch.kind == BranchKind::NoBranch {
        return "the game has no variations".to_string();
    }
    let kind = match branch.kind {
        BranchKind::InRange => "branch",
        _ => "earliest branch, outside the move window",
    };
    format!(
        "{} at move {} (ply {}): main {}, alternatives {}\npath: {}",
        kind,
        branch.fullmove,
        branch.ply,
        branch.mainline.as_deref().unwrap_or("-"),
        branch.alternatives.join(", "),
        branch.path.join(" ")
    )
}

fn format_check(analysis: &PlyAnalysis) -> String {
    if let Some(error) = &analysis.error {
        return format!("{}: skipped ({})", analysis.san, error);
    }
    let Some(c) = &analysis.classification else {
        return format!("{}: no verdict", analysis.san);
    };
    if c.in_opening {
        return format!("{}: opening move, not judged", analysis.san);
    }
    let v = &c.verdict;
    let mut text = format!("{}{} (CPL: {:+})", v.played, v.mark.symbol(), v.cpl);
    if !v.best.is_empty() && v.best != v.played {
        text.push_str(&format!(", best: {}", v.best));
    }
    if c.decisive {
        text.push_str(", position already decided");
    }
    text
}

fn format_probe(result: &ProbeResult) -> String {
    let mut text = format!(
        "after {}: depth {}{}",
        if result.sans.is_empty() {
            "the current position".to_string()
        } else {
            result.sans.join(" ")
        },
        result.depth_reached,
        if result.cancelled { " (interrupted)" } else { "" }
    );
    for line in &result.lines {
        text.push_str(&format!(
            "\n{}) {}: {}",
            line.rank,
            line.eval_label(Color::White),
            line.numbered_pv(&result.position, WHAT_IF_PV_PLIES)
        ));
    }
    text
}
