//! Coach - reviews chess games with a UCI engine.
//!
//! `analyze` writes a JSONL log, a Markdown report and an annotated PGN for
//! a game. `what-if` probes a line from a logged position. `branch` and
//! `goto` inspect a game without an engine, and `session` opens an
//! interactive coaching prompt.

mod config;
mod repl;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chess_analysis::{
    find_record, read_jsonl, render_markdown, AnalysisProgress, AnnotatedExporter, CancelToken, CoachSession,
    DeepProbe, EngineGateway, GameAnalyzer, ProbeProgress,
};
use clap::{Parser, Subcommand};
use config::CoachConfig;
use game_tree::notation::parse_fen;
use game_tree::pgn::{read_pgn_file, write_pgn_file};
use game_tree::Navigator;
use serde::Serialize;
use shakmaty::Color;
use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "coach")]
#[command(about = "Chess game coach backed by a UCI engine")]
struct Cli {
    /// Configuration file (default: ./coach.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Engine executable, overriding the configuration
    #[arg(short, long, global = true)]
    engine: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Analyse every mainline move of a game
    Analyze {
        /// PGN file to analyse
        pgn: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "analysis_out")]
        out: PathBuf,
        /// Search depth
        #[arg(short, long)]
        depth: Option<u32>,
        /// Lines per position
        #[arg(short, long)]
        multipv: Option<usize>,
        /// Full moves of each line kept in the log and report
        #[arg(long)]
        pv_moves: Option<usize>,
    },
    /// Deep analysis of a hypothetical line from a logged position
    WhatIf {
        /// JSONL log written by `analyze`
        #[arg(short, long)]
        log: PathBuf,
        /// Ply whose pre-move position the line starts from
        #[arg(short, long)]
        ply: usize,
        /// Moves to play, e.g. "2... Nc6 3. Bb5"
        line: String,
        /// Target depth
        #[arg(short, long)]
        depth: Option<u32>,
        /// Lines to report
        #[arg(long)]
        lines: Option<usize>,
    },
    /// Show the first branch point of a game
    Branch {
        pgn: PathBuf,
        /// First full move of the preferred window
        #[arg(long)]
        min: Option<u32>,
        /// Last full move of the preferred window
        #[arg(long)]
        max: Option<u32>,
    },
    /// Show the position at a ply number or mainline move
    Goto {
        pgn: PathBuf,
        /// Ply number or SAN, e.g. 8 or O-O
        target: String,
    },
    /// Interactive coaching over a game
    Session { pgn: PathBuf },
}

/// Files written by `analyze`.
#[derive(Serialize, Debug)]
struct AnalyzeOutputs {
    jsonl: PathBuf,
    markdown: PathBuf,
    pgn: PathBuf,
    plies: usize,
    cancelled: bool,
}

#[derive(Serialize, Debug)]
struct ProbeLineOutput {
    rank: usize,
    eval: String,
    pv: String,
}

#[derive(Serialize, Debug)]
struct WhatIfOutput {
    ply: usize,
    fen: String,
    line: Vec<String>,
    depth: u32,
    cancelled: bool,
    lines: Vec<ProbeLineOutput>,
}

/// Plies of each line printed by `what-if`.
const WHAT_IF_PV_PLIES: usize = 12;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut config = CoachConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(engine) = cli.engine {
        config.engine.path = engine;
    }

    match cli.command {
        Commands::Analyze {
            pgn,
            out,
            depth,
            multipv,
            pv_moves,
        } => {
            if let Some(depth) = depth {
                config.analysis.depth = depth;
            }
            if let Some(multipv) = multipv {
                config.analysis.multipv = multipv;
            }
            if let Some(pv_moves) = pv_moves {
                config.analysis.pv_moves = pv_moves;
            }
            config.validate()?;
            analyze(&config, &pgn, &out).await
        }
        Commands::WhatIf {
            log,
            ply,
            line,
            depth,
            lines,
        } => {
            if let Some(depth) = depth {
                config.session.probe_depth = depth;
            }
            if let Some(lines) = lines {
                config.session.probe_lines = lines;
            }
            config.validate()?;
            what_if(&config, &log, ply, line).await
        }
        Commands::Branch { pgn, min, max } => {
            let tree = read_pgn_file(&pgn)?;
            let mut navigator = Navigator::new(tree, &config.session.player_names);
            let branch = navigator.advance_to_first_branch(
                min.unwrap_or(config.session.branch_min_fullmove),
                max.unwrap_or(config.session.branch_max_fullmove),
            );
            println!("{}", repl::format_branch(&branch));
            Ok(())
        }
        Commands::Goto { pgn, target } => {
            let tree = read_pgn_file(&pgn)?;
            let mut navigator = Navigator::new(tree, &config.session.player_names);
            let status = match target.parse::<usize>() {
                Ok(ply) => navigator.goto_ply(ply),
                Err(_) => navigator.goto_by_notation(&target)?,
            };
            println!("{}", repl::format_status(&status));
            println!("{}", status.fen);
            Ok(())
        }
        Commands::Session { pgn } => session(&config, &pgn).await,
    }
}

/// Starts the engine off the async runtime.
async fn spawn_engine(config: &CoachConfig) -> anyhow::Result<Arc<EngineGateway>> {
    let path = config.engine.path.clone();
    let options = config.engine_options();
    tracing::info!("Starting engine: {}", path);
    let gateway = tokio::task::spawn_blocking(move || EngineGateway::spawn(&path, &options)).await??;
    Ok(Arc::new(gateway))
}

/// Runs `job` on a blocking thread, forwarding its progress reports to
/// `on_progress`. Ctrl+C trips the job's cancel token.
async fn run_with_progress<T, P, J, F>(job: J, mut on_progress: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    P: Send + 'static,
    J: FnOnce(CancelToken, mpsc::UnboundedSender<P>) -> T + Send + 'static,
    F: FnMut(P),
{
    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, finishing the current step");
            interrupt.cancel();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::task::spawn_blocking(move || job(cancel, tx));
    while let Some(progress) = rx.recv().await {
        on_progress(progress);
    }
    let result = handle.await?;
    watcher.abort();
    Ok(result)
}

async fn analyze(config: &CoachConfig, pgn: &Path, out: &Path) -> anyhow::Result<()> {
    let tree = read_pgn_file(pgn).with_context(|| format!("reading {}", pgn.display()))?;
    let gateway = spawn_engine(config).await?;
    let analysis = config.analysis_config();
    let analyzer = GameAnalyzer::new(Arc::clone(&gateway), analysis.clone());

    let job_tree = tree.clone();
    let review = run_with_progress(
        move |cancel, tx| {
            analyzer.analyze_game(&job_tree, &cancel, |progress| {
                let _ = tx.send(progress);
            })
        },
        |p: AnalysisProgress| eprintln!("[{}/{}] {}", p.done, p.total, p.san),
    )
    .await?;
    gateway.close();

    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let stem = pgn
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "game".to_string());
    let outputs = AnalyzeOutputs {
        jsonl: out.join(format!("{}.jsonl", stem)),
        markdown: out.join(format!("{}.md", stem)),
        pgn: out.join(format!("{}_annotated.pgn", stem)),
        plies: review.plies.len(),
        cancelled: review.cancelled,
    };

    review.write_jsonl(&outputs.jsonl, analysis.pv_moves)?;
    std::fs::write(&outputs.markdown, render_markdown(&tree, &review, &analysis))?;
    let annotated = AnnotatedExporter::new(analysis.thresholds.clone()).export(&tree, &review);
    write_pgn_file(&outputs.pgn, &annotated)?;
    tracing::info!(plies = outputs.plies, cancelled = outputs.cancelled, "Analysis written");

    println!("{}", serde_json::to_string_pretty(&outputs)?);
    Ok(())
}

async fn what_if(config: &CoachConfig, log: &Path, ply: usize, line: String) -> anyhow::Result<()> {
    let records = read_jsonl(log).with_context(|| format!("reading {}", log.display()))?;
    let record = find_record(&records, ply)?;
    let before = parse_fen(&record.fen_before)?;
    let gateway = spawn_engine(config).await?;
    let probe = DeepProbe::new(Arc::clone(&gateway));
    let (depth, lines) = (config.session.probe_depth, config.session.probe_lines);

    let result = run_with_progress(
        move |cancel, tx| {
            probe.analyze_hypothetical(&before, &line, depth, lines, &cancel, |progress| {
                let _ = tx.send(progress.clone());
            })
        },
        |p: ProbeProgress| eprintln!("depth {}/{} {} {}", p.depth, p.target_depth, p.eval, p.pv.join(" ")),
    )
    .await??;
    gateway.close();

    let output = WhatIfOutput {
        ply,
        fen: record.fen_before.clone(),
        line: result.sans.clone(),
        depth: result.depth_reached,
        cancelled: result.cancelled,
        lines: result
            .lines
            .iter()
            .map(|l| ProbeLineOutput {
                rank: l.rank,
                eval: l.eval_label(Color::White),
                pv: l.numbered_pv(&result.position, WHAT_IF_PV_PLIES),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn session(config: &CoachConfig, pgn: &Path) -> anyhow::Result<()> {
    let tree = read_pgn_file(pgn).with_context(|| format!("reading {}", pgn.display()))?;
    let gateway = match spawn_engine(config).await {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::warn!("Engine unavailable, navigation only: {}", e);
            Arc::new(EngineGateway::closed())
        }
    };
    let mut coach = CoachSession::new(tree, Arc::clone(&gateway), config.session_config());

    // Ctrl+C stops a running what-if; with nothing running it leaves.
    let probe: repl::ProbeSlot = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&probe);
    tokio::spawn(async move {
        while signal::ctrl_c().await.is_ok() {
            let running = slot.lock().ok().and_then(|mut s| s.take());
            match running {
                Some(cancel) => cancel.cancel(),
                None => std::process::exit(130),
            }
        }
    });

    tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        repl::run(&mut coach, stdin.lock(), &mut stdout, &probe)
    })
    .await??;
    gateway.close();
    Ok(())
}
