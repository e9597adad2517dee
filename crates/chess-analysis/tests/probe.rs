//! Deep probe tests against a scripted engine.

mod common;

use chess_analysis::{CancelToken, DeepProbe, ProbeError};
use common::{pos, ScriptedEngine};
use game_tree::notation::fen_of;
use game_tree::TreeError;
use shakmaty::Chess;

#[test]
fn test_iterates_from_ten_to_target() {
    let engine = ScriptedEngine::new().with(&pos("Nf3 Nc6 e4"), &[(-25, "e5 d4"), (-40, "d6")]);
    let requests = engine.requests();
    let probe = DeepProbe::new(engine.into_gateway());

    let mut progress = Vec::new();
    let result = probe
        .analyze_hypothetical(&Chess::default(), "Nf3 Nc6 e4", 13, 2, &CancelToken::new(), |p| {
            progress.push(p.clone())
        })
        .unwrap();

    let depths: Vec<u32> = progress.iter().map(|p| p.depth).collect();
    assert_eq!(depths, vec![10, 11, 12, 13]);
    assert!(progress.iter().all(|p| p.target_depth == 13));
    assert_eq!(progress[0].eval, "+0.25");
    assert_eq!(progress[0].pv, vec!["e5", "d4"]);

    assert_eq!(result.depth_reached, 13);
    assert_eq!(result.lines.len(), 2);
    assert_eq!(result.lines[0].depth, 13);
    assert_eq!(result.sans, vec!["Nf3", "Nc6", "e4"]);
    assert_eq!(fen_of(&result.position), fen_of(&pos("Nf3 Nc6 e4")));

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 4);
    assert!(requests.iter().all(|r| r.multipv == 2));
}

#[test]
fn test_shallow_target_runs_once() {
    let engine = ScriptedEngine::new();
    let requests = engine.requests();
    let probe = DeepProbe::new(engine.into_gateway());

    let result = probe
        .analyze_hypothetical(&Chess::default(), "", 6, 1, &CancelToken::new(), |_| {})
        .unwrap();
    assert_eq!(result.depth_reached, 6);
    assert!(result.moves.is_empty());
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[test]
fn test_tolerant_notation() {
    let probe = DeepProbe::new(ScriptedEngine::new().into_gateway());
    let result = probe
        .analyze_hypothetical(&Chess::default(), "1. e4, e7e5 2. Nf3 …Nc6", 10, 1, &CancelToken::new(), |_| {})
        .unwrap();
    assert_eq!(result.sans, vec!["e4", "e5", "Nf3", "Nc6"]);
}

#[test]
fn test_invalid_variation_never_reaches_engine() {
    let engine = ScriptedEngine::new();
    let requests = engine.requests();
    let probe = DeepProbe::new(engine.into_gateway());
    let start = Chess::default();

    let err = probe
        .analyze_hypothetical(&start, "e4 badtoken", 12, 2, &CancelToken::new(), |_| {})
        .unwrap_err();
    match err {
        ProbeError::InvalidVariation(TreeError::InvalidVariation { token, .. }) => assert_eq!(token, "badtoken"),
        other => panic!("expected invalid variation, got {:?}", other),
    }
    assert!(requests.lock().unwrap().is_empty());
    assert_eq!(fen_of(&start), fen_of(&Chess::default()));
}

#[test]
fn test_cancel_keeps_last_completed_depth() {
    let probe = DeepProbe::new(ScriptedEngine::new().with(&pos("d4"), &[(-20, "d5")]).into_gateway());
    let cancel = CancelToken::new();

    let result = probe
        .analyze_hypothetical(&Chess::default(), "d4", 20, 1, &cancel, |p| {
            if p.depth == 11 {
                cancel.cancel();
            }
        })
        .unwrap();
    assert!(result.cancelled);
    assert_eq!(result.depth_reached, 11);
    assert_eq!(result.lines.len(), 1);
}

#[test]
fn test_engine_failure_is_reported() {
    let probe = DeepProbe::new(ScriptedEngine::new().strict().into_gateway());
    let err = probe
        .analyze_hypothetical(&Chess::default(), "e4", 12, 1, &CancelToken::new(), |_| {})
        .unwrap_err();
    assert!(matches!(err, ProbeError::Engine(_)));
}
