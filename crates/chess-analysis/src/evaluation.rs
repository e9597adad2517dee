//! Chess position evaluation types and score normalization.
//!
//! Engines report scores relative to the side to move. Everything that needs
//! a score from a particular side's point of view goes through
//! [`to_centipawns`].

use serde::{Deserialize, Serialize};
use shakmaty::Color;

/// Magnitude used for a forced mate when a single centipawn number is needed.
pub const MATE_SCORE_CP: i32 = 100_000;

/// Represents a chess position evaluation, relative to the side to move.
///
/// Evaluations can be either centipawn scores (for normal positions)
/// or mate scores (when a forced mate is found).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Evaluation {
    /// Centipawn evaluation (positive = side to move is better)
    Centipawns(i32),
    /// Mate in N moves (positive = side to move mates, zero or negative = side to move is mated)
    Mate(i32),
}

impl Evaluation {
    pub fn from_uci_score(score: uci::Score) -> Self {
        match score {
            uci::Score::Cp(cp) => Evaluation::Centipawns(cp),
            uci::Score::Mate(m) => Evaluation::Mate(m),
        }
    }

    pub fn mate_distance(self) -> Option<i32> {
        match self {
            Evaluation::Mate(m) => Some(m),
            Evaluation::Centipawns(_) => None,
        }
    }
}

/// Convert a raw score into centipawns from `perspective`'s point of view.
///
/// `pov` is the side to move in the analysed position, which is the side the
/// raw score is relative to. A forced mate becomes [`MATE_SCORE_CP`] signed
/// for the mating side; a missing score is 0.
pub fn to_centipawns(raw: Option<Evaluation>, pov: Color, perspective: Color) -> i32 {
    let relative = match raw {
        Some(Evaluation::Centipawns(cp)) => cp,
        Some(Evaluation::Mate(m)) if m > 0 => MATE_SCORE_CP,
        Some(Evaluation::Mate(_)) => -MATE_SCORE_CP,
        None => 0,
    };
    if pov == perspective {
        relative
    } else {
        relative.saturating_neg()
    }
}

/// Forced-mate distance from `perspective`: positive when `perspective` mates.
pub fn mate_for(raw: Option<Evaluation>, pov: Color, perspective: Color) -> Option<i32> {
    let m = raw.and_then(Evaluation::mate_distance)?;
    if pov == perspective {
        Some(m)
    } else {
        Some(m.saturating_neg())
    }
}

/// Human-readable evaluation from `perspective`: `+0.35`, `-1.20`, `#3`, `#-2`.
pub fn format_eval(raw: Option<Evaluation>, pov: Color, perspective: Color) -> String {
    match raw {
        Some(Evaluation::Mate(m)) => {
            let mating_side_is_perspective = (m > 0) == (pov == perspective);
            let moves = m.unsigned_abs();
            if mating_side_is_perspective {
                format!("#{}", moves)
            } else {
                format!("#-{}", moves)
            }
        }
        _ => format_cp(to_centipawns(raw, pov, perspective)),
    }
}

/// Centipawns as signed pawns with two decimals.
pub fn format_cp(cp: i32) -> String {
    format!("{:+.2}", f64::from(cp) / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_centipawns_same_perspective() {
        let cp = to_centipawns(Some(Evaluation::Centipawns(35)), Color::White, Color::White);
        assert_eq!(cp, 35);
    }

    #[test]
    fn test_centipawns_rotated() {
        let cp = to_centipawns(Some(Evaluation::Centipawns(35)), Color::Black, Color::White);
        assert_eq!(cp, -35);
    }

    #[test]
    fn test_mate_sign() {
        assert_eq!(
            to_centipawns(Some(Evaluation::Mate(3)), Color::White, Color::White),
            MATE_SCORE_CP
        );
        assert_eq!(
            to_centipawns(Some(Evaluation::Mate(-2)), Color::White, Color::White),
            -MATE_SCORE_CP
        );
        assert_eq!(
            to_centipawns(Some(Evaluation::Mate(3)), Color::Black, Color::White),
            -MATE_SCORE_CP
        );
    }

    #[test]
    fn test_mated_side_to_move() {
        // mate 0: the side to move is already mated
        assert_eq!(
            to_centipawns(Some(Evaluation::Mate(0)), Color::Black, Color::Black),
            -MATE_SCORE_CP
        );
        assert_eq!(
            to_centipawns(Some(Evaluation::Mate(0)), Color::Black, Color::White),
            MATE_SCORE_CP
        );
    }

    #[test]
    fn test_missing_score_is_zero() {
        assert_eq!(to_centipawns(None, Color::White, Color::Black), 0);
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        assert_eq!(
            to_centipawns(Some(Evaluation::Centipawns(i32::MIN)), Color::White, Color::Black),
            i32::MAX
        );
        assert_eq!(mate_for(Some(Evaluation::Mate(i32::MIN)), Color::White, Color::Black), Some(i32::MAX));
    }

    #[test]
    fn test_format_eval() {
        assert_eq!(format_eval(Some(Evaluation::Centipawns(35)), Color::White, Color::White), "+0.35");
        assert_eq!(format_eval(Some(Evaluation::Centipawns(35)), Color::Black, Color::White), "-0.35");
        assert_eq!(format_eval(Some(Evaluation::Mate(3)), Color::Black, Color::White), "#-3");
        assert_eq!(format_eval(Some(Evaluation::Mate(-2)), Color::Black, Color::White), "#2");
        assert_eq!(format_eval(None, Color::White, Color::White), "+0.00");
    }

    #[test]
    fn test_mate_for() {
        assert_eq!(mate_for(Some(Evaluation::Mate(3)), Color::Black, Color::White), Some(-3));
        assert_eq!(mate_for(Some(Evaluation::Mate(3)), Color::Black, Color::Black), Some(3));
        assert_eq!(mate_for(Some(Evaluation::Centipawns(3)), Color::White, Color::White), None);
    }

    #[test]
    fn test_from_uci_score() {
        assert_eq!(Evaluation::from_uci_score(uci::Score::Cp(-12)), Evaluation::Centipawns(-12));
        assert_eq!(Evaluation::from_uci_score(uci::Score::Mate(4)).mate_distance(), Some(4));
    }

    fn any_color() -> impl Strategy<Value = Color> {
        prop_oneof![Just(Color::White), Just(Color::Black)]
    }

    fn any_evaluation() -> impl Strategy<Value = Option<Evaluation>> {
        prop_oneof![
            Just(None),
            any::<i32>().prop_map(|cp| Some(Evaluation::Centipawns(cp))),
            any::<i32>().prop_map(|m| Some(Evaluation::Mate(m))),
        ]
    }

    proptest! {
        #[test]
        fn prop_normalizer_is_total(raw in any_evaluation(), pov in any_color(), perspective in any_color()) {
            let cp = to_centipawns(raw, pov, perspective);
            if let Some(Evaluation::Mate(_)) = raw {
                prop_assert!(cp.abs() >= 10_000);
            }
            let _ = format_eval(raw, pov, perspective);
        }

        #[test]
        fn prop_rotation_is_antisymmetric(cp in -5_000i32..5_000, pov in any_color()) {
            let raw = Some(Evaluation::Centipawns(cp));
            prop_assert_eq!(
                to_centipawns(raw, pov, Color::White),
                -to_centipawns(raw, pov, Color::Black)
            );
        }
    }
}
