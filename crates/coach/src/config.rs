//! Configuration file loading for the coach.
//!
//! Settings live in `coach.toml`. Every section and field is optional; a
//! missing file means all defaults.

use chess_analysis::{AnalysisConfig, EngineOptions, SessionConfig, Thresholds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Values parsed but make no sense together.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// The `[engine]` section.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineSection {
    /// Engine executable. A bare name is looked up on PATH.
    pub path: String,
    pub threads: u32,
    pub hash_mb: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            path: "stockfish".to_string(),
            threads: 2,
            hash_mb: 256,
        }
    }
}

/// The `[analysis]` section.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AnalysisSection {
    pub depth: u32,
    pub multipv: usize,
    /// Full moves of each engine line in the log and report.
    pub pv_moves: usize,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        let defaults = AnalysisConfig::default();
        Self {
            depth: defaults.depth,
            multipv: defaults.multipv,
            pv_moves: defaults.pv_moves,
        }
    }
}

/// The `[session]` section.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionSection {
    /// Names the coached player appears under in game headers.
    pub player_names: Vec<String>,
    pub branch_min_fullmove: u32,
    pub branch_max_fullmove: u32,
    pub eval_depth: u32,
    pub eval_lines: usize,
    pub probe_depth: u32,
    pub probe_lines: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            player_names: defaults.player_names,
            branch_min_fullmove: defaults.branch_min_fullmove,
            branch_max_fullmove: defaults.branch_max_fullmove,
            eval_depth: defaults.eval_depth,
            eval_lines: defaults.eval_lines,
            probe_depth: defaults.probe_depth,
            probe_lines: defaults.probe_lines,
        }
    }
}

/// Main coach configuration structure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CoachConfig {
    pub engine: EngineSection,
    pub analysis: AnalysisSection,
    pub thresholds: Thresholds,
    pub session: SessionSection,
}

impl CoachConfig {
    /// Loads the configuration from `path`, or from [`Self::config_path()`]
    /// when no path is given.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file cannot be read,
    /// [`ConfigError::ParseError`] if it contains invalid TOML, or
    /// [`ConfigError::Invalid`] if the values are inconsistent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::parse(&std::fs::read_to_string(path)?)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::parse(&std::fs::read_to_string(&default_path)?)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Returns `coach.toml` in the current working directory.
    pub fn config_path() -> PathBuf {
        PathBuf::from("coach.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.depth == 0 || self.session.eval_depth == 0 || self.session.probe_depth == 0 {
            return Err(ConfigError::Invalid("depths must be at least 1".to_string()));
        }
        if self.analysis.multipv == 0 || self.session.eval_lines == 0 || self.session.probe_lines == 0 {
            return Err(ConfigError::Invalid("line counts must be at least 1".to_string()));
        }
        if self.session.branch_min_fullmove > self.session.branch_max_fullmove {
            return Err(ConfigError::Invalid(format!(
                "branch window {}..{} is empty",
                self.session.branch_min_fullmove, self.session.branch_max_fullmove
            )));
        }
        let t = &self.thresholds;
        if t.inaccuracy_cp > t.mistake_cp || t.mistake_cp > t.blunder_cp {
            return Err(ConfigError::Invalid(format!(
                "thresholds must satisfy inaccuracy_cp <= mistake_cp <= blunder_cp (got {} / {} / {})",
                t.inaccuracy_cp, t.mistake_cp, t.blunder_cp
            )));
        }
        if t.alternates_shown > 2 {
            return Err(ConfigError::Invalid(format!(
                "alternates_shown is at most 2 (got {})",
                t.alternates_shown
            )));
        }
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            threads: self.engine.threads,
            hash_mb: self.engine.hash_mb,
        }
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            depth: self.analysis.depth,
            multipv: self.analysis.multipv,
            pv_moves: self.analysis.pv_moves,
            thresholds: self.thresholds.clone(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            analysis: self.analysis_config(),
            player_names: self.session.player_names.clone(),
            branch_min_fullmove: self.session.branch_min_fullmove,
            branch_max_fullmove: self.session.branch_max_fullmove,
            eval_depth: self.session.eval_depth,
            eval_lines: self.session.eval_lines,
            probe_depth: self.session.probe_depth,
            probe_lines: self.session.probe_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[engine]
path = "/usr/bin/stockfish"
threads = 4
hash_mb = 512

[analysis]
depth = 20
multipv = 4
pv_moves = 3

[thresholds]
opening_grace_fullmoves = 8
blunder_cp = 250
alternates_shown = 1

[session]
player_names = ["Alice", "alice99"]
branch_min_fullmove = 3
branch_max_fullmove = 8
probe_depth = 26
"#;

        let config = CoachConfig::parse(toml_content).unwrap();
        assert_eq!(config.engine.path, "/usr/bin/stockfish");
        assert_eq!(config.engine_options().threads, 4);
        assert_eq!(config.engine_options().hash_mb, 512);

        let analysis = config.analysis_config();
        assert_eq!(analysis.depth, 20);
        assert_eq!(analysis.multipv, 4);
        assert_eq!(analysis.pv_moves, 3);
        assert_eq!(analysis.thresholds.opening_grace_fullmoves, 8);
        assert_eq!(analysis.thresholds.blunder_cp, 250);
        // Unset thresholds keep their defaults.
        assert_eq!(analysis.thresholds.mistake_cp, 150);
        assert_eq!(analysis.thresholds.alternates(), 1);

        let session = config.session_config();
        assert_eq!(session.player_names, vec!["Alice", "alice99"]);
        assert_eq!(session.branch_min_fullmove, 3);
        assert_eq!(session.branch_max_fullmove, 8);
        assert_eq!(session.probe_depth, 26);
        assert_eq!(session.eval_lines, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_defaults() {
        let config = CoachConfig::parse("").unwrap();
        assert_eq!(config, CoachConfig::default());
        assert_eq!(config.engine.path, "stockfish");
        assert_eq!(config.analysis.depth, 18);
        assert_eq!(config.analysis.multipv, 3);
        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.session.branch_min_fullmove, 4);
        assert_eq!(config.session.branch_max_fullmove, 6);
    }

    #[test]
    fn test_parse_error() {
        let result = CoachConfig::parse("[engine]\nthreads = \"many\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_empty_branch_window() {
        let config = CoachConfig::parse("[session]\nbranch_min_fullmove = 9\nbranch_max_fullmove = 4\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("9..4"));
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let config = CoachConfig::parse("[analysis]\ndepth = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_unordered_thresholds() {
        let config = CoachConfig::parse("[thresholds]\ninaccuracy_cp = 200\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(ref msg)) if msg.contains("inaccuracy_cp")));

        let config = CoachConfig::parse("[thresholds]\nmistake_cp = 400\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = CoachConfig::parse("[thresholds]\ninaccuracy_cp = 150\nmistake_cp = 150\nblunder_cp = 150\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_too_many_alternates() {
        let config = CoachConfig::parse("[thresholds]\nalternates_shown = 3\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(ref msg)) if msg.contains("alternates_shown")));

        let config = CoachConfig::parse("[thresholds]\nalternates_shown = 2\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coach.toml");
        std::fs::write(&path, "[analysis]\ndepth = 12\n").unwrap();

        let config = CoachConfig::load(Some(&path)).unwrap();
        assert_eq!(config.analysis.depth, 12);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = CoachConfig::load(Some(&dir.path().join("missing.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_config_path_returns_expected_path() {
        assert_eq!(CoachConfig::config_path(), PathBuf::from("coach.toml"));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = CoachConfig::default();
        config.session.player_names = vec!["Bob".to_string()];
        config.thresholds.decisive_cp = 800;

        let serialized = toml::to_string(&config).unwrap();
        let deserialized = CoachConfig::parse(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }
}
