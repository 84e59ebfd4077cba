//! Rich diagnostic error types for cubecalc.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Expected-empty outcomes (no want groups,
//! no line table for a mechanism) are not errors and never show up here.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for cubecalc.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum CalcError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Want(#[from] WantError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Want expression errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum WantError {
    #[error("unknown combinator operator: {token}")]
    #[diagnostic(
        code(cubecalc::want::unknown_operator),
        help("Valid operators are `or` (1) and `and` (2).")
    )]
    UnknownOperator { token: String },

    #[error("unknown {kind}: {token}")]
    #[diagnostic(
        code(cubecalc::want::unknown_name),
        help("Names are matched case-insensitively. Run `cubecalc tables` to list known lines.")
    )]
    UnknownName { kind: &'static str, token: String },

    #[error("malformed want expression: {message}")]
    #[diagnostic(
        code(cubecalc::want::malformed),
        help("`set wants` takes the JSON form of a want expression, as written by `save`.")
    )]
    Malformed { message: String },
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum SessionError {
    #[error("no matching result for session {session}")]
    #[diagnostic(
        code(cubecalc::session::no_result),
        help("Run `calc` on this session with a non-empty want expression before reading matches.")
    )]
    NoResult { session: i64 },
}

// ---------------------------------------------------------------------------
// Snapshot errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SnapshotError {
    #[error("failed to read session snapshot: {path}")]
    #[diagnostic(
        code(cubecalc::snapshot::read),
        help("Ensure the snapshot file exists.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write session snapshot: {path}")]
    #[diagnostic(
        code(cubecalc::snapshot::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode session snapshot: {path}")]
    #[diagnostic(
        code(cubecalc::snapshot::decode),
        help("Snapshots are JSON files written by `save`.")
    )]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode session snapshot: {path}")]
    #[diagnostic(code(cubecalc::snapshot::encode))]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Line data errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DataError {
    #[error("failed to read line data: {path}")]
    #[diagnostic(
        code(cubecalc::data::read),
        help("Check the `lines` path in your config file.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse line data {path}: {message}")]
    #[diagnostic(
        code(cubecalc::data::parse),
        help("Line data files are TOML (`.toml`) or JSON (`.json`) lists of `[[table]]` entries.")
    )]
    Parse { path: String, message: String },

    #[error("invalid line row in table \"{table}\": {message}")]
    #[diagnostic(
        code(cubecalc::data::invalid_row),
        help("Every table needs a non-empty `cubes` set and every row a positive `one_in`.")
    )]
    InvalidRow { table: String, message: String },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("too many combinations: {count} exceeds the limit of {limit}")]
    #[diagnostic(
        code(cubecalc::engine::too_many_combos),
        help(
            "The want expression references too many distinct lines for this mechanism. \
             Raise `max_combos` in the config file or narrow the query."
        )
    )]
    TooManyCombos { count: u64, limit: usize },

    #[error("inconsistent line data: {message}")]
    #[diagnostic(
        code(cubecalc::engine::inconsistent_data),
        help("The line table produced probabilities outside [0, 1]. Check the `one_in` values.")
    )]
    InconsistentData { message: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(cubecalc::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(cubecalc::config::parse),
        help("Check the TOML syntax in the config file. {message}")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(cubecalc::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type CalcResult<T> = std::result::Result<T, CalcError>;
