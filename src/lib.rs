pub mod config;
pub mod ema;
pub mod family;
pub mod ngrams;
pub mod network;
pub mod observations;
pub mod relationships;
pub mod scores;
pub mod table;
pub mod weights;

use thiserror::Error;

/// A mode flag given as a string (CLI or config) that names no known mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModeError {
    #[error("invalid color mode `{0}`: expected 'derivative' or 'model'")]
    Color(String),
    #[error("invalid compare mode `{0}`: expected 'd' for distance or 's' for similarity")]
    Compare(String),
    #[error("invalid interval kind `{0}`: expected 'time' or 'melodic'")]
    Interval(String),
}

/// Application name for XDG paths
pub const APP_NAME: &str = "crimviz";
