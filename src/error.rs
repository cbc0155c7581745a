use thiserror::Error;

/// Errors surfaced by the rating engine. Nothing is retried internally;
/// input errors leave the registry unchanged apart from interned names.
#[derive(Error, Debug)]
pub enum WhrError {
    /// Malformed game, line, or configuration; the offending item was not created.
    #[error("invalid input: {0}")]
    Input(String),

    /// A rating query named a player the registry has never seen.
    #[error("unknown player: {0}")]
    UnknownPlayer(String),

    /// A Newton sweep pushed a rating past the sanity bound; iteration halted.
    #[error("rating of {player} diverged to r = {rating}")]
    NumericalFault { player: String, rating: f64 },

    /// A saved base could not be read back, or failed its consistency checks.
    #[error("persistence failure: {0}")]
    Persistence(String),
}
