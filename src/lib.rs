//! Implementation of Rémi Coulom's Whole-History Rating system.
//!
//! See <https://www.remi-coulom.fr/WHR/WHR.pdf> for the original paper.
//!
//! Each player's skill is a latent time series: one natural rating `r` per
//! day on which they played, with `gamma = exp(r)` acting as a Bradley-Terry
//! strength. Consecutive days of the same player are coupled by a Wiener
//! prior whose variance grows linearly with the day gap, and every recorded
//! game contributes a Bradley-Terry likelihood term to both participants.
//! The posterior is maximized by Gauss-Seidel sweeps of per-player
//! Newton-Raphson steps, each of which solves a symmetric tridiagonal system
//! in `O(days)`. Day-level uncertainties come from the Laplace approximation,
//! reading the diagonal of the inverse tridiagonal Hessian.
//!
//! This implementation promises:
//!
//! - Ratings never become NaN: the logistic terms are evaluated in their
//!   numerically stable forms, and curvatures are floored away from zero.
//! - A sweep that pushes any rating past the sanity bound halts with
//!   [`WhrError::NumericalFault`] instead of iterating on garbage.
//! - Saving a [`Base`] and loading it back yields a byte-identical re-save
//!   and identical answers to every query.
//!
//! Ratings are estimated in batch: adding games and re-running
//! [`Base::auto_iterate`] re-sweeps the whole history.

pub mod base;
pub mod config;
pub mod error;
pub mod game;
pub mod numerical;
pub mod player;
pub mod player_day;
pub mod summary;

pub use base::{Base, ConvergenceReport, RatingPoint};
pub use config::WhrConfig;
pub use error::WhrError;
pub use game::{Game, GameId, PlayerId, Winner};
pub use player::Player;
pub use player_day::{GameTerm, PlayerDay};
pub use summary::OrderedRating;
