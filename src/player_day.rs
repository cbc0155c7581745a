use crate::game::GameId;
use crate::numerical::{log_sigmoid, natural_to_elo, sigmoid, MIN_CURVATURE};
use serde::{Deserialize, Serialize};

/// Precomputed likelihood inputs for one game, from the owning player's
/// perspective. Rebuilt from current opponent ratings before every solve.
#[derive(Clone, Copy, Debug)]
pub struct GameTerm {
    /// Opponent's natural rating on the game's day, handicap folded in.
    pub opponent_r: f64,
    /// Whether the owning player won.
    pub won: bool,
}

/// One latent rating variable: a (player, day) node. Created lazily on the
/// first game a player plays on that day.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerDay {
    pub day: u32,
    /// Natural rating; `gamma = exp(r)`.
    pub r: f64,
    /// Games this player played on this day.
    pub games: Vec<GameId>,
}

impl PlayerDay {
    pub(crate) fn new(day: u32, r: f64) -> Self {
        Self {
            day,
            r,
            games: Vec::new(),
        }
    }

    /// Bradley-Terry strength on this day.
    pub fn gamma(&self) -> f64 {
        self.r.exp()
    }

    pub fn elo(&self) -> f64 {
        natural_to_elo(self.r)
    }

    /// Display-scale uncertainty for a natural-rating variance, matching the
    /// convention of historical WHR tools: one hundred times the variance.
    pub fn uncertainty(variance: f64) -> f64 {
        100.0 * variance
    }

    /// Elo standard deviation for a natural-rating variance.
    pub fn uncertainty_elo(variance: f64) -> f64 {
        natural_to_elo(variance.sqrt())
    }

    /// d/dr of the negative log likelihood of this day's games: each game
    /// contributes `s - won`, where `s` is its predicted win probability.
    pub(crate) fn likelihood_gradient(&self, terms: &[GameTerm]) -> f64 {
        terms
            .iter()
            .map(|t| {
                let s = sigmoid(self.r - t.opponent_r);
                s - if t.won { 1.0 } else { 0.0 }
            })
            .sum()
    }

    /// d2/dr2 of the negative log likelihood: each game contributes
    /// `s(1 - s)`, floored so the total stays strictly positive.
    pub(crate) fn likelihood_curvature(&self, terms: &[GameTerm]) -> f64 {
        terms
            .iter()
            .map(|t| {
                let s = sigmoid(self.r - t.opponent_r);
                (s * (1.0 - s)).max(MIN_CURVATURE)
            })
            .sum()
    }

    /// Log probability of this day's observed outcomes under the current
    /// ratings.
    pub(crate) fn log_likelihood(&self, terms: &[GameTerm]) -> f64 {
        terms
            .iter()
            .map(|t| {
                let z = self.r - t.opponent_r;
                if t.won {
                    log_sigmoid(z)
                } else {
                    log_sigmoid(-z)
                }
            })
            .sum()
    }
}
