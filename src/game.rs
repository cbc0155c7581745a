use crate::error::WhrError;
use crate::numerical::elo_to_natural;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Index into the registry's flat player store.
pub type PlayerId = usize;
/// Index into the registry's flat game store.
pub type GameId = usize;

/// Which color won. Draws are not part of the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Black,
    White,
}

impl FromStr for Winner {
    type Err = WhrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "B" | "b" => Ok(Winner::Black),
            "W" | "w" => Ok(Winner::White),
            other => Err(WhrError::Input(format!(
                "winner must be B or W, got {:?}",
                other
            ))),
        }
    }
}

/// One dated game result. Immutable once appended to the registry, and
/// referenced by both participants' day nodes through its [`GameId`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Game {
    pub black: PlayerId,
    pub white: PlayerId,
    pub winner: Winner,
    /// Day number, counted from an arbitrary origin; always >= 1.
    pub day: u32,
    /// Handicap in Elo points.
    pub handicap: f64,
}

impl Game {
    pub fn opponent(&self, player: PlayerId) -> PlayerId {
        if player == self.black {
            self.white
        } else {
            self.black
        }
    }

    pub fn won_by(&self, player: PlayerId) -> bool {
        match self.winner {
            Winner::Black => player == self.black,
            Winner::White => player == self.white,
        }
    }

    /// The opponent's effective natural rating for this game's likelihood
    /// terms: the handicap is folded in as a bonus on the opponent, the same
    /// way from either side. Not a probability model; queries that report
    /// win probabilities boost the white side once instead.
    pub fn adjusted_opponent_rating(&self, opponent_r: f64) -> f64 {
        opponent_r + elo_to_natural(self.handicap)
    }
}
