//! Leaderboard views over a converged [`Base`].

use crate::base::{Base, RatingPoint};
use crate::player_day::PlayerDay;
use rayon::prelude::*;
use serde::Serialize;

/// One player's row in the ordered-ratings listing.
#[derive(Clone, Debug, Serialize)]
pub struct OrderedRating {
    pub name: String,
    /// Day-ordered history; a single entry when only current ratings were
    /// requested.
    pub ratings: Vec<RatingPoint>,
}

impl Base {
    /// Players sorted by most-recent Elo descending, ties broken by name
    /// ascending. `current` keeps only each player's latest day; `compact`
    /// skips the uncertainty computation. Players without any recorded day
    /// are omitted.
    ///
    /// Computing every player's variances is the expensive part, so it runs
    /// one player per rayon task; each task only reads the registry.
    pub fn get_ordered_ratings(&self, current: bool, compact: bool) -> Vec<OrderedRating> {
        let mut rows: Vec<OrderedRating> = (0..self.players().len())
            .into_par_iter()
            .filter_map(|id| {
                let player = &self.players()[id];
                player.latest_day()?;
                let uncertainties: Vec<Option<f64>> = if compact {
                    vec![None; player.days.len()]
                } else {
                    player
                        .variances(&self.day_terms(id))
                        .into_iter()
                        .map(|v| Some(PlayerDay::uncertainty(v)))
                        .collect()
                };
                let mut ratings: Vec<RatingPoint> = player
                    .days
                    .iter()
                    .zip(uncertainties)
                    .map(|(day, uncertainty)| RatingPoint {
                        day: day.day,
                        elo: day.elo(),
                        uncertainty,
                    })
                    .collect();
                if current {
                    ratings.drain(..ratings.len() - 1);
                }
                Some(OrderedRating {
                    name: player.name.clone(),
                    ratings,
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            let elo_a = a.ratings.last().map_or(f64::NEG_INFINITY, |p| p.elo);
            let elo_b = b.ratings.last().map_or(f64::NEG_INFINITY, |p| p.elo);
            elo_b
                .partial_cmp(&elo_a)
                .expect("NaN is unordered")
                .then_with(|| a.name.cmp(&b.name))
        });
        rows
    }
}
