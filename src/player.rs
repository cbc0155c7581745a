use crate::error::WhrError;
use crate::game::GameId;
use crate::numerical::{
    solve_tridiagonal, tridiagonal_inverse_diagonal, DIAGONAL_DAMPING,
};
use crate::player_day::{GameTerm, PlayerDay};
use serde::{Deserialize, Serialize};

/// Sanity bound on |r| (roughly 8700 Elo). A Newton step landing outside it
/// means the likelihood assembly diverged, so the driver halts.
const MAX_ABS_RATING: f64 = 50.0;

/// One player: a canonical name plus the day-ordered sequence of latent
/// rating nodes. The Wiener prior between consecutive nodes lives here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    /// Wiener variance per day, natural scale.
    w2: f64,
    /// Strictly increasing by day.
    pub days: Vec<PlayerDay>,
}

impl Player {
    pub(crate) fn new(name: String, w2_natural: f64) -> Self {
        Self {
            name,
            w2: w2_natural,
            days: Vec::new(),
        }
    }

    pub fn day_index(&self, day: u32) -> Option<usize> {
        self.days.binary_search_by_key(&day, |d| d.day).ok()
    }

    pub fn rating_on(&self, day: u32) -> Option<f64> {
        self.day_index(day).map(|i| self.days[i].r)
    }

    pub fn latest_day(&self) -> Option<&PlayerDay> {
        self.days.last()
    }

    /// Locates or creates the node for `day`, keeping the day list sorted
    /// and unique, and records the game on it. A fresh node seeds its rating
    /// from the chronologically closest existing neighbor.
    pub(crate) fn add_game(&mut self, day: u32, game: GameId) {
        match self.days.binary_search_by_key(&day, |d| d.day) {
            Ok(i) => self.days[i].games.push(game),
            Err(i) => {
                let seed = if i > 0 {
                    self.days[i - 1].r
                } else {
                    self.days.first().map_or(0.0, |next| next.r)
                };
                let mut node = PlayerDay::new(day, seed);
                node.games.push(game);
                self.days.insert(i, node);
            }
        }
    }

    /// Precision of each Wiener prior edge: `a_i = 1 / (w2 * delta_days)`.
    /// A history with n days has exactly n - 1 edges.
    fn edge_precisions(&self) -> Vec<f64> {
        self.days
            .windows(2)
            .map(|w| 1.0 / (self.w2 * f64::from(w[1].day - w[0].day)))
            .collect()
    }

    /// Gradient and tridiagonal Hessian of the negative log posterior of
    /// this player's rating vector, with opponents held fixed.
    fn build_system(&self, terms: &[Vec<GameTerm>]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let n = self.days.len();
        let a = self.edge_precisions();
        let mut diag = Vec::with_capacity(n);
        let mut grad = Vec::with_capacity(n);
        for (i, day) in self.days.iter().enumerate() {
            let mut h = day.likelihood_curvature(&terms[i]) + DIAGONAL_DAMPING;
            let mut g = day.likelihood_gradient(&terms[i]);
            if i > 0 {
                h += a[i - 1];
                g += a[i - 1] * (day.r - self.days[i - 1].r);
            }
            if i + 1 < n {
                h += a[i];
                g += a[i] * (day.r - self.days[i + 1].r);
            }
            diag.push(h);
            grad.push(g);
        }
        let off = a.iter().map(|&x| -x).collect();
        (diag, off, grad)
    }

    /// One Newton-Raphson step on this player's ratings. `terms` must be
    /// freshly built against current opponent ratings, one entry per day.
    pub(crate) fn newton_update(&mut self, terms: &[Vec<GameTerm>]) -> Result<(), WhrError> {
        match self.days.len() {
            0 => return Ok(()),
            1 => {
                // single-day history: the 1x1 step needs no factorization
                let day = &mut self.days[0];
                let g = day.likelihood_gradient(&terms[0]);
                let h = day.likelihood_curvature(&terms[0]) + DIAGONAL_DAMPING;
                day.r -= g / h;
            }
            _ => {
                let (diag, off, grad) = self.build_system(terms);
                let delta = solve_tridiagonal(&diag, &off, &grad);
                for (day, d) in self.days.iter_mut().zip(delta) {
                    day.r -= d;
                }
            }
        }
        self.check_sane()
    }

    fn check_sane(&self) -> Result<(), WhrError> {
        for day in &self.days {
            if !day.r.is_finite() || day.r.abs() > MAX_ABS_RATING {
                tracing::warn!(
                    "halting: rating of {} reached r = {} on day {}",
                    self.name,
                    day.r,
                    day.day
                );
                return Err(WhrError::NumericalFault {
                    player: self.name.clone(),
                    rating: day.r,
                });
            }
        }
        Ok(())
    }

    /// Laplace variances of this player's ratings: the diagonal of the
    /// inverse Hessian, via the tridiagonal two-pass recurrence.
    pub(crate) fn variances(&self, terms: &[Vec<GameTerm>]) -> Vec<f64> {
        match self.days.len() {
            0 => Vec::new(),
            1 => {
                let h = self.days[0].likelihood_curvature(&terms[0]) + DIAGONAL_DAMPING;
                vec![1.0 / h]
            }
            _ => {
                let (diag, off, _) = self.build_system(terms);
                tridiagonal_inverse_diagonal(&diag, &off)
            }
        }
    }

    /// Log posterior of this player's slice: observed outcomes plus the
    /// Wiener increment densities between consecutive days.
    pub(crate) fn log_likelihood(&self, terms: &[Vec<GameTerm>]) -> f64 {
        let mut total: f64 = self
            .days
            .iter()
            .zip(terms)
            .map(|(day, t)| day.log_likelihood(t))
            .sum();
        for (w, a) in self.days.windows(2).zip(self.edge_precisions()) {
            let dr = w[1].r - w[0].r;
            total -= 0.5 * (dr * dr * a + (std::f64::consts::TAU / a).ln());
        }
        total
    }
}
