use crate::config::WhrConfig;
use crate::error::WhrError;
use crate::game::{Game, GameId, PlayerId, Winner};
use crate::numerical::{elo_to_natural, sigmoid};
use crate::player::Player;
use crate::player_day::{GameTerm, PlayerDay};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// A (day, rating, uncertainty) sample from one player's history. The
/// uncertainty is on the display scale of [`PlayerDay::uncertainty`] and is
/// omitted by compact queries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingPoint {
    pub day: u32,
    pub elo: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<f64>,
}

/// Outcome of [`Base::auto_iterate`].
#[derive(Clone, Copy, Debug)]
pub struct ConvergenceReport {
    /// Total sweeps performed.
    pub iterations: usize,
    /// Whether the precision target was met before the time limit.
    pub converged: bool,
    /// Largest |delta r| observed over the final batch.
    pub max_delta: f64,
}

/// The registry: owns every player, their day nodes, and the flat game
/// store, and drives the Newton sweeps. Multiple independent bases may
/// coexist; nothing is process-global.
///
/// Games are shared by exactly two day nodes, so they live in one
/// append-only store and day nodes hold indices into it.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Base {
    config: WhrConfig,
    players: Vec<Player>,
    games: Vec<Game>,
    /// Canonical name -> player index; rebuilt on load, never serialized.
    #[serde(skip)]
    names: HashMap<String, PlayerId>,
}

impl Base {
    pub fn new(config: WhrConfig) -> Self {
        Self {
            config,
            players: Vec::new(),
            games: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn config(&self) -> &WhrConfig {
        &self.config
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    fn canonical(&self, name: &str) -> String {
        let name = name.trim();
        if self.config.uncased {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    pub fn player_id(&self, name: &str) -> Option<PlayerId> {
        self.names.get(&self.canonical(name)).copied()
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.player_id(name).map(|id| &self.players[id])
    }

    fn intern(&mut self, name: &str) -> Result<PlayerId, WhrError> {
        let key = self.canonical(name);
        if key.is_empty() {
            return Err(WhrError::Input("player name is empty".to_string()));
        }
        if let Some(&id) = self.names.get(&key) {
            return Ok(id);
        }
        let id = self.players.len();
        self.players
            .push(Player::new(key.clone(), self.config.w2_natural()));
        self.names.insert(key, id);
        Ok(id)
    }

    /// Records one game, creating players and day nodes as needed. Returns
    /// the game's index in the flat store.
    pub fn create_game(
        &mut self,
        black: &str,
        white: &str,
        winner: Winner,
        day: u32,
        handicap: f64,
    ) -> Result<GameId, WhrError> {
        if day == 0 {
            return Err(WhrError::Input("day must be positive".to_string()));
        }
        let black_id = self.intern(black)?;
        let white_id = self.intern(white)?;
        if black_id == white_id {
            return Err(WhrError::Input(format!(
                "black and white are the same player: {:?}",
                self.players[black_id].name
            )));
        }
        let id = self.games.len();
        self.games.push(Game {
            black: black_id,
            white: white_id,
            winner,
            day,
            handicap,
        });
        self.players[black_id].add_game(day, id);
        self.players[white_id].add_game(day, id);
        Ok(id)
    }

    /// Loads many games from `BLACK S WHITE S WINNER S DAY [S HANDICAP [S EXTRAS]]`
    /// lines, where `S` is `separator`. A missing handicap defaults to 0; a
    /// lone fifth field that is not an integer is treated as opaque extras.
    pub fn load_games<I, S>(&mut self, lines: I, separator: char) -> Result<(), WhrError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for line in lines {
            self.load_game_line(line.as_ref(), separator)?;
            count += 1;
        }
        tracing::debug!("loaded {} games", count);
        Ok(())
    }

    fn load_game_line(&mut self, line: &str, separator: char) -> Result<GameId, WhrError> {
        let fields: Vec<&str> = line.split(separator).map(str::trim).collect();
        if fields.len() < 4 || fields.len() > 6 {
            return Err(WhrError::Input(format!(
                "bad game line {:?}: expected 4 to 6 fields",
                line
            )));
        }
        let winner = Winner::from_str(fields[2])?;
        let day: u32 = fields[3]
            .parse()
            .map_err(|_| WhrError::Input(format!("bad day in {:?}", line)))?;
        let mut handicap = 0.0;
        if let Some(field) = fields.get(4) {
            match field.parse::<i64>() {
                Ok(h) => handicap = h as f64,
                // with all six fields present the fifth must be the handicap
                Err(_) if fields.len() == 6 => {
                    return Err(WhrError::Input(format!("bad handicap in {:?}", line)));
                }
                Err(_) => {}
            }
        }
        self.create_game(fields[0], fields[1], winner, day, handicap)
    }

    /// Likelihood inputs for every day of one player, read from current
    /// opponent ratings. The first day carries a virtual win and a virtual
    /// loss against a reference opponent at r = 0, which anchors the
    /// posterior's otherwise-free global shift.
    pub(crate) fn day_terms(&self, player: PlayerId) -> Vec<Vec<GameTerm>> {
        let days = &self.players[player].days;
        let mut all = Vec::with_capacity(days.len());
        for (i, day) in days.iter().enumerate() {
            let mut terms = Vec::with_capacity(day.games.len() + 2);
            for &gid in &day.games {
                let game = &self.games[gid];
                let opponent = game.opponent(player);
                let opponent_r = self.players[opponent]
                    .rating_on(game.day)
                    .expect("opponent is missing the day node for a game it played");
                terms.push(GameTerm {
                    opponent_r: game.adjusted_opponent_rating(opponent_r),
                    won: game.won_by(player),
                });
            }
            if i == 0 {
                terms.push(GameTerm {
                    opponent_r: 0.0,
                    won: true,
                });
                terms.push(GameTerm {
                    opponent_r: 0.0,
                    won: false,
                });
            }
            all.push(terms);
        }
        all
    }

    /// One Gauss-Seidel sweep: every player gets one Newton step, reading
    /// opponents' ratings as already updated earlier in the same sweep.
    fn run_one_iteration(&mut self) -> Result<(), WhrError> {
        for id in 0..self.players.len() {
            let terms = self.day_terms(id);
            self.players[id].newton_update(&terms)?;
        }
        Ok(())
    }

    /// Performs `count` full sweeps.
    pub fn iterate(&mut self, count: usize) -> Result<(), WhrError> {
        for _ in 0..count {
            self.run_one_iteration()?;
        }
        Ok(())
    }

    /// Sweeps in batches of `batch_size` until the largest per-node rating
    /// change over a batch is at most `precision`, or until `time_limit`
    /// elapses. The clock is only checked between batches.
    pub fn auto_iterate(
        &mut self,
        time_limit: Option<Duration>,
        precision: f64,
        batch_size: usize,
    ) -> Result<ConvergenceReport, WhrError> {
        let batch_size = batch_size.max(1);
        let start = Instant::now();
        let mut iterations = 0;
        loop {
            let before = self.snapshot_ratings();
            self.iterate(batch_size)?;
            iterations += batch_size;
            let max_delta = self
                .snapshot_ratings()
                .iter()
                .zip(&before)
                .map(|(now, then)| (now - then).abs())
                .fold(0.0, f64::max);
            if max_delta <= precision {
                tracing::debug!(
                    "converged after {} sweeps, max |delta r| = {:.3e}",
                    iterations,
                    max_delta
                );
                return Ok(ConvergenceReport {
                    iterations,
                    converged: true,
                    max_delta,
                });
            }
            if let Some(limit) = time_limit {
                if start.elapsed() > limit {
                    tracing::warn!(
                        "time limit reached after {} sweeps, max |delta r| = {:.3e}",
                        iterations,
                        max_delta
                    );
                    return Ok(ConvergenceReport {
                        iterations,
                        converged: false,
                        max_delta,
                    });
                }
            }
        }
    }

    fn snapshot_ratings(&self) -> Vec<f64> {
        self.players
            .iter()
            .flat_map(|p| p.days.iter().map(|d| d.r))
            .collect()
    }

    /// Day-ordered `(day, elo, uncertainty)` triples for one player.
    /// Uncertainties are recomputed from the current ratings on every call.
    pub fn ratings_for_player(&self, name: &str) -> Result<Vec<RatingPoint>, WhrError> {
        let id = self
            .player_id(name)
            .ok_or_else(|| WhrError::UnknownPlayer(name.to_string()))?;
        let player = &self.players[id];
        let variances = player.variances(&self.day_terms(id));
        Ok(player
            .days
            .iter()
            .zip(variances)
            .map(|(day, v)| RatingPoint {
                day: day.day,
                elo: day.elo(),
                uncertainty: Some(PlayerDay::uncertainty(v)),
            })
            .collect())
    }

    /// Win probabilities `(p_black, p_white)` for a hypothetical game at the
    /// players' most recent ratings. Unknown or game-less players count as
    /// rating zero; the handicap boosts the white side. The pair sums to 1.
    pub fn probability_future_match(&self, black: &str, white: &str, handicap: f64) -> (f64, f64) {
        let gamma_black = self.latest_gamma(black);
        let gamma_white = self.latest_gamma(white) * 10f64.powf(handicap / 400.0);
        let total = gamma_black + gamma_white;
        (gamma_black / total, gamma_white / total)
    }

    fn latest_gamma(&self, name: &str) -> f64 {
        self.player(name)
            .and_then(Player::latest_day)
            .map_or(1.0, PlayerDay::gamma)
    }

    /// Model probability that the white side of a recorded game wins, under
    /// the current ratings. As in [`Base::probability_future_match`], the
    /// handicap boosts the white side once, so the two sides' probabilities
    /// sum to 1.
    pub fn white_win_probability(&self, game: GameId) -> f64 {
        let game = &self.games[game];
        let white_r = self.players[game.white]
            .rating_on(game.day)
            .expect("game participant is missing its day node");
        let black_r = self.players[game.black]
            .rating_on(game.day)
            .expect("game participant is missing its day node");
        sigmoid(white_r + elo_to_natural(game.handicap) - black_r)
    }

    /// Model probability that the black side of a recorded game wins;
    /// complementary to [`Base::white_win_probability`].
    pub fn black_win_probability(&self, game: GameId) -> f64 {
        1.0 - self.white_win_probability(game)
    }

    /// 1.0 when the model favored the observed winner, 0.0 when it favored
    /// the loser, 0.5 on a coin flip.
    pub fn prediction_score(&self, game: GameId) -> f64 {
        let p_white = self.white_win_probability(game);
        if p_white == 0.5 {
            return 0.5;
        }
        let predicted = if p_white > 0.5 {
            Winner::White
        } else {
            Winner::Black
        };
        if predicted == self.games[game].winner {
            1.0
        } else {
            0.0
        }
    }

    /// Total log posterior across all players; grows toward its maximum as
    /// the sweeps converge.
    pub fn log_likelihood(&self) -> f64 {
        (0..self.players.len())
            .map(|id| self.players[id].log_likelihood(&self.day_terms(id)))
            .sum()
    }

    /// Serializes the whole registry. Output is deterministic: players and
    /// games appear in creation order, so save -> load -> save round-trips
    /// byte for byte.
    pub fn to_json(&self) -> Result<String, WhrError> {
        serde_json::to_string_pretty(self).map_err(|e| WhrError::Persistence(e.to_string()))
    }

    /// Deserializes a registry and re-checks its structural invariants.
    pub fn from_json(text: &str) -> Result<Self, WhrError> {
        let mut base: Base =
            serde_json::from_str(text).map_err(|e| WhrError::Persistence(e.to_string()))?;
        base.rebuild_index()?;
        base.validate()?;
        Ok(base)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), WhrError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .map_err(|e| WhrError::Persistence(format!("cannot write {:?}: {}", path, e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WhrError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| WhrError::Persistence(format!("cannot read {:?}: {}", path, e)))?;
        let base = Self::from_json(&text)?;
        tracing::info!(
            "loaded base with {} players and {} games from {:?}",
            base.players.len(),
            base.games.len(),
            path
        );
        Ok(base)
    }

    fn rebuild_index(&mut self) -> Result<(), WhrError> {
        self.names.clear();
        for (id, player) in self.players.iter().enumerate() {
            if self.names.insert(player.name.clone(), id).is_some() {
                return Err(WhrError::Persistence(format!(
                    "duplicate player name {:?}",
                    player.name
                )));
            }
        }
        Ok(())
    }

    /// Structural invariants that must hold between sweeps: sorted unique
    /// day lists, finite ratings, and games cross-referenced by exactly the
    /// two day nodes they belong to.
    fn validate(&self) -> Result<(), WhrError> {
        for (id, player) in self.players.iter().enumerate() {
            for w in player.days.windows(2) {
                if w[0].day >= w[1].day {
                    return Err(WhrError::Persistence(format!(
                        "days out of order for {:?}",
                        player.name
                    )));
                }
            }
            for day in &player.days {
                if !day.r.is_finite() {
                    return Err(WhrError::Persistence(format!(
                        "non-finite rating for {:?} on day {}",
                        player.name, day.day
                    )));
                }
                if day.games.is_empty() {
                    return Err(WhrError::Persistence(format!(
                        "game-less day node {} for {:?}",
                        day.day, player.name
                    )));
                }
                for &gid in &day.games {
                    let game = self.games.get(gid).ok_or_else(|| {
                        WhrError::Persistence(format!(
                            "{:?} references missing game {}",
                            player.name, gid
                        ))
                    })?;
                    if game.day != day.day || (game.black != id && game.white != id) {
                        return Err(WhrError::Persistence(format!(
                            "game {} misfiled under {:?} day {}",
                            gid, player.name, day.day
                        )));
                    }
                }
            }
        }
        for (gid, game) in self.games.iter().enumerate() {
            for side in [game.black, game.white] {
                let held = self
                    .players
                    .get(side)
                    .and_then(|p| p.day_index(game.day))
                    .map(|i| self.players[side].days[i].games.contains(&gid))
                    .unwrap_or(false);
                if !held {
                    return Err(WhrError::Persistence(format!(
                        "game {} is not referenced by player {}",
                        gid, side
                    )));
                }
            }
        }
        Ok(())
    }
}
