//! End-to-end scenarios exercising the full estimation pipeline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use whr::{Base, RatingPoint, WhrError, Winner};

fn rounded(points: &[RatingPoint]) -> Vec<(u32, i64, i64)> {
    points
        .iter()
        .map(|p| {
            (
                p.day,
                p.elo.round() as i64,
                p.uncertainty.unwrap().round() as i64,
            )
        })
        .collect()
}

fn shusaku_base() -> Base {
    let mut base = Base::default();
    base.create_game("shusaku", "shusai", Winner::Black, 1, 0.0)
        .unwrap();
    base.create_game("shusaku", "shusai", Winner::White, 2, 0.0)
        .unwrap();
    base.create_game("shusaku", "shusai", Winner::White, 3, 0.0)
        .unwrap();
    base
}

#[test]
fn canonical_three_game_history() {
    let mut base = shusaku_base();
    base.iterate(50).unwrap();

    let shusaku = rounded(&base.ratings_for_player("shusaku").unwrap());
    let shusai = rounded(&base.ratings_for_player("shusai").unwrap());
    assert_eq!(shusaku, vec![(1, -43, 84), (2, -45, 84), (3, -45, 84)]);
    assert_eq!(shusai, vec![(1, 43, 84), (2, 45, 84), (3, 45, 84)]);
}

#[test]
fn five_game_history_matches_reference() {
    let mut base = shusaku_base();
    base.create_game("shusaku", "shusai", Winner::White, 4, 0.0)
        .unwrap();
    base.create_game("shusaku", "shusai", Winner::White, 4, 0.0)
        .unwrap();
    base.iterate(50).unwrap();

    let shusaku = rounded(&base.ratings_for_player("shusaku").unwrap());
    assert_eq!(
        shusaku,
        vec![(1, -92, 71), (2, -94, 71), (3, -95, 71), (4, -96, 72)]
    );
}

#[test]
fn future_match_probability_after_convergence() {
    let mut base = shusaku_base();
    base.iterate(50).unwrap();

    let (p_shusaku, p_shusai) = base.probability_future_match("shusaku", "shusai", 0.0);
    assert!((p_shusaku - 0.3724).abs() < 1e-3);
    assert!((p_shusai - 0.6276).abs() < 1e-3);
    assert!((p_shusaku + p_shusai - 1.0).abs() < 1e-12);
}

#[test]
fn future_match_probability_round_trips_with_handicap() {
    let mut base = shusaku_base();
    base.iterate(50).unwrap();

    let forward = base.probability_future_match("shusaku", "shusai", 37.0);
    let reverse = base.probability_future_match("shusai", "shusaku", -37.0);
    assert!((forward.0 + reverse.0 - 1.0).abs() < 1e-12);
    assert!((forward.1 + reverse.1 - 1.0).abs() < 1e-12);
}

#[test]
fn handicap_is_color_symmetric() {
    let mut first = Base::default();
    first.create_game("A", "B", Winner::Black, 1, 100.0).unwrap();
    first.auto_iterate(None, 1e-10, 10).unwrap();

    let mut second = Base::default();
    second.create_game("B", "A", Winner::White, 1, 100.0).unwrap();
    second.auto_iterate(None, 1e-10, 10).unwrap();

    let gap = |base: &Base| {
        let a = base.ratings_for_player("A").unwrap()[0].elo;
        let b = base.ratings_for_player("B").unwrap()[0].elo;
        (a - b).abs()
    };
    assert!((gap(&first) - gap(&second)).abs() < 1e-6);
}

#[test]
fn single_game_ratings_are_antisymmetric() {
    let mut base = Base::default();
    base.create_game("A", "B", Winner::Black, 1, 0.0).unwrap();
    base.iterate(100).unwrap();

    let a = base.player("A").unwrap().days[0].r;
    let b = base.player("B").unwrap().days[0].r;
    assert!(a > 0.0);
    assert!((a + b).abs() < 1e-9);
}

#[test]
fn an_extra_win_never_hurts() {
    let converged_r = |wins_for_a: usize| {
        let mut base = Base::default();
        base.create_game("A", "B", Winner::Black, 1, 0.0).unwrap();
        base.create_game("A", "B", Winner::White, 1, 0.0).unwrap();
        for _ in 0..wins_for_a {
            base.create_game("A", "B", Winner::Black, 1, 0.0).unwrap();
        }
        base.auto_iterate(None, 1e-9, 10).unwrap();
        let a = base.player("A").unwrap().days[0].r;
        let b = base.player("B").unwrap().days[0].r;
        (a, b)
    };
    let (a_base, b_base) = converged_r(0);
    let (a_more, b_more) = converged_r(1);
    assert!(a_more >= a_base);
    assert!(b_more <= b_base);
}

#[test]
fn auto_iterate_reaches_a_fixed_point() {
    let mut base = Base::default();
    base.create_game("a", "b", Winner::Black, 1, 0.0).unwrap();
    base.create_game("b", "c", Winner::Black, 3, 0.0).unwrap();
    base.create_game("c", "a", Winner::Black, 5, 0.0).unwrap();
    base.create_game("a", "b", Winner::White, 7, 2.0).unwrap();

    let report = base.auto_iterate(None, 1e-4, 10).unwrap();
    assert!(report.converged);
    assert!(report.max_delta <= 1e-4);

    // one more sweep moves nothing beyond the precision target
    let before: Vec<f64> = base
        .players()
        .iter()
        .flat_map(|p| p.days.iter().map(|d| d.r))
        .collect();
    base.iterate(1).unwrap();
    let after: Vec<f64> = base
        .players()
        .iter()
        .flat_map(|p| p.days.iter().map(|d| d.r))
        .collect();
    let delta = before
        .iter()
        .zip(&after)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max);
    assert!(delta <= 1e-4);
}

#[test]
fn uncertainty_grows_with_the_gap_between_observations() {
    let second_day_uncertainty = |last_day: u32| {
        let mut base = Base::default();
        base.create_game("A", "B", Winner::Black, 1, 0.0).unwrap();
        base.create_game("A", "B", Winner::White, last_day, 0.0)
            .unwrap();
        base.auto_iterate(None, 1e-9, 10).unwrap();
        base.ratings_for_player("A").unwrap()[1]
            .uncertainty
            .unwrap()
    };
    let near = second_day_uncertainty(2);
    let far = second_day_uncertainty(200);
    assert!(near > 0.0);
    assert!(far > near);
}

#[test]
fn alternating_extreme_handicaps_trip_the_sanity_bound() {
    // alternating 600-Elo handicaps between two far-apart days make the
    // coupled Newton steps oscillate with growing amplitude
    let mut base = Base::default();
    for _ in 0..10 {
        base.create_game("anchor", "player", Winner::Black, 1, 0.0)
            .unwrap();
        base.create_game("anchor", "player", Winner::White, 1, 0.0)
            .unwrap();
    }
    for _ in 0..10 {
        base.create_game("anchor", "player", Winner::Black, 180, 600.0)
            .unwrap();
        base.create_game("anchor", "player", Winner::White, 180, 600.0)
            .unwrap();
    }
    let err = base.iterate(50).unwrap_err();
    assert!(matches!(err, WhrError::NumericalFault { .. }));
}

#[test]
fn load_games_is_equivalent_to_create_game() {
    let mut loaded = Base::default();
    loaded.load_games(["A B B 1", "A B W 2 0"], ' ').unwrap();

    let mut created = Base::default();
    created.create_game("A", "B", Winner::Black, 1, 0.0).unwrap();
    created.create_game("A", "B", Winner::White, 2, 0.0).unwrap();

    assert_eq!(loaded.to_json().unwrap(), created.to_json().unwrap());

    loaded.iterate(20).unwrap();
    created.iterate(20).unwrap();
    assert_eq!(
        loaded.ratings_for_player("A").unwrap(),
        created.ratings_for_player("A").unwrap()
    );
}

#[test]
fn persistence_round_trips_exactly() {
    let mut base = shusaku_base();
    base.create_game("shusaku", "nobody", Winner::Black, 3, 20.0)
        .unwrap();
    base.iterate(30).unwrap();

    let saved = base.to_json().unwrap();
    let reloaded = Base::from_json(&saved).unwrap();
    assert_eq!(saved, reloaded.to_json().unwrap());

    // the reloaded registry answers every query identically
    for name in ["shusaku", "shusai", "nobody"] {
        assert_eq!(
            base.ratings_for_player(name).unwrap(),
            reloaded.ratings_for_player(name).unwrap()
        );
    }
    assert_eq!(
        base.probability_future_match("shusaku", "nobody", 15.0),
        reloaded.probability_future_match("shusaku", "nobody", 15.0)
    );
    assert_eq!(base.log_likelihood(), reloaded.log_likelihood());

    let ordered: Vec<String> = base
        .get_ordered_ratings(true, false)
        .into_iter()
        .map(|row| row.name)
        .collect();
    let reloaded_ordered: Vec<String> = reloaded
        .get_ordered_ratings(true, false)
        .into_iter()
        .map(|row| row.name)
        .collect();
    assert_eq!(ordered, reloaded_ordered);
}

#[test]
fn save_and_load_through_a_file() {
    let mut base = shusaku_base();
    base.iterate(20).unwrap();

    let path = std::env::temp_dir().join("whr_base_roundtrip.json");
    base.save(&path).unwrap();
    let reloaded = Base::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(base.to_json().unwrap(), reloaded.to_json().unwrap());
    assert!(matches!(
        Base::load("/no/such/base.json"),
        Err(WhrError::Persistence(_))
    ));
}

#[test]
fn corrupted_saves_are_rejected() {
    let mut base = shusaku_base();
    base.iterate(10).unwrap();
    let saved = base.to_json().unwrap();

    let mut value: serde_json::Value = serde_json::from_str(&saved).unwrap();
    let days = value["players"][0]["days"].as_array_mut().unwrap();
    days.swap(0, 1);
    let tampered = serde_json::to_string(&value).unwrap();
    assert!(matches!(
        Base::from_json(&tampered),
        Err(WhrError::Persistence(_))
    ));

    assert!(matches!(
        Base::from_json("{\"definitely\": \"not a base\"}"),
        Err(WhrError::Persistence(_))
    ));
}

#[test]
fn random_schedules_converge_with_consistent_state() {
    let mut rng = StdRng::seed_from_u64(42);
    let names = ["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"];
    let mut base = Base::default();
    for _ in 0..200 {
        let black = names[rng.gen_range(0..names.len())];
        let mut white = names[rng.gen_range(0..names.len())];
        while white == black {
            white = names[rng.gen_range(0..names.len())];
        }
        let winner = if rng.gen_bool(0.5) {
            Winner::Black
        } else {
            Winner::White
        };
        let day = rng.gen_range(1..=30);
        base.create_game(black, white, winner, day, 0.0).unwrap();
    }

    let report = base.auto_iterate(None, 1e-6, 10).unwrap();
    assert!(report.converged);

    // structural invariants survive a save/load cycle, variances stay positive
    let reloaded = Base::from_json(&base.to_json().unwrap()).unwrap();
    for name in names {
        for point in reloaded.ratings_for_player(name).unwrap() {
            assert!(point.uncertainty.unwrap() > 0.0);
            assert!(point.elo.is_finite());
        }
    }
}
