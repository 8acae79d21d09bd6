// Integration tests for the draft service.
//
// Each test wires a DraftService to an in-memory or SQLite store, runs a
// draft with a seeded RNG and checks the offerings and recorded picks.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leaderdraft_app::catalog::{load_leaders, NewLeader};
use leaderdraft_app::db::Database;
use leaderdraft_app::registration::register_players;
use leaderdraft_app::repo::{
    LeaderCatalog, MemoryStore, PickHistory, PlayerRoster, RepositoryError,
};
use leaderdraft_app::service::deadline_after;
use leaderdraft_app::{DraftService, EngineKind, ServiceError, Stores};
use leaderdraft_core::shuffler::{
    generate_random_subset, no_repeat_history_games, validate_offering, ALL_PICK, RANDOM_PICK,
    RANDOM_PICK_NO_REPEATS,
};
use leaderdraft_core::{
    DraftError, DraftStrategy, Leader, LeaderId, Offering, Pick, PlayerId, ShuffleLimits,
    StrategyEntry, StrategyRegistry,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;

// ===========================================================================
// Test helpers
// ===========================================================================

const FIXTURE: &str = "tests/fixtures/leaders.csv";

fn service_for(store: Arc<MemoryStore>) -> DraftService {
    DraftService::new(
        Stores::shared(store),
        StrategyRegistry::with_builtins(),
        ShuffleLimits::default(),
    )
}

/// Memory store with the fixture catalog and `players` registered players.
async fn fixture_store(players: &[&str]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_leaders(&load_leaders(Path::new(FIXTURE)).unwrap());
    for name in players {
        store.upsert_player(name).await.unwrap();
    }
    store
}

fn deadline() -> Instant {
    deadline_after(5_000)
}

fn assert_disjoint(offerings: &[Offering]) {
    let ids: Vec<LeaderId> = offerings.iter().flat_map(|o| o.leader_ids()).collect();
    let unique: HashSet<&LeaderId> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len(), "a leader was offered twice: {ids:?}");
}

fn banned_ids(catalog: &[Leader]) -> HashSet<LeaderId> {
    catalog.iter().filter(|l| l.banned).map(|l| l.id).collect()
}

fn presentation_sorted(offering: &Offering) -> bool {
    let key = |l: &Leader| (l.tier, l.civilization.clone(), l.name.clone());
    offering.leaders.windows(2).all(|w| key(&w[0]) <= key(&w[1]))
}

/// Record `leader` as the only pick of `player` in an earlier draft.
async fn record_old_pick(store: &MemoryStore, player: PlayerId, leader: LeaderId) {
    let pick = Pick {
        player,
        leader,
        draft_id: "old".into(),
    };
    store.record_pick(&pick).await.unwrap();
}

/// Leader catalog that answers only after `delay`.
struct SlowCatalog {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

#[async_trait]
impl LeaderCatalog for SlowCatalog {
    async fn leader_catalog(&self) -> Result<Vec<Leader>, RepositoryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.leader_catalog().await
    }
}

// ===========================================================================
// Shuffler path
// ===========================================================================

#[tokio::test]
async fn random_pick_covers_every_active_player() {
    let store = fixture_store(&["Ana", "Ben", "Cy"]).await;
    store.add_strategy(DraftStrategy::new(RANDOM_PICK, 3));
    let service = service_for(store.clone());
    let banned = banned_ids(&store.leader_catalog().await.unwrap());

    for seed in 0..20 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let offerings = service
            .draft(EngineKind::Shuffler, RANDOM_PICK, "d1", deadline(), &mut rng)
            .await
            .unwrap();

        assert_eq!(offerings.len(), 3);
        assert_disjoint(&offerings);
        for offering in &offerings {
            assert_eq!(offering.leaders.len(), 3);
            assert_eq!(offering.draft_id, "d1");
            assert!(offering.leaders.iter().all(|l| !banned.contains(&l.id)));
        }
    }
}

#[tokio::test]
async fn inactive_players_get_no_offering() {
    let store = fixture_store(&["Ana", "Ben", "Cy"]).await;
    store.add_strategy(DraftStrategy::new(RANDOM_PICK, 2));
    let active = store.active_players().await.unwrap();
    store.set_active(active[1].id, false);

    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let offerings = service_for(store)
        .shuffle(RANDOM_PICK, "d1", deadline(), &mut rng)
        .await
        .unwrap();

    let players: Vec<_> = offerings.iter().map(|o| o.player).collect();
    assert_eq!(players, vec![active[0].id, active[2].id]);
}

#[tokio::test]
async fn all_pick_offers_whole_catalog_sorted_when_not_randomized() {
    let store = fixture_store(&["Ana", "Ben"]).await;
    let mut strategy = DraftStrategy::new(ALL_PICK, 1);
    strategy.randomize = false;
    store.add_strategy(strategy);
    let unbanned = store
        .leader_catalog()
        .await
        .unwrap()
        .into_iter()
        .filter(|l| !l.banned)
        .count();

    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let offerings = service_for(store)
        .shuffle(ALL_PICK, "d1", deadline(), &mut rng)
        .await
        .unwrap();

    assert_eq!(offerings.len(), 2);
    for offering in &offerings {
        assert_eq!(offering.leaders.len(), unbanned);
        assert!(presentation_sorted(offering), "offering not in presentation order: {offering}");
    }
    assert_eq!(offerings[0].leader_ids(), offerings[1].leader_ids());
}

#[tokio::test]
async fn no_repeats_excludes_recorded_picks() {
    let store = fixture_store(&["Ana", "Ben"]).await;
    store.add_strategy(DraftStrategy::new(RANDOM_PICK_NO_REPEATS, 3).with_rule("noRepeats", 1));
    let service = service_for(store.clone());

    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let first = service
        .shuffle(RANDOM_PICK_NO_REPEATS, "d1", deadline(), &mut rng)
        .await
        .unwrap();
    let mut taken = Vec::new();
    for offering in &first {
        let pick = service
            .record_pick(offering, offering.leaders[0].id, deadline())
            .await
            .unwrap();
        taken.push(pick);
    }
    assert_eq!(store.picks().len(), 2);

    for seed in 0..25 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let offerings = service
            .shuffle(RANDOM_PICK_NO_REPEATS, "d2", deadline(), &mut rng)
            .await
            .unwrap();
        for offering in &offerings {
            let previous = taken.iter().find(|p| p.player == offering.player).unwrap();
            assert!(
                !offering.contains(previous.leader),
                "player {} was offered their last pick again",
                offering.player
            );
        }
    }
}

#[tokio::test]
async fn custom_no_repeat_strategy_skips_last_game_pick() {
    let store = fixture_store(&["Ana"]).await;
    store.add_strategy(DraftStrategy::new("Fresh", 3));
    let ana = store.active_players().await.unwrap()[0].id;
    let last = store.leader_catalog().await.unwrap()[0].id;
    record_old_pick(&store, ana, last).await;

    let mut registry = StrategyRegistry::with_builtins();
    registry.register(
        "Fresh",
        StrategyEntry {
            generate: generate_random_subset,
            validate: validate_offering,
            history_games: no_repeat_history_games,
            reduces_pool: true,
        },
    );
    let service = DraftService::new(Stores::shared(store), registry, ShuffleLimits::default());

    for seed in 0..20 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let offerings = service
            .shuffle("Fresh", "d1", deadline(), &mut rng)
            .await
            .unwrap();
        assert!(!offerings[0].contains(last), "seed {seed} offered {last} again");
    }
}

#[tokio::test]
async fn impossible_draft_is_incomplete_not_short() {
    let store = Arc::new(MemoryStore::new());
    store.add_leaders(&[
        NewLeader::new("Rome", "Trajan", 1.0),
        NewLeader::new("Egypt", "Cleopatra", 2.0),
        NewLeader::new("Greece", "Pericles", 2.0),
        NewLeader::new("Persia", "Cyrus", 3.0),
    ]);
    for name in ["Ana", "Ben", "Cy"] {
        store.upsert_player(name).await.unwrap();
    }
    store.add_strategy(DraftStrategy::new(RANDOM_PICK, 2));
    let service = DraftService::new(
        Stores::shared(store),
        StrategyRegistry::with_builtins(),
        ShuffleLimits {
            max_attempts: 5,
            max_player_attempts: 5,
        },
    );

    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let err = service
        .shuffle(RANDOM_PICK, "d1", deadline(), &mut rng)
        .await
        .unwrap_err();
    assert!(err.is_incomplete_draft(), "unexpected error: {err}");
}

#[tokio::test]
async fn unregistered_shuffle_strategy_is_rejected() {
    let store = fixture_store(&["Ana"]).await;
    store.add_strategy(DraftStrategy::new("Custom", 2));

    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let err = service_for(store)
        .shuffle("Custom", "d1", deadline(), &mut rng)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Draft(DraftError::UnknownStrategy { .. })
    ));
}

// ===========================================================================
// Allocator path
// ===========================================================================

#[tokio::test]
async fn allocator_honours_min_tier_per_player() {
    let store = Arc::new(MemoryStore::new());
    let mut leaders: Vec<NewLeader> = (1..=4)
        .map(|i| NewLeader::new(format!("Strong {i}"), format!("S{i}"), 1.0))
        .collect();
    leaders.extend((1..=6).map(|i| NewLeader::new(format!("Weak {i}"), format!("W{i}"), 3.0)));
    store.add_leaders(&leaders);
    store.upsert_player("Ana").await.unwrap();
    store.upsert_player("Ben").await.unwrap();
    store.add_strategy(DraftStrategy::new("Tiered", 2).with_rule("minTier", 1));
    let service = service_for(store);

    for seed in 0..20 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let offerings = service
            .draft(EngineKind::Allocator, "Tiered", "d1", deadline(), &mut rng)
            .await
            .unwrap();
        assert_eq!(offerings.len(), 2);
        assert_disjoint(&offerings);
        for offering in &offerings {
            assert_eq!(offering.leaders.len(), 2);
            assert!(offering.leaders.iter().any(|l| l.tier <= 1.0));
        }
    }
}

#[tokio::test]
async fn allocator_uses_default_no_repeat_window() {
    let store = fixture_store(&["Ana"]).await;
    store.add_strategy(DraftStrategy::new(RANDOM_PICK_NO_REPEATS, 3));
    let ana = store.active_players().await.unwrap()[0].id;
    let last = store.leader_catalog().await.unwrap()[0].id;
    record_old_pick(&store, ana, last).await;
    let service = service_for(store);

    for seed in 0..20 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let offerings = service
            .draft(EngineKind::Allocator, RANDOM_PICK_NO_REPEATS, "d1", deadline(), &mut rng)
            .await
            .unwrap();
        assert_eq!(offerings[0].leaders.len(), 3);
        assert!(!offerings[0].contains(last), "seed {seed} offered {last} again");
    }
}

#[tokio::test]
async fn allocator_sorts_unrandomized_offerings() {
    let store = fixture_store(&["Ana", "Ben"]).await;
    let mut strategy = DraftStrategy::new("Ordered", 4);
    strategy.randomize = false;
    store.add_strategy(strategy);
    let service = service_for(store);

    for seed in 0..10 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let offerings = service
            .draft(EngineKind::Allocator, "Ordered", "d1", deadline(), &mut rng)
            .await
            .unwrap();
        for offering in &offerings {
            assert!(presentation_sorted(offering), "offering not in presentation order: {offering}");
        }
    }
}

#[tokio::test]
async fn allocator_rejects_bad_rule_bag() {
    let store = fixture_store(&["Ana"]).await;
    store.add_strategy(DraftStrategy::new("Odd", 2).with_rule("noRepeats", "two"));

    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let err = service_for(store)
        .roll_for_players("Odd", "d1", deadline(), &mut rng)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Draft(DraftError::RuleConfig { .. })
    ));
}

// ===========================================================================
// Picks, deadlines and missing data
// ===========================================================================

#[tokio::test]
async fn record_pick_rejects_leader_not_offered() {
    let store = fixture_store(&["Ana"]).await;
    store.add_strategy(DraftStrategy::new(RANDOM_PICK, 2));
    let service = service_for(store.clone());

    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let offerings = service
        .shuffle(RANDOM_PICK, "d1", deadline(), &mut rng)
        .await
        .unwrap();
    let stranger = store
        .leader_catalog()
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .find(|id| !offerings[0].contains(*id))
        .unwrap();

    let err = service
        .record_pick(&offerings[0], stranger, deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::LeaderNotOffered { leader, .. } if leader == stranger));
    assert!(store.picks().is_empty());
}

#[tokio::test]
async fn missing_strategy_is_not_found() {
    let store = fixture_store(&["Ana"]).await;
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let err = service_for(store)
        .shuffle(RANDOM_PICK, "d1", deadline(), &mut rng)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Repository(RepositoryError::NotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn slow_collaborator_hits_the_deadline() {
    let store = fixture_store(&["Ana"]).await;
    store.add_strategy(DraftStrategy::new(RANDOM_PICK, 2));
    let stores = Stores {
        leaders: Arc::new(SlowCatalog {
            inner: store.clone(),
            delay: Duration::from_secs(10),
        }),
        ..Stores::shared(store)
    };
    let service = DraftService::new(
        stores,
        StrategyRegistry::with_builtins(),
        ShuffleLimits::default(),
    );

    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let err = service
        .shuffle(RANDOM_PICK, "d1", deadline_after(100), &mut rng)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Repository(RepositoryError::Timeout {
            operation: "leader_catalog"
        })
    ));
}

// ===========================================================================
// SQLite end to end
// ===========================================================================

#[tokio::test]
async fn sqlite_store_runs_a_full_draft() {
    let db = Arc::new(Database::open(":memory:").unwrap());
    db.import_leaders(&load_leaders(Path::new(FIXTURE)).unwrap())
        .unwrap();
    db.save_strategy(&DraftStrategy::new(RANDOM_PICK_NO_REPEATS, 2).with_rule("noRepeats", 2))
        .unwrap();
    let roster: Arc<dyn PlayerRoster> = db.clone();
    let players = register_players(roster, vec!["Ana".into(), "Ben".into()])
        .await
        .unwrap();
    assert_eq!(players.len(), 2);

    let service = DraftService::new(
        Stores::shared(db.clone()),
        StrategyRegistry::with_builtins(),
        ShuffleLimits::default(),
    );

    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let offerings = service
        .draft(EngineKind::Shuffler, RANDOM_PICK_NO_REPEATS, "g1", deadline(), &mut rng)
        .await
        .unwrap();
    assert_eq!(offerings.len(), 2);
    assert_disjoint(&offerings);

    for offering in &offerings {
        service
            .record_pick(offering, offering.leaders[1].id, deadline())
            .await
            .unwrap();
    }

    // Registration runs concurrently, so ids need not follow input order.
    let first = offerings[0].player;
    let history = PickHistory::recent_picks(db.as_ref(), first, 2)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].leader, offerings[0].leaders[1].id);

    let next = service
        .draft(EngineKind::Shuffler, RANDOM_PICK_NO_REPEATS, "g2", deadline(), &mut rng)
        .await
        .unwrap();
    assert_eq!(next[0].player, first);
    assert!(!next[0].contains(history[0].leader));
}
