// Draft orchestration: pulls inputs from the collaborators, runs an engine,
// and records picks.

use std::future::Future;
use std::sync::Arc;

use leaderdraft_core::{
    roll_for_players, DraftError, DraftStrategy, Leader, LeaderId, Offering, Pick, PlayerId,
    RecentPicks, ShuffleLimits, Shuffler, StrategyRegistry,
};
use rand::RngCore;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::repo::{LeaderCatalog, PickHistory, PlayerRoster, RepositoryError, StrategyStore};

/// Which engine produces the offerings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Rule-driven single pass.
    Allocator,
    /// Strategy-driven search with retries.
    #[default]
    Shuffler,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("leader {leader} was not offered to player {player}")]
    LeaderNotOffered { player: PlayerId, leader: LeaderId },
}

impl ServiceError {
    /// True when the rules could not be satisfied for every player.
    pub fn is_incomplete_draft(&self) -> bool {
        matches!(self, ServiceError::Draft(e) if e.is_out_of_choices())
    }
}

/// The collaborators a [`DraftService`] reads from and writes to.
#[derive(Clone)]
pub struct Stores {
    pub leaders: Arc<dyn LeaderCatalog>,
    pub players: Arc<dyn PlayerRoster>,
    pub picks: Arc<dyn PickHistory>,
    pub strategies: Arc<dyn StrategyStore>,
}

impl Stores {
    /// Use one backend for every collaborator.
    pub fn shared<T>(store: Arc<T>) -> Self
    where
        T: LeaderCatalog + PlayerRoster + PickHistory + StrategyStore + 'static,
    {
        Self {
            leaders: store.clone(),
            players: store.clone(),
            picks: store.clone(),
            strategies: store,
        }
    }
}

pub struct DraftService {
    stores: Stores,
    shuffler: Shuffler,
}

impl DraftService {
    pub fn new(stores: Stores, registry: StrategyRegistry, limits: ShuffleLimits) -> Self {
        Self {
            stores,
            shuffler: Shuffler::new(registry, limits),
        }
    }

    /// Run `engine` for every active player.
    pub async fn draft(
        &self,
        engine: EngineKind,
        strategy_name: &str,
        draft_id: &str,
        deadline: Instant,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Offering>, ServiceError> {
        match engine {
            EngineKind::Allocator => {
                self.roll_for_players(strategy_name, draft_id, deadline, rng)
                    .await
            }
            EngineKind::Shuffler => self.shuffle(strategy_name, draft_id, deadline, rng).await,
        }
    }

    /// Allocator path: the strategy's rule bag becomes one rule per slot.
    /// Unrandomized strategies get offerings in presentation order.
    pub async fn roll_for_players(
        &self,
        strategy_name: &str,
        draft_id: &str,
        deadline: Instant,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Offering>, ServiceError> {
        let strategy = self.load_strategy(strategy_name, deadline).await?;
        let games = self.history_games(&strategy)?;
        let rules = strategy.allocation_rules(games)?;
        let (catalog, players) = self.load_inputs(deadline).await?;
        let history = self.load_history(&players, games, deadline).await?;

        let mut offerings =
            roll_for_players(&players, &rules, &catalog, draft_id, &history, rng)?;
        if !strategy.randomize {
            for offering in &mut offerings {
                offering.leaders.sort_by(Leader::cmp_presentation);
            }
        }
        info!(
            "Allocated {} offerings with {} for draft {}",
            offerings.len(),
            strategy.name,
            draft_id
        );
        Ok(offerings)
    }

    /// Shuffler path. Recent picks are fetched only when the strategy
    /// checks them.
    pub async fn shuffle(
        &self,
        strategy_name: &str,
        draft_id: &str,
        deadline: Instant,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Offering>, ServiceError> {
        let strategy = self.load_strategy(strategy_name, deadline).await?;
        let games = self.history_games(&strategy)?;
        let (catalog, players) = self.load_inputs(deadline).await?;
        let history = self.load_history(&players, games, deadline).await?;

        let offerings = self
            .shuffler
            .shuffle(&catalog, &players, &strategy, draft_id, &history, rng)?;
        Ok(offerings)
    }

    /// Persist `leader` as the offering's player's pick.
    pub async fn record_pick(
        &self,
        offering: &Offering,
        leader: LeaderId,
        deadline: Instant,
    ) -> Result<Pick, ServiceError> {
        if !offering.contains(leader) {
            return Err(ServiceError::LeaderNotOffered {
                player: offering.player,
                leader,
            });
        }
        let pick = Pick {
            player: offering.player,
            leader,
            draft_id: offering.draft_id.clone(),
        };
        within(deadline, "record_pick", self.stores.picks.record_pick(&pick)).await?;
        debug!("Recorded pick {:?}", pick);
        Ok(pick)
    }

    /// Games of pick history the strategy's registry entry checks.
    fn history_games(&self, strategy: &DraftStrategy) -> Result<usize, DraftError> {
        let params = strategy.validate()?;
        Ok(self.shuffler.registry().history_games(&strategy.name, &params))
    }

    async fn load_strategy(
        &self,
        name: &str,
        deadline: Instant,
    ) -> Result<DraftStrategy, RepositoryError> {
        within(deadline, "strategy", self.stores.strategies.strategy(name)).await
    }

    async fn load_inputs(
        &self,
        deadline: Instant,
    ) -> Result<(Vec<Leader>, Vec<PlayerId>), RepositoryError> {
        let catalog =
            within(deadline, "leader_catalog", self.stores.leaders.leader_catalog()).await?;
        let players = within(deadline, "active_players", self.stores.players.active_players())
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        Ok((catalog, players))
    }

    async fn load_history(
        &self,
        players: &[PlayerId],
        games: usize,
        deadline: Instant,
    ) -> Result<RecentPicks, RepositoryError> {
        if games == 0 {
            return Ok(RecentPicks::new());
        }
        let mut picks = Vec::new();
        for &player in players {
            let recent =
                within(deadline, "recent_picks", self.stores.picks.recent_picks(player, games))
                    .await?;
            picks.extend(recent);
        }
        Ok(RecentPicks::from_picks(&picks))
    }
}

/// Await `fut`, failing with `Timeout` once `deadline` passes.
async fn within<T, F>(
    deadline: Instant,
    operation: &'static str,
    fut: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::Timeout { operation }),
    }
}

/// Deadline `timeout_ms` from now.
pub fn deadline_after(timeout_ms: u64) -> Instant {
    Instant::now() + std::time::Duration::from_millis(timeout_ms)
}
