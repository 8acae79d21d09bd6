// Collaborator interfaces the draft service pulls its inputs from, plus an
// in-memory implementation for tests and embedding callers.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use leaderdraft_core::{DraftStrategy, Leader, LeaderId, Pick, Player, PlayerId};
use thiserror::Error;

use crate::catalog::NewLeader;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{operation} did not finish before the deadline")]
    Timeout { operation: &'static str },

    #[error("{what} not found")]
    NotFound { what: String },
}

impl RepositoryError {
    pub fn backend(operation: &'static str, err: impl Into<anyhow::Error>) -> Self {
        let err: anyhow::Error = err.into();
        RepositoryError::Backend {
            operation,
            source: err.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LeaderCatalog: Send + Sync {
    /// Every leader, banned ones included.
    async fn leader_catalog(&self) -> Result<Vec<Leader>, RepositoryError>;
}

#[async_trait]
pub trait PlayerRoster: Send + Sync {
    async fn active_players(&self) -> Result<Vec<Player>, RepositoryError>;

    /// Register `name`, or return the existing player with that name.
    async fn upsert_player(&self, name: &str) -> Result<Player, RepositoryError>;
}

#[async_trait]
pub trait PickHistory: Send + Sync {
    /// The player's picks from their last `games` games, most recent first.
    async fn recent_picks(&self, player: PlayerId, games: usize)
        -> Result<Vec<Pick>, RepositoryError>;

    async fn record_pick(&self, pick: &Pick) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait StrategyStore: Send + Sync {
    async fn strategy(&self, name: &str) -> Result<DraftStrategy, RepositoryError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryInner {
    leaders: Vec<Leader>,
    players: Vec<Player>,
    /// Oldest first.
    picks: Vec<Pick>,
    strategies: HashMap<String, DraftStrategy>,
}

/// Thread-safe in-memory implementation of every collaborator trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().expect("memory store mutex poisoned")
    }

    /// Add leaders, assigning sequential ids. Returns the stored leaders.
    pub fn add_leaders(&self, leaders: &[NewLeader]) -> Vec<Leader> {
        let mut inner = self.inner();
        let mut added = Vec::with_capacity(leaders.len());
        for new in leaders {
            let id = LeaderId(inner.leaders.len() as i64 + 1);
            let leader = new.clone().into_leader(id);
            inner.leaders.push(leader.clone());
            added.push(leader);
        }
        added
    }

    pub fn set_banned(&self, id: LeaderId, banned: bool) {
        if let Some(leader) = self.inner().leaders.iter_mut().find(|l| l.id == id) {
            leader.banned = banned;
        }
    }

    pub fn set_active(&self, id: PlayerId, active: bool) {
        if let Some(player) = self.inner().players.iter_mut().find(|p| p.id == id) {
            player.active = active;
        }
    }

    pub fn add_strategy(&self, strategy: DraftStrategy) {
        self.inner()
            .strategies
            .insert(strategy.name.clone(), strategy);
    }

    /// Every recorded pick, oldest first.
    pub fn picks(&self) -> Vec<Pick> {
        self.inner().picks.clone()
    }
}

#[async_trait]
impl LeaderCatalog for MemoryStore {
    async fn leader_catalog(&self) -> Result<Vec<Leader>, RepositoryError> {
        Ok(self.inner().leaders.clone())
    }
}

#[async_trait]
impl PlayerRoster for MemoryStore {
    async fn active_players(&self) -> Result<Vec<Player>, RepositoryError> {
        Ok(self
            .inner()
            .players
            .iter()
            .filter(|p| p.active)
            .cloned()
            .collect())
    }

    async fn upsert_player(&self, name: &str) -> Result<Player, RepositoryError> {
        let mut inner = self.inner();
        if let Some(existing) = inner.players.iter().find(|p| p.name == name) {
            return Ok(existing.clone());
        }
        let player = Player {
            id: PlayerId(inner.players.len() as i64 + 1),
            name: name.to_string(),
            active: true,
        };
        inner.players.push(player.clone());
        Ok(player)
    }
}

#[async_trait]
impl PickHistory for MemoryStore {
    async fn recent_picks(
        &self,
        player: PlayerId,
        games: usize,
    ) -> Result<Vec<Pick>, RepositoryError> {
        let inner = self.inner();
        let mine: Vec<&Pick> = inner.picks.iter().rev().filter(|p| p.player == player).collect();

        // Most recent draft ids first, by when their last pick was recorded.
        let mut drafts: Vec<&str> = Vec::new();
        for pick in &mine {
            if !drafts.contains(&pick.draft_id.as_str()) {
                drafts.push(&pick.draft_id);
            }
        }
        drafts.truncate(games);

        let mut out: Vec<Pick> = Vec::new();
        for draft in drafts {
            out.extend(mine.iter().filter(|p| p.draft_id == draft).map(|p| (*p).clone()));
        }
        Ok(out)
    }

    async fn record_pick(&self, pick: &Pick) -> Result<(), RepositoryError> {
        let mut inner = self.inner();
        if !inner.picks.contains(pick) {
            inner.picks.push(pick.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl StrategyStore for MemoryStore {
    async fn strategy(&self, name: &str) -> Result<DraftStrategy, RepositoryError> {
        self.inner()
            .strategies
            .get(name)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                what: format!("strategy `{name}`"),
            })
    }
}
