// Pick history lookup used by no-repeat rules and validators.

use std::collections::{HashMap, HashSet};

use crate::model::{LeaderId, Pick, PlayerId};

/// Answers "which leaders did this player pick in their last N games".
///
/// The engine never fetches history itself; callers prefetch it from the
/// pick store and hand the lookup in.
pub trait HistoryLookup {
    fn recent_leaders(&self, player: PlayerId, games: usize) -> HashSet<LeaderId>;
}

/// Lookup with no recorded games.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl HistoryLookup for NoHistory {
    fn recent_leaders(&self, _player: PlayerId, _games: usize) -> HashSet<LeaderId> {
        HashSet::new()
    }
}

/// Prefetched picks, grouped per player into games ordered most recent
/// first.
#[derive(Debug, Clone, Default)]
pub struct RecentPicks {
    games: HashMap<PlayerId, Vec<Vec<LeaderId>>>,
}

impl RecentPicks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one game's picks for `player`. Games must be pushed most
    /// recent first.
    pub fn push_game(&mut self, player: PlayerId, leaders: Vec<LeaderId>) {
        self.games.entry(player).or_default().push(leaders);
    }

    /// Group picks (ordered most recent first) into games by draft id.
    pub fn from_picks(picks: &[Pick]) -> Self {
        let mut out = Self::new();
        let mut last_draft: HashMap<PlayerId, &str> = HashMap::new();
        for pick in picks {
            let games = out.games.entry(pick.player).or_default();
            let same_game = last_draft.get(&pick.player) == Some(&pick.draft_id.as_str());
            match games.last_mut() {
                Some(game) if same_game => game.push(pick.leader),
                _ => games.push(vec![pick.leader]),
            }
            last_draft.insert(pick.player, &pick.draft_id);
        }
        out
    }
}

impl HistoryLookup for RecentPicks {
    fn recent_leaders(&self, player: PlayerId, games: usize) -> HashSet<LeaderId> {
        self.games
            .get(&player)
            .map(|g| g.iter().take(games).flatten().copied().collect())
            .unwrap_or_default()
    }
}
