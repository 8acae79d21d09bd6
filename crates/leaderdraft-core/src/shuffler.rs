// Strategy-driven shuffling with bounded retries.
//
// Each strategy name maps to a generator that proposes an offering from the
// leaders still eligible, and a validator that accepts or rejects it. A draft
// attempt walks the players in order, retrying each player's proposal up to
// `max_player_attempts` times. Attempts restart from the full catalog until
// one covers every player or `max_attempts` is reached.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::RngCore;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::error::DraftError;
use crate::history::HistoryLookup;
use crate::model::{unbanned, Leader, LeaderId, Offering, PlayerId};
use crate::strategy::{DraftStrategy, RuleParams};

pub const RANDOM_PICK: &str = "RandomPick";
pub const RANDOM_PICK_NO_REPEATS: &str = "RandomPickNoRepeats";
pub const ALL_PICK: &str = "AllPick";

/// Games checked by `RandomPickNoRepeats` when the strategy carries no
/// explicit `noRepeats` value.
pub const DEFAULT_NO_REPEAT_GAMES: usize = 1;

/// Proposes an offering for `player` from the currently eligible leaders.
pub type GenerateFn = fn(&[Leader], PlayerId, &DraftStrategy, &mut dyn RngCore) -> Vec<Leader>;

/// Accepts or rejects a proposed offering.
pub type ValidateFn = fn(&Proposal<'_>) -> Result<(), ValidationFailure>;

/// Number of past games whose picks a strategy keeps out of new offerings.
pub type HistoryGamesFn = fn(&RuleParams) -> usize;

/// Everything a validator may look at.
pub struct Proposal<'a> {
    pub player: PlayerId,
    pub leaders: &'a [Leader],
    pub strategy: &'a DraftStrategy,
    pub params: &'a RuleParams,
    /// Leaders the player picked in the games the strategy checks.
    pub recent: &'a HashSet<LeaderId>,
}

/// Why a proposal was rejected. Never surfaced to callers: the shuffler
/// simply retries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationFailure {
    #[error("leader {0} proposed twice")]
    Duplicate(LeaderId),

    #[error("no proposed leader is within tier {0}")]
    NoLeaderWithinTier(f64),

    #[error("leader {0} was picked in a recent game")]
    RecentlyPicked(LeaderId),
}

#[derive(Clone, Copy)]
pub struct StrategyEntry {
    pub generate: GenerateFn,
    pub validate: ValidateFn,
    pub history_games: HistoryGamesFn,
    /// Whether accepted leaders leave the pool for later players.
    pub reduces_pool: bool,
}

impl std::fmt::Debug for StrategyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyEntry")
            .field("reduces_pool", &self.reduces_pool)
            .finish_non_exhaustive()
    }
}

/// Strategy name -> (generate, validate).
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    entries: HashMap<String, StrategyEntry>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry holding `RandomPick`, `RandomPickNoRepeats` and `AllPick`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(
            RANDOM_PICK,
            StrategyEntry {
                generate: generate_random_subset,
                validate: validate_offering,
                history_games: configured_history_games,
                reduces_pool: true,
            },
        );
        registry.register(
            RANDOM_PICK_NO_REPEATS,
            StrategyEntry {
                generate: generate_random_subset,
                validate: validate_offering,
                history_games: no_repeat_history_games,
                reduces_pool: true,
            },
        );
        registry.register(
            ALL_PICK,
            StrategyEntry {
                generate: generate_whole_pool,
                validate: validate_offering,
                history_games: configured_history_games,
                reduces_pool: false,
            },
        );
        registry
    }

    /// Add or replace a strategy.
    pub fn register(&mut self, name: impl Into<String>, entry: StrategyEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&StrategyEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Games of pick history the named strategy checks. Unregistered names
    /// check only an explicit `noRepeats`.
    pub fn history_games(&self, name: &str, params: &RuleParams) -> usize {
        self.get(name)
            .map_or(configured_history_games(params), |e| (e.history_games)(params))
    }
}

// ---------------------------------------------------------------------------
// Built-in generators and validators
// ---------------------------------------------------------------------------

/// `pool_size` distinct leaders drawn uniformly from the eligible pool.
pub fn generate_random_subset(
    eligible: &[Leader],
    _player: PlayerId,
    strategy: &DraftStrategy,
    rng: &mut dyn RngCore,
) -> Vec<Leader> {
    eligible
        .choose_multiple(rng, strategy.pool_size)
        .cloned()
        .collect()
}

/// The entire eligible pool, in random order when the strategy randomizes.
pub fn generate_whole_pool(
    eligible: &[Leader],
    _player: PlayerId,
    strategy: &DraftStrategy,
    rng: &mut dyn RngCore,
) -> Vec<Leader> {
    let mut leaders = eligible.to_vec();
    if strategy.randomize {
        leaders.shuffle(rng);
    }
    leaders
}

/// Only the games named by `noRepeats`; none when it is absent.
pub fn configured_history_games(params: &RuleParams) -> usize {
    params.no_repeats.unwrap_or(0)
}

/// `noRepeats` games, or [`DEFAULT_NO_REPEAT_GAMES`] when it is absent.
pub fn no_repeat_history_games(params: &RuleParams) -> usize {
    params.no_repeats.unwrap_or(DEFAULT_NO_REPEAT_GAMES)
}

/// Uniqueness, then `minTier` when set, then the player's recent picks.
pub fn validate_offering(proposal: &Proposal<'_>) -> Result<(), ValidationFailure> {
    check_unique(proposal.leaders)?;
    if let Some(tier) = proposal.params.min_tier {
        check_min_tier(proposal.leaders, tier)?;
    }
    check_no_repeats(proposal.leaders, proposal.recent)
}

fn check_unique(leaders: &[Leader]) -> Result<(), ValidationFailure> {
    let mut seen = HashSet::with_capacity(leaders.len());
    for leader in leaders {
        if !seen.insert(leader.id) {
            return Err(ValidationFailure::Duplicate(leader.id));
        }
    }
    Ok(())
}

fn check_min_tier(leaders: &[Leader], tier: f64) -> Result<(), ValidationFailure> {
    if leaders.iter().any(|l| l.within_tier(tier)) {
        Ok(())
    } else {
        Err(ValidationFailure::NoLeaderWithinTier(tier))
    }
}

fn check_no_repeats(
    leaders: &[Leader],
    recent: &HashSet<LeaderId>,
) -> Result<(), ValidationFailure> {
    match leaders.iter().find(|l| recent.contains(&l.id)) {
        Some(leader) => Err(ValidationFailure::RecentlyPicked(leader.id)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Shuffler
// ---------------------------------------------------------------------------

/// Retry caps for [`Shuffler::shuffle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShuffleLimits {
    /// Whole-draft attempts before giving up.
    pub max_attempts: usize,
    /// Proposals per player within one attempt.
    pub max_player_attempts: usize,
}

impl Default for ShuffleLimits {
    fn default() -> Self {
        Self {
            max_attempts: 2000,
            max_player_attempts: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AbandonReason {
    /// A player's proposals all failed validation, or too few leaders
    /// outside their recent picks remain.
    PlayerExhausted,
    /// Too few leaders left for the next player.
    PoolExhausted,
}

#[derive(Debug)]
enum AttemptOutcome {
    Complete(Vec<Offering>),
    Abandoned {
        player: PlayerId,
        covered: usize,
        available: usize,
        reason: AbandonReason,
    },
}

/// Inputs that stay fixed across every attempt of one shuffle.
struct Round<'a> {
    entry: &'a StrategyEntry,
    strategy: &'a DraftStrategy,
    params: &'a RuleParams,
    /// Each player's recent picks, looked up once per call.
    recent: HashMap<PlayerId, HashSet<LeaderId>>,
}

#[derive(Debug, Clone, Default)]
pub struct Shuffler {
    registry: StrategyRegistry,
    limits: ShuffleLimits,
}

impl Shuffler {
    /// Zero caps are raised to one.
    pub fn new(registry: StrategyRegistry, limits: ShuffleLimits) -> Self {
        let limits = ShuffleLimits {
            max_attempts: limits.max_attempts.max(1),
            max_player_attempts: limits.max_player_attempts.max(1),
        };
        Self { registry, limits }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Produce one offering per player under `strategy`.
    ///
    /// Returns `RanOutOfChoices` when no attempt within the cap covers every
    /// player; a short result is never returned.
    pub fn shuffle(
        &self,
        leaders: &[Leader],
        players: &[PlayerId],
        strategy: &DraftStrategy,
        draft_id: &str,
        history: &dyn HistoryLookup,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Offering>, DraftError> {
        let entry = self
            .registry
            .get(&strategy.name)
            .ok_or_else(|| DraftError::UnknownStrategy {
                name: strategy.name.clone(),
            })?;
        let params = strategy.validate()?;
        let Some(&first) = players.first() else {
            return Ok(Vec::new());
        };

        let catalog = unbanned(leaders);
        let games = (entry.history_games)(&params);
        let round = Round {
            entry,
            strategy,
            params: &params,
            recent: players
                .iter()
                .map(|&p| (p, history.recent_leaders(p, games)))
                .collect(),
        };

        let mut last_failure = (first, catalog.len());
        for attempt in 1..=self.limits.max_attempts {
            match self.attempt(&round, &catalog, players, draft_id, rng) {
                AttemptOutcome::Complete(offerings) => {
                    info!(
                        "Shuffled {} offerings with {} for draft {} (attempt {})",
                        offerings.len(),
                        strategy.name,
                        draft_id,
                        attempt
                    );
                    return Ok(offerings);
                }
                AttemptOutcome::Abandoned {
                    player,
                    covered,
                    available,
                    reason,
                } => {
                    debug!(
                        "Attempt {} abandoned at player {} ({:?}, {}/{} covered)",
                        attempt,
                        player,
                        reason,
                        covered,
                        players.len()
                    );
                    last_failure = (player, available);
                }
            }
        }

        let (player, available) = last_failure;
        info!(
            "Gave up shuffling {} for draft {} after {} attempts",
            strategy.name, draft_id, self.limits.max_attempts
        );
        Err(DraftError::RanOutOfChoices {
            player,
            needed: strategy.pool_size,
            available,
        })
    }

    fn attempt(
        &self,
        round: &Round<'_>,
        catalog: &[Leader],
        players: &[PlayerId],
        draft_id: &str,
        rng: &mut dyn RngCore,
    ) -> AttemptOutcome {
        let (entry, strategy) = (round.entry, round.strategy);
        let mut eligible = catalog.to_vec();
        let mut offerings = Vec::with_capacity(players.len());

        for &player in players {
            if entry.reduces_pool && eligible.len() < strategy.pool_size {
                return AttemptOutcome::Abandoned {
                    player,
                    covered: offerings.len(),
                    available: eligible.len(),
                    reason: AbandonReason::PoolExhausted,
                };
            }

            let mut leaders = match self.offer_player(round, &eligible, player, rng) {
                Ok(leaders) => leaders,
                Err(available) => {
                    return AttemptOutcome::Abandoned {
                        player,
                        covered: offerings.len(),
                        available,
                        reason: AbandonReason::PlayerExhausted,
                    };
                }
            };

            if entry.reduces_pool {
                let taken: HashSet<LeaderId> = leaders.iter().map(|l| l.id).collect();
                eligible.retain(|l| !taken.contains(&l.id));
            }
            if !strategy.randomize {
                leaders.sort_by(Leader::cmp_presentation);
            }
            offerings.push(Offering {
                player,
                leaders,
                draft_id: draft_id.to_string(),
            });
        }

        AttemptOutcome::Complete(offerings)
    }

    /// An accepted proposal, or the number of leaders `player` could still
    /// be offered when none was accepted.
    fn offer_player(
        &self,
        round: &Round<'_>,
        eligible: &[Leader],
        player: PlayerId,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Leader>, usize> {
        let no_recent = HashSet::new();
        let recent = round.recent.get(&player).unwrap_or(&no_recent);

        if round.entry.reduces_pool && !recent.is_empty() {
            let fresh = eligible.iter().filter(|l| !recent.contains(&l.id)).count();
            if fresh < round.strategy.pool_size {
                trace!("Player {} has only {} leaders outside recent picks", player, fresh);
                return Err(fresh);
            }
        }

        for _ in 0..self.limits.max_player_attempts {
            let leaders = (round.entry.generate)(eligible, player, round.strategy, rng);
            let proposal = Proposal {
                player,
                leaders: &leaders,
                strategy: round.strategy,
                params: round.params,
                recent,
            };
            match (round.entry.validate)(&proposal) {
                Ok(()) => return Ok(leaders),
                Err(failure) => trace!("Rejected proposal for player {}: {}", player, failure),
            }
        }
        Err(eligible.len())
    }
}
