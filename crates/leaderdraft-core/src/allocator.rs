// Rule-driven leader allocation.
//
// Each player gets one leader per rule. `All` rules narrow the candidate set,
// each `AtLeastOne` rule contributes one leader drawn from its own pool, and
// the remaining slots are filled at random. No leader is ever offered to two
// players in the same call.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::DraftError;
use crate::history::HistoryLookup;
use crate::model::{unbanned, Leader, LeaderId, Offering, PlayerId};
use crate::pool::Pool;
use crate::rule::{LeaderRule, RuleKind};

/// Leader ids already handed out earlier in the same allocation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assigned(HashSet<LeaderId>);

impl Assigned {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: LeaderId) -> bool {
        self.0.contains(&id)
    }

    /// Return the accumulator with `leaders` added.
    pub fn with<'a>(mut self, leaders: impl IntoIterator<Item = &'a Leader>) -> Self {
        self.0.extend(leaders.into_iter().map(|l| l.id));
        self
    }
}

/// Build one offering per player, in input order. Either every player gets
/// an offering of `rules.len()` leaders or the whole call fails.
pub fn roll_for_players<R, G>(
    players: &[PlayerId],
    rules: &[R],
    catalog: &[Leader],
    draft_id: &str,
    history: &dyn HistoryLookup,
    rng: &mut G,
) -> Result<Vec<Offering>, DraftError>
where
    R: LeaderRule,
    G: Rng + ?Sized,
{
    if rules.is_empty() {
        return Err(DraftError::RuleConfig {
            strategy: "inline rules".into(),
            message: "at least one rule is required (rules define the pool size)".into(),
        });
    }

    let candidates = unbanned(catalog);
    let mut assigned = Assigned::new();
    let mut offerings = Vec::with_capacity(players.len());

    for &player in players {
        let selection = roll_for_player(player, rules, &candidates, &assigned, history, rng)?;
        assigned = assigned.with(&selection);
        offerings.push(Offering {
            player,
            leaders: selection,
            draft_id: draft_id.to_string(),
        });
    }

    debug!(
        "Allocated {} offerings of {} leaders for draft {}",
        offerings.len(),
        rules.len(),
        draft_id
    );
    Ok(offerings)
}

/// Select `rules.len()` leaders for a single player, avoiding every leader in
/// `assigned`. `candidates` is expected to be free of banned leaders.
pub fn roll_for_player<R, G>(
    player: PlayerId,
    rules: &[R],
    candidates: &[Leader],
    assigned: &Assigned,
    history: &dyn HistoryLookup,
    rng: &mut G,
) -> Result<Vec<Leader>, DraftError>
where
    R: LeaderRule,
    G: Rng + ?Sized,
{
    let pool_size = rules.len();
    let (all_pools, any_pools): (Vec<Pool>, Vec<Pool>) = rules
        .iter()
        .map(|rule| Pool::evaluate(rule, player, candidates, history))
        .partition(|pool| pool.kind == RuleKind::All);

    let mut valid = intersect_all(candidates, &all_pools);
    valid.retain(|l| !assigned.contains(l.id));

    if valid.len() < pool_size && any_pools.is_empty() {
        return Err(out_of_choices(player, pool_size, valid.len()));
    }

    let mut selection = Vec::with_capacity(pool_size);
    for pool in &any_pools {
        let matching: Vec<usize> = valid
            .iter()
            .enumerate()
            .filter(|(_, l)| pool.leaders.iter().any(|p| p.id == l.id))
            .map(|(i, _)| i)
            .collect();
        let Some(&idx) = matching.choose(rng) else {
            debug!("No leader left for an at-least-one rule (player {})", player);
            return Err(out_of_choices(player, pool_size - selection.len(), 0));
        };
        selection.push(valid.remove(idx));
    }

    let remaining = pool_size - selection.len();
    if valid.len() < remaining {
        return Err(out_of_choices(player, remaining, valid.len()));
    }
    valid.shuffle(rng);
    selection.extend(valid.into_iter().take(remaining));

    Ok(selection)
}

/// Leaders present in every `All` pool, in candidate order. With no `All`
/// pools every candidate qualifies.
fn intersect_all(candidates: &[Leader], all_pools: &[Pool]) -> Vec<Leader> {
    let id_sets: Vec<HashSet<LeaderId>> = all_pools.iter().map(Pool::ids).collect();
    candidates
        .iter()
        .filter(|l| id_sets.iter().all(|ids| ids.contains(&l.id)))
        .cloned()
        .collect()
}

fn out_of_choices(player: PlayerId, needed: usize, available: usize) -> DraftError {
    DraftError::RanOutOfChoices {
        player,
        needed,
        available,
    }
}
