// A pool is one rule applied to one player's candidate leaders.

use std::collections::HashSet;

use crate::history::HistoryLookup;
use crate::model::{Leader, LeaderId, PlayerId};
use crate::rule::{LeaderRule, RuleKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    pub player: PlayerId,
    pub kind: RuleKind,
    pub leaders: Vec<Leader>,
}

impl Pool {
    pub fn evaluate<R: LeaderRule + ?Sized>(
        rule: &R,
        player: PlayerId,
        candidates: &[Leader],
        history: &dyn HistoryLookup,
    ) -> Self {
        Pool {
            player,
            kind: rule.kind(),
            leaders: rule.filter(player, candidates, history),
        }
    }

    pub fn ids(&self) -> HashSet<LeaderId> {
        self.leaders.iter().map(|l| l.id).collect()
    }

    /// Keep only leaders whose id is in `keep`, preserving order.
    pub fn intersect(&mut self, keep: &HashSet<LeaderId>) {
        self.leaders.retain(|l| keep.contains(&l.id));
    }

    pub fn len(&self) -> usize {
        self.leaders.len()
    }
}
