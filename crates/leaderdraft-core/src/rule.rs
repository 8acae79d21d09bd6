// Leader rules: predicates over (player, leader) plus a combination kind.
//
// A rule of kind `All` constrains every leader in an offering; a rule of kind
// `AtLeastOne` only requires that the offering contains one satisfying
// leader. Banned leaders never pass any rule.

use serde::{Deserialize, Serialize};

use crate::history::HistoryLookup;
use crate::model::{Leader, PlayerId};

/// How a rule's verdicts combine across an offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    All,
    AtLeastOne,
}

/// The contract the allocator relies on. The engine never inspects concrete
/// rule types, so new rules only need to implement this trait.
pub trait LeaderRule {
    fn kind(&self) -> RuleKind;

    fn is_valid(&self, player: PlayerId, leader: &Leader, history: &dyn HistoryLookup) -> bool;

    /// Leaders from `leaders` that satisfy this rule, in their original order.
    fn filter(
        &self,
        player: PlayerId,
        leaders: &[Leader],
        history: &dyn HistoryLookup,
    ) -> Vec<Leader> {
        leaders
            .iter()
            .filter(|l| !l.banned && self.is_valid(player, l, history))
            .cloned()
            .collect()
    }
}

/// Built-in predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Always valid. Used as a pass-through pool slot.
    Any,
    /// Valid iff `leader.tier <= threshold`.
    MinTier(f64),
    /// Valid iff the leader is absent from the player's picks in their last
    /// N games.
    NoRepeat(usize),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eval(&self, player: PlayerId, leader: &Leader, history: &dyn HistoryLookup) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::MinTier(threshold) => leader.within_tier(*threshold),
            Predicate::NoRepeat(0) => true,
            Predicate::NoRepeat(games) => {
                !history.recent_leaders(player, *games).contains(&leader.id)
            }
            Predicate::And(parts) => parts.iter().all(|p| p.eval(player, leader, history)),
            Predicate::Or(parts) => parts.iter().any(|p| p.eval(player, leader, history)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub kind: RuleKind,
    pub predicate: Predicate,
}

impl Rule {
    pub fn new(kind: RuleKind, predicate: Predicate) -> Self {
        Self { kind, predicate }
    }

    pub fn no_op() -> Self {
        Self::new(RuleKind::All, Predicate::Any)
    }

    /// At least one offered leader must have `tier <= threshold`.
    pub fn min_tier(threshold: f64) -> Self {
        Self::new(RuleKind::AtLeastOne, Predicate::MinTier(threshold))
    }

    /// No offered leader may come from the player's last `games` games.
    pub fn no_repeat(games: usize) -> Self {
        Self::new(RuleKind::All, Predicate::NoRepeat(games))
    }
}

impl LeaderRule for Rule {
    fn kind(&self) -> RuleKind {
        self.kind
    }

    fn is_valid(&self, player: PlayerId, leader: &Leader, history: &dyn HistoryLookup) -> bool {
        self.predicate.eval(player, leader, history)
    }
}
