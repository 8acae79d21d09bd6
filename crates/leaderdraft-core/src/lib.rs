// Leader draft engine: rules, pools, the allocator and the shuffler.
//
// Everything here is a pure computation over the supplied catalog, roster
// and history, plus one injected random source.

pub mod allocator;
pub mod error;
pub mod history;
pub mod model;
pub mod pool;
pub mod rule;
pub mod shuffler;
pub mod strategy;

pub use allocator::{roll_for_player, roll_for_players, Assigned};
pub use error::DraftError;
pub use history::{HistoryLookup, NoHistory, RecentPicks};
pub use model::{Leader, LeaderId, Offering, Pick, Player, PlayerId};
pub use pool::Pool;
pub use rule::{LeaderRule, Predicate, Rule, RuleKind};
pub use shuffler::{ShuffleLimits, Shuffler, StrategyEntry, StrategyRegistry};
pub use strategy::{DraftStrategy, RuleParams};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Random source for a draft: seeded when `seed` is given, otherwise drawn
/// from OS entropy.
pub fn draft_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}
