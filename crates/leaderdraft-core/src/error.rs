// Engine error types.

use thiserror::Error;

use crate::model::PlayerId;

#[derive(Debug, Error)]
pub enum DraftError {
    /// No feasible assignment exists under the current rules and remaining
    /// pool. Terminal: the engine never retries once this is raised.
    #[error("ran out of choices for player {player}: needed {needed}, {available} available")]
    RanOutOfChoices {
        player: PlayerId,
        needed: usize,
        available: usize,
    },

    #[error("invalid rule configuration for strategy `{strategy}`: {message}")]
    RuleConfig { strategy: String, message: String },

    #[error("unknown draft strategy `{name}`")]
    UnknownStrategy { name: String },
}

impl DraftError {
    /// True when the draft could not be completed under the current rules.
    pub fn is_out_of_choices(&self) -> bool {
        matches!(self, DraftError::RanOutOfChoices { .. })
    }
}
