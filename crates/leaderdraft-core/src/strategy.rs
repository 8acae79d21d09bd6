// Draft strategies and their rule parameter bag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DraftError;
use crate::rule::Rule;

/// Named configuration controlling how offerings are generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftStrategy {
    pub name: String,
    /// Number of leaders in each offering.
    pub pool_size: usize,
    /// When false, offerings are presented sorted by tier instead of in
    /// draw order.
    #[serde(default = "default_randomize")]
    pub randomize: bool,
    /// Opaque rule parameters, e.g. `{"minTier": 2, "noRepeats": 3}`.
    #[serde(default)]
    pub rules: Map<String, Value>,
}

fn default_randomize() -> bool {
    true
}

/// Typed view of a strategy's rule bag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleParams {
    /// At least one offered leader must have `tier <= min_tier`.
    pub min_tier: Option<f64>,
    /// No offered leader may appear in the player's picks from their last
    /// `no_repeats` games.
    pub no_repeats: Option<usize>,
}

impl DraftStrategy {
    pub fn new(name: impl Into<String>, pool_size: usize) -> Self {
        Self {
            name: name.into(),
            pool_size,
            randomize: true,
            rules: Map::new(),
        }
    }

    /// Builder-style helper for setting one rule parameter.
    pub fn with_rule(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.rules.insert(key.to_string(), value.into());
        self
    }

    /// Parse the rule bag. Malformed data is fatal for the calling draft.
    pub fn params(&self) -> Result<RuleParams, DraftError> {
        let params: RuleParams = serde_json::from_value(Value::Object(self.rules.clone()))
            .map_err(|e| self.config_error(e.to_string()))?;

        if let Some(tier) = params.min_tier {
            if !tier.is_finite() {
                return Err(self.config_error(format!("minTier must be finite, got {tier}")));
            }
        }
        Ok(params)
    }

    /// Check the strategy is usable: a positive pool size and a parsable
    /// rule bag.
    pub fn validate(&self) -> Result<RuleParams, DraftError> {
        if self.pool_size == 0 {
            return Err(self.config_error("pool_size must be at least 1".into()));
        }
        self.params()
    }

    /// Translate the rule bag into one allocator rule per pool slot:
    /// a no-repeat slot covering `history_games` games, a min-tier slot,
    /// then pass-through slots.
    pub fn allocation_rules(&self, history_games: usize) -> Result<Vec<Rule>, DraftError> {
        let params = self.validate()?;

        let mut rules = Vec::with_capacity(self.pool_size);
        if history_games > 0 {
            rules.push(Rule::no_repeat(history_games));
        }
        if let Some(tier) = params.min_tier {
            rules.push(Rule::min_tier(tier));
        }
        if rules.len() > self.pool_size {
            return Err(self.config_error(format!(
                "pool_size {} is too small for {} constrained slots",
                self.pool_size,
                rules.len()
            )));
        }
        rules.resize(self.pool_size, Rule::no_op());
        Ok(rules)
    }

    fn config_error(&self, message: String) -> DraftError {
        DraftError::RuleConfig {
            strategy: self.name.clone(),
            message,
        }
    }
}
