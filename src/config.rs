//! Inbound session configuration
//!
//! Supplied by the hosting shell as JSON. Validated into a [`ResolvedConfig`]
//! before a session may start.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sim::DrillKind;
use crate::tuning::{self, DifficultyProfile, DifficultyTier};

/// Raw host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Tier name: easy, medium, hard or expert
    pub difficulty_tier: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Replaces the tier's session budget
    #[serde(default)]
    pub session_budget_override_ms: Option<i64>,
    /// Submit the score record to the stats boundary on completion
    #[serde(default = "default_auto_submit")]
    pub auto_submit: bool,
    /// Fixed RNG seed (replays, tests). Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_auto_submit() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            difficulty_tier: DifficultyTier::Easy.as_str().to_string(),
            user_id: None,
            session_budget_override_ms: None,
            auto_submit: true,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Config for a tier with a fixed seed
    pub fn seeded(tier: DifficultyTier, seed: u64) -> Self {
        Self {
            difficulty_tier: tier.as_str().to_string(),
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Validate against a drill's tuning table
    pub fn resolve(&self, kind: DrillKind) -> Result<ResolvedConfig, ConfigError> {
        let tier: DifficultyTier = self.difficulty_tier.parse()?;
        let table = tuning::table_for(kind);
        table.validate(kind)?;

        let mut profile = table.profile(tier);
        if let Some(budget) = self.session_budget_override_ms {
            if budget <= 0 {
                return Err(ConfigError::NonPositiveBudget(budget));
            }
            profile.session_budget_ms = budget as u64;
        }

        let seed = self.seed.unwrap_or_else(crate::platform::entropy_seed);

        Ok(ResolvedConfig {
            kind,
            tier,
            profile,
            user_id: self.user_id.clone(),
            auto_submit: self.auto_submit,
            seed,
        })
    }
}

/// Validated configuration, ready for `Session::new`
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub kind: DrillKind,
    pub tier: DifficultyTier,
    pub profile: DifficultyProfile,
    pub user_id: Option<String>,
    pub auto_submit: bool,
    pub seed: u64,
}

impl ResolvedConfig {
    /// Resolve the stock profile for a drill and tier
    pub fn new(kind: DrillKind, tier: DifficultyTier, seed: u64) -> Self {
        Self {
            kind,
            tier,
            profile: tuning::profile(kind, tier),
            user_id: None,
            auto_submit: true,
            seed,
        }
    }

    /// Swap in a hand-tuned profile (tests, experiments)
    pub fn with_profile(mut self, profile: DifficultyProfile) -> Self {
        self.tier = profile.tier;
        self.profile = profile;
        self
    }
}
