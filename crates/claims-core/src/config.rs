//! Claim configuration.

use std::path::PathBuf;
use std::time::Duration;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ClaimError, ClaimResult};
use crate::flag::{Flag, FlagSet, FlagValues};
use crate::growth::GrowthPolicy;
use crate::permission::ExplosionRule;
use crate::trust::{TrustLevel, TrustPermissions};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClaimsConfig {
    pub max_cells_per_region: usize,
    pub max_regions_per_owner: usize,
    pub require_adjacent: bool,
    pub auto_save_interval_secs: u64,
    /// Queue writes on a background worker instead of waiting for them.
    pub async_saves: bool,
    pub data_dir: PathBuf,
    pub map_size_mb: usize,
    /// Flag key → value applied to every new region.
    pub default_flags: HashMap<String, bool>,
    pub trust_levels: TrustLevelsConfig,
    pub protection: ProtectionConfig,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            max_cells_per_region: 100,
            max_regions_per_owner: 1,
            require_adjacent: true,
            auto_save_interval_secs: 300,
            async_saves: true,
            data_dir: PathBuf::from("data/claims"),
            map_size_mb: 256,
            default_flags: HashMap::new(),
            trust_levels: TrustLevelsConfig::default(),
            protection: ProtectionConfig::default(),
        }
    }
}

impl ClaimsConfig {
    /// Check every flag key the configuration mentions.
    pub fn validate(&self) -> ClaimResult<()> {
        self.flag_defaults()?;
        self.trust_permissions()?;
        Ok(())
    }

    #[must_use]
    pub const fn growth_policy(&self) -> GrowthPolicy {
        GrowthPolicy {
            require_adjacent: self.require_adjacent,
            max_regions_per_owner: self.max_regions_per_owner,
            max_cells_per_region: self.max_cells_per_region,
        }
    }

    /// Flag values a new region starts with.
    pub fn flag_defaults(&self) -> ClaimResult<FlagValues> {
        self.default_flags
            .iter()
            .map(|(key, value)| Ok((parse_flag(key)?, *value)))
            .collect()
    }

    pub fn trust_permissions(&self) -> ClaimResult<TrustPermissions> {
        let levels = &self.trust_levels;
        Ok(TrustPermissions::new(
            parse_set(&levels.trusted)?,
            parse_set(&levels.moderator)?,
            parse_set(&levels.admin)?,
        ))
    }

    #[must_use]
    pub const fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval_secs)
    }

    #[must_use]
    pub const fn map_size_bytes(&self) -> usize {
        self.map_size_mb * 1024 * 1024
    }
}

fn parse_flag(key: &str) -> ClaimResult<Flag> {
    Flag::from_key(key).ok_or_else(|| ClaimError::InvalidFlag(key.to_owned()))
}

fn parse_set(keys: &[String]) -> ClaimResult<FlagSet> {
    keys.iter().map(|k| parse_flag(k)).collect()
}

/// Flag keys each trust level may act on. Higher levels also inherit every
/// lower level's list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TrustLevelsConfig {
    pub trusted: Vec<String>,
    pub moderator: Vec<String>,
    pub admin: Vec<String>,
}

impl Default for TrustLevelsConfig {
    fn default() -> Self {
        let keys = |set: FlagSet| -> Vec<String> { set.flags().map(|f| f.key().to_owned()).collect() };
        let defaults = TrustPermissions::default();
        let trusted = defaults.of(TrustLevel::Trusted);
        let moderator = defaults.of(TrustLevel::Moderator);
        Self {
            trusted: keys(trusted),
            moderator: keys(moderator - trusted),
            admin: keys(defaults.of(TrustLevel::Admin) - moderator),
        }
    }
}

/// Master switches for the event feed. A disabled switch lets that intent
/// through everywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProtectionConfig {
    pub block_break: bool,
    pub block_place: bool,
    pub interact: bool,
    pub explosion: bool,
    /// Spare every claimed cell from explosions regardless of flags.
    pub blanket_explosions: bool,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            block_break: true,
            block_place: true,
            interact: true,
            explosion: true,
            blanket_explosions: false,
        }
    }
}

impl ProtectionConfig {
    #[must_use]
    pub const fn explosion_rule(&self) -> ExplosionRule {
        if self.blanket_explosions {
            ExplosionRule::Blanket
        } else {
            ExplosionRule::FlagGated
        }
    }
}
