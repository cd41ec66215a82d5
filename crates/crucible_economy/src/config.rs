//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! seed_domain = "crucible/v1"
//! node_version = "0.1.0"
//! max_item_inputs = 16
//!
//! [limits]
//! max_program_len = 4096
//! max_depth = 64
//! max_steps = 10000
//! ```

use std::path::Path;

use crucible_expr::Limits;
use serde::{Deserialize, Serialize};

use crate::error::{RecipeError, RecipeResult};

/// Default domain-separation tag mixed into every seed.
pub const DEFAULT_SEED_DOMAIN: &str = "crucible/v1";

/// Engine-wide settings.
///
/// Every validator must run with the same `seed_domain` and `limits`,
/// otherwise re-executions diverge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Expression limits applied to every program.
    pub limits: Limits,
    /// Domain-separation tag for seed derivation.
    pub seed_domain: String,
    /// Software version tag recorded on executions.
    pub node_version: String,
    /// Upper bound on recipe item-input slots.
    pub max_item_inputs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            seed_domain: DEFAULT_SEED_DOMAIN.to_string(),
            node_version: env!("CARGO_PKG_VERSION").to_string(),
            max_item_inputs: 16,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeError::InvalidConfig`] on malformed TOML or
    /// out-of-range values.
    pub fn from_toml_str(text: &str) -> RecipeResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| RecipeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// I/O failures and parse failures both map to
    /// [`RecipeError::InvalidConfig`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> RecipeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RecipeError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> RecipeResult<()> {
        if self.seed_domain.is_empty() {
            return Err(RecipeError::InvalidConfig("seed_domain must not be empty".into()));
        }
        if self.limits.max_program_len == 0 || self.limits.max_depth == 0 || self.limits.max_steps == 0 {
            return Err(RecipeError::InvalidConfig("expression limits must be positive".into()));
        }
        if self.max_item_inputs == 0 {
            return Err(RecipeError::InvalidConfig("max_item_inputs must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            seed_domain = "testnet"

            [limits]
            max_steps = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.seed_domain, "testnet");
        assert_eq!(config.limits.max_steps, 500);
        assert_eq!(config.limits.max_depth, Limits::default().max_depth);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("seed_domain = \"\""),
            Err(RecipeError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[limits]\nmax_steps = 0"),
            Err(RecipeError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("max_item_inputs = \"many\""),
            Err(RecipeError::InvalidConfig(_))
        ));
    }
}
