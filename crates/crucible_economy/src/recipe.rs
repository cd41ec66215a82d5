//! # Recipes
//!
//! Declarative transformation rules: positional item-input slots, coin
//! inputs, output entries and weighted output sets.
//!
//! Recipes are authored in TOML and validated once when registered in a
//! [`RecipeBook`]. A registered recipe is immutable.
//!
//! ```toml
//! [[recipes]]
//! cookbook_id = "arena"
//! id = "reforge"
//! block_interval = 2
//!
//! [[recipes.item_inputs]]
//! id = "blade"
//! strings = [{ key = "Name", value = "sword" }]
//! longs = [{ key = "HP", min_value = 100, max_value = 200 }]
//!
//! [[recipes.entries.coin_outputs]]
//! id = "reward"
//! coin = "gold"
//! count = "rand(10) + 1"
//!
//! [[recipes.outputs]]
//! entry_ids = ["reward"]
//! weight = 1
//! ```

use std::collections::{HashMap, HashSet};

use crucible_expr::Program;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{RecipeError, RecipeResult};
use crate::sampler::{DoubleWeightTable, IntWeightTable};

// ============================================================================
// INPUT CONSTRAINTS
// ============================================================================

/// Inclusive range constraint on a floating field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoubleInputParam {
    /// Field name, or a program when used as a condition.
    pub key: String,
    /// Inclusive lower bound.
    pub min_value: f64,
    /// Inclusive upper bound.
    pub max_value: f64,
}

impl DoubleInputParam {
    /// True when `value` lies within `[min_value, max_value]`.
    #[inline]
    #[must_use]
    pub fn has(&self, value: f64) -> bool {
        self.min_value <= value && value <= self.max_value
    }
}

/// Inclusive range constraint on an integer field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongInputParam {
    /// Field name, or a program when used as a condition.
    pub key: String,
    /// Inclusive lower bound.
    pub min_value: i64,
    /// Inclusive upper bound.
    pub max_value: i64,
}

impl LongInputParam {
    /// True when `value` lies within `[min_value, max_value]`.
    #[inline]
    #[must_use]
    pub const fn has(&self, value: i64) -> bool {
        self.min_value <= value && value <= self.max_value
    }
}

/// Exact-match constraint on a string field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringInputParam {
    /// Field name, or a program when used as a condition.
    pub key: String,
    /// Required value.
    pub value: String,
}

/// Expression-based constraints; each `key` is a program evaluated
/// against the candidate item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionList {
    /// Programs with a floating result.
    pub doubles: Vec<DoubleInputParam>,
    /// Programs with an integer result.
    pub longs: Vec<LongInputParam>,
    /// Programs with a string result.
    pub strings: Vec<StringInputParam>,
}

impl ConditionList {
    /// True when no condition is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doubles.is_empty() && self.longs.is_empty() && self.strings.is_empty()
    }
}

/// Transfer fee bounds an input item must declare. Recorded, not enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeInputParam {
    /// Inclusive lower bound.
    pub min_value: u64,
    /// Inclusive upper bound.
    pub max_value: u64,
}

/// One positional item-input slot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemInput {
    /// Slot id, referenced by item-modify outputs.
    pub id: String,
    /// Floating field ranges.
    #[serde(default)]
    pub doubles: Vec<DoubleInputParam>,
    /// Integer field ranges.
    #[serde(default)]
    pub longs: Vec<LongInputParam>,
    /// String field equalities.
    #[serde(default)]
    pub strings: Vec<StringInputParam>,
    /// Transfer fee bounds.
    #[serde(default)]
    pub transfer_fee: FeeInputParam,
    /// Expression-based constraints.
    #[serde(default)]
    pub conditions: ConditionList,
}

/// Coins the recipe consumes. Custody is the host's concern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInput {
    /// Denomination.
    pub coin: String,
    /// Amount.
    pub count: u64,
}

// ============================================================================
// OUTPUT PARAMETERS
// ============================================================================

/// Floating output parameter.
///
/// A non-empty `program` takes precedence over `weight_table`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DoubleParam {
    /// Attribute name produced.
    pub key: String,
    /// Expression producing the value.
    #[serde(default)]
    pub program: String,
    /// Distribution used when no program is set.
    #[serde(default)]
    pub weight_table: DoubleWeightTable,
}

/// Integer output parameter.
///
/// A non-empty `program` takes precedence over `weight_table`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongParam {
    /// Attribute name produced.
    pub key: String,
    /// Expression producing the value.
    #[serde(default)]
    pub program: String,
    /// Distribution used when no program is set.
    #[serde(default)]
    pub weight_table: IntWeightTable,
}

/// String output parameter: a literal, or a program when one is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringParam {
    /// Attribute name produced.
    pub key: String,
    /// Literal value.
    #[serde(default)]
    pub value: String,
    /// Expression producing the value.
    #[serde(default)]
    pub program: String,
}

/// Ordered floating parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoubleParamList {
    /// Parameters in declaration order.
    pub params: Vec<DoubleParam>,
}

/// Ordered integer parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LongParamList {
    /// Parameters in declaration order.
    pub params: Vec<LongParam>,
}

/// Ordered string parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringParamList {
    /// Parameters in declaration order.
    pub params: Vec<StringParam>,
}

// ============================================================================
// OUTPUTS
// ============================================================================

/// Coins minted by an entry. `count` is an integer program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinOutput {
    /// Entry id.
    pub id: String,
    /// Denomination.
    pub coin: String,
    /// Integer program for the amount, e.g. `rand(10) + 1`.
    pub count: String,
}

/// A newly created item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemOutput {
    /// Entry id, also the new item's id prefix.
    pub id: String,
    /// Floating attributes.
    #[serde(default)]
    pub doubles: DoubleParamList,
    /// Integer attributes.
    #[serde(default)]
    pub longs: LongParamList,
    /// String attributes.
    #[serde(default)]
    pub strings: StringParamList,
    /// Fee charged when the item is later transferred.
    #[serde(default)]
    pub transfer_fee: u64,
}

/// Overwrites attributes on a matched input item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemModifyOutput {
    /// Entry id.
    pub id: String,
    /// [`ItemInput::id`] of the slot whose item is modified.
    pub item_input_ref: String,
    /// Floating attributes set on the item.
    #[serde(default)]
    pub doubles: DoubleParamList,
    /// Integer attributes set on the item.
    #[serde(default)]
    pub longs: LongParamList,
    /// String attributes set on the item.
    #[serde(default)]
    pub strings: StringParamList,
}

/// All entries a recipe can produce.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntriesList {
    /// Coin entries.
    pub coin_outputs: Vec<CoinOutput>,
    /// New-item entries.
    pub item_outputs: Vec<ItemOutput>,
    /// Item-modify entries.
    pub item_modify_outputs: Vec<ItemModifyOutput>,
}

impl EntriesList {
    /// Every entry id in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.coin_outputs
            .iter()
            .map(|c| c.id.as_str())
            .chain(self.item_outputs.iter().map(|i| i.id.as_str()))
            .chain(self.item_modify_outputs.iter().map(|m| m.id.as_str()))
    }
}

/// A set of entries produced together, chosen by weight at completion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedOutputs {
    /// Entries produced when this set is chosen.
    pub entry_ids: Vec<String>,
    /// Relative weight.
    pub weight: i64,
}

// ============================================================================
// RECIPE
// ============================================================================

/// A published recipe.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Owning cookbook.
    pub cookbook_id: String,
    /// Recipe id, unique within the cookbook.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Coins consumed.
    #[serde(default)]
    pub coin_inputs: Vec<CoinInput>,
    /// Positional item slots.
    #[serde(default)]
    pub item_inputs: Vec<ItemInput>,
    /// Producible entries.
    #[serde(default)]
    pub entries: EntriesList,
    /// Weighted output sets.
    #[serde(default)]
    pub outputs: Vec<WeightedOutputs>,
    /// Blocks between submission and completion.
    #[serde(default)]
    pub block_interval: u64,
}

#[derive(Deserialize)]
struct RecipeDocument {
    #[serde(default)]
    recipes: Vec<Recipe>,
}

fn invalid(recipe: &Recipe, message: impl std::fmt::Display) -> RecipeError {
    RecipeError::InvalidRecipe(format!("{}/{}: {message}", recipe.cookbook_id, recipe.id))
}

impl Recipe {
    /// Parses and validates a single recipe table.
    ///
    /// # Errors
    ///
    /// [`RecipeError::InvalidRecipe`] on malformed TOML or a failed check.
    pub fn from_toml_str(text: &str, config: &EngineConfig) -> RecipeResult<Self> {
        let recipe: Self =
            toml::from_str(text).map_err(|e| RecipeError::InvalidRecipe(e.to_string()))?;
        recipe.validate(config)?;
        Ok(recipe)
    }

    /// Looks up a slot index by its id.
    #[must_use]
    pub fn slot_index(&self, item_input_id: &str) -> Option<usize> {
        self.item_inputs.iter().position(|s| s.id == item_input_id)
    }

    fn check_program(&self, program: &str, config: &EngineConfig) -> RecipeResult<()> {
        Program::compile(program, &config.limits)
            .map(drop)
            .map_err(|e| invalid(self, format!("program `{program}`: {e}")))
    }

    fn check_params(
        &self,
        doubles: &DoubleParamList,
        longs: &LongParamList,
        strings: &StringParamList,
        config: &EngineConfig,
    ) -> RecipeResult<()> {
        for p in &doubles.params {
            if p.program.is_empty() {
                for r in &p.weight_table.weight_ranges {
                    if !(r.lower.is_finite() && r.upper.is_finite() && r.lower <= r.upper) {
                        return Err(invalid(self, format!("param {}: bad range [{}, {}]", p.key, r.lower, r.upper)));
                    }
                }
            } else {
                self.check_program(&p.program, config)?;
            }
        }
        for p in &longs.params {
            if p.program.is_empty() {
                for r in &p.weight_table.weight_ranges {
                    if r.lower > r.upper {
                        return Err(invalid(self, format!("param {}: bad range [{}, {}]", p.key, r.lower, r.upper)));
                    }
                }
            } else {
                self.check_program(&p.program, config)?;
            }
        }
        for p in strings.params.iter().filter(|p| !p.program.is_empty()) {
            self.check_program(&p.program, config)?;
        }
        Ok(())
    }

    /// Checks authoring rules.
    ///
    /// # Errors
    ///
    /// [`RecipeError::InvalidRecipe`] naming the first violated rule.
    pub fn validate(&self, config: &EngineConfig) -> RecipeResult<()> {
        if self.cookbook_id.is_empty() || self.id.is_empty() {
            return Err(invalid(self, "cookbook_id and id are required"));
        }
        if self.item_inputs.len() > config.max_item_inputs {
            return Err(invalid(
                self,
                format!("{} item inputs exceed limit {}", self.item_inputs.len(), config.max_item_inputs),
            ));
        }

        let mut slot_ids = HashSet::new();
        for slot in &self.item_inputs {
            if !slot_ids.insert(slot.id.as_str()) {
                return Err(invalid(self, format!("duplicate item input id {}", slot.id)));
            }
            for p in slot.doubles.iter().chain(&slot.conditions.doubles) {
                if p.min_value.is_nan() || p.max_value.is_nan() || p.min_value > p.max_value {
                    return Err(invalid(self, format!("input {}: bad range for {}", slot.id, p.key)));
                }
            }
            for p in slot.longs.iter().chain(&slot.conditions.longs) {
                if p.min_value > p.max_value {
                    return Err(invalid(self, format!("input {}: bad range for {}", slot.id, p.key)));
                }
            }
            let conditions = &slot.conditions;
            for program in conditions
                .doubles
                .iter()
                .map(|p| &p.key)
                .chain(conditions.longs.iter().map(|p| &p.key))
                .chain(conditions.strings.iter().map(|p| &p.key))
            {
                self.check_program(program, config)?;
            }
        }

        let mut entry_ids = HashSet::new();
        for id in self.entries.ids() {
            if !entry_ids.insert(id) {
                return Err(invalid(self, format!("duplicate entry id {id}")));
            }
        }

        for coin in &self.entries.coin_outputs {
            self.check_program(&coin.count, config)?;
        }
        for item in &self.entries.item_outputs {
            self.check_params(&item.doubles, &item.longs, &item.strings, config)?;
        }
        for modify in &self.entries.item_modify_outputs {
            if !slot_ids.contains(modify.item_input_ref.as_str()) {
                return Err(invalid(
                    self,
                    format!("entry {} references unknown item input {}", modify.id, modify.item_input_ref),
                ));
            }
            self.check_params(&modify.doubles, &modify.longs, &modify.strings, config)?;
        }

        for set in &self.outputs {
            if let Some(missing) = set.entry_ids.iter().find(|id| !entry_ids.contains(id.as_str())) {
                return Err(invalid(self, format!("output references unknown entry {missing}")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// RECIPE BOOK
// ============================================================================

/// Validated recipes keyed by `(cookbook_id, recipe_id)`.
#[derive(Clone, Debug, Default)]
pub struct RecipeBook {
    config: EngineConfig,
    recipes: HashMap<(String, String), Recipe>,
}

impl RecipeBook {
    /// Creates an empty book validating against `config`.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            recipes: HashMap::new(),
        }
    }

    /// Parses a `[[recipes]]` document.
    ///
    /// # Errors
    ///
    /// [`RecipeError::InvalidRecipe`] on malformed TOML, a failed check, or
    /// a duplicate key.
    pub fn from_toml_str(text: &str, config: EngineConfig) -> RecipeResult<Self> {
        let doc: RecipeDocument =
            toml::from_str(text).map_err(|e| RecipeError::InvalidRecipe(e.to_string()))?;
        let mut book = Self::new(config);
        for recipe in doc.recipes {
            book.insert(recipe)?;
        }
        Ok(book)
    }

    /// Validates and registers a recipe.
    ///
    /// # Errors
    ///
    /// [`RecipeError::InvalidRecipe`] if validation fails or the key is taken.
    pub fn insert(&mut self, recipe: Recipe) -> RecipeResult<()> {
        recipe.validate(&self.config)?;
        let key = (recipe.cookbook_id.clone(), recipe.id.clone());
        if self.recipes.contains_key(&key) {
            return Err(invalid(&recipe, "already registered"));
        }
        self.recipes.insert(key, recipe);
        Ok(())
    }

    /// Fetches a recipe.
    ///
    /// # Errors
    ///
    /// [`RecipeError::RecipeNotFound`] when absent.
    pub fn get(&self, cookbook_id: &str, recipe_id: &str) -> RecipeResult<&Recipe> {
        self.recipes
            .get(&(cookbook_id.to_string(), recipe_id.to_string()))
            .ok_or_else(|| RecipeError::RecipeNotFound {
                cookbook_id: cookbook_id.to_string(),
                recipe_id: recipe_id.to_string(),
            })
    }

    /// Number of registered recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// True when no recipe is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Configuration recipes are validated against.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORGE: &str = r#"
        [[recipes]]
        cookbook_id = "arena"
        id = "reforge"
        block_interval = 2

        [[recipes.coin_inputs]]
        coin = "gold"
        count = 5

        [[recipes.item_inputs]]
        id = "blade"
        strings = [{ key = "Name", value = "sword" }]
        longs = [{ key = "HP", min_value = 100, max_value = 200 }]

        [recipes.item_inputs.conditions]
        longs = [{ key = "HP * 2", min_value = 200, max_value = 400 }]

        [[recipes.entries.coin_outputs]]
        id = "reward"
        coin = "gold"
        count = "rand(10) + 1"

        [[recipes.entries.item_modify_outputs]]
        id = "sharpen"
        item_input_ref = "blade"
        longs = [{ key = "HP", program = "HP + 10" }]

        [[recipes.outputs]]
        entry_ids = ["reward", "sharpen"]
        weight = 1
    "#;

    #[test]
    fn test_parse_document() {
        let book = RecipeBook::from_toml_str(FORGE, EngineConfig::default()).unwrap();
        assert_eq!(book.len(), 1);

        let recipe = book.get("arena", "reforge").unwrap();
        assert_eq!(recipe.block_interval, 2);
        assert_eq!(recipe.coin_inputs[0].count, 5);
        assert_eq!(recipe.item_inputs[0].longs[0].max_value, 200);
        assert_eq!(recipe.item_inputs[0].conditions.longs[0].key, "HP * 2");
        assert!(!recipe.item_inputs[0].conditions.is_empty());
        assert!(ConditionList::default().is_empty());
        assert_eq!(recipe.entries.item_modify_outputs[0].longs.params[0].program, "HP + 10");
        assert_eq!(recipe.slot_index("blade"), Some(0));
    }

    #[test]
    fn test_missing_recipe() {
        let book = RecipeBook::new(EngineConfig::default());
        assert!(matches!(book.get("a", "b"), Err(RecipeError::RecipeNotFound { .. })));
    }

    #[test]
    fn test_range_inclusive() {
        let p = LongInputParam {
            key: "HP".into(),
            min_value: 100,
            max_value: 200,
        };
        assert!(p.has(100) && p.has(200));
        assert!(!p.has(99) && !p.has(201));

        let d = DoubleInputParam {
            key: "attack".into(),
            min_value: 1.0,
            max_value: 2.0,
        };
        assert!(d.has(1.0) && d.has(2.0));
        assert!(!d.has(1.0 - f64::EPSILON) && !d.has(2.0 + 4.0 * f64::EPSILON));
    }

    fn base() -> Recipe {
        Recipe {
            cookbook_id: "cb".into(),
            id: "r".into(),
            item_inputs: vec![ItemInput {
                id: "a".into(),
                ..ItemInput::default()
            }],
            ..Recipe::default()
        }
    }

    #[test]
    fn test_validation_rules() {
        let config = EngineConfig::default();
        assert!(base().validate(&config).is_ok());

        let mut r = base();
        r.entries.item_modify_outputs.push(ItemModifyOutput {
            id: "m".into(),
            item_input_ref: "missing".into(),
            ..ItemModifyOutput::default()
        });
        assert!(matches!(r.validate(&config), Err(RecipeError::InvalidRecipe(_))));

        let mut r = base();
        r.outputs.push(WeightedOutputs {
            entry_ids: vec!["ghost".into()],
            weight: 1,
        });
        assert!(r.validate(&config).is_err());

        let mut r = base();
        r.entries.item_outputs.push(ItemOutput {
            id: "i".into(),
            longs: LongParamList {
                params: vec![LongParam {
                    key: "HP".into(),
                    weight_table: IntWeightTable::new(&[(10, 1, 1)]),
                    ..LongParam::default()
                }],
            },
            ..ItemOutput::default()
        });
        assert!(r.validate(&config).is_err());

        let mut r = base();
        r.entries.coin_outputs.push(CoinOutput {
            id: "c".into(),
            coin: "gold".into(),
            count: "rand(".into(),
        });
        assert!(r.validate(&config).is_err());

        let mut r = base();
        r.item_inputs.push(r.item_inputs[0].clone());
        assert!(r.validate(&config).is_err());

        let tight = EngineConfig {
            max_item_inputs: 0,
            ..EngineConfig::default()
        };
        assert!(base().validate(&tight).is_err());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut book = RecipeBook::new(EngineConfig::default());
        book.insert(base()).unwrap();
        assert!(matches!(book.insert(base()), Err(RecipeError::InvalidRecipe(_))));
    }
}
