//! # CRUCIBLE Economy
//!
//! Recipe matching and output actualization for a ledger-resident game
//! economy.
//!
//! ## Design Principles
//!
//! 1. **Reproducible** - Every validator derives identical outputs from the
//!    same submission; randomness is seeded from on-chain data only
//! 2. **First-fit matching** - Slots are filled greedily in declaration
//!    order, without backtracking
//! 3. **All-or-nothing** - No partial matches, no partial output lists
//! 4. **External configuration** - Engine limits and recipes in TOML files
//!
//! ## Thread Safety
//!
//! Every call builds its own environments and discards them afterwards.
//! There is no shared mutable state in the engine; the in-memory item
//! store is the only type with interior locking.
//!
//! ## Example
//!
//! ```rust
//! use crucible_economy::{
//!     Engine, EngineConfig, ExecuteRecipeRequest, Item, MemoryItemStore, RecipeBook,
//! };
//!
//! let book = RecipeBook::from_toml_str(
//!     r#"
//!     [[recipes]]
//!     cookbook_id = "arena"
//!     id = "reforge"
//!
//!     [[recipes.item_inputs]]
//!     id = "blade"
//!     strings = [{ key = "Name", value = "sword" }]
//!
//!     [[recipes.entries.item_modify_outputs]]
//!     id = "sharpen"
//!     item_input_ref = "blade"
//!     longs = [{ key = "HP", program = "HP + 10" }]
//!
//!     [[recipes.outputs]]
//!     entry_ids = ["sharpen"]
//!     weight = 1
//!     "#,
//!     EngineConfig::default(),
//! )
//! .unwrap();
//!
//! let store = MemoryItemStore::new();
//! store.put(Item::new("arena", "s1").with_string("Name", "sword").with_long("HP", 90));
//!
//! let engine = Engine::new(book);
//! let request = ExecuteRecipeRequest {
//!     creator: "alice".into(),
//!     cookbook_id: "arena".into(),
//!     recipe_id: "reforge".into(),
//!     item_ids: vec!["s1".into()],
//!     block_height: 100,
//! };
//! let mut execution = engine.execute_recipe(&store, &request).unwrap();
//! let outcome = engine.complete_execution(&mut execution, 100).unwrap();
//! assert_eq!(outcome.modified_items[0].attributes.find_long("HP"), Some(100));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod actualize;
pub mod config;
pub mod constraint;
pub mod env;
pub mod error;
pub mod execution;
pub mod item;
pub mod matcher;
pub mod recipe;
pub mod sampler;
pub mod testing;

pub use config::EngineConfig;
pub use constraint::check_item;
pub use env::{derive_seed, EnvContext, EnvFactory, Environment, ExprEnv, ExprEnvFactory};
pub use error::{RecipeError, RecipeResult, Rejection};
pub use execution::{
    CoinAmount, Engine, ExecuteRecipeRequest, Execution, ExecutionLog, ExecutionOutcome,
    ExecutionStatus,
};
pub use item::{
    DoubleKeyValue, Item, ItemRecord, ItemStore, ItemTerms, LongKeyValue, MemoryItemStore,
    StringKeyValue,
};
pub use matcher::match_item_inputs;
pub use recipe::{
    CoinInput, CoinOutput, ConditionList, DoubleInputParam, DoubleParam, DoubleParamList,
    EntriesList, FeeInputParam, ItemInput, ItemModifyOutput, ItemOutput, LongInputParam,
    LongParam, LongParamList, Recipe, RecipeBook, StringInputParam, StringParam, StringParamList,
    WeightedOutputs,
};
pub use sampler::{
    pick_weighted, DoubleWeightRange, DoubleWeightTable, IntWeightRange, IntWeightTable,
};
