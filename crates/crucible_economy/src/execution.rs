//! # Execution Lifecycle
//!
//! Two-phase recipe execution.
//!
//! ```text
//! execute_recipe() -> match inputs -> freeze ItemRecords -> Execution (Submitted)
//!                                                                |
//!        external scheduler, once block_interval has elapsed     v
//! complete_execution() -> pick output set -> actualize entries -> ExecutionOutcome
//!                                                                (Completed)
//! ```
//!
//! A failed submission produces no record. Completion reads only the
//! frozen records stored on the execution, never the live item store, so
//! every validator observes the same inputs whenever completion runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::env::{EnvContext, EnvFactory, Environment, ExprEnvFactory};
use crate::error::{RecipeError, RecipeResult};
use crate::item::{Item, ItemRecord, ItemStore, ItemTerms};
use crate::matcher::match_item_inputs;
use crate::recipe::{CoinInput, Recipe, RecipeBook};
use crate::sampler::pick_weighted;

/// Output id reserved for the environment that picks the output set.
pub const OUTPUT_SET_SELECTOR: &str = "#outputs";

/// Where an execution is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Matched and recorded; awaiting completion.
    Submitted,
    /// Outputs produced. Terminal.
    Completed,
}

impl ExecutionStatus {
    /// Lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Completed => "completed",
        }
    }
}

/// A request to run a recipe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRecipeRequest {
    /// Submitting address.
    pub creator: String,
    /// Cookbook id.
    pub cookbook_id: String,
    /// Recipe id.
    pub recipe_id: String,
    /// Submitted item ids, in submission order.
    pub item_ids: Vec<String>,
    /// Height of the block carrying the request.
    pub block_height: u64,
}

/// A recorded recipe invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Assigned by [`ExecutionLog::append_pending`]; empty until then.
    pub id: String,
    /// Submitting address.
    pub creator: String,
    /// Cookbook id.
    pub cookbook_id: String,
    /// Recipe id.
    pub recipe_id: String,
    /// Software version that accepted the submission.
    pub node_version: String,
    /// Height at submission.
    pub block_height: u64,
    /// Coins declared by the recipe.
    pub coin_inputs: Vec<CoinInput>,
    /// Matched items frozen at submission, in slot order.
    pub item_inputs: Vec<ItemRecord>,
    /// Owner and transfer fee of each matched item, in slot order.
    #[serde(default)]
    pub item_terms: Vec<ItemTerms>,
    /// Lifecycle state.
    pub status: ExecutionStatus,
}

impl Execution {
    /// First height at which the execution may complete.
    #[inline]
    #[must_use]
    pub const fn ready_at(&self, block_interval: u64) -> u64 {
        self.block_height.saturating_add(block_interval)
    }

    /// True once `block_interval` blocks have passed since submission.
    #[inline]
    #[must_use]
    pub const fn is_ready(&self, current_height: u64, block_interval: u64) -> bool {
        current_height >= self.ready_at(block_interval)
    }
}

/// Coins minted by a completed execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinAmount {
    /// Entry that produced the coins.
    pub entry_id: String,
    /// Denomination.
    pub coin: String,
    /// Amount.
    pub amount: u64,
}

/// Everything a completed execution produced.
///
/// Persisting and crediting these is the host's job.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Execution id.
    pub execution_id: String,
    /// Index of the chosen output set, if the recipe declares any.
    pub output_set: Option<usize>,
    /// Coins to mint.
    pub coins: Vec<CoinAmount>,
    /// Newly created items.
    pub items: Vec<Item>,
    /// Input items with their attributes rewritten.
    pub modified_items: Vec<Item>,
}

/// Runs submissions and completions against a [`RecipeBook`].
#[derive(Debug)]
pub struct Engine<F: EnvFactory = ExprEnvFactory> {
    book: RecipeBook,
    factory: F,
}

impl Engine<ExprEnvFactory> {
    /// Creates an engine with the default expression environment.
    #[must_use]
    pub fn new(book: RecipeBook) -> Self {
        let factory = ExprEnvFactory::new(book.config());
        Self { book, factory }
    }
}

impl<F: EnvFactory> Engine<F> {
    /// Creates an engine with a custom environment factory.
    #[must_use]
    pub const fn with_factory(book: RecipeBook, factory: F) -> Self {
        Self { book, factory }
    }

    /// Registered recipes.
    #[must_use]
    pub const fn book(&self) -> &RecipeBook {
        &self.book
    }

    /// Matches a submission and records it.
    ///
    /// # Errors
    ///
    /// [`RecipeError::RecipeNotFound`] or any matcher error. No execution is
    /// produced on failure.
    pub fn execute_recipe<S: ItemStore + ?Sized>(
        &self,
        store: &S,
        request: &ExecuteRecipeRequest,
    ) -> RecipeResult<Execution> {
        let recipe = self.book.get(&request.cookbook_id, &request.recipe_id)?;
        let matched = match_item_inputs(
            store,
            &self.factory,
            recipe,
            &request.item_ids,
            Some(request.block_height),
        )?;

        let execution = Execution {
            id: String::new(),
            creator: request.creator.clone(),
            cookbook_id: recipe.cookbook_id.clone(),
            recipe_id: recipe.id.clone(),
            node_version: self.book.config().node_version.clone(),
            block_height: request.block_height,
            coin_inputs: recipe.coin_inputs.clone(),
            item_inputs: matched.iter().map(Item::snapshot).collect(),
            item_terms: matched.iter().map(Item::terms).collect(),
            status: ExecutionStatus::Submitted,
        };

        tracing::info!(
            "{}/{}: submitted by {} at height {} with {} items",
            execution.cookbook_id,
            execution.recipe_id,
            execution.creator,
            execution.block_height,
            execution.item_inputs.len()
        );
        Ok(execution)
    }

    fn env(&self, execution: &Execution, output_id: &str) -> RecipeResult<F::Env> {
        let ctx = EnvContext {
            cookbook_id: &execution.cookbook_id,
            recipe_id: &execution.recipe_id,
            output_id,
            block_height: Some(execution.block_height),
        };
        self.factory.build(&ctx, &execution.item_inputs)
    }

    /// Produces the outputs of a submitted execution and marks it completed.
    ///
    /// On error the execution is left untouched.
    ///
    /// # Errors
    ///
    /// - [`RecipeError::InvalidTransition`] if already completed
    /// - [`RecipeError::NotReady`] before the block interval has elapsed
    /// - [`RecipeError::ExpressionInvalid`], [`RecipeError::CannotSample`] or
    ///   [`RecipeError::InvalidRecipe`] from producing the outputs
    pub fn complete_execution(
        &self,
        execution: &mut Execution,
        current_height: u64,
    ) -> RecipeResult<ExecutionOutcome> {
        if execution.status != ExecutionStatus::Submitted {
            return Err(RecipeError::InvalidTransition {
                from: execution.status.as_str(),
                to: ExecutionStatus::Completed.as_str(),
            });
        }
        let recipe = self.book.get(&execution.cookbook_id, &execution.recipe_id)?;
        if !execution.is_ready(current_height, recipe.block_interval) {
            return Err(RecipeError::NotReady {
                submitted: execution.block_height,
                ready_at: execution.ready_at(recipe.block_interval),
                current: current_height,
            });
        }

        let outcome = self.produce(execution, recipe)?;
        execution.status = ExecutionStatus::Completed;

        tracing::info!(
            "{}/{}: execution {} completed, {} coins, {} new items, {} modified",
            execution.cookbook_id,
            execution.recipe_id,
            execution.id,
            outcome.coins.len(),
            outcome.items.len(),
            outcome.modified_items.len()
        );
        Ok(outcome)
    }

    fn produce(&self, execution: &Execution, recipe: &Recipe) -> RecipeResult<ExecutionOutcome> {
        let mut outcome = ExecutionOutcome {
            execution_id: execution.id.clone(),
            ..ExecutionOutcome::default()
        };
        if recipe.outputs.is_empty() {
            return Ok(outcome);
        }

        let mut selector = self.env(execution, OUTPUT_SET_SELECTOR)?;
        let chosen = pick_weighted(recipe.outputs.iter().map(|o| o.weight), selector.rng())?;
        outcome.output_set = Some(chosen);
        let selected = &recipe.outputs[chosen].entry_ids;
        let is_selected = |id: &str| selected.iter().any(|s| s == id);

        for coin in recipe.entries.coin_outputs.iter().filter(|c| is_selected(&c.id)) {
            let mut env = self.env(execution, &coin.id)?;
            let count = env.eval_int(&coin.count).map_err(|e| RecipeError::ExpressionInvalid {
                program: coin.count.clone(),
                subject: format!("entry={}", coin.id),
                source: e,
            })?;
            let amount = u64::try_from(count).map_err(|_| {
                RecipeError::InvalidRecipe(format!("entry {}: negative coin count {count}", coin.id))
            })?;
            outcome.coins.push(CoinAmount {
                entry_id: coin.id.clone(),
                coin: coin.coin.clone(),
                amount,
            });
        }

        for output in recipe.entries.item_outputs.iter().filter(|o| is_selected(&o.id)) {
            let mut env = self.env(execution, &output.id)?;
            let attributes = ItemRecord {
                id: format!("{}/{}", execution.id, output.id),
                doubles: output.doubles.actualize(&mut env)?,
                longs: output.longs.actualize(&mut env)?,
                strings: output.strings.actualize(&mut env)?,
            };
            outcome.items.push(Item {
                cookbook_id: execution.cookbook_id.clone(),
                owner: execution.creator.clone(),
                transfer_fee: output.transfer_fee,
                attributes,
            });
        }

        let mut modified: BTreeMap<usize, ItemRecord> = BTreeMap::new();
        for modify in recipe.entries.item_modify_outputs.iter().filter(|m| is_selected(&m.id)) {
            let slot = recipe
                .slot_index(&modify.item_input_ref)
                .filter(|&i| i < execution.item_inputs.len() && i < execution.item_terms.len())
                .ok_or_else(|| {
                    RecipeError::InvalidRecipe(format!(
                        "entry {} references unknown item input {}",
                        modify.id, modify.item_input_ref
                    ))
                })?;

            let mut env = self.env(execution, &modify.id)?;
            let doubles = modify.doubles.actualize(&mut env)?;
            let longs = modify.longs.actualize(&mut env)?;
            let strings = modify.strings.actualize(&mut env)?;

            let record = modified
                .entry(slot)
                .or_insert_with(|| execution.item_inputs[slot].clone());
            for kv in doubles {
                record.set_double(&kv.key, kv.value);
            }
            for kv in longs {
                record.set_long(&kv.key, kv.value);
            }
            for kv in strings {
                record.set_string(&kv.key, &kv.value);
            }
        }
        outcome.modified_items = modified
            .into_iter()
            .map(|(slot, attributes)| {
                Item::from_parts(
                    execution.cookbook_id.as_str(),
                    execution.item_terms[slot].clone(),
                    attributes,
                )
            })
            .collect();

        Ok(outcome)
    }
}

/// Submitted executions awaiting completion, plus finished ones.
#[derive(Clone, Debug, Default)]
pub struct ExecutionLog {
    next_id: u64,
    pending: BTreeMap<u64, Execution>,
    completed: BTreeMap<u64, Execution>,
}

impl ExecutionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next sequential id and stores the execution as pending.
    pub fn append_pending(&mut self, mut execution: Execution) -> String {
        let seq = self.next_id;
        self.next_id += 1;
        execution.id = seq.to_string();
        let id = execution.id.clone();
        self.pending.insert(seq, execution);
        id
    }

    /// Pending executions in submission order.
    pub fn pending(&self) -> impl Iterator<Item = &Execution> {
        self.pending.values()
    }

    /// Number of pending executions.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Looks up an execution by id, pending or completed.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Execution> {
        let seq = id.parse::<u64>().ok()?;
        self.pending.get(&seq).or_else(|| self.completed.get(&seq))
    }

    /// Completes every pending execution whose interval has elapsed, in
    /// submission order.
    ///
    /// Executions that fail stay pending; their errors are returned
    /// alongside the outcomes.
    pub fn complete_ready<F: EnvFactory>(
        &mut self,
        engine: &Engine<F>,
        current_height: u64,
    ) -> (Vec<ExecutionOutcome>, Vec<(String, RecipeError)>) {
        let mut outcomes = Vec::new();
        let mut failures = Vec::new();

        let ready: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, e)| match engine.book().get(&e.cookbook_id, &e.recipe_id) {
                Ok(recipe) => e.is_ready(current_height, recipe.block_interval),
                // surfaces as a failure below
                Err(_) => true,
            })
            .map(|(&seq, _)| seq)
            .collect();

        for seq in ready {
            let Some(mut execution) = self.pending.remove(&seq) else {
                continue;
            };
            match engine.complete_execution(&mut execution, current_height) {
                Ok(outcome) => {
                    outcomes.push(outcome);
                    self.completed.insert(seq, execution);
                }
                Err(e) => {
                    tracing::warn!("execution {} failed to complete: {}", execution.id, e);
                    failures.push((execution.id.clone(), e));
                    self.pending.insert(seq, execution);
                }
            }
        }
        (outcomes, failures)
    }
}
